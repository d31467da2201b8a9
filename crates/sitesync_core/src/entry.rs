use serde::{Deserialize, Serialize};

/// One row of the site-wide page catalog consumed by search, feed and sitemap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub title: String,
    /// Root-relative path with forward slashes; unique across the index.
    pub slug: String,
    pub href: String,
    pub preview: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub category: String,
    pub icon: String,
    /// RFC 3339 timestamp; the descending sort key of every consumer.
    pub date: String,
}
