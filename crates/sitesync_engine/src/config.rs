//! Configuration value objects.
//!
//! [`SiteConfig`] is what the configuration file deserializes into; every
//! field has a default so an empty file (or no file) is valid. Components
//! never read it directly: the `*_settings` methods resolve it against the
//! site root into the plain settings each stage takes at construction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::chunk::DEFAULT_CHUNK_SIZE;
use crate::listing::ListingMarkers;
use crate::preview::MAX_PREVIEW_CHARS;

/// Documents at or above this many bytes of normalized HTML are chunked.
pub const DEFAULT_LARGE_DOC_THRESHOLD: usize = 8 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site_name: String,
    pub site_url: String,
    pub author: String,
    pub sync: SyncOptions,
    pub drive: DriveOptions,
    pub index: IndexOptions,
    pub feed: FeedOptions,
    pub sitemap: SitemapOptions,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_name: "Portfolio".to_string(),
            site_url: "https://www.example.com".to_string(),
            author: "Site Author".to_string(),
            sync: SyncOptions::default(),
            drive: DriveOptions::default(),
            index: IndexOptions::default(),
            feed: FeedOptions::default(),
            sitemap: SitemapOptions::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncOptions {
    pub posts_dir: PathBuf,
    /// Page whose marker region lists the synced posts; `None` disables it.
    pub listing_page: Option<PathBuf>,
    pub state_file: PathBuf,
    pub large_doc_threshold: usize,
    pub chunk_size: usize,
    pub prefetch_parts: bool,
    pub download_media: bool,
    pub markers: ListingMarkers,
    pub retry: RetryPolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            posts_dir: PathBuf::from("pages/blog"),
            listing_page: Some(PathBuf::from("pages/blog.html")),
            state_file: PathBuf::from(".sync-state.json"),
            large_doc_threshold: DEFAULT_LARGE_DOC_THRESHOLD,
            chunk_size: DEFAULT_CHUNK_SIZE,
            prefetch_parts: false,
            download_media: true,
            markers: ListingMarkers::default(),
            retry: RetryPolicy::default(),
        }
    }
}

/// Fixed-delay retry budget for remote calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay_ms: u64,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts,
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// No waiting between attempts; for tests and local fakes.
    pub fn immediate(attempts: u32) -> Self {
        Self::new(attempts, Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveOptions {
    pub api_base: String,
    pub folder_id: Option<String>,
    pub credentials_file: Option<PathBuf>,
    pub max_export_bytes: u64,
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
}

impl Default for DriveOptions {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/drive/v3/".to_string(),
            folder_id: None,
            credentials_file: None,
            max_export_bytes: 64 * 1024 * 1024,
            connect_timeout_secs: 10,
            request_timeout_secs: 120,
        }
    }
}

/// Path prefix -> (category, icon); the first matching rule wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryRule {
    pub prefix: String,
    pub category: String,
    pub icon: String,
}

impl CategoryRule {
    pub fn new(prefix: &str, category: &str, icon: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            category: category.to_string(),
            icon: icon.to_string(),
        }
    }
}

fn default_category_rules() -> Vec<CategoryRule> {
    vec![
        CategoryRule::new("pages/blog/", "article", "bi-journal-text"),
        CategoryRule::new("pages/projects/", "project-detail", "bi-file-earmark-text"),
        CategoryRule::new("pages/my-work", "work", "bi-briefcase"),
        CategoryRule::new("pages/projects.html", "projects", "bi-kanban"),
        CategoryRule::new("pages/music", "music", "bi-music-note-beamed"),
        CategoryRule::new("pages/shop", "shop", "bi-bag"),
        CategoryRule::new("pages/about", "about", "bi-person"),
        CategoryRule::new("pages/blog.html", "articles", "bi-journal-text"),
        CategoryRule::new("pages/gallery", "gallery", "bi-images"),
        CategoryRule::new("pages/passion-projects", "projects", "bi-kanban"),
        CategoryRule::new("index.html", "home", "bi-house"),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexOptions {
    pub output: PathBuf,
    pub skip_dirs: Vec<String>,
    pub skip_files: Vec<String>,
    pub category_rules: Vec<CategoryRule>,
    pub default_category: String,
    pub default_icon: String,
    pub preview_chars: usize,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from("assets/search-index.json"),
            skip_dirs: [".git", ".github", "node_modules", "__pycache__", "scripts", "target"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            skip_files: vec!["_TEMPLATE.html".to_string()],
            category_rules: default_category_rules(),
            default_category: "page".to_string(),
            default_icon: "bi-file-earmark".to_string(),
            preview_chars: MAX_PREVIEW_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedOptions {
    pub output: PathBuf,
    /// Defaults to the site name.
    pub title: Option<String>,
    pub subtitle: String,
    pub include_categories: Vec<String>,
}

impl Default for FeedOptions {
    fn default() -> Self {
        Self {
            output: PathBuf::from("feed.xml"),
            title: None,
            subtitle: "Articles, projects, and updates.".to_string(),
            include_categories: ["article", "project-detail", "work", "music", "shop"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapOptions {
    pub output: PathBuf,
    pub priorities: BTreeMap<String, String>,
    pub default_priority: String,
}

impl Default for SitemapOptions {
    fn default() -> Self {
        let priorities = [
            ("home", "1.0"),
            ("work", "0.9"),
            ("projects", "0.8"),
            ("project-detail", "0.7"),
            ("articles", "0.8"),
            ("article", "0.7"),
            ("about", "0.6"),
            ("gallery", "0.6"),
            ("music", "0.6"),
            ("shop", "0.6"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        Self {
            output: PathBuf::from("sitemap.xml"),
            priorities,
            default_priority: "0.5".to_string(),
        }
    }
}

/// Resolved settings for the synchronizer.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub posts_dir: PathBuf,
    pub listing_page: Option<PathBuf>,
    pub state_file: PathBuf,
    pub author: String,
    pub site_name: String,
    pub large_doc_threshold: usize,
    pub chunk_size: usize,
    pub prefetch_parts: bool,
    pub download_media: bool,
    pub markers: ListingMarkers,
    pub retry: RetryPolicy,
    pub dry_run: bool,
}

/// Resolved settings for the site index builder.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexSettings {
    pub root: PathBuf,
    pub site_name: String,
    pub skip_dirs: Vec<String>,
    pub skip_files: Vec<String>,
    pub category_rules: Vec<CategoryRule>,
    pub default_category: String,
    pub default_icon: String,
    pub preview_chars: usize,
}

/// Resolved settings for the Atom feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSettings {
    pub site_url: String,
    pub title: String,
    pub subtitle: String,
    pub author: String,
    pub include_categories: Vec<String>,
}

/// Resolved settings for the sitemap.
#[derive(Debug, Clone, PartialEq)]
pub struct SitemapSettings {
    pub site_url: String,
    pub priorities: BTreeMap<String, String>,
    pub default_priority: String,
}

impl SiteConfig {
    pub fn sync_settings(&self, root: &Path) -> SyncSettings {
        let sync = &self.sync;
        SyncSettings {
            posts_dir: root.join(&sync.posts_dir),
            listing_page: sync.listing_page.as_ref().map(|page| root.join(page)),
            state_file: root.join(&sync.state_file),
            author: self.author.clone(),
            site_name: self.site_name.clone(),
            large_doc_threshold: sync.large_doc_threshold,
            chunk_size: sync.chunk_size.max(1),
            prefetch_parts: sync.prefetch_parts,
            download_media: sync.download_media,
            markers: sync.markers.clone(),
            retry: sync.retry,
            dry_run: false,
        }
    }

    pub fn index_settings(&self, root: &Path) -> IndexSettings {
        let index = &self.index;
        IndexSettings {
            root: root.to_path_buf(),
            site_name: self.site_name.clone(),
            skip_dirs: index.skip_dirs.clone(),
            skip_files: index.skip_files.clone(),
            category_rules: index.category_rules.clone(),
            default_category: index.default_category.clone(),
            default_icon: index.default_icon.clone(),
            preview_chars: index.preview_chars,
        }
    }

    pub fn feed_settings(&self) -> FeedSettings {
        FeedSettings {
            site_url: self.site_url.trim_end_matches('/').to_string(),
            title: self
                .feed
                .title
                .clone()
                .unwrap_or_else(|| self.site_name.clone()),
            subtitle: self.feed.subtitle.clone(),
            author: self.author.clone(),
            include_categories: self.feed.include_categories.clone(),
        }
    }

    pub fn sitemap_settings(&self) -> SitemapSettings {
        SitemapSettings {
            site_url: self.site_url.trim_end_matches('/').to_string(),
            priorities: self.sitemap.priorities.clone(),
            default_priority: self.sitemap.default_priority.clone(),
        }
    }

    pub fn index_path(&self, root: &Path) -> PathBuf {
        root.join(&self.index.output)
    }

    pub fn feed_path(&self, root: &Path) -> PathBuf {
        root.join(&self.feed.output)
    }

    pub fn sitemap_path(&self, root: &Path) -> PathBuf {
        root.join(&self.sitemap.output)
    }
}
