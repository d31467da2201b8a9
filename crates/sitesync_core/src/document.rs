use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A document living in the remote folder. Read-only to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteDocument {
    pub id: String,
    pub name: String,
    /// RFC 3339 modification timestamp, used verbatim as the revision marker.
    #[serde(rename = "modifiedTime")]
    pub modified_time: String,
}

impl RemoteDocument {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        modified_time: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            modified_time: modified_time.into(),
        }
    }

    /// Parsed modification time in UTC, if the remote sent a valid timestamp.
    pub fn modified_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(self.modified_time.trim())
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Human-readable date shown on post pages, e.g. `March 1, 2024`.
    pub fn display_date(&self) -> String {
        match self.modified_at() {
            Some(dt) => dt.format("%B %-d, %Y").to_string(),
            None => self.modified_time.clone(),
        }
    }

    /// Title used for rendering; blank names fall back to `Untitled`.
    pub fn title(&self) -> &str {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            "Untitled"
        } else {
            trimmed
        }
    }
}
