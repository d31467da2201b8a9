use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::persist::{write_atomic_if_changed, PersistError, WriteOutcome};
use crate::render::{render_listing, ListingItem};

#[derive(Debug, Error)]
pub enum ListingError {
    #[error("cannot read listing page {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("listing page {0:?} has no well-ordered marker pair")]
    MissingMarkers(PathBuf),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// The literal comment pair delimiting the generated region of a page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingMarkers {
    pub start: String,
    pub end: String,
}

impl Default for ListingMarkers {
    fn default() -> Self {
        Self {
            start: "<!-- AUTO:START -->".to_string(),
            end: "<!-- AUTO:END -->".to_string(),
        }
    }
}

/// Replaces exactly the content between the markers; everything outside,
/// the markers included, is preserved byte for byte.
pub fn replace_marked_region(page: &str, markers: &ListingMarkers, content: &str) -> Option<String> {
    let start = page.find(&markers.start)?;
    let inner_start = start + markers.start.len();
    let end = inner_start + page[inner_start..].find(&markers.end)?;

    let mut out = String::with_capacity(page.len() + content.len());
    out.push_str(&page[..inner_start]);
    out.push('\n');
    out.push_str(content);
    out.push('\n');
    out.push_str(&page[end..]);
    Some(out)
}

/// Sorts `items` newest first and rewrites the marked region of `page_path`.
pub fn update_listing_page(
    page_path: &Path,
    markers: &ListingMarkers,
    items: &mut [ListingItem],
) -> Result<WriteOutcome, ListingError> {
    let page = fs::read_to_string(page_path).map_err(|source| ListingError::Read {
        path: page_path.to_path_buf(),
        source,
    })?;
    items.sort_by(|a, b| b.sort_key.cmp(&a.sort_key).then_with(|| a.href.cmp(&b.href)));
    let updated = replace_marked_region(&page, markers, &render_listing(items))
        .ok_or_else(|| ListingError::MissingMarkers(page_path.to_path_buf()))?;
    Ok(write_atomic_if_changed(page_path, updated.as_bytes())?)
}
