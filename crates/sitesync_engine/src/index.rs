//! Site-wide page catalog, rebuilt from the HTML tree on every pass.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use scraper::{Html, Selector};
use site_logging::{site_debug, site_warn};
use sitesync_core::{classify_generated, is_part_filename, GeneratedFile, IndexEntry};
use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

use crate::config::IndexSettings;
use crate::persist::{write_atomic, PersistError};
use crate::preview::{collapse_whitespace, truncate_preview, visible_text_of};

const FILENAME_TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";
const FILENAME_TIMESTAMP_LEN: usize = 19;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("site root {0:?} is not a directory")]
    NotADirectory(PathBuf),
    #[error("cannot serialize index: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("cannot read index {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("cannot parse index {path:?}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Walks `settings.root` and builds one entry per HTML page, newest first.
///
/// Unreadable files are logged and skipped; only a missing root fails.
pub fn build_site_index(settings: &IndexSettings) -> Result<Vec<IndexEntry>, IndexError> {
    let root = &settings.root;
    if !root.is_dir() {
        return Err(IndexError::NotADirectory(root.clone()));
    }

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| !is_skipped_dir(entry, settings));

    let mut entries = Vec::new();
    for item in walker {
        let entry = match item {
            Ok(entry) => entry,
            Err(err) => {
                site_warn!("Skipping unreadable path: {}", err);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_indexable(entry.file_name().to_string_lossy().as_ref(), settings) {
            continue;
        }
        if let Some(index_entry) = index_file(entry.path(), settings) {
            entries.push(index_entry);
        }
    }

    sort_entries(&mut entries);
    site_debug!("Indexed {} pages under {:?}", entries.len(), root);
    Ok(entries)
}

/// Newest first; equal dates fall back to `href` so output is stable.
pub fn sort_entries(entries: &mut [IndexEntry]) {
    entries.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.href.cmp(&b.href)));
}

fn is_skipped_dir(entry: &DirEntry, settings: &IndexSettings) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && settings
            .skip_dirs
            .iter()
            .any(|skip| entry.file_name().to_string_lossy() == skip.as_str())
}

fn is_indexable(file_name: &str, settings: &IndexSettings) -> bool {
    file_name.to_ascii_lowercase().ends_with(".html")
        && !settings.skip_files.iter().any(|skip| skip == file_name)
        && !is_part_filename(file_name)
}

/// First matching path-prefix rule, or the configured default.
pub fn categorize(rel_path: &str, settings: &IndexSettings) -> (String, String) {
    let normalized = rel_path.replace('\\', "/");
    settings
        .category_rules
        .iter()
        .find(|rule| normalized.starts_with(&rule.prefix))
        .map(|rule| (rule.category.clone(), rule.icon.clone()))
        .unwrap_or_else(|| (settings.default_category.clone(), settings.default_icon.clone()))
}

/// Builds the entry for one file; `None` when it cannot be read.
pub fn index_file(path: &Path, settings: &IndexSettings) -> Option<IndexEntry> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            site_warn!("Skipping {:?}: {}", path, err);
            return None;
        }
    };
    let rel = relative_path(path, &settings.root);
    let document = Html::parse_document(&crate::decode::decode_lossy(&bytes));

    let title = first_text(&document, "title")
        .map(|raw| strip_site_suffix(&raw, &settings.site_name))
        .filter(|title| !title.is_empty())
        .or_else(|| first_text(&document, "h1").filter(|h1| !h1.is_empty()))
        .unwrap_or_else(|| rel.clone());

    let (category, icon) = categorize(&rel, settings);

    let preview_source = meta_content(&document, "name", "description")
        .filter(|description| !description.trim().is_empty())
        .unwrap_or_else(|| visible_text_of(&document));
    let preview = truncate_preview(&preview_source, settings.preview_chars);

    let mut tags: Vec<String> = meta_content(&document, "name", "keywords")
        .map(|keywords| {
            keywords
                .split(',')
                .map(str::trim)
                .filter(|k| !k.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default();
    if !tags.contains(&category) {
        tags.push(category.clone());
    }

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let date = meta_date(&document)
        .or_else(|| filename_date(&file_name))
        .or_else(|| modified_date(path))
        .unwrap_or_default();

    Some(IndexEntry {
        title,
        slug: rel.clone(),
        href: format!("/{rel}"),
        preview,
        tags,
        category,
        icon,
        date: date.to_rfc3339_opts(SecondsFormat::Secs, false),
    })
}

fn relative_path(path: &Path, root: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// `Page | Site Name` -> `Page`.
fn strip_site_suffix(raw: &str, site_name: &str) -> String {
    let title = collapse_whitespace(raw);
    if let Some((head, tail)) = title.rsplit_once('|') {
        if !site_name.is_empty() && tail.trim() == site_name.trim() && !head.trim().is_empty() {
            return head.trim().to_string();
        }
    }
    title
}

fn first_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
}

fn meta_content(document: &Html, attr: &str, value: &str) -> Option<String> {
    let selector = Selector::parse("meta").ok()?;
    document
        .select(&selector)
        .find(|meta| {
            meta.value()
                .attr(attr)
                .is_some_and(|v| v.trim().eq_ignore_ascii_case(value))
        })
        .and_then(|meta| meta.value().attr("content"))
        .map(ToOwned::to_owned)
}

/// `article:published_time` first, then a plain `date` meta.
fn meta_date(document: &Html) -> Option<DateTime<Utc>> {
    meta_content(document, "property", "article:published_time")
        .and_then(|value| parse_date(&value))
        .or_else(|| meta_content(document, "name", "date").and_then(|value| parse_date(&value)))
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Timestamp encoded in a generated post name.
fn filename_date(file_name: &str) -> Option<DateTime<Utc>> {
    let stem = match classify_generated(file_name)? {
        GeneratedFile::Post { stem } => stem,
        _ => return None,
    };
    let timestamp = stem.get(..FILENAME_TIMESTAMP_LEN)?;
    NaiveDateTime::parse_from_str(timestamp, FILENAME_TIMESTAMP_FORMAT)
        .ok()
        .map(|dt| dt.and_utc())
}

fn modified_date(path: &Path) -> Option<DateTime<Utc>> {
    let modified: SystemTime = fs::metadata(path).and_then(|meta| meta.modified()).ok()?;
    Some(DateTime::<Utc>::from(modified))
}

/// Pretty JSON, replaced atomically.
pub fn write_site_index(path: &Path, entries: &[IndexEntry]) -> Result<(), IndexError> {
    let mut json = serde_json::to_string_pretty(entries)?;
    json.push('\n');
    write_atomic(path, json.as_bytes())?;
    Ok(())
}

/// `Ok(None)` when no index has been built yet.
pub fn load_site_index(path: &Path) -> Result<Option<Vec<IndexEntry>>, IndexError> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(IndexError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&text)
        .map(Some)
        .map_err(|source| IndexError::Parse {
            path: path.to_path_buf(),
            source,
        })
}
