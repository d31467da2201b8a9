//! Atom feed generated from the site index.

use std::path::Path;
use std::string::FromUtf8Error;

use atom_syndication::{Category, Entry, Feed, FixedDateTime, Link, Person, Text};
use chrono::{DateTime, NaiveDate};
use sitesync_core::IndexEntry;
use thiserror::Error;

use crate::config::FeedSettings;
use crate::persist::{write_atomic_if_changed, PersistError, WriteOutcome};

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("atom error: {0}")]
    Atom(#[from] atom_syndication::Error),
    #[error("feed is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

/// Absolute URL of a site-relative href.
pub fn absolute_url(site_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{site_url}{href}")
    } else {
        format!("{site_url}/{href}")
    }
}

/// Accepts full timestamps and bare `YYYY-MM-DD` dates.
fn parse_entry_date(date: &str) -> Option<FixedDateTime> {
    let date = date.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(date) {
        return Some(dt);
    }
    let day = NaiveDate::parse_from_str(date.get(..10)?, "%Y-%m-%d").ok()?;
    Some(day.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset())
}

fn epoch() -> FixedDateTime {
    DateTime::<chrono::Utc>::default().fixed_offset()
}

fn link(href: String, rel: &str, mime_type: Option<&str>) -> Link {
    let mut link = Link::default();
    link.set_href(href);
    link.set_rel(rel);
    link.set_mime_type(mime_type.map(ToOwned::to_owned));
    link
}

/// Builds the feed document. The feed's `updated` is the newest entry date,
/// so the same index always yields the same bytes.
pub fn build_atom_feed(entries: &[IndexEntry], settings: &FeedSettings) -> Result<String, FeedError> {
    let site_url = settings.site_url.as_str();
    let mut author = Person::default();
    author.set_name(settings.author.as_str());

    let mut feed_entries = Vec::new();
    let mut newest: Option<FixedDateTime> = None;
    for entry in entries
        .iter()
        .filter(|entry| settings.include_categories.iter().any(|c| *c == entry.category))
    {
        let url = absolute_url(site_url, &entry.href);
        let updated = parse_entry_date(&entry.date).unwrap_or_else(epoch);
        newest = Some(newest.map_or(updated, |current| current.max(updated)));

        let mut item = Entry::default();
        item.set_title(entry.title.as_str());
        item.set_id(url.as_str());
        item.set_updated(updated);
        item.set_links(vec![link(url, "alternate", None)]);
        item.set_summary(Some(Text::plain(entry.preview.as_str())));
        item.set_categories(
            entry
                .tags
                .iter()
                .map(|tag| {
                    let mut category = Category::default();
                    category.set_term(tag.as_str());
                    category
                })
                .collect::<Vec<_>>(),
        );
        feed_entries.push(item);
    }

    let mut feed = Feed::default();
    feed.set_title(settings.title.as_str());
    feed.set_subtitle(Some(Text::plain(settings.subtitle.as_str())));
    feed.set_id(format!("{site_url}/"));
    feed.set_updated(newest.unwrap_or_else(epoch));
    feed.set_authors(vec![author]);
    feed.set_links(vec![
        link(format!("{site_url}/feed.xml"), "self", Some("application/atom+xml")),
        link(format!("{site_url}/"), "alternate", Some("text/html")),
    ]);
    feed.set_entries(feed_entries);

    let bytes = feed.write_to(Vec::new())?;
    Ok(String::from_utf8(bytes)?)
}

/// Builds and writes the feed; returns the number of entries included.
pub fn write_atom_feed(
    path: &Path,
    entries: &[IndexEntry],
    settings: &FeedSettings,
) -> Result<(usize, WriteOutcome), FeedError> {
    let xml = build_atom_feed(entries, settings)?;
    let count = entries
        .iter()
        .filter(|entry| settings.include_categories.iter().any(|c| *c == entry.category))
        .count();
    let outcome = write_atomic_if_changed(path, xml.as_bytes())?;
    Ok((count, outcome))
}
