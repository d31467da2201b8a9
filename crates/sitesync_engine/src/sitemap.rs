use std::path::Path;

use quick_xml::escape::escape;
use sitesync_core::IndexEntry;

use crate::config::SitemapSettings;
use crate::feed::absolute_url;
use crate::persist::{write_atomic_if_changed, PersistError, WriteOutcome};

const LASTMOD_LEN: usize = 10;

/// `<urlset>` with one `<url>` per index entry, in index order.
pub fn build_sitemap(entries: &[IndexEntry], settings: &SitemapSettings) -> String {
    let mut xml = String::from(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
    );
    for entry in entries {
        let loc = absolute_url(&settings.site_url, &entry.href);
        let priority = settings
            .priorities
            .get(&entry.category)
            .unwrap_or(&settings.default_priority);

        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", escape(loc.as_str())));
        if let Some(lastmod) = entry.date.get(..LASTMOD_LEN).filter(|d| !d.trim().is_empty()) {
            xml.push_str(&format!("    <lastmod>{}</lastmod>\n", escape(lastmod)));
        }
        xml.push_str(&format!("    <priority>{}</priority>\n", escape(priority.as_str())));
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

pub fn write_sitemap(
    path: &Path,
    entries: &[IndexEntry],
    settings: &SitemapSettings,
) -> Result<WriteOutcome, PersistError> {
    write_atomic_if_changed(path, build_sitemap(entries, settings).as_bytes())
}
