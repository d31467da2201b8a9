use quick_xml::escape::escape;

/// Delay before prefetch mode starts pulling parts, in milliseconds.
pub const PREFETCH_DELAY_MS: u32 = 1500;

const PART_LOADER_JS: &str = r#"(function () {
  var PARTS = __PARTS__;
  var PREFETCH = __PREFETCH__;
  if (!Array.isArray(PARTS) || PARTS.length < 2) return;
  var container = document.getElementById('docs-container');
  var slot = document.getElementById('docs-loading-placeholder');
  var btn = document.createElement('button');
  btn.type = 'button';
  btn.className = 'load-more-btn';
  btn.textContent = 'Load full document';
  var started = false;
  async function loadRemainingParts() {
    if (started) return;
    started = true;
    btn.disabled = true;
    btn.textContent = 'Loading...';
    for (var i = 1; i < PARTS.length; i++) {
      try {
        var resp = await fetch(PARTS[i]);
        if (!resp.ok) { console.error('Failed to load part', PARTS[i]); continue; }
        var wrapper = document.createElement('div');
        wrapper.innerHTML = await resp.text();
        container.appendChild(wrapper);
      } catch (e) {
        console.error('Error loading part', PARTS[i], e);
      }
    }
    btn.remove();
  }
  btn.addEventListener('click', loadRemainingParts);
  slot.appendChild(btn);
  if (PREFETCH) setTimeout(loadRemainingParts, __DELAY__);
})();"#;

/// Everything needed to render one synced post page.
#[derive(Debug, Clone, Copy)]
pub struct PostPage<'a> {
    pub title: &'a str,
    pub author: &'a str,
    /// Display date, not necessarily sortable.
    pub date: &'a str,
    /// Meta description, usually the cached summary.
    pub description: &'a str,
    pub site_name: &'a str,
    /// First chunk, or the whole body when not chunked.
    pub content_html: &'a str,
    /// Sibling part filenames in order, empty when not chunked.
    pub parts: &'a [String],
    pub prefetch: bool,
}

/// Builds the complete HTML document for a post. Pure string building.
pub fn render_post(page: &PostPage<'_>) -> String {
    let title = escape(page.title);
    let author = escape(page.author);
    let date = escape(page.date);
    let description = escape(page.description);
    let site_name = escape(page.site_name);

    let mut html = String::with_capacity(page.content_html.len() + 4096);
    html.push_str(&format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <meta name="viewport" content="width=device-width,initial-scale=1">
  <meta name="description" content="{description}">
  <meta name="author" content="{author}">
  <title>{title} | {site_name}</title>
  <link rel="stylesheet" href="../../css/main.css">
  <link rel="stylesheet" href="https://cdn.jsdelivr.net/npm/bootstrap-icons@1.11.3/font/bootstrap-icons.min.css">
  <link rel="alternate" type="application/atom+xml" title="{site_name}" href="/feed.xml">
</head>
<body data-route="blog">
  <a href="#main" class="skip-link">Skip to main content</a>
  <main id="main" class="page-content">
    <div class="breadcrumb"><a href="../../index.html">Home</a> / <a href="../blog.html">Blog</a> / {title}</div>
    <article class="article-content">
      <header class="article-header">
        <h1>{title}</h1>
        <div class="article-meta">
          <span><i class="bi bi-calendar3"></i> {date}</span>
          <span><i class="bi bi-person"></i> {author}</span>
        </div>
      </header>
      <div id="docs-container" class="docs-content-container">
"##
    ));
    html.push_str(page.content_html);
    html.push_str(
        r#"
      </div>
      <div id="docs-loading-placeholder"></div>
    </article>
  </main>
"#,
    );

    if page.parts.len() > 1 {
        html.push_str("  <script>\n");
        html.push_str(&part_loader_script(page.parts, page.prefetch));
        html.push_str("\n  </script>\n");
    }
    html.push_str("  <script src=\"../../js/nav.js\"></script>\n</body>\n</html>\n");
    html
}

fn part_loader_script(parts: &[String], prefetch: bool) -> String {
    // Filenames are slugs, but never let data close the script element.
    let parts_json = serde_json::to_string(parts)
        .unwrap_or_else(|_| "[]".to_string())
        .replace("</", "<\\/");
    PART_LOADER_JS
        .replace("__PARTS__", &parts_json)
        .replace("__PREFETCH__", if prefetch { "true" } else { "false" })
        .replace("__DELAY__", &PREFETCH_DELAY_MS.to_string())
}

/// Body used when neither export format could be retrieved.
pub fn placeholder_body(title: &str, source_link: &str) -> String {
    format!(
        "<p class=\"sync-placeholder\">The content of &quot;{}&quot; could not be extracted \
         automatically.</p>\n<p><a href=\"{}\" rel=\"noopener\">Open the original document</a></p>",
        escape(title),
        escape(source_link)
    )
}

/// Post card list placed between the listing page markers.
pub fn render_listing(items: &[ListingItem]) -> String {
    if items.is_empty() {
        return "<p class=\"post-list-empty\">No posts yet.</p>".to_string();
    }
    let mut html = String::from("<div class=\"post-list\">\n");
    for item in items {
        html.push_str(&format!(
            "  <article class=\"post-card\">\n    <h3><a href=\"{href}\">{title}</a></h3>\n    \
             <div class=\"post-meta\"><i class=\"bi bi-calendar3\"></i> {date}</div>\n",
            href = escape(&item.href),
            title = escape(&item.title),
            date = escape(&item.date),
        ));
        if !item.summary.is_empty() {
            html.push_str(&format!("    <p>{}</p>\n", escape(&item.summary)));
        }
        html.push_str("  </article>\n");
    }
    html.push_str("</div>");
    html
}

/// One post in the aggregate listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingItem {
    pub title: String,
    pub href: String,
    /// Display date.
    pub date: String,
    /// Raw modifiedTime, used as the sort key.
    pub sort_key: String,
    pub summary: String,
}
