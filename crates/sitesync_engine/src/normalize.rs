use std::collections::{HashMap, HashSet};
use std::path::Path;

use ego_tree::NodeRef;
use quick_xml::escape::{escape, partial_escape};
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html};
use url::Url;

use crate::preview::visible_text;

/// Elements removed together with everything inside them.
const DROPPED_ELEMENTS: &[&str] = &[
    "style", "script", "meta", "link", "noscript", "template", "title", "head", "base",
];

const VOID_ELEMENTS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "param", "source", "track", "wbr",
];

/// Elements that are pure wrappers: without content they render nothing.
const CONTAINER_ELEMENTS: &[&str] = &[
    "p", "span", "div", "section", "article", "header", "footer", "aside", "b", "i", "em",
    "strong", "u", "s", "font", "sup", "sub", "small", "mark", "center", "li", "ul", "ol",
    "blockquote", "h1", "h2", "h3", "h4", "h5", "h6",
];

/// Converts exported markup into a sanitized, self-contained body fragment.
pub trait Normalizer: Send + Sync {
    fn normalize(&self, html: &str, media: &MediaMap) -> String;
}

/// Original image `src` -> local href, for files confirmed on disk.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaMap {
    local: HashMap<String, String>,
}

impl MediaMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the rewrite only when `local_file` exists; returns whether it
    /// was registered.
    pub fn insert_if_present(&mut self, src: &str, local_href: &str, local_file: &Path) -> bool {
        if !local_file.is_file() {
            return false;
        }
        self.local.insert(src.to_string(), local_href.to_string());
        true
    }

    pub fn resolve(&self, src: &str) -> Option<&str> {
        self.local.get(src).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.local.len()
    }

    pub fn is_empty(&self) -> bool {
        self.local.is_empty()
    }
}

/// Normalizer tuned for word-processor HTML exports: inline styles, bookmark
/// spans, redirect-wrapped links and repeated images.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocsNormalizer;

impl Normalizer for DocsNormalizer {
    fn normalize(&self, html: &str, media: &MediaMap) -> String {
        if !html.contains('<') {
            return single_paragraph(html);
        }

        let document = Html::parse_document(html);
        let mut ctx = NormalizeContext::new(media);
        if let Some(body) = body_of(&document) {
            for child in body.children() {
                visit_node(child, &mut ctx);
            }
        }

        let output = ctx.out.trim();
        if output.is_empty() {
            // Nothing structural survived; keep whatever text there was.
            let text = visible_text(html);
            if text.is_empty() {
                return String::new();
            }
            return format!("<p>{}</p>", partial_escape(text.as_str()));
        }
        if !output.contains('<') {
            // Parsed as bare text: no element survived to carry it.
            return format!("<p>{output}</p>");
        }
        output.to_string()
    }
}

/// Markup-free input as one escaped paragraph.
fn single_paragraph(text: &str) -> String {
    let text = text.trim_start_matches('\u{feff}').trim();
    if text.is_empty() {
        return String::new();
    }
    format!("<p>{}</p>", partial_escape(text))
}

/// Event handlers never survive normalization.
fn is_event_handler(name: &str) -> bool {
    name.len() > 2 && name.get(..2).is_some_and(|prefix| prefix.eq_ignore_ascii_case("on"))
}

/// `javascript:` URLs, including ones obfuscated with whitespace or case.
fn is_script_url(value: &str) -> bool {
    let compact: String = value
        .chars()
        .filter(|c| !c.is_whitespace() && !c.is_control())
        .take("javascript:".len())
        .collect();
    compact.eq_ignore_ascii_case("javascript:")
}

struct NormalizeContext<'m> {
    out: String,
    media: &'m MediaMap,
    seen_images: HashSet<String>,
}

impl<'m> NormalizeContext<'m> {
    fn new(media: &'m MediaMap) -> Self {
        Self {
            out: String::new(),
            media,
            seen_images: HashSet::new(),
        }
    }

    fn push_attr(&mut self, name: &str, value: &str) {
        self.out.push(' ');
        self.out.push_str(name);
        self.out.push_str("=\"");
        self.out.push_str(&escape(value));
        self.out.push('"');
    }
}

fn visit_node(node: NodeRef<'_, Node>, ctx: &mut NormalizeContext) {
    match node.value() {
        Node::Text(text) => ctx.out.push_str(&partial_escape(&**text)),
        Node::Element(_) => {
            if let Some(element) = ElementRef::wrap(node) {
                visit_element(element, ctx);
            }
        }
        Node::Document | Node::Fragment => {
            for child in node.children() {
                visit_node(child, ctx);
            }
        }
        // comments, doctypes, processing instructions
        _ => {}
    }
}

fn visit_element(element: ElementRef, ctx: &mut NormalizeContext) {
    let el = element.value();
    let tag = el.name().to_ascii_lowercase();
    if DROPPED_ELEMENTS.contains(&tag.as_str()) {
        return;
    }
    if tag == "img" {
        write_image(el, ctx);
        return;
    }

    let start = ctx.out.len();
    ctx.out.push('<');
    ctx.out.push_str(&tag);
    for (name, value) in sorted_attrs(el) {
        if name.eq_ignore_ascii_case("style") || is_event_handler(name) {
            continue;
        }
        if is_url_attr(name) && is_script_url(value) {
            continue;
        }
        if tag == "a" && name.eq_ignore_ascii_case("href") {
            let href = unwrap_redirect(value).unwrap_or_else(|| value.to_string());
            ctx.push_attr(name, &href);
        } else {
            ctx.push_attr(name, value);
        }
    }
    ctx.out.push('>');
    if VOID_ELEMENTS.contains(&tag.as_str()) {
        return;
    }

    let content_start = ctx.out.len();
    for child in element.children() {
        visit_node(child, ctx);
    }
    if CONTAINER_ELEMENTS.contains(&tag.as_str()) && ctx.out[content_start..].trim().is_empty() {
        ctx.out.truncate(start);
        return;
    }
    ctx.out.push_str("</");
    ctx.out.push_str(&tag);
    ctx.out.push('>');
}

/// Images with a usable `src` appear once per source. Images without one
/// (lazy-loading `data-src` only) are kept as they are, minus sizing.
fn write_image(el: &Element, ctx: &mut NormalizeContext) {
    let src = el
        .attr("src")
        .map(str::trim)
        .filter(|s| !s.is_empty() && !is_script_url(s));
    if let Some(src) = src {
        if !ctx.seen_images.insert(src.to_string()) {
            return;
        }
    }

    ctx.out.push_str("<img");
    if let Some(src) = src {
        let final_src = ctx.media.resolve(src).unwrap_or(src).to_string();
        ctx.push_attr("src", &final_src);
    }
    for (name, value) in sorted_attrs(el) {
        let lower = name.to_ascii_lowercase();
        if matches!(
            lower.as_str(),
            "src" | "style" | "width" | "height" | "loading" | "decoding"
        ) || is_event_handler(&lower)
            || (is_url_attr(&lower) && is_script_url(value))
        {
            continue;
        }
        ctx.push_attr(name, value);
    }
    ctx.push_attr("loading", "lazy");
    ctx.push_attr("decoding", "async");
    ctx.out.push('>');
}

fn is_url_attr(name: &str) -> bool {
    ["href", "src", "action", "formaction", "xlink:href"]
        .iter()
        .any(|attr| name.eq_ignore_ascii_case(attr))
}

/// Attribute storage order is a parser detail; sorting keeps output stable.
fn sorted_attrs(el: &Element) -> Vec<(&str, &str)> {
    let mut attrs: Vec<(&str, &str)> = el.attrs().collect();
    attrs.sort_by(|a, b| a.0.cmp(b.0));
    attrs
}

fn body_of(document: &Html) -> Option<ElementRef<'_>> {
    document
        .root_element()
        .children()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name().eq_ignore_ascii_case("body"))
}

/// `https://www.google.com/url?q=<target>&sa=...` -> `<target>`.
fn unwrap_redirect(href: &str) -> Option<String> {
    let url = Url::parse(href.trim()).ok()?;
    let host = url.host_str()?;
    let is_google = host == "google.com" || host.ends_with(".google.com");
    if !is_google || url.path() != "/url" {
        return None;
    }
    url.query_pairs()
        .find(|(key, _)| key == "q")
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// Distinct `img` sources in document order.
pub fn image_sources(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    document
        .root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name().eq_ignore_ascii_case("img"))
        .filter_map(|el| el.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty() && seen.insert(src.to_string()))
        .map(ToOwned::to_owned)
        .collect()
}

/// Plain-text export -> one escaped paragraph per non-empty line.
pub fn text_to_html(text: &str) -> String {
    text.trim_start_matches('\u{feff}')
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| format!("<p>{}</p>", partial_escape(line)))
        .collect::<Vec<_>>()
        .join("\n")
}
