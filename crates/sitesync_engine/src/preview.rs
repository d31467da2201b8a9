use ego_tree::NodeRef;
use scraper::node::Node;
use scraper::Html;

const TRUNCATED_MARKER: &str = "...";
pub const MAX_PREVIEW_CHARS: usize = 250;

/// Regions that never contribute to previews.
const HIDDEN_ELEMENTS: &[&str] = &[
    "nav", "footer", "aside", "script", "style", "noscript", "template", "head", "title",
];

/// Collapse runs of whitespace to single spaces and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Whitespace-collapsed preview of at most `max_chars` characters, ending in
/// `...` when the text had to be cut.
pub fn truncate_preview(text: &str, max_chars: usize) -> String {
    let collapsed = collapse_whitespace(text);
    if collapsed.chars().count() <= max_chars {
        return collapsed;
    }
    let keep = max_chars.saturating_sub(TRUNCATED_MARKER.len());
    let mut truncated: String = collapsed.chars().take(keep).collect();
    truncated.truncate(truncated.trim_end().len());
    truncated.push_str(TRUNCATED_MARKER);
    truncated
}

/// Visible text of an HTML document or fragment, excluding navigation,
/// footers, asides and scripting.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    visible_text_of(&document)
}

pub(crate) fn visible_text_of(document: &Html) -> String {
    let mut parts = Vec::new();
    collect_text(*document.root_element(), &mut parts);
    parts.join(" ")
}

fn collect_text<'a>(node: NodeRef<'a, Node>, parts: &mut Vec<&'a str>) {
    match node.value() {
        Node::Text(text) => {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed);
            }
        }
        Node::Element(el) => {
            let name = el.name();
            if HIDDEN_ELEMENTS.iter().any(|hidden| name.eq_ignore_ascii_case(hidden)) {
                return;
            }
            for child in node.children() {
                collect_text(child, parts);
            }
        }
        _ => {
            for child in node.children() {
                collect_text(child, parts);
            }
        }
    }
}

/// Summary cached in sync state and embedded as the post's meta description.
pub fn summarize_html(html: &str) -> String {
    truncate_preview(&visible_text(html), MAX_PREVIEW_CHARS)
}
