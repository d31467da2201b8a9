//! Size-bounded splitting of rendered post bodies.
//!
//! Splits happen only between top-level nodes of the fragment so headings,
//! tables and sections stay intact. A single node larger than the target
//! becomes its own chunk rather than being cut.

use ego_tree::NodeRef;
use quick_xml::escape::partial_escape;
use scraper::node::Node;
use scraper::{ElementRef, Html};

/// Default chunk target: 2 MiB.
pub const DEFAULT_CHUNK_SIZE: usize = 2 * 1024 * 1024;

/// Split `html` into ordered fragments of at most `target_bytes` UTF-8 bytes
/// each (oversized single nodes excepted). Never returns an empty list.
pub fn chunk_html(html: &str, target_bytes: usize) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    let nodes: Vec<String> = fragment
        .root_element()
        .children()
        .filter_map(serialize_top_level)
        .collect();

    let mut chunks = Vec::new();
    let mut current = String::new();
    for node in nodes {
        if !current.is_empty() && current.len() + node.len() > target_bytes {
            chunks.push(std::mem::take(&mut current));
        }
        current.push_str(&node);
    }
    if !current.is_empty() {
        chunks.push(current);
    }

    if chunks.is_empty() {
        chunks.push(html.to_string());
    }
    chunks
}

/// Serialized form of one top-level node; whitespace-only text is dropped.
fn serialize_top_level(node: NodeRef<'_, Node>) -> Option<String> {
    match node.value() {
        Node::Text(text) => {
            if text.trim().is_empty() {
                None
            } else {
                Some(partial_escape(&**text).into_owned())
            }
        }
        Node::Element(_) => ElementRef::wrap(node).map(|el| el.html()),
        Node::Comment(comment) => Some(format!("<!--{}-->", &**comment)),
        _ => None,
    }
}
