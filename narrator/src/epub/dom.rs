//! DOM traversal helpers for the TOC-driven and heading-driven cascade
//! strategies: both need to slice a document's text by element boundaries,
//! following siblings first then descendants, which a flat-text renderer
//! like `html2text` cannot express.

use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;

/// Splits `html` into one text buffer per entry in `ids_in_order`: the text
/// from each id's element through the document, up to (not including) the
/// next id's element. A single pre-order DOM walk already yields text in
/// "siblings first, then descend" order, so boundaries are just index
/// changes in that single pass.
pub fn split_by_anchor_ids(html: &str, ids_in_order: &[String]) -> Vec<String> {
    let document = Html::parse_document(html);
    let id_to_idx: HashMap<&str, usize> = ids_in_order
        .iter()
        .enumerate()
        .map(|(i, s)| (s.as_str(), i))
        .collect();

    let mut buffers = vec![String::new(); ids_in_order.len()];
    let mut current: Option<usize> = None;
    walk(document.tree.root(), &mut |node| {
        if let Some(element) = node.value().as_element() {
            if let Some(id) = element.attr("id") {
                if let Some(&idx) = id_to_idx.get(id) {
                    current = Some(idx);
                }
            }
        }
        if let Some(text) = node.value().as_text() {
            if let Some(idx) = current {
                buffers[idx].push_str(text);
            }
        }
    });
    buffers
}

/// Splits `html` at every element matching `selector` (e.g. `"h1, h2"`),
/// returning `(heading_text, body_text)` pairs in document order. The
/// heading element's own text is excluded from `body_text`.
pub fn split_by_heading_selector(html: &str, selector: &str) -> Vec<(String, String)> {
    let document = Html::parse_document(html);
    let sel = match Selector::parse(selector) {
        Ok(s) => s,
        Err(_) => return Vec::new(),
    };

    let headings: Vec<ElementRef> = document.select(&sel).collect();
    if headings.is_empty() {
        return Vec::new();
    }

    let titles: Vec<String> = headings
        .iter()
        .map(|h| h.text().collect::<String>().trim().to_string())
        .collect();
    let heading_ids: Vec<ego_tree::NodeId> = headings.iter().map(|h| h.id()).collect();

    let mut bodies = vec![String::new(); headings.len()];
    let mut current: Option<usize> = None;
    walk_skip_subtree(document.tree.root(), &heading_ids, &mut current, &mut |idx, text| {
        bodies[idx].push_str(text);
    });

    titles.into_iter().zip(bodies).collect()
}

fn walk(node: ego_tree::NodeRef<Node>, visit: &mut impl FnMut(ego_tree::NodeRef<Node>)) {
    visit(node);
    for child in node.children() {
        walk(child, visit);
    }
}

/// Pre-order walk that tracks which of `boundary_ids` subtree we are
/// currently inside (to exclude a boundary element's own text, e.g. a
/// heading's label) while still updating `current` on entry.
fn walk_skip_subtree(
    node: ego_tree::NodeRef<Node>,
    boundary_ids: &[ego_tree::NodeId],
    current: &mut Option<usize>,
    emit: &mut impl FnMut(usize, &str),
) {
    walk_inner(node, boundary_ids, current, emit, false);
}

fn walk_inner(
    node: ego_tree::NodeRef<Node>,
    boundary_ids: &[ego_tree::NodeId],
    current: &mut Option<usize>,
    emit: &mut impl FnMut(usize, &str),
    inside_boundary: bool,
) {
    let mut inside_boundary = inside_boundary;
    if let Some(pos) = boundary_ids.iter().position(|&id| id == node.id()) {
        *current = Some(pos);
        inside_boundary = true;
    }
    if !inside_boundary {
        if let Some(text) = node.value().as_text() {
            if let Some(idx) = *current {
                emit(idx, text);
            }
        }
    }
    for child in node.children() {
        walk_inner(child, boundary_ids, current, emit, inside_boundary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_by_anchor_ids_following_document_order() {
        let html = r#"<body>
            <p>preamble</p>
            <a id="ch1"></a><p>First chapter text.</p>
            <a id="ch2"></a><p>Second chapter text.</p>
        </body>"#;
        let parts = split_by_anchor_ids(html, &["ch1".to_string(), "ch2".to_string()]);
        assert_eq!(parts.len(), 2);
        assert!(parts[0].contains("First chapter text"));
        assert!(!parts[0].contains("Second"));
        assert!(parts[1].contains("Second chapter text"));
    }

    #[test]
    fn splits_by_heading_selector_excludes_heading_text_from_body() {
        let html = "<body><h1>Chapter One</h1><p>It was a dark night.</p><h1>Chapter Two</h1><p>The end.</p></body>";
        let parts = split_by_heading_selector(html, "h1");
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].0, "Chapter One");
        assert!(parts[0].1.contains("dark night"));
        assert!(!parts[0].1.contains("Chapter One"));
        assert_eq!(parts[1].0, "Chapter Two");
        assert!(parts[1].1.contains("The end"));
    }

    #[test]
    fn no_headings_returns_empty() {
        let html = "<body><p>No headings here.</p></body>";
        assert!(split_by_heading_selector(html, "h1, h2").is_empty());
    }
}
