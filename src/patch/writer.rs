//! Rewrites the text nodes under a matched span.
//!
//! The whole replacement lands in the first touched node: the first node
//! keeps its prefix plus the replacement, middle nodes are emptied and the
//! last node keeps its suffix. No element is created or removed.

use ego_tree::NodeId;

use super::blocks::TextNodeMapping;
use crate::config::PatchConfig;
use crate::dom::Document;
use crate::error::{PatchError, PatchResult};

/// Mappings overlapping the raw span `start..end`, in block order.
#[must_use]
pub fn affected_nodes(node_map: &[TextNodeMapping], start: usize, end: usize) -> Vec<TextNodeMapping> {
    node_map
        .iter()
        .filter(|m| m.start < end && m.end > start)
        .copied()
        .collect()
}

/// Whether a multi-node span straddles an interactive element: some nodes
/// inside a link/button and some outside, or nodes under two different ones.
#[must_use]
pub fn straddles_interactive(doc: &Document, affected: &[TextNodeMapping], config: &PatchConfig) -> bool {
    if affected.len() < 2 {
        return false;
    }
    let wrappers: Vec<Option<NodeId>> = affected
        .iter()
        .map(|m| doc.nearest_ancestor(m.node, |tag| config.is_interactive(tag)))
        .collect();
    wrappers.windows(2).any(|w| w[0] != w[1])
}

/// Replace the raw span `start..end` of a block with `replacement`.
///
/// Returns `Ok(false)` when nothing overlaps the span or the span straddles
/// an interactive element; nothing is written in that case. The caller owns
/// snapshots for rollback.
pub fn apply_replacement_to_nodes(
    doc: &mut Document,
    node_map: &[TextNodeMapping],
    start: usize,
    end: usize,
    replacement: &str,
    config: &PatchConfig,
) -> PatchResult<bool> {
    let affected = affected_nodes(node_map, start, end);
    if affected.is_empty() || straddles_interactive(doc, &affected, config) {
        return Ok(false);
    }

    let escaped = escape_text(replacement);
    let mut writes: Vec<(NodeId, String)> = Vec::with_capacity(affected.len());

    if let [only] = affected.as_slice() {
        let raw = doc.text(only.node)?;
        let local_start = start.saturating_sub(only.start);
        let local_end = (end - only.start).min(raw.len());
        let mut updated = String::with_capacity(raw.len() + escaped.len());
        updated.push_str(slice_to(raw, local_start)?);
        updated.push_str(&escaped);
        updated.push_str(slice_from(raw, local_end)?);
        writes.push((only.node, updated));
    } else {
        let last_idx = affected.len() - 1;
        for (idx, m) in affected.iter().enumerate() {
            let raw = doc.text(m.node)?;
            let updated = if idx == 0 {
                let mut head = slice_to(raw, start.saturating_sub(m.start))?.to_owned();
                head.push_str(&escaped);
                head
            } else if idx == last_idx {
                slice_from(raw, end.saturating_sub(m.start).min(raw.len()))?.to_owned()
            } else {
                String::new()
            };
            writes.push((m.node, updated));
        }
    }

    for (node, text) in writes {
        doc.set_text(node, text)?;
    }
    Ok(true)
}

/// Escape text for insertion into a raw text node.
#[must_use]
pub fn escape_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            other => out.push(other),
        }
    }
    out
}

fn slice_to(raw: &str, offset: usize) -> PatchResult<&str> {
    raw.get(..offset).ok_or(PatchError::CharBoundary { offset })
}

fn slice_from(raw: &str, offset: usize) -> PatchResult<&str> {
    raw.get(offset..).ok_or(PatchError::CharBoundary { offset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patch::blocks::scan_blocks;

    fn setup(html: &str) -> (Document, Vec<TextNodeMapping>, String) {
        let doc = Document::parse(html);
        let block = scan_blocks(&doc, &PatchConfig::default())
            .into_iter()
            .next()
            .expect("one block");
        (doc, block.nodes, block.text)
    }

    fn replace(doc: &mut Document, map: &[TextNodeMapping], start: usize, end: usize, with: &str) -> bool {
        apply_replacement_to_nodes(doc, map, start, end, with, &PatchConfig::default())
            .expect("no internal error")
    }

    #[test]
    fn test_single_node_in_place() {
        let (mut doc, map, text) = setup("<p>The qiuck fox</p>");
        let start = text.find("qiuck").expect("present");
        assert!(replace(&mut doc, &map, start, start + 5, "quick"));
        assert_eq!(doc.to_html(), "<p>The quick fox</p>");
    }

    #[test]
    fn test_multi_node_collapses_onto_first() {
        let (mut doc, map, text) = setup("<p>The <b>qi</b>uck fox</p>");
        let start = text.find("qiuck").expect("present");
        assert!(replace(&mut doc, &map, start, start + 5, "quick"));
        assert_eq!(doc.to_html(), "<p>The <b>quick</b> fox</p>");
    }

    #[test]
    fn test_refuses_link_boundary() {
        let html = "<p><a href=\"/x\">Click</a> here</p>";
        let (mut doc, map, text) = setup(html);
        assert!(!replace(&mut doc, &map, 0, text.len(), "Tap here"));
        assert_eq!(doc.to_html(), html);
    }

    #[test]
    fn test_inside_single_link_is_fine() {
        let (mut doc, map, _) = setup("<p><a href=\"/x\">Clik <em>now</em></a></p>");
        assert!(replace(&mut doc, &map, 0, 8, "Click now"));
        assert_eq!(doc.to_html(), "<p><a href=\"/x\">Click now<em></em></a></p>");
    }

    #[test]
    fn test_replacement_is_escaped() {
        let (mut doc, map, _) = setup("<p>R and D</p>");
        assert!(replace(&mut doc, &map, 0, 7, "R&D <team>"));
        assert_eq!(doc.to_html(), "<p>R&amp;D &lt;team&gt;</p>");
    }

    #[test]
    fn test_no_overlap_writes_nothing() {
        let (mut doc, map, text) = setup("<p>abc</p>");
        assert!(!replace(&mut doc, &map, text.len(), text.len() + 2, "x"));
        assert_eq!(doc.to_html(), "<p>abc</p>");
    }
}
