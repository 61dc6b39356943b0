//! Prose block scanning.
//!
//! A block is one element-level unit of prose (paragraph, heading, list
//! item, cell, ...). Its scope is the text of every descendant text node
//! that is not inside a nested block or a denied container, concatenated
//! in document order. Blocks are never merged, and a nested block cuts its
//! owner into separate segments, so a match cannot drift across markup.

use std::collections::{HashMap, HashSet};

use ego_tree::NodeId;

use super::matcher::SearchScope;
use super::normalize;
use crate::config::PatchConfig;
use crate::dom::{Document, Node};
use crate::error::PatchResult;

/// Position of one text node inside its block's consolidated text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextNodeMapping {
    pub node: NodeId,
    pub start: usize,
    pub end: usize,
}

/// One search scope.
#[derive(Debug, Clone)]
pub struct Block {
    /// The block element, or the document root for loose top-level text.
    pub element: NodeId,
    pub tag: String,
    /// Raw consolidated text.
    pub text: String,
    pub nodes: Vec<TextNodeMapping>,
    /// Document text just before the block, for context checks.
    pub lead: String,
    /// Document text just after the block, for context checks.
    pub trail: String,
}

impl Block {
    #[must_use]
    pub fn scope(&self) -> SearchScope<'_> {
        SearchScope {
            text: &self.text,
            lead: &self.lead,
            trail: &self.trail,
        }
    }

    /// Re-read the block's text from the live document.
    pub fn current_text(&self, doc: &Document) -> PatchResult<String> {
        let mut out = String::with_capacity(self.text.len());
        for mapping in &self.nodes {
            out.push_str(doc.text(mapping.node)?);
        }
        Ok(out)
    }
}

/// Scan `doc` into blocks, in document order of their first text node.
///
/// A nested block splits its owner: the owner's text before and after it
/// lands in separate segments that share the owner's element, so no match
/// can span the nested markup. Whitespace-only segments are dropped.
#[must_use]
pub fn scan_blocks(doc: &Document, config: &PatchConfig) -> Vec<Block> {
    let root = doc.root_id();
    let denied = |tag: &str| config.is_denied(tag);

    let mut blocks = vec![empty_block(root, "#document")];
    // Open segment of every block element.
    let mut current: HashMap<NodeId, usize> = HashMap::from([(root, 0)]);
    // Owners whose open segment was cut by a nested block.
    let mut interrupted: HashSet<NodeId> = HashSet::new();
    // (segment, raw text) for every visible text node.
    let mut sequence: Vec<(usize, &str)> = Vec::new();

    for node in doc.descendants() {
        match node.value() {
            Node::Element(el) if config.is_block(&el.name) => {
                if config.is_denied(&el.name) || doc.has_ancestor(node.id(), denied) {
                    continue;
                }
                let owner = doc
                    .nearest_ancestor(node.id(), |tag| config.is_block(tag))
                    .unwrap_or(root);
                interrupted.insert(owner);
                current.insert(node.id(), blocks.len());
                blocks.push(empty_block(node.id(), &el.name));
            }
            Node::Text(raw) => {
                if doc.has_ancestor(node.id(), denied) {
                    continue;
                }
                let owner = doc
                    .nearest_ancestor(node.id(), |tag| config.is_block(tag))
                    .unwrap_or(root);
                let Some(&open) = current.get(&owner) else {
                    continue;
                };
                let slot = if interrupted.remove(&owner) && !blocks[open].nodes.is_empty() {
                    let tag = blocks[open].tag.clone();
                    current.insert(owner, blocks.len());
                    blocks.push(empty_block(owner, &tag));
                    blocks.len() - 1
                } else {
                    open
                };

                let block = &mut blocks[slot];
                let start = block.text.len();
                block.text.push_str(raw);
                block.nodes.push(TextNodeMapping {
                    node: node.id(),
                    start,
                    end: block.text.len(),
                });
                sequence.push((slot, raw.as_str()));
            }
            _ => {}
        }
    }

    let mut first_seen: Vec<Option<usize>> = vec![None; blocks.len()];
    let mut last_seen: Vec<usize> = vec![0; blocks.len()];
    for (pos, &(slot, _)) in sequence.iter().enumerate() {
        first_seen[slot].get_or_insert(pos);
        last_seen[slot] = pos;
    }

    let mut ordered: Vec<(usize, Block)> = blocks
        .into_iter()
        .enumerate()
        .filter_map(|(slot, mut block)| {
            let first = first_seen[slot]?;
            block.lead = lead_text(&sequence[..first], config.context_window);
            block.trail = trail_text(&sequence[last_seen[slot] + 1..], config.context_window);
            Some((first, block))
        })
        .filter(|(_, b)| !normalize::normalize_only(&b.text).trim().is_empty())
        .collect();
    ordered.sort_by_key(|&(first, _)| first);
    ordered.into_iter().map(|(_, block)| block).collect()
}

fn empty_block(element: NodeId, tag: &str) -> Block {
    Block {
        element,
        tag: tag.to_owned(),
        text: String::new(),
        nodes: Vec::new(),
        lead: String::new(),
        trail: String::new(),
    }
}

/// Up to `window` bytes of text preceding a block. Text from different
/// blocks is separated by a space.
fn lead_text(before: &[(usize, &str)], window: usize) -> String {
    let mut pieces: Vec<&str> = Vec::new();
    let mut len = 0;
    let mut prev_owner = None;
    for &(owner, raw) in before.iter().rev() {
        if len >= window {
            break;
        }
        if prev_owner.is_some_and(|p| p != owner) {
            pieces.push(" ");
        }
        pieces.push(raw);
        len += raw.len();
        prev_owner = Some(owner);
    }
    pieces.reverse();
    let joined = pieces.concat();

    let mut cut = joined.len().saturating_sub(window);
    while !joined.is_char_boundary(cut) {
        cut += 1;
    }
    joined[cut..].to_owned()
}

/// Up to `window` bytes of text following a block.
fn trail_text(after: &[(usize, &str)], window: usize) -> String {
    let mut joined = String::new();
    let mut prev_owner = None;
    for &(owner, raw) in after {
        if joined.len() >= window {
            break;
        }
        if prev_owner.is_some_and(|p| p != owner) {
            joined.push(' ');
        }
        joined.push_str(raw);
        prev_owner = Some(owner);
    }

    let mut cut = joined.len().min(window);
    while !joined.is_char_boundary(cut) {
        cut -= 1;
    }
    joined.truncate(cut);
    joined
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scan(html: &str) -> (Document, Vec<Block>) {
        let doc = Document::parse(html);
        let blocks = scan_blocks(&doc, &PatchConfig::default());
        (doc, blocks)
    }

    #[test]
    fn test_inline_nodes_consolidate() {
        let (_, blocks) = scan("<p>The <b>qi</b>uck fox</p>");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].tag, "p");
        assert_eq!(blocks[0].text, "The qiuck fox");
        assert_eq!(blocks[0].nodes.len(), 3);
        assert_eq!((blocks[0].nodes[1].start, blocks[0].nodes[1].end), (4, 6));
    }

    #[test]
    fn test_nested_blocks_stay_separate() {
        let (_, blocks) = scan("<div>Intro <p>Inner text</p> outro</div>");
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["Intro ", "Inner text", " outro"]);
        assert_eq!(blocks[0].element, blocks[2].element);
        assert!(blocks[2].lead.contains("Inner text"));
    }

    #[test]
    fn test_loose_text_keeps_document_position() {
        let (_, blocks) = scan("<p>Save now</p>Save later");
        let tags: Vec<&str> = blocks.iter().map(|b| b.tag.as_str()).collect();
        assert_eq!(tags, vec!["p", "#document"]);
    }

    #[test]
    fn test_denied_and_blank_blocks_skipped() {
        let (_, blocks) =
            scan("<head><style>p { color: red }</style><title>Page</title></head><p>&nbsp;</p><li>Item</li>");
        let tags: Vec<&str> = blocks.iter().map(|b| b.tag.as_str()).collect();
        assert_eq!(tags, vec!["li"]);
    }

    #[test]
    fn test_lead_and_trail() {
        let (_, blocks) = scan("<p>First para.</p><p>Second para.</p><p>Third.</p>");
        assert_eq!(blocks[1].text, "Second para.");
        assert!(blocks[1].lead.trim_end().ends_with("First para."));
        assert!(blocks[1].trail.trim_start().starts_with("Third."));
    }

    #[test]
    fn test_current_text_follows_document() {
        let (mut doc, blocks) = scan("<p>a<i>b</i></p>");
        doc.set_text(blocks[0].nodes[1].node, "c".to_owned()).expect("text node");
        assert_eq!(blocks[0].current_text(&doc).expect("nodes exist"), "ac");
    }
}
