//! Byte-preserving HTML document tree.
//!
//! The parser assigns every byte of the input to exactly one node, keeping
//! tags, comments and text in their raw form. Serializing an untouched tree
//! therefore reproduces the input byte for byte, and the only mutation the
//! engine performs is rewriting the raw content of [`Node::Text`] nodes.
//!
//! # Architecture
//!
//! ```text
//! &str ──parser::parse──> Tree<Node> ──(text edits)──> Document::to_html()
//! ```

mod parser;

use ego_tree::iter::Edge;
use ego_tree::{NodeId, NodeRef, Tree};

use crate::error::{PatchError, PatchResult};
use crate::patch::normalize;

/// A node in the document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    /// Synthetic root. Owns no bytes.
    Document,
    /// An element with its raw start tag and, when present in the source,
    /// its raw end tag.
    Element(Element),
    /// Raw, entity-encoded character data.
    Text(String),
    /// Bytes that are never prose: comments, doctype, processing
    /// instructions, `script`/`style` bodies and stray end tags.
    Markup(String),
}

/// Element payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// ASCII-lowercased tag name.
    pub name: String,
    /// The start tag exactly as written, `<` through `>`.
    pub open_tag: String,
    /// The end tag exactly as written, if the source had one.
    pub close_tag: Option<String>,
}

/// A parsed HTML document.
#[derive(Debug, Clone)]
pub struct Document {
    tree: Tree<Node>,
}

impl Document {
    /// Parse `html` into a tree. Never fails: malformed markup degrades to
    /// text or [`Node::Markup`].
    #[must_use]
    pub fn parse(html: &str) -> Self {
        Self {
            tree: parser::parse(html),
        }
    }

    /// Serialize the whole document.
    #[must_use]
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        write_subtree(self.tree.root(), &mut out);
        out
    }

    /// Serialize one node and its descendants.
    #[must_use]
    pub fn outer_html(&self, id: NodeId) -> String {
        let mut out = String::new();
        if let Some(node) = self.tree.get(id) {
            write_subtree(node, &mut out);
        }
        out
    }

    #[must_use]
    pub fn root_id(&self) -> NodeId {
        self.tree.root().id()
    }

    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_, Node>> {
        self.tree.get(id)
    }

    /// Tag name of an element node. The root reports `#document`.
    #[must_use]
    pub fn tag_name(&self, id: NodeId) -> Option<&str> {
        match self.tree.get(id)?.value() {
            Node::Element(el) => Some(el.name.as_str()),
            Node::Document => Some("#document"),
            _ => None,
        }
    }

    /// Raw content of a text node.
    pub fn text(&self, id: NodeId) -> PatchResult<&str> {
        match self.tree.get(id).ok_or(PatchError::NodeMissing)?.value() {
            Node::Text(raw) => Ok(raw.as_str()),
            _ => Err(PatchError::NotText),
        }
    }

    /// Overwrite the raw content of a text node.
    pub fn set_text(&mut self, id: NodeId, raw: String) -> PatchResult<()> {
        let mut node = self.tree.get_mut(id).ok_or(PatchError::NodeMissing)?;
        match node.value() {
            Node::Text(slot) => {
                *slot = raw;
                Ok(())
            }
            _ => Err(PatchError::NotText),
        }
    }

    /// Nearest proper ancestor element whose tag satisfies `pred`.
    pub fn nearest_ancestor(&self, id: NodeId, pred: impl Fn(&str) -> bool) -> Option<NodeId> {
        self.tree.get(id)?.ancestors().find_map(|anc| match anc.value() {
            Node::Element(el) if pred(&el.name) => Some(anc.id()),
            _ => None,
        })
    }

    /// Whether any proper ancestor element satisfies `pred`.
    pub fn has_ancestor(&self, id: NodeId, pred: impl Fn(&str) -> bool) -> bool {
        self.nearest_ancestor(id, pred).is_some()
    }

    /// Every node including the root, in document order.
    pub fn descendants(&self) -> impl Iterator<Item = NodeRef<'_, Node>> + '_ {
        self.tree.root().descendants()
    }

    /// Every text node, in document order.
    pub fn text_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.tree
            .root()
            .descendants()
            .filter(|n| matches!(n.value(), Node::Text(_)))
            .map(|n| n.id())
    }

    /// Entity-decoded text of every text node that is not under a denied
    /// container, adjacent nodes joined verbatim.
    #[must_use]
    pub fn visible_text(&self, denied: impl Fn(&str) -> bool) -> String {
        let mut out = String::new();
        for id in self.text_nodes() {
            if self.has_ancestor(id, &denied) {
                continue;
            }
            if let Ok(raw) = self.text(id) {
                out.push_str(&normalize::decode_entities(raw));
            }
        }
        out
    }

    /// Positional path of an element, e.g. `/html/body/p[2]`.
    #[must_use]
    pub fn xpath(&self, id: NodeId) -> String {
        let Some(node) = self.tree.get(id) else {
            return String::new();
        };

        let mut steps = Vec::new();
        for n in std::iter::once(node).chain(node.ancestors()) {
            let Node::Element(el) = n.value() else {
                continue;
            };
            let same = |s: NodeRef<'_, Node>| matches!(s.value(), Node::Element(o) if o.name == el.name);
            let before = n.prev_siblings().filter(|s| same(*s)).count();
            let after = n.next_siblings().filter(|s| same(*s)).count();
            if before + after > 0 {
                steps.push(format!("{}[{}]", el.name, before + 1));
            } else {
                steps.push(el.name.clone());
            }
        }

        if steps.is_empty() {
            return "/".to_owned();
        }
        steps.reverse();
        format!("/{}", steps.join("/"))
    }
}

fn write_subtree(node: NodeRef<'_, Node>, out: &mut String) {
    for edge in node.traverse() {
        match edge {
            Edge::Open(n) => match n.value() {
                Node::Document => {}
                Node::Element(el) => out.push_str(&el.open_tag),
                Node::Text(raw) | Node::Markup(raw) => out.push_str(raw),
            },
            Edge::Close(n) => {
                if let Node::Element(Element {
                    close_tag: Some(close),
                    ..
                }) = n.value()
                {
                    out.push_str(close);
                }
            }
        }
    }
}
