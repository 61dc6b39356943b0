//! Lenient HTML tokenizer and tree builder.
//!
//! Not a conforming HTML5 parser: it only needs to find element boundaries
//! and text runs well enough to scope prose, and it must never drop or
//! reorder bytes. Recovery rules are the common ones (void elements,
//! implicit `p`/`li`/cell closing, raw-text `script`/`style`); anything
//! unrecognized becomes text or [`Node::Markup`].

use ego_tree::{NodeId, Tree};

use super::{Element, Node};

/// Elements that never have content.
const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Elements whose content is opaque until the matching end tag.
const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style"];

/// Start tags that implicitly close an open `p`.
const CLOSES_P: &[&str] = &[
    "address", "article", "aside", "blockquote", "div", "dl", "fieldset", "figure", "footer",
    "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "main", "nav", "ol", "p", "pre",
    "section", "table", "ul",
];

/// Containers an implicit `p` close never reaches past.
const P_SCOPE: &[&str] = &[
    "div", "td", "th", "li", "blockquote", "section", "article", "body", "html", "button",
    "table", "dd", "dt",
];

pub(super) fn parse(html: &str) -> Tree<Node> {
    let mut builder = Builder::new();
    let bytes = html.as_bytes();
    let mut i = 0;
    let mut text_start = 0;

    while i < bytes.len() {
        if bytes[i] != b'<' {
            i += 1;
            continue;
        }

        let Some((kind, end)) = scan_construct(html, i) else {
            i += 1;
            continue;
        };

        if text_start < i {
            builder.text(&html[text_start..i]);
        }

        match kind {
            Construct::Markup => builder.markup(&html[i..end]),
            Construct::EndTag(name) => builder.end_tag(&name, &html[i..end]),
            Construct::StartTag { name, self_closing } => {
                let raw_text = !self_closing && RAW_TEXT_ELEMENTS.contains(&name.as_str());
                builder.start_tag(name.clone(), &html[i..end], self_closing);
                if raw_text {
                    let close_at = find_ascii_ci(html, end, &format!("</{name}")).unwrap_or(html.len());
                    if close_at > end {
                        builder.markup(&html[end..close_at]);
                    }
                    i = close_at;
                    text_start = close_at;
                    continue;
                }
            }
        }

        i = end;
        text_start = end;
    }

    if text_start < html.len() {
        builder.text(&html[text_start..]);
    }

    builder.tree
}

enum Construct {
    Markup,
    EndTag(String),
    StartTag { name: String, self_closing: bool },
}

/// Recognize the construct starting at `start` (which holds `<`) and return
/// it with the exclusive end offset. `None` means the `<` is plain text.
fn scan_construct(html: &str, start: usize) -> Option<(Construct, usize)> {
    let rest = &html[start..];
    let next = *rest.as_bytes().get(1)?;

    if rest.starts_with("<!--") {
        let end = rest[4..]
            .find("-->")
            .map_or(html.len(), |p| start + 4 + p + 3);
        return Some((Construct::Markup, end));
    }

    if next == b'!' || next == b'?' {
        let end = rest.find('>').map_or(html.len(), |p| start + p + 1);
        return Some((Construct::Markup, end));
    }

    if next == b'/' {
        if !rest.as_bytes().get(2)?.is_ascii_alphabetic() {
            return None;
        }
        let name = tag_name(&rest[2..]);
        let end = rest.find('>').map_or(html.len(), |p| start + p + 1);
        return Some((Construct::EndTag(name), end));
    }

    if !next.is_ascii_alphabetic() {
        return None;
    }

    let name = tag_name(&rest[1..]);
    let close = find_tag_end(rest)?;
    let self_closing = rest[..close].trim_end().ends_with('/');
    Some((Construct::StartTag { name, self_closing }, start + close + 1))
}

fn tag_name(s: &str) -> String {
    s.bytes()
        .take_while(|b| !b.is_ascii_whitespace() && *b != b'/' && *b != b'>')
        .map(|b| char::from(b.to_ascii_lowercase()))
        .collect()
}

/// Offset of the `>` that ends a start tag, skipping quoted attribute values.
fn find_tag_end(tag: &str) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (idx, b) in tag.bytes().enumerate() {
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return Some(idx),
            None => {}
        }
    }
    None
}

/// Case-insensitive ASCII search for `needle` in `haystack[from..]`.
fn find_ascii_ci(haystack: &str, from: usize, needle: &str) -> Option<usize> {
    haystack[from..]
        .to_ascii_lowercase()
        .find(needle)
        .map(|p| from + p)
}

struct Builder {
    tree: Tree<Node>,
    /// Open elements, innermost last.
    open: Vec<(NodeId, String)>,
}

impl Builder {
    fn new() -> Self {
        Self {
            tree: Tree::new(Node::Document),
            open: Vec::new(),
        }
    }

    fn current(&self) -> NodeId {
        self.open
            .last()
            .map_or_else(|| self.tree.root().id(), |(id, _)| *id)
    }

    fn append(&mut self, node: Node) -> Option<NodeId> {
        let parent = self.current();
        let mut parent = self.tree.get_mut(parent)?;
        Some(parent.append(node).id())
    }

    fn text(&mut self, raw: &str) {
        let parent = self.current();
        if let Some(mut parent) = self.tree.get_mut(parent) {
            if let Some(mut last) = parent.last_child() {
                if let Node::Text(existing) = last.value() {
                    existing.push_str(raw);
                    return;
                }
            }
        }
        self.append(Node::Text(raw.to_owned()));
    }

    fn markup(&mut self, raw: &str) {
        self.append(Node::Markup(raw.to_owned()));
    }

    fn start_tag(&mut self, name: String, raw: &str, self_closing: bool) {
        self.close_implied_by(&name);

        let element = Node::Element(Element {
            name: name.clone(),
            open_tag: raw.to_owned(),
            close_tag: None,
        });
        let Some(id) = self.append(element) else {
            return;
        };

        if !self_closing && !VOID_ELEMENTS.contains(&name.as_str()) {
            self.open.push((id, name));
        }
    }

    fn end_tag(&mut self, name: &str, raw: &str) {
        let Some(pos) = self.open.iter().rposition(|(_, open)| open == name) else {
            self.markup(raw);
            return;
        };

        let (id, _) = self.open[pos];
        self.open.truncate(pos);
        if let Some(mut node) = self.tree.get_mut(id) {
            if let Node::Element(el) = node.value() {
                el.close_tag = Some(raw.to_owned());
            }
        }
    }

    /// Pop elements that `name` implicitly closes.
    fn close_implied_by(&mut self, name: &str) {
        let (targets, scope): (&[&str], &[&str]) = match name {
            "li" => (&["li"], &["ul", "ol", "menu"]),
            "td" | "th" => (&["td", "th"], &["tr", "table"]),
            "tr" => (&["tr"], &["table", "tbody", "thead", "tfoot"]),
            "dd" | "dt" => (&["dd", "dt"], &["dl"]),
            "option" => (&["option"], &["select", "datalist"]),
            _ if CLOSES_P.contains(&name) => (&["p"], P_SCOPE),
            _ => return,
        };

        for pos in (0..self.open.len()).rev() {
            let open = self.open[pos].1.as_str();
            if targets.contains(&open) {
                self.open.truncate(pos);
                return;
            }
            if scope.contains(&open) {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child_names(tree: &Tree<Node>) -> Vec<String> {
        tree.root()
            .descendants()
            .filter_map(|n| match n.value() {
                Node::Element(el) => Some(el.name.clone()),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_implicit_li_close() {
        let tree = parse("<ul><li>a<li>b</ul>");
        let ul = tree
            .root()
            .first_child()
            .expect("ul element");
        assert_eq!(ul.children().count(), 2);
    }

    #[test]
    fn test_raw_text_script_is_markup() {
        let tree = parse("<script>a<b</script>");
        let script = tree.root().first_child().expect("script element");
        let body = script.first_child().expect("script body");
        assert_eq!(body.value(), &Node::Markup("a<b".to_owned()));
    }

    #[test]
    fn test_quoted_gt_in_attribute() {
        let tree = parse("<a title=\"x > y\">link</a>");
        let a = tree.root().first_child().expect("anchor");
        let Node::Element(el) = a.value() else {
            panic!("expected element");
        };
        assert_eq!(el.open_tag, "<a title=\"x > y\">");
        assert_eq!(el.close_tag.as_deref(), Some("</a>"));
    }

    #[test]
    fn test_void_and_self_closing() {
        let tree = parse("<p>a<br>b<img/>c</p>");
        assert_eq!(child_names(&tree), vec!["p", "br", "img"]);
        let p = tree.root().first_child().expect("paragraph");
        assert_eq!(p.children().count(), 5);
    }

    #[test]
    fn test_unterminated_tag_is_text() {
        let tree = parse("a <b");
        assert_eq!(tree.root().children().count(), 1);
    }
}
