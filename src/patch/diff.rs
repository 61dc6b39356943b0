//! Before/after preview of a patched document, using the `similar` crate.

use similar::{Algorithm, TextDiff};

/// Unified diff between the original and patched HTML.
///
/// HTML often arrives as one long line, so the diff is computed over lines
/// after breaking each side at tag boundaries.
#[must_use]
pub fn html_diff(name: &str, before: &str, after: &str) -> String {
    let old = split_at_tags(before);
    let new = split_at_tags(after);
    let diff = TextDiff::configure()
        .algorithm(Algorithm::Patience)
        .diff_lines(&old, &new);

    diff.unified_diff()
        .context_radius(2)
        .header(&format!("a/{name}"), &format!("b/{name}"))
        .to_string()
}

/// Put a newline before every `<` that does not already start a line.
fn split_at_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len() + html.len() / 8);
    let mut at_line_start = true;
    for ch in html.chars() {
        if ch == '<' && !at_line_start {
            out.push('\n');
        }
        out.push(ch);
        at_line_start = ch == '\n';
    }
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_documents() {
        let html = "<p>Same</p>";
        let result = html_diff("page.html", html, html);
        assert!(!result.contains("+<p>"));
        assert!(!result.contains("-<p>"));
    }

    #[test]
    fn test_single_line_html_shows_changed_text() {
        let before = "<html><body><p>The qiuck fox</p><p>Other</p></body></html>";
        let after = "<html><body><p>The quick fox</p><p>Other</p></body></html>";
        let result = html_diff("page.html", before, after);
        assert!(result.contains("-<p>The qiuck fox"));
        assert!(result.contains("+<p>The quick fox"));
        assert!(!result.contains("-<p>Other"));
    }
}
