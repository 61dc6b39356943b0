//! Wrap body fragments into complete HTML documents.

use crate::patch::writer::escape_text;

/// Return `body` unchanged when it already is a document (it has an
/// `<html` tag or a doctype); otherwise wrap it in a minimal shell titled
/// `name`.
#[must_use]
pub fn ensure_html_document(name: &str, body: &str) -> String {
    let lower = body.to_ascii_lowercase();
    if lower.contains("<html") || lower.contains("<!doctype") {
        return body.to_owned();
    }
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{}</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n",
        escape_text(name)
    )
}
