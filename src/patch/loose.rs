//! Low-precision single-word fallback.
//!
//! For edits whose replacement is one word, swap the first whole-word
//! occurrence of any sufficiently long word of `find` anywhere in the
//! document's visible text nodes. There is no context check, no
//! verification and no rollback; callers opt in explicitly.

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::writer::escape_text;
use super::{Edit, validate};
use crate::config::PatchConfig;
use crate::dom::Document;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LooseOutcome {
    pub html: String,
    /// Indices of the edits that changed something.
    pub applied: Vec<usize>,
}

/// Run the loose-word pass over `edits`.
#[must_use]
pub fn apply_loose_word_fallback(html: &str, edits: &[Edit], config: &PatchConfig) -> LooseOutcome {
    let mut doc = Document::parse(html);
    let mut applied = Vec::new();

    for (index, edit) in edits.iter().enumerate() {
        let replacement = edit.replace.trim();
        if validate(index, edit, config).is_some() || replacement.split_whitespace().count() != 1 {
            continue;
        }
        if replace_first_word(&mut doc, edit, replacement, config) {
            debug!(index, "loose word replacement applied");
            applied.push(index);
        }
    }

    LooseOutcome {
        html: doc.to_html(),
        applied,
    }
}

fn replace_first_word(doc: &mut Document, edit: &Edit, replacement: &str, config: &PatchConfig) -> bool {
    let nodes: Vec<_> = doc
        .text_nodes()
        .filter(|&id| !doc.has_ancestor(id, |tag| config.is_denied(tag)))
        .collect();

    let words = edit
        .find
        .split(|c: char| !c.is_alphanumeric() && c != '\'')
        .filter(|w| w.chars().count() >= config.loose_min_word_len && *w != replacement);

    for word in words {
        let Ok(re) = Regex::new(&format!(r"\b{}\b", regex::escape(word))) else {
            continue;
        };
        for &id in &nodes {
            let Ok(raw) = doc.text(id) else {
                continue;
            };
            let Some(found) = re.find(raw) else {
                continue;
            };
            let mut updated = String::with_capacity(raw.len() + replacement.len());
            updated.push_str(&raw[..found.start()]);
            updated.push_str(&escape_text(replacement));
            updated.push_str(&raw[found.end()..]);
            if doc.set_text(id, updated).is_ok() {
                return true;
            }
        }
    }
    false
}
