//! Guidance for edits that did not apply.
//!
//! Every non-applied result carries a recommendation a person can act on in
//! a visual editor, plus search hints for locating the spot by hand.

use serde::{Deserialize, Serialize};

use super::blocks::Block;
use super::levenshtein;
use super::normalize;
use super::types::Edit;
use crate::dom::Document;

/// Characters of surrounding text shown on each side of a candidate.
const CANDIDATE_RADIUS: usize = 40;

/// How much to trust a diagnosis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// One place where the needle occurs without context agreement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateLocation {
    pub block_tag: String,
    pub xpath: String,
    /// Normalized text around the occurrence.
    pub surrounding: String,
    /// 0..1 closeness of the actual neighbours to the supplied contexts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_similarity: Option<f64>,
}

/// Where a boundary refusal or rollback happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoundaryDetail {
    /// Tags of the elements directly holding the touched text nodes.
    pub spanning_tags: Vec<String>,
    pub xpath: String,
    pub html_excerpt: String,
    /// True when text was written and then restored.
    pub rolled_back: bool,
}

/// Occurrence counts across the whole document, gathered before searching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OccurrenceCounts {
    pub raw: usize,
    pub normalized: usize,
}

impl OccurrenceCounts {
    #[must_use]
    pub const fn is_absent(self) -> bool {
        self.raw == 0 && self.normalized == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    pub recommendation: String,
    pub search_hints: Vec<String>,
    pub confidence: Confidence,
    #[serde(default)]
    pub counts: OccurrenceCounts,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub candidates: Vec<CandidateLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub boundary: Option<BoundaryDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Diagnostics {
    fn new(edit: &Edit, recommendation: impl Into<String>, confidence: Confidence) -> Self {
        Self {
            recommendation: recommendation.into(),
            search_hints: search_hints(edit, &[]),
            confidence,
            counts: OccurrenceCounts::default(),
            candidates: Vec::new(),
            boundary: None,
            detail: None,
        }
    }

    /// Edit rejected by a safety rule.
    #[must_use]
    pub fn blocked(edit: &Edit, rule: &str) -> Self {
        let mut diag = Self::new(
            edit,
            "This edit touches protected content (links or merge tags) and was not attempted. \
             Change it by hand if it is really needed.",
            Confidence::High,
        );
        diag.detail = Some(rule.to_owned());
        diag
    }

    /// Needle absent, present in prose only across block boundaries, or
    /// present only in markup.
    #[must_use]
    pub fn not_found(edit: &Edit, counts: OccurrenceCounts) -> Self {
        let recommendation = if counts.is_absent() {
            "Text not found in the document. It may already have been applied, or the collaborator \
             paraphrased it; search for it manually and fix it in the visual editor."
        } else if counts.normalized > 0 {
            "The text exists but crosses block boundaries (for example two paragraphs or list \
             items) or cuts through a special character, so no single block can hold the \
             replacement. Fix it manually in the visual editor."
        } else {
            "The text appears only in markup (an attribute, the page title or a script), not in \
             visible text. Edit the source by hand if it really needs to change."
        };
        let confidence = if counts.is_absent() {
            Confidence::High
        } else {
            Confidence::Medium
        };
        let mut diag = Self::new(edit, recommendation, confidence);
        diag.counts = counts;
        diag
    }

    /// An internal inconsistency stopped the attempt. Nothing was changed.
    #[must_use]
    pub fn internal(edit: &Edit, counts: OccurrenceCounts, error: &str) -> Self {
        let mut diag = Self::new(
            edit,
            "The engine could not map this edit onto the document safely; nothing was changed. \
             Apply it manually.",
            Confidence::Low,
        );
        diag.counts = counts;
        diag.detail = Some(error.to_owned());
        diag
    }

    /// Needle present but no occurrence had agreeing context.
    #[must_use]
    pub fn context_mismatch(edit: &Edit, counts: OccurrenceCounts, candidates: Vec<CandidateLocation>) -> Self {
        let recommendation = format!(
            "Found {} occurrence(s) of the text, but none matched the surrounding context. \
             Check the candidates below and apply the edit to the intended one manually.",
            candidates.len()
        );
        let mut diag = Self::new(edit, recommendation, Confidence::Medium);
        diag.counts = counts;
        diag.candidates = candidates;
        diag
    }

    /// Context matched but the write was refused or rolled back.
    #[must_use]
    pub fn boundary_issue(edit: &Edit, counts: OccurrenceCounts, boundary: BoundaryDetail) -> Self {
        let recommendation = if boundary.rolled_back {
            "The replacement was written but failed verification, so it was rolled back. \
             The text is split across formatting; edit it manually at the location below."
        } else {
            "The text crosses a link or button boundary. Changing it automatically would break the \
             element apart; edit it manually at the location below."
        };
        let mut diag = Self::new(edit, recommendation, Confidence::High);
        diag.search_hints = search_hints(edit, &boundary.spanning_tags);
        diag.counts = counts;
        diag.boundary = Some(boundary);
        diag
    }
}

/// Raw needle, normalized needle, trimmed needle, then `<tag>` for each
/// spanned element. Duplicates are dropped.
fn search_hints(edit: &Edit, spanning_tags: &[String]) -> Vec<String> {
    let candidates = [
        edit.find.clone(),
        normalize::normalize_only(&edit.find),
        edit.find.trim().to_owned(),
    ];
    let mut hints: Vec<String> = Vec::new();
    for hint in candidates {
        if !hint.is_empty() && !hints.contains(&hint) {
            hints.push(hint);
        }
    }
    hints.extend(spanning_tags.iter().map(|t| format!("<{t}>")));
    hints
}

/// Every occurrence of the normalized needle across `blocks`, in document
/// order, scored against the supplied contexts.
#[must_use]
pub fn collect_candidates(doc: &Document, blocks: &[Block], edit: &Edit) -> Vec<CandidateLocation> {
    let needle = normalize::normalize_only(&edit.find).trim().to_owned();
    if needle.is_empty() {
        return Vec::new();
    }
    let before = normalize::normalize_only(&edit.before_context).trim().to_owned();
    let after = normalize::normalize_only(&edit.after_context).trim().to_owned();

    let mut out = Vec::new();
    for block in blocks {
        let view = normalize::normalize_and_map(&block.text);
        let text = &view.text;
        for (pos, m) in text.match_indices(needle.as_str()) {
            let end = pos + m.len();
            if view.to_raw_span(pos, end).is_none() {
                continue;
            }
            out.push(CandidateLocation {
                block_tag: block.tag.clone(),
                xpath: doc.xpath(block.element),
                surrounding: window(text, pos, end),
                context_similarity: context_similarity(&text[..pos], &text[end..], &before, &after),
            });
        }
    }
    out
}

/// Up to [`CANDIDATE_RADIUS`] characters either side of `start..end`.
fn window(text: &str, start: usize, end: usize) -> String {
    let head: String = {
        let mut chars: Vec<char> = text[..start].chars().rev().take(CANDIDATE_RADIUS).collect();
        chars.reverse();
        chars.into_iter().collect()
    };
    let tail: String = text[end..].chars().take(CANDIDATE_RADIUS).collect();
    format!("{head}{}{tail}", &text[start..end])
}

fn context_similarity(preceding: &str, following: &str, before: &str, after: &str) -> Option<f64> {
    let mut scores = Vec::new();
    if !before.is_empty() {
        let actual = tail_chars(preceding.trim_end(), before.chars().count());
        scores.push(levenshtein::similarity(&actual, before));
    }
    if !after.is_empty() {
        let actual: String = following.trim_start().chars().take(after.chars().count()).collect();
        scores.push(levenshtein::similarity(&actual, after));
    }
    if scores.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = scores.iter().sum::<f64>() / scores.len() as f64;
    Some(mean)
}

fn tail_chars(s: &str, n: usize) -> String {
    let skip = s.chars().count().saturating_sub(n);
    s.chars().skip(skip).collect()
}

/// First `max_chars` characters of `html`, marked when cut.
#[must_use]
pub fn excerpt(html: &str, max_chars: usize) -> String {
    let mut out: String = html.chars().take(max_chars).collect();
    if out.len() < html.len() {
        out.push('…');
    }
    out
}
