//! Context-anchored substring search.
//!
//! Finds one occurrence of a needle inside a block's raw text, using the
//! supplied before/after context to pick between repeated occurrences.
//! Strategies run in a fixed order and the first hit wins:
//!
//! 1. `ExactRaw`: the needle verbatim in the raw text, contexts checked.
//! 2. `Normalized`: the same search on normalized text, mapped back to raw.
//! 3. `BeforeAnchor`: find the before-context, expect the needle right after.
//! 4. `AfterAnchor`: find the after-context, expect the needle right before.
//!
//! Every test is an exact substring test; nothing here is fuzzy.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::normalize::{self, NormalizedView};

/// Which strategy produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MatchStrategy {
    ExactRaw,
    Normalized,
    BeforeAnchor,
    AfterAnchor,
}

/// A raw byte span in the searched text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchSpan {
    pub start: usize,
    pub end: usize,
    pub strategy: MatchStrategy,
}

/// The text searched plus the document text around it, used only to check
/// contexts that run past the edges of the block.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchScope<'a> {
    pub text: &'a str,
    pub lead: &'a str,
    pub trail: &'a str,
}

impl<'a> SearchScope<'a> {
    #[must_use]
    pub const fn bare(text: &'a str) -> Self {
        Self {
            text,
            lead: "",
            trail: "",
        }
    }
}

type StrategyFn = fn(&Search<'_>) -> Option<(usize, usize)>;

const STRATEGY_CHAIN: &[(MatchStrategy, StrategyFn)] = &[
    (MatchStrategy::ExactRaw, exact_raw),
    (MatchStrategy::Normalized, normalized),
    (MatchStrategy::BeforeAnchor, before_anchor),
    (MatchStrategy::AfterAnchor, after_anchor),
];

/// Find `needle` in `haystack`, corroborated by the contexts when given.
#[must_use]
pub fn find_with_context_span(
    haystack: &str,
    needle: &str,
    before_ctx: &str,
    after_ctx: &str,
) -> Option<MatchSpan> {
    find_in_scope(SearchScope::bare(haystack), needle, before_ctx, after_ctx)
}

/// Like [`find_with_context_span`], with document text around the block
/// available for context checks.
#[must_use]
pub fn find_in_scope(
    scope: SearchScope<'_>,
    needle: &str,
    before_ctx: &str,
    after_ctx: &str,
) -> Option<MatchSpan> {
    if needle.trim().is_empty() || scope.text.is_empty() {
        return None;
    }

    let search = Search::new(scope, needle, before_ctx, after_ctx);
    for &(strategy, run) in STRATEGY_CHAIN {
        if let Some((start, end)) = run(&search) {
            debug!(?strategy, start, end, "context match");
            return Some(MatchSpan {
                start,
                end,
                strategy,
            });
        }
    }
    None
}

/// How one side's context relates to a candidate occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    /// No context supplied for this side.
    Absent,
    Agree,
    /// Supplied but not found next to the occurrence, including at the very
    /// start or end of the document.
    Disagree,
}

/// Every supplied side must agree.
fn accepts(before: Side, after: Side) -> bool {
    matches!(
        (before, after),
        (Side::Absent | Side::Agree, Side::Absent | Side::Agree)
    )
}

/// Precomputed inputs shared by the strategies.
struct Search<'a> {
    text: &'a str,
    needle: &'a str,
    raw_before: &'a str,
    raw_after: &'a str,
    view: NormalizedView,
    norm_needle: String,
    norm_before: String,
    norm_after: String,
    norm_lead: String,
    norm_trail: String,
}

impl<'a> Search<'a> {
    fn new(scope: SearchScope<'a>, needle: &'a str, before: &'a str, after: &'a str) -> Self {
        Self {
            text: scope.text,
            needle,
            raw_before: before.trim(),
            raw_after: after.trim(),
            view: normalize::normalize_and_map(scope.text),
            norm_needle: normalize::normalize_only(needle).trim().to_owned(),
            norm_before: normalize::normalize_only(before).trim().to_owned(),
            norm_after: normalize::normalize_only(after).trim().to_owned(),
            norm_lead: normalize::normalize_only(scope.lead).trim().to_owned(),
            norm_trail: normalize::normalize_only(scope.trail).trim().to_owned(),
        }
    }

    /// Judge the before-context against normalized text preceding a match.
    fn before_side(&self, preceding: &str) -> Side {
        if self.norm_before.is_empty() {
            return Side::Absent;
        }
        let preceding = join_ws(&self.norm_lead, preceding.trim());
        if preceding.ends_with(self.norm_before.as_str()) {
            Side::Agree
        } else {
            Side::Disagree
        }
    }

    /// Judge the after-context against normalized text following a match.
    fn after_side(&self, following: &str) -> Side {
        if self.norm_after.is_empty() {
            return Side::Absent;
        }
        let following = join_ws(following.trim(), &self.norm_trail);
        if following.starts_with(self.norm_after.as_str()) {
            Side::Agree
        } else {
            Side::Disagree
        }
    }

    fn contexts_agree_raw(&self, start: usize, end: usize) -> bool {
        let preceding = normalize::normalize_only(&self.text[..start]);
        let following = normalize::normalize_only(&self.text[end..]);
        accepts(self.before_side(&preceding), self.after_side(&following))
    }

    fn contexts_agree_norm(&self, start: usize, end: usize) -> bool {
        let text = &self.view.text;
        accepts(self.before_side(&text[..start]), self.after_side(&text[end..]))
    }

    fn clean_raw_span(&self, start: usize, end: usize) -> bool {
        !normalize::inside_entity(self.text, start) && !normalize::inside_entity(self.text, end)
    }
}

fn join_ws(left: &str, right: &str) -> String {
    match (left.is_empty(), right.is_empty()) {
        (true, _) => right.to_owned(),
        (_, true) => left.to_owned(),
        _ => format!("{left} {right}"),
    }
}

fn exact_raw(s: &Search<'_>) -> Option<(usize, usize)> {
    s.text
        .match_indices(s.needle)
        .map(|(pos, m)| (pos, pos + m.len()))
        .find(|&(start, end)| s.clean_raw_span(start, end) && s.contexts_agree_raw(start, end))
}

fn normalized(s: &Search<'_>) -> Option<(usize, usize)> {
    if s.norm_needle.is_empty() {
        return None;
    }
    s.view
        .text
        .match_indices(s.norm_needle.as_str())
        .map(|(pos, m)| (pos, pos + m.len()))
        .filter(|&(start, end)| s.contexts_agree_norm(start, end))
        .find_map(|(start, end)| s.view.to_raw_span(start, end))
}

fn before_anchor(s: &Search<'_>) -> Option<(usize, usize)> {
    if s.norm_before.is_empty() {
        return None;
    }

    let needle = s.needle.trim();
    if !s.raw_before.is_empty() {
        for (pos, ctx) in s.text.match_indices(s.raw_before) {
            let after_ctx = pos + ctx.len();
            let rest = &s.text[after_ctx..];
            let trimmed = rest.trim_start();
            if trimmed.starts_with(needle) {
                let start = after_ctx + (rest.len() - trimmed.len());
                let end = start + needle.len();
                if s.clean_raw_span(start, end) {
                    return Some((start, end));
                }
            }
        }
    }

    let text = &s.view.text;
    for (pos, ctx) in text.match_indices(s.norm_before.as_str()) {
        let after_ctx = pos + ctx.len();
        let rest = &text[after_ctx..];
        let trimmed = rest.trim_start();
        if !s.norm_needle.is_empty() && trimmed.starts_with(s.norm_needle.as_str()) {
            let start = after_ctx + (rest.len() - trimmed.len());
            if let Some(span) = s.view.to_raw_span(start, start + s.norm_needle.len()) {
                return Some(span);
            }
        }
    }
    None
}

fn after_anchor(s: &Search<'_>) -> Option<(usize, usize)> {
    if s.norm_after.is_empty() {
        return None;
    }

    let needle = s.needle.trim();
    if !s.raw_after.is_empty() {
        for (pos, _) in s.text.match_indices(s.raw_after) {
            let head = s.text[..pos].trim_end();
            if head.ends_with(needle) {
                let end = head.len();
                let start = end - needle.len();
                if s.clean_raw_span(start, end) {
                    return Some((start, end));
                }
            }
        }
    }

    let text = &s.view.text;
    for (pos, _) in text.match_indices(s.norm_after.as_str()) {
        let head = text[..pos].trim_end();
        if !s.norm_needle.is_empty() && head.ends_with(s.norm_needle.as_str()) {
            let end = head.len();
            if let Some(span) = s.view.to_raw_span(end - s.norm_needle.len(), end) {
                return Some(span);
            }
        }
    }
    None
}
