//! Context-anchored atomic text patching.
//!
//! A batch of "find → replace" edits is applied sequentially to one parsed
//! document. For each edit the document is re-scanned into prose blocks, the
//! first block holding a context-corroborated match is rewritten, and the
//! write is verified. A write that fails verification is rolled back from
//! snapshots, so an edit either lands completely or leaves the document
//! untouched.

pub mod blocks;
pub mod diagnostics;
pub mod diff;
pub mod levenshtein;
pub mod loose;
pub mod matcher;
pub mod normalize;
pub mod types;
pub mod writer;

use std::sync::LazyLock;
use std::time::{Duration, Instant};

use ego_tree::NodeId;
use regex::Regex;
use tracing::{debug, info, warn};

pub use diagnostics::{BoundaryDetail, CandidateLocation, Confidence, Diagnostics, OccurrenceCounts};
pub use loose::{LooseOutcome, apply_loose_word_fallback};
pub use matcher::{MatchSpan, MatchStrategy, find_with_context_span};
pub use normalize::{NormalizedView, map_norm_span_to_raw_span, normalize_and_map, normalize_only};
pub use types::{BatchOutcome, BatchStats, Change, Edit, EditResult, EditStatus, Timings};

use blocks::{Block, TextNodeMapping};
use crate::config::PatchConfig;
use crate::dom::Document;
use crate::error::{PatchError, PatchResult};

#[allow(clippy::expect_used)]
static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:https?://|ftp://|www\.)\S+|\bmailto:\S+").expect("URL pattern compiles")
});

#[allow(clippy::expect_used)]
static MERGE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\|[^|\s]+\|\*").expect("merge tag pattern compiles"));

/// Apply `edits` to `html` with the default configuration.
#[must_use]
pub fn apply_context_edits(html: &str, edits: &[Edit]) -> BatchOutcome {
    apply_context_edits_with(html, edits, &PatchConfig::default())
}

/// Apply `edits` to `html` in order. Never fails: every problem is reported
/// on the edit's result and the document keeps only applied edits.
#[must_use]
pub fn apply_context_edits_with(html: &str, edits: &[Edit], config: &PatchConfig) -> BatchOutcome {
    let started = Instant::now();
    let mut doc = Document::parse(html);
    let parse_time = started.elapsed();

    let edits_started = Instant::now();
    let mut verification = Duration::ZERO;
    let mut results = Vec::with_capacity(edits.len());
    for (index, edit) in edits.iter().enumerate() {
        let result = apply_one(&mut doc, index, edit, config, &mut verification);
        debug!(index, status = ?result.status, "edit processed");
        if result.status != EditStatus::Skipped {
            results.push(result);
        }
    }
    let edits_time = edits_started.elapsed();

    let stats = BatchStats::from_results(&results);
    let out_html = doc.to_html();
    let timings = Timings::from_durations(parse_time, edits_time, verification, started.elapsed());
    info!(
        total = stats.total,
        applied = stats.applied,
        failed = stats.failed,
        blocked = stats.blocked,
        "edit batch complete"
    );

    BatchOutcome {
        html: out_html,
        results,
        stats,
        timings,
    }
}

/// Why an edit cannot be attempted, if it cannot.
enum Rejection {
    Skipped(&'static str),
    Blocked(&'static str),
}

fn validate(index: usize, edit: &Edit, config: &PatchConfig) -> Option<Rejection> {
    for text in [&edit.find, &edit.replace] {
        if URL_RE.is_match(text) {
            return Some(Rejection::Blocked("contains a URL"));
        }
        if MERGE_TAG_RE.is_match(text) {
            return Some(Rejection::Blocked("contains a merge tag"));
        }
    }
    if edit.find.trim().is_empty() || edit.replace.trim().is_empty() {
        return Some(Rejection::Skipped("empty find or replace"));
    }
    if edit.find == edit.replace {
        return Some(Rejection::Skipped("find equals replace"));
    }
    if index >= config.max_edits {
        return Some(Rejection::Skipped("beyond the edit cap"));
    }
    None
}

/// Result of searching and writing one edit.
enum Attempt {
    Applied(Change),
    Boundary(BoundaryDetail),
    NoMatch,
}

fn apply_one(
    doc: &mut Document,
    index: usize,
    edit: &Edit,
    config: &PatchConfig,
    verification: &mut Duration,
) -> EditResult {
    let finish = |status, change, diagnostics| EditResult {
        index,
        edit: edit.clone(),
        status,
        change,
        diagnostics,
    };

    match validate(index, edit, config) {
        Some(Rejection::Skipped(why)) => {
            debug!(index, why, "edit skipped");
            return finish(EditStatus::Skipped, None, None);
        }
        Some(Rejection::Blocked(rule)) => {
            return finish(EditStatus::Blocked, None, Some(Diagnostics::blocked(edit, rule)));
        }
        None => {}
    }

    let blocks = blocks::scan_blocks(doc, config);
    let counts = occurrence_counts(doc, &blocks, &edit.find);
    if counts.is_absent() {
        return finish(EditStatus::NotFound, None, Some(Diagnostics::not_found(edit, counts)));
    }

    match attempt(doc, &blocks, edit, config, verification) {
        Ok(Attempt::Applied(change)) => finish(EditStatus::Applied, Some(change), None),
        Ok(Attempt::Boundary(detail)) => finish(
            EditStatus::BoundaryIssue,
            None,
            Some(Diagnostics::boundary_issue(edit, counts, detail)),
        ),
        Ok(Attempt::NoMatch) => {
            let candidates = diagnostics::collect_candidates(doc, &blocks, edit);
            if candidates.is_empty() {
                finish(EditStatus::NotFound, None, Some(Diagnostics::not_found(edit, counts)))
            } else {
                finish(
                    EditStatus::ContextMismatch,
                    None,
                    Some(Diagnostics::context_mismatch(edit, counts, candidates)),
                )
            }
        }
        Err(e) => {
            warn!(index, error = %e, "edit abandoned on internal error");
            finish(
                EditStatus::NotFound,
                None,
                Some(Diagnostics::internal(edit, counts, &e.to_string())),
            )
        }
    }
}

/// Raw occurrences in the serialized document and normalized occurrences in
/// the prose blocks.
fn occurrence_counts(doc: &Document, blocks: &[Block], find: &str) -> OccurrenceCounts {
    let prose = blocks.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join(" ");
    let needle = normalize_only(find);
    OccurrenceCounts {
        raw: normalize::count_occurrences(&doc.to_html(), find),
        normalized: normalize::count_occurrences(&normalize_only(&prose), needle.trim()),
    }
}

fn attempt(
    doc: &mut Document,
    blocks: &[Block],
    edit: &Edit,
    config: &PatchConfig,
    verification: &mut Duration,
) -> PatchResult<Attempt> {
    for block in blocks {
        let Some(span) =
            matcher::find_in_scope(block.scope(), &edit.find, &edit.before_context, &edit.after_context)
        else {
            continue;
        };

        if span.start > span.end || span.end > block.text.len() {
            return Err(PatchError::OffsetMap {
                start: span.start,
                end: span.end,
                len: block.text.len(),
            });
        }
        let affected = writer::affected_nodes(&block.nodes, span.start, span.end);
        let snapshot = Snapshot::capture(doc, &affected)?;
        let written =
            match writer::apply_replacement_to_nodes(doc, &block.nodes, span.start, span.end, &edit.replace, config) {
                Ok(written) => written,
                Err(e) => {
                    snapshot.restore(doc);
                    return Err(e);
                }
            };
        if !written {
            debug!(tag = %block.tag, "write refused at interactive boundary");
            return Ok(Attempt::Boundary(boundary_detail(doc, block, &affected, config, false)));
        }

        let clock = Instant::now();
        let verified = verify(doc, block, edit, config);
        let outcome = match verified {
            Ok(true) => {
                let before = normalize::decode_entities(block.text.get(span.start..span.end).unwrap_or_default());
                let parent = affected
                    .first()
                    .map_or_else(|| block.tag.clone(), |m| parent_tag(doc, m.node));
                Ok(Attempt::Applied(Change {
                    before,
                    after: edit.replace.clone(),
                    parent,
                    reason: edit.reason.clone(),
                }))
            }
            Ok(false) => {
                warn!(tag = %block.tag, "replacement failed verification, rolling back");
                snapshot.restore(doc);
                Ok(Attempt::Boundary(boundary_detail(doc, block, &affected, config, true)))
            }
            Err(e) => {
                snapshot.restore(doc);
                Err(e)
            }
        };
        *verification += clock.elapsed();
        return outcome;
    }
    Ok(Attempt::NoMatch)
}

/// Check the rewritten block: the find text lost an occurrence (unless the
/// replacement contains it), the replacement is present, and so is every
/// replacement word of at least `min_verify_word_len` characters.
fn verify(doc: &Document, block: &Block, edit: &Edit, config: &PatchConfig) -> PatchResult<bool> {
    let before = normalize_only(&block.text);
    let after = normalize_only(&block.current_text(doc)?);
    let find = normalize_only(&edit.find);
    let find = find.trim();
    let replace = normalize_only(&edit.replace);
    let replace = replace.trim();

    let find_gone = replace.contains(find)
        || normalize::count_occurrences(&after, find) < normalize::count_occurrences(&before, find);
    let replace_present = after.contains(replace);
    let words_present = replace
        .split_whitespace()
        .filter(|w| w.chars().count() >= config.min_verify_word_len)
        .all(|w| after.contains(w));

    Ok(find_gone && replace_present && words_present)
}

/// Pre-images of the text nodes an edit is about to touch.
struct Snapshot(Vec<(NodeId, String)>);

impl Snapshot {
    fn capture(doc: &Document, affected: &[TextNodeMapping]) -> PatchResult<Self> {
        let saved = affected
            .iter()
            .map(|m| Ok((m.node, doc.text(m.node)?.to_owned())))
            .collect::<PatchResult<Vec<_>>>()?;
        Ok(Self(saved))
    }

    fn restore(self, doc: &mut Document) {
        for (node, text) in self.0 {
            if let Err(e) = doc.set_text(node, text) {
                warn!(error = %e, "failed to restore text node");
            }
        }
    }
}

fn parent_tag(doc: &Document, node: NodeId) -> String {
    let parent = doc.nearest_ancestor(node, |_| true).unwrap_or_else(|| doc.root_id());
    doc.tag_name(parent).unwrap_or("#document").to_owned()
}

fn boundary_detail(
    doc: &Document,
    block: &Block,
    affected: &[TextNodeMapping],
    config: &PatchConfig,
    rolled_back: bool,
) -> BoundaryDetail {
    let mut spanning_tags: Vec<String> = Vec::new();
    let mut note = |tag: String| {
        if !spanning_tags.contains(&tag) {
            spanning_tags.push(tag);
        }
    };
    for m in affected {
        if let Some(wrapper) = doc.nearest_ancestor(m.node, |tag| config.is_interactive(tag)) {
            note(doc.tag_name(wrapper).unwrap_or_default().to_owned());
        }
        note(parent_tag(doc, m.node));
    }
    note(block.tag.clone());

    BoundaryDetail {
        spanning_tags,
        xpath: doc.xpath(block.element),
        html_excerpt: diagnostics::excerpt(&doc.outer_html(block.element), config.excerpt_len),
        rolled_back,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_order() {
        let config = PatchConfig::default();
        let cases = [
            (Edit::new("", "x"), "skipped"),
            (Edit::new("", "https://evil.com"), "blocked"),
            (Edit::new("*|UNSUB|*", " "), "blocked"),
            (Edit::new("see www.example.com", "see www.example.com"), "blocked"),
            (Edit::new("Hi *|FNAME|*", "Hello *|FNAME|*"), "blocked"),
            (Edit::new("same", "same"), "skipped"),
            (Edit::new("teh", "the"), "ok"),
        ];
        for (edit, expected) in cases {
            let got = match validate(0, &edit, &config) {
                Some(Rejection::Skipped(_)) => "skipped",
                Some(Rejection::Blocked(_)) => "blocked",
                None => "ok",
            };
            assert_eq!(got, expected, "{edit:?}");
        }
    }

    #[test]
    fn test_edit_cap_skips() {
        let config = PatchConfig {
            max_edits: 1,
            ..PatchConfig::default()
        };
        let edits = vec![Edit::new("one", "1"), Edit::new("two", "2")];
        let out = apply_context_edits_with("<p>one two</p>", &edits, &config);
        assert_eq!(out.html, "<p>1 two</p>");
        assert_eq!(out.results.len(), 1);
        assert_eq!(out.stats.total, 1);
    }

    #[test]
    fn test_verification_rollback() {
        // Replacing "cat" in "ccatt" with "ca" yields "ccat", which still
        // contains the find text once.
        let html = "<p>ccatt</p>";
        let out = apply_context_edits(html, &[Edit::new("cat", "ca")]);
        assert_eq!(out.html, html);
        assert_eq!(out.results[0].status, EditStatus::BoundaryIssue);
        let boundary = out.results[0]
            .diagnostics
            .as_ref()
            .and_then(|d| d.boundary.as_ref())
            .expect("boundary detail");
        assert!(boundary.rolled_back);
        assert_eq!(boundary.xpath, "/p");
    }

    #[test]
    fn test_change_records_parent_and_decoded_before() {
        let out = apply_context_edits(
            "<p>It&rsquo;s <em>grate</em> news</p>",
            &[Edit::new("grate", "great").with_reason("typo")],
        );
        let change = out.results[0].change.as_ref().expect("applied");
        assert_eq!(change.parent, "em");
        assert_eq!(change.before, "grate");
        assert_eq!(change.reason.as_deref(), Some("typo"));
    }

    #[test]
    fn test_replace_containing_find_verifies() {
        let out = apply_context_edits("<p>Free shipping</p>", &[Edit::new("Free", "Free fast")]);
        assert_eq!(out.html, "<p>Free fast shipping</p>");
        assert_eq!(out.stats.applied, 1);
    }

    #[test]
    fn test_repeated_word_replaces_first_only() {
        // The block still holds one "very" afterwards; one fewer is enough.
        let out = apply_context_edits("<p>very very good</p>", &[Edit::new("very", "really")]);
        assert_eq!(out.results[0].status, EditStatus::Applied);
        assert_eq!(out.html, "<p>really very good</p>");
    }
}
