//! Data model for edit batches.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::diagnostics::Diagnostics;

/// One proposed "find → replace" edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edit {
    pub find: String,
    pub replace: String,
    #[serde(default)]
    pub before_context: String,
    #[serde(default)]
    pub after_context: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Short tag for the kind of change, fed back to the collaborator to
    /// avoid repeating itself across variants.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idea: Option<String>,
}

impl Edit {
    /// Edit without context or annotations.
    #[must_use]
    pub fn new(find: impl Into<String>, replace: impl Into<String>) -> Self {
        Self {
            find: find.into(),
            replace: replace.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_context(mut self, before: impl Into<String>, after: impl Into<String>) -> Self {
        self.before_context = before.into();
        self.after_context = after.into();
        self
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Outcome of one edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EditStatus {
    Applied,
    NotFound,
    BoundaryIssue,
    ContextMismatch,
    Blocked,
    Skipped,
}

impl EditStatus {
    /// Counted under `stats.failed`.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(self, Self::NotFound | Self::BoundaryIssue | Self::ContextMismatch)
    }
}

/// What an applied edit changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Change {
    /// The decoded text that was replaced.
    pub before: String,
    pub after: String,
    /// Tag of the element the replacement was written under.
    pub parent: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Caller-visible record of one edit. Never mutated after construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditResult {
    /// Position of the edit in the submitted list.
    pub index: usize,
    pub edit: Edit,
    pub status: EditStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change: Option<Change>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnostics: Option<Diagnostics>,
}

/// Batch summary. Skipped edits are not counted anywhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStats {
    pub total: usize,
    pub applied: usize,
    pub failed: usize,
    pub blocked: usize,
}

impl BatchStats {
    #[must_use]
    pub fn from_results(results: &[EditResult]) -> Self {
        let mut stats = Self::default();
        for result in results {
            if result.status == EditStatus::Skipped {
                continue;
            }
            stats.total += 1;
            match result.status {
                EditStatus::Applied => stats.applied += 1,
                EditStatus::Blocked => stats.blocked += 1,
                s if s.is_failure() => stats.failed += 1,
                _ => {}
            }
        }
        stats
    }
}

/// Wall-clock breakdown of a batch, in milliseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Timings {
    pub parse_ms: f64,
    /// Time spent processing edits, verification included.
    pub edits_ms: f64,
    /// Share of `edits_ms` spent verifying and rolling back writes.
    pub verification_ms: f64,
    pub total_ms: f64,
}

impl Timings {
    pub(crate) fn from_durations(parse: Duration, edits: Duration, verification: Duration, total: Duration) -> Self {
        Self {
            parse_ms: millis(parse),
            edits_ms: millis(edits),
            verification_ms: millis(verification),
            total_ms: millis(total),
        }
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Everything a batch call returns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchOutcome {
    pub html: String,
    /// Results for every non-skipped edit, in submission order.
    pub results: Vec<EditResult>,
    pub stats: BatchStats,
    pub timings: Timings,
}

impl BatchOutcome {
    /// Changes of every applied edit, in order.
    #[must_use]
    pub fn changes(&self) -> Vec<Change> {
        self.results.iter().filter_map(|r| r.change.clone()).collect()
    }

    /// Results that did not apply.
    #[must_use]
    pub fn failed(&self) -> Vec<EditResult> {
        self.results
            .iter()
            .filter(|r| r.status != EditStatus::Applied)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(index: usize, status: EditStatus) -> EditResult {
        EditResult {
            index,
            edit: Edit::new("a", "b"),
            status,
            change: None,
            diagnostics: None,
        }
    }

    #[test]
    fn test_stats_ignore_skipped() {
        let results = vec![
            result(0, EditStatus::Applied),
            result(1, EditStatus::Skipped),
            result(2, EditStatus::NotFound),
            result(3, EditStatus::BoundaryIssue),
            result(4, EditStatus::Blocked),
            result(5, EditStatus::ContextMismatch),
        ];
        let stats = BatchStats::from_results(&results);
        assert_eq!(
            stats,
            BatchStats {
                total: 5,
                applied: 1,
                failed: 3,
                blocked: 1,
            }
        );
    }

    #[test]
    fn test_edit_deserializes_camel_case() {
        let edit: Edit = serde_json::from_value(serde_json::json!({
            "find": "teh",
            "replace": "the",
            "beforeContext": "in",
            "afterContext": "end",
            "reason": "typo"
        }))
        .expect("valid edit");
        assert_eq!(edit.before_context, "in");
        assert_eq!(edit.reason.as_deref(), Some("typo"));
        assert_eq!(edit.idea, None);
    }

    #[test]
    fn test_status_wire_names() {
        let json = serde_json::to_string(&EditStatus::BoundaryIssue).expect("serializable");
        assert_eq!(json, "\"boundaryIssue\"");
    }
}
