//! Error types for the html-patcher crate.
//!
//! The patch engine itself never fails a batch: per-edit problems are
//! reported through [`crate::patch::EditStatus`]. The errors below cover
//! internal invariant breaks inside a single edit attempt, the variant run
//! manager, and the text-generation collaborator.

use uuid::Uuid;

/// Internal engine errors. Converted to low-confidence `NotFound` results
/// by the applier, never returned from a batch call.
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// A node id recorded during the block scan no longer resolves.
    #[error("node vanished from the document tree during an edit")]
    NodeMissing,

    /// A node id resolved to something other than a text node.
    #[error("expected a text node")]
    NotText,

    /// A normalized span could not be mapped back to the raw string.
    #[error("offset map inconsistency: normalized span {start}..{end} of {len}")]
    OffsetMap { start: usize, end: usize, len: usize },

    /// A computed raw offset does not land on a UTF-8 character boundary.
    #[error("raw offset {offset} is not a character boundary")]
    CharBoundary { offset: usize },
}

/// Errors raised by the text-generation collaborator.
#[derive(Debug, thiserror::Error)]
pub enum ProposerError {
    /// The collaborator could not be reached or refused the request.
    #[error("edit proposer request failed: {0}")]
    Request(String),

    /// The collaborator answered with something that is not an edit list.
    #[error("malformed edit proposal: {0}")]
    Malformed(String),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Variant run manager errors.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    /// No run is registered under this id.
    #[error("unknown run: {0}")]
    RunNotFound(Uuid),

    /// Every chunk request to the collaborator failed.
    #[error("edit generation failed for run {run_id}: {reason}")]
    Generation { run_id: Uuid, reason: String },
}

/// Convenience result type for engine internals.
pub type PatchResult<T> = Result<T, PatchError>;
