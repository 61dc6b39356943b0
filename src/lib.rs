//! `html-patcher`: context-anchored atomic text patching for HTML.
//!
//! Takes a batch of "find → replace" edits from an untrusted copy-editing
//! collaborator and applies them to an HTML document whose visible text may
//! be split across nested elements, entity-encoded, or wrapped in links and
//! buttons. Each edit either lands completely and verifiably or leaves the
//! document untouched, with a diagnosis explaining why.
//!
//! # Modules
//!
//! - `dom`: byte-preserving HTML tree; untouched documents serialize back
//!   to their exact input
//! - `patch`: normalizer, context matcher, block scanner, node writer,
//!   atomic applier, diagnostics and the loose-word fallback
//! - `variants`: in-memory runs producing sibling variants of one document
//!   from proposer-generated edit batches
//! - `shell`: wraps body fragments into complete documents
//!
//! # Architecture
//!
//! ```text
//! html ──→ Document ──→ scan_blocks ──→ find_in_scope ──→ writer ──→ verify
//!                ↑                                                    │
//!                └──────────── restore snapshots on failure ←─────────┘
//!
//! RunManager ──→ EditProposer (chunks, concurrent) ──→ apply_context_edits
//! ```

pub mod config;
pub mod dom;
pub mod error;
pub mod patch;
pub mod shell;
pub mod util;
pub mod variants;

pub use config::{GenerationConfig, PatchConfig};
pub use error::{PatchError, PatchResult, ProposerError, RunError};
pub use patch::{
    BatchOutcome, BatchStats, Change, Edit, EditResult, EditStatus, apply_context_edits,
    apply_context_edits_with,
};
pub use variants::{EditProposer, NextVariant, ProposalRequest, RunManager, RunStatus, Variant};
