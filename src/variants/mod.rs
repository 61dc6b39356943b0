//! Variant runs.
//!
//! A run produces up to `target` independent variants of one base document.
//! Each [`RunManager::next`] call asks the proposer for a fresh batch of
//! edits against the untouched base document and applies it with the patch
//! engine, so variants are siblings rather than a chain.
//!
//! Runs live in memory only. Each run sits behind its own async mutex, which
//! serializes concurrent `next` calls for the same run id.

pub mod generate;
pub mod proposer;

use std::collections::BTreeSet;
use std::sync::Arc;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

pub use generate::{chunk_text, generate_edits};
pub use proposer::{EditProposer, ProposalRequest, parse_proposal};

use crate::config::{GenerationConfig, PatchConfig};
use crate::dom::Document;
use crate::error::RunError;
use crate::patch::{BatchOutcome, BatchStats, Change, EditResult, apply_context_edits_with};
use crate::shell::ensure_html_document;

/// One generated copy of the base document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant {
    /// 1-based position within the run.
    pub no: usize,
    pub html: String,
    pub changes: Vec<Change>,
    /// Distinct reasons of the applied changes, joined with `"; "`.
    pub why: String,
    pub failed_edits: Vec<EditResult>,
    pub stats: BatchStats,
}

impl Variant {
    fn from_outcome(no: usize, outcome: BatchOutcome) -> Self {
        let changes = outcome.changes();
        let mut reasons: Vec<&str> = Vec::new();
        for reason in changes.iter().filter_map(|c| c.reason.as_deref()) {
            if !reasons.contains(&reason) {
                reasons.push(reason);
            }
        }
        let why = reasons.join("; ");
        Self {
            no,
            failed_edits: outcome.failed(),
            stats: outcome.stats,
            html: outcome.html,
            changes,
            why,
        }
    }
}

/// What [`RunManager::next`] produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum NextVariant {
    /// The run already holds `target` variants. Nothing changed.
    Done,
    Variant(Variant),
}

/// Read-only view of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStatus {
    pub id: Uuid,
    pub template_id: String,
    pub target: usize,
    pub complete: bool,
    pub used_ideas: Vec<String>,
    pub variants: Vec<Variant>,
}

#[derive(Debug)]
struct Run {
    id: Uuid,
    template_id: String,
    target: usize,
    base_html: String,
    used_ideas: BTreeSet<String>,
    variants: Vec<Variant>,
}

impl Run {
    fn is_complete(&self) -> bool {
        self.variants.len() >= self.target
    }

    fn status(&self) -> RunStatus {
        RunStatus {
            id: self.id,
            template_id: self.template_id.clone(),
            target: self.target,
            complete: self.is_complete(),
            used_ideas: self.used_ideas.iter().cloned().collect(),
            variants: self.variants.clone(),
        }
    }
}

/// Owns every run and the collaborator that feeds them.
pub struct RunManager<P: ?Sized> {
    proposer: Arc<P>,
    runs: DashMap<Uuid, Arc<Mutex<Run>>>,
    patch: PatchConfig,
    generation: GenerationConfig,
}

impl<P: EditProposer + ?Sized> RunManager<P> {
    #[must_use]
    pub fn new(proposer: Arc<P>) -> Self {
        Self::with_config(proposer, PatchConfig::default(), GenerationConfig::default())
    }

    #[must_use]
    pub fn with_config(proposer: Arc<P>, patch: PatchConfig, generation: GenerationConfig) -> Self {
        Self {
            proposer,
            runs: DashMap::new(),
            patch,
            generation,
        }
    }

    /// Register a run over `base_html`. Fragments are wrapped into a full
    /// document first.
    pub fn start(&self, template_id: &str, base_html: &str, target: usize) -> Uuid {
        let id = Uuid::new_v4();
        let run = Run {
            id,
            template_id: template_id.to_owned(),
            target,
            base_html: ensure_html_document(template_id, base_html),
            used_ideas: BTreeSet::new(),
            variants: Vec::new(),
        };
        self.runs.insert(id, Arc::new(Mutex::new(run)));
        info!(%id, template_id, target, "variant run started");
        id
    }

    /// Generate the next variant, or report that the run is complete.
    pub async fn next(&self, id: Uuid) -> Result<NextVariant, RunError> {
        let slot = self.slot(id)?;
        let mut run = slot.lock().await;
        if run.is_complete() {
            return Ok(NextVariant::Done);
        }

        let text = Document::parse(&run.base_html).visible_text(|tag| self.patch.is_denied(tag));
        let used: Vec<String> = run.used_ideas.iter().cloned().collect();
        let edits = generate_edits(self.proposer.as_ref(), &text, &used, &self.generation)
            .await
            .ok_or_else(|| RunError::Generation {
                run_id: id,
                reason: "every edit proposal request failed".to_owned(),
            })?;

        run.used_ideas.extend(edits.iter().filter_map(|e| e.idea.clone()));
        let outcome = apply_context_edits_with(&run.base_html, &edits, &self.patch);
        let variant = Variant::from_outcome(run.variants.len() + 1, outcome);
        run.variants.push(variant.clone());
        info!(
            %id,
            no = variant.no,
            applied = variant.stats.applied,
            failed = variant.stats.failed,
            "variant generated"
        );
        Ok(NextVariant::Variant(variant))
    }

    /// Current state of a run.
    pub async fn status(&self, id: Uuid) -> Result<RunStatus, RunError> {
        let slot = self.slot(id)?;
        let run = slot.lock().await;
        Ok(run.status())
    }

    fn slot(&self, id: Uuid) -> Result<Arc<Mutex<Run>>, RunError> {
        self.runs
            .get(&id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(RunError::RunNotFound(id))
    }
}
