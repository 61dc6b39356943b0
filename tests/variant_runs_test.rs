//! Variant run manager integration tests.
//!
//! Uses an in-process proposer whose answers depend on the request, so the
//! tests stay deterministic under concurrent chunk fan-out.

use std::sync::{Arc, Mutex};

use html_patcher::error::{ProposerError, RunError};
use html_patcher::{
    Edit, EditProposer, GenerationConfig, NextVariant, PatchConfig, ProposalRequest, RunManager, Variant,
};
use uuid::Uuid;

type Reply = fn(&ProposalRequest) -> Result<Vec<Edit>, ProposerError>;

struct ScriptedProposer {
    reply: Reply,
    seen: Mutex<Vec<ProposalRequest>>,
}

impl ScriptedProposer {
    fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            seen: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ProposalRequest> {
        self.seen.lock().expect("lock").clone()
    }
}

#[async_trait::async_trait]
impl EditProposer for ScriptedProposer {
    async fn propose(&self, request: &ProposalRequest) -> Result<Vec<Edit>, ProposerError> {
        self.seen.lock().expect("lock").push(request.clone());
        (self.reply)(request)
    }
}

fn idea(find: &str, replace: &str, idea: &str) -> Edit {
    let mut edit = Edit::new(find, replace).with_reason(format!("{idea} change"));
    edit.idea = Some(idea.to_owned());
    edit
}

/// First call fixes the typo, later calls swap the animal.
fn typo_then_animal(request: &ProposalRequest) -> Result<Vec<Edit>, ProposerError> {
    if request.used_ideas.is_empty() {
        Ok(vec![idea("qiuck", "quick", "typo")])
    } else {
        Ok(vec![idea("fox", "dog", "animal"), Edit::new("missing", "gone")])
    }
}

fn expect_variant(next: NextVariant) -> Variant {
    match next {
        NextVariant::Variant(v) => v,
        NextVariant::Done => panic!("expected a variant, run reported done"),
    }
}

#[tokio::test]
async fn test_variants_are_siblings_of_base() {
    let proposer = ScriptedProposer::new(typo_then_animal);
    let manager = RunManager::new(Arc::clone(&proposer));
    let id = manager.start("welcome", "<p>The qiuck fox</p>", 2);

    let first = expect_variant(manager.next(id).await.expect("first variant"));
    assert_eq!(first.no, 1);
    assert!(first.html.contains("The quick fox"));
    assert_eq!(first.why, "typo change");

    let second = expect_variant(manager.next(id).await.expect("second variant"));
    assert_eq!(second.no, 2);
    assert!(second.html.contains("The qiuck dog"));
    assert_eq!(second.stats.applied, 1);
    assert_eq!(second.failed_edits.len(), 1);

    let requests = proposer.requests();
    assert_eq!(requests[1].used_ideas, vec!["typo"]);
    assert!(requests.iter().all(|r| r.text == "The qiuck fox"));
}

#[tokio::test]
async fn test_done_is_idempotent() {
    let manager = RunManager::new(ScriptedProposer::new(typo_then_animal));
    let id = manager.start("t", "<p>The qiuck fox</p>", 1);

    expect_variant(manager.next(id).await.expect("variant"));
    assert!(matches!(manager.next(id).await, Ok(NextVariant::Done)));
    assert!(matches!(manager.next(id).await, Ok(NextVariant::Done)));

    let status = manager.status(id).await.expect("status");
    assert!(status.complete);
    assert_eq!(status.variants.len(), 1);
    assert_eq!(status.used_ideas, vec!["typo"]);
    assert_eq!(status.template_id, "t");
}

#[tokio::test]
async fn test_status_of_fresh_run() {
    let manager = RunManager::new(ScriptedProposer::new(typo_then_animal));
    let id = manager.start("t", "<html><body><p>x</p></body></html>", 3);
    let status = manager.status(id).await.expect("status");
    assert!(!status.complete);
    assert!(status.variants.is_empty());
    assert_eq!(status.target, 3);
}

#[tokio::test]
async fn test_unknown_run() {
    let manager = RunManager::new(ScriptedProposer::new(typo_then_animal));
    let missing = Uuid::new_v4();
    assert!(matches!(manager.next(missing).await, Err(RunError::RunNotFound(id)) if id == missing));
    assert!(matches!(manager.status(missing).await, Err(RunError::RunNotFound(_))));
}

#[tokio::test]
async fn test_all_chunks_failing_appends_nothing() {
    let manager = RunManager::new(ScriptedProposer::new(|_| Err(ProposerError::Request("offline".into()))));
    let id = manager.start("t", "<p>Some text</p>", 2);

    assert!(matches!(manager.next(id).await, Err(RunError::Generation { .. })));
    let status = manager.status(id).await.expect("status");
    assert!(status.variants.is_empty());
}

#[tokio::test]
async fn test_failed_chunk_degrades_to_fewer_edits() {
    fn reply(request: &ProposalRequest) -> Result<Vec<Edit>, ProposerError> {
        if request.text.contains("gamma") {
            Err(ProposerError::Malformed("bad reply".into()))
        } else if request.text.contains("alpha") {
            Ok(vec![Edit::new("alpha", "omega")])
        } else {
            Ok(Vec::new())
        }
    }

    let proposer = ScriptedProposer::new(reply);
    let generation = GenerationConfig {
        chunk_chars: 10,
        ..GenerationConfig::default()
    };
    let manager = RunManager::with_config(Arc::clone(&proposer), PatchConfig::default(), generation);
    let id = manager.start("t", "<p>alpha beta</p><p>gamma delta</p>", 1);

    let variant = expect_variant(manager.next(id).await.expect("variant"));
    assert_eq!(proposer.requests().len(), 3);
    assert!(variant.html.contains("<p>omega beta</p>"));
    assert_eq!(variant.stats.applied, 1);
}

#[tokio::test]
async fn test_concurrent_next_calls_serialize() {
    let manager = RunManager::new(ScriptedProposer::new(typo_then_animal));
    let id = manager.start("t", "<p>The qiuck fox</p>", 2);

    let (a, b) = tokio::join!(manager.next(id), manager.next(id));
    let mut numbers = vec![
        expect_variant(a.expect("first")).no,
        expect_variant(b.expect("second")).no,
    ];
    numbers.sort_unstable();
    assert_eq!(numbers, vec![1, 2]);

    let status = manager.status(id).await.expect("status");
    assert_eq!(status.variants.len(), 2);
    assert_eq!(status.used_ideas, vec!["animal", "typo"]);
}
