//! Edit-batch generation: chunk the visible text, ask the proposer about
//! every chunk concurrently, then concatenate the answers in chunk order.

use futures::future::join_all;
use tracing::{debug, warn};

use super::proposer::{EditProposer, ProposalRequest};
use crate::config::GenerationConfig;
use crate::patch::Edit;

/// Split `text` into chunks of at most `max_chars` characters, breaking on
/// whitespace. A single word longer than `max_chars` becomes its own chunk.
#[must_use]
pub fn chunk_text(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0;

    for word in text.split_whitespace() {
        let word_chars = word.chars().count();
        let needed = if current.is_empty() { word_chars } else { word_chars + 1 };
        if current_chars + needed > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push(' ');
            current_chars += 1;
        }
        current.push_str(word);
        current_chars += word_chars;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Gather edits for `text`. Returns `None` when every chunk request failed;
/// a partial failure just yields fewer edits.
pub async fn generate_edits<P>(
    proposer: &P,
    text: &str,
    used_ideas: &[String],
    config: &GenerationConfig,
) -> Option<Vec<Edit>>
where
    P: EditProposer + ?Sized,
{
    let chunks = chunk_text(text, config.chunk_chars);
    if chunks.is_empty() {
        return Some(Vec::new());
    }

    let requests: Vec<ProposalRequest> = chunks
        .into_iter()
        .map(|text| ProposalRequest {
            text,
            max_edits: config.max_edits_per_request,
            used_ideas: used_ideas.to_vec(),
        })
        .collect();
    let futures: Vec<_> = requests.iter().map(|req| proposer.propose(req)).collect();
    let results = join_all(futures).await;

    let mut edits = Vec::new();
    let mut succeeded = 0usize;
    for (chunk, result) in results.into_iter().enumerate() {
        match result {
            Ok(mut proposed) => {
                succeeded += 1;
                proposed.truncate(config.max_edits_per_request);
                edits.extend(proposed);
            }
            Err(e) => warn!(chunk, error = %e, "edit proposal failed for chunk"),
        }
    }
    if succeeded == 0 {
        return None;
    }

    edits.truncate(config.max_edits_total);
    debug!(chunks = requests.len(), succeeded, edits = edits.len(), "edits generated");
    Some(edits)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_respect_limit() {
        let chunks = chunk_text("one two three four five", 9);
        assert_eq!(chunks, vec!["one two", "three", "four five"]);
        assert!(chunks.iter().all(|c| c.chars().count() <= 9));
    }

    #[test]
    fn test_oversized_word_alone() {
        assert_eq!(chunk_text("a supercalifragilistic b", 5), vec!["a", "supercalifragilistic", "b"]);
    }

    #[test]
    fn test_blank_text_has_no_chunks() {
        assert!(chunk_text("  \n\t ", 10).is_empty());
    }
}
