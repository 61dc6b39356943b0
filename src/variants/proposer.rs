//! The text-generation collaborator that proposes edits.
//!
//! Whatever transport an implementation uses, its answers are untrusted:
//! every proposed edit still goes through validation and verification in
//! the patch engine.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::error::ProposerError;
use crate::patch::Edit;

/// One request for edits over a chunk of visible text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProposalRequest {
    /// Plain visible text, without script/style content.
    pub text: String,
    pub max_edits: usize,
    /// Ideas already used by earlier variants of the same run.
    #[serde(default)]
    pub used_ideas: Vec<String>,
}

/// Source of proposed edits.
#[async_trait::async_trait]
pub trait EditProposer: Send + Sync {
    /// Propose up to `request.max_edits` edits for `request.text`.
    async fn propose(&self, request: &ProposalRequest) -> Result<Vec<Edit>, ProposerError>;
}

/// Parse a collaborator reply into edits.
///
/// Accepts `{"edits": [...]}` or a bare array, optionally wrapped in a
/// Markdown code fence. Entries that do not deserialize as an [`Edit`] are
/// dropped.
pub fn parse_proposal(reply: &str) -> Result<Vec<Edit>, ProposerError> {
    let value: Value = serde_json::from_str(strip_fence(reply))?;
    let entries = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("edits") {
            Some(Value::Array(items)) => items,
            _ => return Err(ProposerError::Malformed("missing \"edits\" array".into())),
        },
        other => {
            return Err(ProposerError::Malformed(format!(
                "expected an object or array, got {other}"
            )));
        }
    };

    let total = entries.len();
    let edits: Vec<Edit> = entries
        .into_iter()
        .filter_map(|entry| serde_json::from_value(entry).ok())
        .collect();
    if edits.len() < total {
        debug!(dropped = total - edits.len(), "ignored malformed proposal entries");
    }
    Ok(edits)
}

fn strip_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_form() {
        let edits = parse_proposal(r#"{"edits":[{"find":"teh","replace":"the"}]}"#).expect("parses");
        assert_eq!(edits, vec![Edit::new("teh", "the")]);
    }

    #[test]
    fn test_fenced_bare_array() {
        let reply = "```json\n[{\"find\":\"a\",\"replace\":\"b\",\"idea\":\"tone\"}]\n```";
        let edits = parse_proposal(reply).expect("parses");
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].idea.as_deref(), Some("tone"));
    }

    #[test]
    fn test_bad_entries_dropped() {
        let edits = parse_proposal(r#"[{"find":"x"},{"find":"a","replace":"b"},42]"#).expect("parses");
        assert_eq!(edits, vec![Edit::new("a", "b")]);
    }

    #[test]
    fn test_wrong_shape_rejected() {
        assert!(matches!(parse_proposal(r#"{"changes":[]}"#), Err(ProposerError::Malformed(_))));
        assert!(matches!(parse_proposal("not json"), Err(ProposerError::Json(_))));
    }
}
