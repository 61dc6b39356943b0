//! Engine and generation configuration.

/// Tags whose descendants are never treated as prose.
pub const DEFAULT_DENIED_TAGS: &[&str] = &["style", "script", "noscript", "title", "svg", "textarea"];

/// Tags whose text must never be split away from its wrapper.
pub const DEFAULT_INTERACTIVE_TAGS: &[&str] = &["a", "button"];

/// Block containers, in no particular order. Each one is its own search scope.
pub const DEFAULT_BLOCK_TAGS: &[&str] = &[
    "p", "div", "td", "th", "li", "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "section",
    "article", "header", "footer", "main", "aside", "nav", "figcaption", "caption", "dd", "dt",
    "pre", "center", "table", "tr", "body",
];

/// Configuration for a single patch batch.
#[derive(Debug, Clone)]
pub struct PatchConfig {
    /// Edits past this index are skipped.
    pub max_edits: usize,
    /// Ancestors that disqualify a text node from matching.
    pub denied_tags: Vec<String>,
    /// Ancestors that a multi-node replacement must not straddle.
    pub interactive_tags: Vec<String>,
    /// Element names that open a new search scope.
    pub block_tags: Vec<String>,
    /// Maximum length of the HTML excerpt attached to boundary diagnostics.
    pub excerpt_len: usize,
    /// Replacement words at least this long must survive verification.
    pub min_verify_word_len: usize,
    /// Minimum word length considered by the loose-word pass.
    pub loose_min_word_len: usize,
    /// Bytes of surrounding document text used when checking contexts at
    /// block edges.
    pub context_window: usize,
}

impl Default for PatchConfig {
    fn default() -> Self {
        Self {
            max_edits: 60,
            denied_tags: to_owned_list(DEFAULT_DENIED_TAGS),
            interactive_tags: to_owned_list(DEFAULT_INTERACTIVE_TAGS),
            block_tags: to_owned_list(DEFAULT_BLOCK_TAGS),
            excerpt_len: 200,
            min_verify_word_len: 3,
            loose_min_word_len: 4,
            context_window: 512,
        }
    }
}

impl PatchConfig {
    pub(crate) fn is_denied(&self, tag: &str) -> bool {
        self.denied_tags.iter().any(|t| t == tag)
    }

    pub(crate) fn is_interactive(&self, tag: &str) -> bool {
        self.interactive_tags.iter().any(|t| t == tag)
    }

    pub(crate) fn is_block(&self, tag: &str) -> bool {
        self.block_tags.iter().any(|t| t == tag)
    }
}

/// Configuration for gathering an edit batch from the collaborator.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Cap applied to each chunk's proposal.
    pub max_edits_per_request: usize,
    /// Cap applied after concatenating every chunk's proposal.
    pub max_edits_total: usize,
    /// Upper bound on the characters of visible text sent per request.
    pub chunk_chars: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_edits_per_request: 30,
            max_edits_total: 60,
            chunk_chars: 6000,
        }
    }
}

fn to_owned_list(tags: &[&str]) -> Vec<String> {
    tags.iter().map(|t| (*t).to_owned()).collect()
}
