//! Atomic output writes via tempfile + rename.
//!
//! The patched document is written to a temporary file next to the target
//! and then renamed over it, so a crash never leaves a half-written page.

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

/// Atomically write `content` to `path`.
///
/// A relative path without a directory component is written in the current
/// directory.
///
/// # Errors
///
/// Returns an error if the temp file cannot be created or written, or the
/// rename fails (e.g., cross-device).
pub fn atomic_write(path: &Path, content: &str) -> Result<()> {
    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut tmp = tempfile::NamedTempFile::new_in(parent)
        .with_context(|| format!("failed to create temp file in {}", parent.display()))?;

    tmp.write_all(content.as_bytes())
        .with_context(|| format!("failed to write patched HTML for {}", path.display()))?;

    tmp.persist(path)
        .with_context(|| format!("failed to replace {}", path.display()))?;

    Ok(())
}
