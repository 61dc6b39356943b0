//! html-patch -- apply an edit batch to an HTML file.
//!
//! Usage: html-patch --html <page.html> --edits <edits.json> [--out <file>] [--diff] [--loose]
//!
//! Prints the batch outcome (results, stats, timings) as JSON on stdout.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use html_patcher::patch::{self, diff};
use html_patcher::util::atomic::atomic_write;
use html_patcher::variants::parse_proposal;
use html_patcher::{EditStatus, PatchConfig};

struct Args {
    html: PathBuf,
    edits: PathBuf,
    out: Option<PathBuf>,
    diff: bool,
    loose: bool,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut html = None;
    let mut edits = None;
    let mut out = None;
    let mut diff = false;
    let mut loose = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--html" => html = args.next().map(PathBuf::from),
            "--edits" => edits = args.next().map(PathBuf::from),
            "--out" => out = args.next().map(PathBuf::from),
            "--diff" => diff = true,
            "--loose" => loose = true,
            other => bail!("unknown argument: {other}"),
        }
    }

    Ok(Args {
        html: html.context("missing --html <file>")?,
        edits: edits.context("missing --edits <file>")?,
        out,
        diff,
        loose,
    })
}

fn read(path: &Path) -> anyhow::Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr; stdout carries the JSON outcome.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = parse_args()?;
    let original = read(&args.html)?;
    let edits = parse_proposal(&read(&args.edits)?)
        .with_context(|| format!("invalid edit list in {}", args.edits.display()))?;

    let config = PatchConfig::default();
    let mut outcome = patch::apply_context_edits_with(&original, &edits, &config);

    let mut loose_applied = Vec::new();
    if args.loose {
        let (indices, leftovers): (Vec<usize>, Vec<_>) = outcome
            .results
            .iter()
            .filter(|r| r.status != EditStatus::Applied && r.status != EditStatus::Blocked)
            .map(|r| (r.index, r.edit.clone()))
            .unzip();
        let loose = patch::apply_loose_word_fallback(&outcome.html, &leftovers, &config);
        loose_applied = loose.applied.iter().filter_map(|&i| indices.get(i).copied()).collect();
        outcome.html = loose.html;
    }

    if let Some(out) = &args.out {
        atomic_write(out, &outcome.html)?;
    }
    if args.diff {
        let name = args.html.file_name().map_or_else(|| "document".to_owned(), |n| n.to_string_lossy().into_owned());
        eprint!("{}", diff::html_diff(&name, &original, &outcome.html));
    }

    let html = if args.out.is_some() {
        serde_json::Value::Null
    } else {
        serde_json::Value::String(outcome.html.clone())
    };
    let report = serde_json::json!({
        "html": html,
        "results": outcome.results,
        "stats": outcome.stats,
        "timings": outcome.timings,
        "looseApplied": loose_applied,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
