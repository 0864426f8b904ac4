//! CLI command implementations for single documents and the clause file.
//!
//! Output is plain text on stdout, one `key: value` line per field, so it
//! can be grepped in scripts. Warnings go to stderr.

use std::path::Path;

use anyhow::{Context, Result};

use clauselens_core::chunk::{chunk_words, word_count};

use crate::clauses::load_clause_file;
use crate::config::Config;
use crate::extract::extract_file;
use crate::persist::{load_store, save_store};
use crate::session::{Engine, ProcessOptions, Session};

/// Longest clause text preview printed by `lens clauses`.
const PREVIEW_CHARS: usize = 80;

/// `lens chunk`: print the fragments of a document.
pub fn run_chunk(config: &Config, file: &Path, size: Option<usize>) -> Result<()> {
    let size = size.unwrap_or(config.chunking.size);
    let text = extract_file(file)?;
    let fragments = chunk_words(&text, size)
        .with_context(|| format!("Failed to chunk {}", file.display()))?;

    println!("chunk {}", file.display());
    println!("  size: {} words", size);
    println!("  fragments: {}", fragments.len());
    for (i, fragment) in fragments.iter().enumerate() {
        println!();
        println!("[{}] ({} words)", i, word_count(fragment));
        println!("{}", fragment);
    }
    Ok(())
}

/// `lens process`: full processing report, optionally dumping the store.
pub async fn run_process(
    config: &Config,
    file: &Path,
    summary: bool,
    save: Option<&Path>,
) -> Result<()> {
    let text = extract_file(file)?;
    let engine = Engine::start(config.clone()).await?;
    if let Some(reason) = engine.degraded() {
        eprintln!("Warning: coverage check disabled ({})", reason);
    }

    let mut session = Session::new();
    let report = engine
        .process_document(&mut session, &text, ProcessOptions { summarize: summary })
        .await?;

    println!("process {}", file.display());
    println!("  fragments: {}", report.total_chunks);
    match &report.coverage_skipped {
        Some(reason) => println!("  coverage: skipped ({})", reason),
        None => println!(
            "  coverage: {} of {} reference clauses missing",
            report.missing_clauses.len(),
            engine.references().len()
        ),
    }
    for name in &report.missing_clauses {
        println!("    - {}", name);
    }
    println!("  suspicious: {}", report.is_suspicious);
    if let Some(note) = &report.suspicion_note {
        println!("  note: {}", note);
    }
    println!("  time: {:.2}s", report.processing_time_secs);

    if let Some(dir) = save {
        let digest = save_store(dir, session.index())?;
        println!("  saved: {} ({})", dir.display(), &digest[..12]);
    }

    if let Some(summary) = &report.summary {
        println!();
        println!("{}", summary);
    }
    Ok(())
}

/// `lens ask`: answer a question from a dumped store.
pub async fn run_ask(config: &Config, question: &str, store: &Path) -> Result<()> {
    let index = load_store(store)?;
    let engine = Engine::connect(config.clone())?;
    let session = Session::from_index(index);
    let answer = engine.answer(&session, question).await?;

    println!("{}", answer.answer);
    if !answer.fragments.is_empty() {
        println!();
        println!("Sources:");
        for fragment in &answer.fragments {
            println!(
                "  [{}] score {:.3}: {}",
                fragment.position,
                fragment.score,
                preview(&fragment.text)
            );
        }
    }
    Ok(())
}

/// `lens clauses`: list the reference clause file.
pub fn run_clauses(config: &Config) -> Result<()> {
    let path = &config.clauses.path;
    let entries = load_clause_file(path)?;

    println!("clauses {}", path.display());
    println!("  count: {}", entries.len());
    for entry in &entries {
        println!("  - {}: {}", entry.name, preview(&entry.text));
    }
    Ok(())
}

fn preview(text: &str) -> String {
    if text.chars().count() <= PREVIEW_CHARS {
        text.to_string()
    } else {
        let cut: String = text.chars().take(PREVIEW_CHARS).collect();
        format!("{}...", cut.trim_end())
    }
}
