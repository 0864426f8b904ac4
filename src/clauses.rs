//! The reference clause file.
//!
//! Reference clauses live in a human-editable TOML file, one `[[clause]]`
//! table per clause:
//!
//! ```toml
//! [[clause]]
//! name = "Payment of Rent"
//! text = "The lessee hereby agrees to pay the said rent on or before the 5th of every month."
//! ```
//!
//! The file is read once at startup and embedded into an immutable
//! [`ReferenceSet`]. `lens discover` rewrites it, keeping a timestamped
//! copy of the previous version next to it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use clauselens_core::reference::{ReferenceClause, ReferenceSet};

use crate::config::EmbeddingConfig;
use crate::embedding::{embed_texts, EmbeddingService};

/// One named clause as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClauseEntry {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct ClauseFile {
    #[serde(default, rename = "clause")]
    clauses: Vec<ClauseEntry>,
}

/// Reject empty names or texts and duplicate names.
pub fn validate_entries(entries: &[ClauseEntry]) -> Result<()> {
    let mut seen = HashSet::new();
    for entry in entries {
        if entry.name.trim().is_empty() {
            bail!("clause name must not be empty");
        }
        if entry.text.trim().is_empty() {
            bail!("clause '{}' has empty text", entry.name);
        }
        if !seen.insert(entry.name.as_str()) {
            bail!("duplicate clause name '{}'", entry.name);
        }
    }
    Ok(())
}

/// Read the clause file at `path`.
///
/// A missing file is not an error: the result is empty and a warning is
/// logged, so the coverage check is skipped rather than the service failing.
pub fn load_clause_file(path: &Path) -> Result<Vec<ClauseEntry>> {
    if !path.exists() {
        tracing::warn!(
            path = %path.display(),
            "reference clause file not found; coverage checks are disabled"
        );
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read clause file: {}", path.display()))?;
    let file: ClauseFile = toml::from_str(&content)
        .with_context(|| format!("Failed to parse clause file: {}", path.display()))?;
    validate_entries(&file.clauses)
        .with_context(|| format!("Invalid clause file: {}", path.display()))?;
    Ok(file.clauses)
}

/// Backup path for `path` at the current local time:
/// `<dir>/<stem>.backup.<YYYYmmdd-HHMMSS>.toml`.
pub fn backup_path(path: &Path) -> PathBuf {
    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("clauses");
    let dir = path.parent().unwrap_or_else(|| Path::new(""));

    let mut candidate = dir.join(format!("{}.backup.{}.toml", stem, stamp));
    let mut n = 2;
    while candidate.exists() {
        candidate = dir.join(format!("{}.backup.{}-{}.toml", stem, stamp, n));
        n += 1;
    }
    candidate
}

/// Write `entries` to `path`, backing up any existing file first.
///
/// Returns the backup path when a previous file was copied aside.
pub fn save_clause_file(path: &Path, entries: &[ClauseEntry]) -> Result<Option<PathBuf>> {
    validate_entries(entries)?;

    let backup = if path.exists() {
        let target = backup_path(path);
        std::fs::copy(path, &target).with_context(|| {
            format!(
                "Failed to back up {} to {}",
                path.display(),
                target.display()
            )
        })?;
        Some(target)
    } else {
        None
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    let body = toml::to_string_pretty(&ClauseFile {
        clauses: entries.to_vec(),
    })
    .context("Failed to serialize clause file")?;
    let header = format!(
        "# Reference clauses generated by `lens discover` on {}.\n\
         # Edit freely or re-run discovery to refresh; the previous file is kept as a backup.\n\n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    std::fs::write(path, header + &body)
        .with_context(|| format!("Failed to write clause file: {}", path.display()))?;

    Ok(backup)
}

/// Embed clause texts and build the reference set.
pub async fn embed_reference_clauses(
    service: &dyn EmbeddingService,
    config: &EmbeddingConfig,
    entries: &[ClauseEntry],
) -> Result<ReferenceSet> {
    if entries.is_empty() {
        return Ok(ReferenceSet::empty());
    }
    let texts: Vec<String> = entries.iter().map(|e| e.text.clone()).collect();
    let embeddings = embed_texts(service, config, &texts)
        .await
        .context("Failed to embed reference clauses")?;

    let clauses = entries
        .iter()
        .zip(embeddings)
        .map(|(entry, embedding)| ReferenceClause {
            name: entry.name.clone(),
            text: entry.text.clone(),
            embedding,
        })
        .collect();
    Ok(ReferenceSet::new(clauses)?)
}
