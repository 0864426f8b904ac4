//! Offline reference clause discovery.
//!
//! Builds a reference clause file from a directory of sample agreements:
//!
//! 1. Read every corpus document (sorted by path) into paragraphs.
//! 2. Split paragraphs into candidate clauses.
//! 3. Embed all candidates (batched, retried).
//! 4. Build one average-linkage dendrogram over the candidates.
//! 5. Auto-tune: cut the dendrogram for every grid combination, filter by
//!    size and document coverage, and keep the combination whose clause
//!    count lands closest to the target range.
//! 6. Name each retained cluster's representative with the generator.
//!
//! When no combination retains a cluster the run is degraded: the output
//! mapping is empty and the report says so.

use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{bail, Context, Result};
use walkdir::WalkDir;

use clauselens_core::cluster::Dendrogram;
use clauselens_core::discovery::{extract_candidates, representative, select_clusters};
use clauselens_core::naming::{assign_names, clean_title, normalize_clause_text};
use clauselens_core::tune::{auto_tune, DiscoveryParams, SearchGrid, TargetRange, Trial, Tuned};

use crate::clauses::{save_clause_file, ClauseEntry};
use crate::config::{Config, EmbeddingConfig};
use crate::embedding::{create_provider, embed_texts, EmbeddingService};
use crate::extract::{is_corpus_file, read_corpus_document};
use crate::generation::{create_generator, generate_best_effort, TextGenerator};
use crate::prompts::render_template;
use crate::retry::RetryPolicy;

/// Knobs for one discovery run.
#[derive(Debug, Clone)]
pub struct DiscoverySettings {
    pub min_paragraph_chars: usize,
    pub grid: SearchGrid,
    pub target: TargetRange,
    /// `{clause}` is replaced with the representative text.
    pub naming_template: String,
    pub naming_policy: RetryPolicy,
}

impl DiscoverySettings {
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self {
            min_paragraph_chars: config.discovery.min_paragraph_chars,
            grid: config.discovery.grid(),
            target: config.discovery.target()?,
            naming_template: config.prompts.naming_template.clone(),
            naming_policy: RetryPolicy::new(
                config.generation.max_retries,
                config.generation.backoff_base_ms,
            ),
        })
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryReport {
    pub documents: usize,
    pub candidates: usize,
    /// Winning combination; `None` for a degraded run.
    pub params: Option<DiscoveryParams>,
    pub trials: Vec<Trial>,
    pub clauses: Vec<ClauseEntry>,
}

impl DiscoveryReport {
    pub fn is_degraded(&self) -> bool {
        self.params.is_none()
    }
}

/// Run discovery over an in-memory corpus (one paragraph list per document).
pub async fn discover_reference_clauses(
    embedder: &dyn EmbeddingService,
    embedding: &EmbeddingConfig,
    generator: &dyn TextGenerator,
    corpus: &[Vec<String>],
    settings: &DiscoverySettings,
) -> Result<DiscoveryReport> {
    let documents = corpus.len();
    let candidates = extract_candidates(corpus, settings.min_paragraph_chars);
    tracing::info!(documents, candidates = candidates.len(), "candidates extracted");

    let degraded = |trials: Vec<Trial>| DiscoveryReport {
        documents,
        candidates: candidates.len(),
        params: None,
        trials,
        clauses: Vec::new(),
    };
    if candidates.is_empty() {
        return Ok(degraded(Vec::new()));
    }

    let started = Instant::now();
    let texts: Vec<String> = candidates.iter().map(|c| c.text.clone()).collect();
    let embeddings = embed_texts(embedder, embedding, &texts)
        .await
        .context("Failed to embed candidate clauses")?;
    tracing::info!(
        elapsed_ms = started.elapsed().as_millis() as u64,
        "candidates embedded"
    );

    let started = Instant::now();
    let (tree, embeddings) = tokio::task::spawn_blocking(move || {
        let tree = Dendrogram::average_linkage(&embeddings);
        (tree, embeddings)
    })
    .await
    .context("Clustering task failed")?;
    tracing::info!(
        merges = tree.merges().len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "dendrogram built"
    );

    let tuned = auto_tune(&settings.grid, settings.target, |params| {
        select_clusters(&tree, &candidates, documents, params)
    });

    let outcome = match tuned {
        Tuned::Selected(outcome) => outcome,
        Tuned::Degraded { trials } => {
            tracing::warn!(trials = trials.len(), "no parameter combination kept a cluster");
            return Ok(degraded(trials));
        }
    };

    let mut representatives = Vec::with_capacity(outcome.clusters.len());
    for cluster in &outcome.clusters {
        let member = representative(cluster, &embeddings)?;
        representatives.push(candidates[member].text.clone());
    }

    let mut titles = Vec::with_capacity(representatives.len());
    for text in &representatives {
        let prompt = render_template(&settings.naming_template, &[("clause", text.as_str())]);
        let title = generate_best_effort(generator, &settings.naming_policy, &prompt)
            .await
            .and_then(|raw| clean_title(&raw));
        if title.is_none() {
            tracing::debug!("no title generated; using placeholder");
        }
        titles.push(title);
    }

    let clauses = assign_names(titles)
        .into_iter()
        .zip(&representatives)
        .map(|(name, text)| ClauseEntry {
            name,
            text: normalize_clause_text(text),
        })
        .collect();

    Ok(DiscoveryReport {
        documents,
        candidates: candidates.len(),
        params: Some(outcome.params),
        trials: outcome.trials,
        clauses,
    })
}

/// Corpus files under `dir`, sorted by path.
pub fn corpus_files(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        bail!("Dataset directory not found: {}", dir.display());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", dir.display()))?;
        if entry.file_type().is_file() && is_corpus_file(entry.path()) {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Paragraphs of every readable corpus file.
#[derive(Debug, Default)]
pub struct Corpus {
    /// One paragraph list per document; the coverage denominator is its length.
    pub documents: Vec<Vec<String>>,
    /// Files that could not be read.
    pub skipped: Vec<PathBuf>,
}

/// Read every corpus file as paragraphs. Unreadable files are skipped and
/// listed in [`Corpus::skipped`].
pub fn read_corpus(files: &[PathBuf]) -> Corpus {
    let mut corpus = Corpus::default();
    for path in files {
        match read_corpus_document(path) {
            Ok(paragraphs) => corpus.documents.push(paragraphs),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "skipping unreadable document");
                corpus.skipped.push(path.clone());
            }
        }
    }
    corpus
}

/// `lens discover`: run discovery and write the clause file.
pub async fn run_discover(config: &Config, dataset: Option<&Path>, dry_run: bool) -> Result<()> {
    let dataset = dataset.unwrap_or(config.discovery.dataset.as_path());
    let files = corpus_files(dataset)?;
    let corpus = read_corpus(&files);
    if corpus.documents.is_empty() {
        bail!("No readable documents in {}", dataset.display());
    }

    let embedder = create_provider(&config.embedding)?;
    let generator = create_generator(&config.generation)?;
    let settings = DiscoverySettings::from_config(config)?;

    let report = discover_reference_clauses(
        embedder.as_ref(),
        &config.embedding,
        generator.as_ref(),
        &corpus.documents,
        &settings,
    )
    .await?;

    println!(
        "discover {}{}",
        dataset.display(),
        if dry_run { " (dry-run)" } else { "" }
    );
    println!("  documents: {}", report.documents);
    println!("  skipped: {}", corpus.skipped.len());
    for path in &corpus.skipped {
        println!("    - {}", path.display());
    }
    println!("  candidates: {}", report.candidates);
    println!("  combinations tried: {}", report.trials.len());
    match &report.params {
        Some(p) => println!(
            "  selected: similarity={:.2} coverage>={:.2} min_size={}",
            p.similarity_threshold, p.coverage_threshold, p.min_cluster_size
        ),
        None => println!("  selected: none (no cluster met the size and coverage filters)"),
    }
    println!("  clauses: {}", report.clauses.len());
    for clause in &report.clauses {
        println!("    - {}", clause.name);
    }

    if dry_run {
        println!("ok");
        return Ok(());
    }

    let output = config.discovery_output();
    if let Some(backup) = save_clause_file(output, &report.clauses)? {
        println!("  backup: {}", backup.display());
    }
    println!("  written: {}", output.display());
    if report.is_degraded() {
        println!("  note: wrote an empty clause set; consider lowering the thresholds or adding documents");
    }
    println!("ok");
    Ok(())
}
