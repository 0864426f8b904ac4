//! Document sessions: processing, summaries, and grounded answers.
//!
//! An [`Engine`] holds what every session shares: configuration, the
//! embedding and generation providers, and the reference clause set
//! computed once at startup. A [`Session`] owns one [`VectorIndex`], so
//! fragments from different callers never mix and each index has a single
//! writer.
//!
//! # Processing pipeline
//!
//! ```text
//! text → chunk → embed → coverage check → append to index → summary
//! ```
//!
//! The coverage check is skipped, with the reason recorded in the report,
//! when no reference clauses are loaded.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Serialize;

use clauselens_core::chunk::chunk_words;
use clauselens_core::coverage::find_missing;
use clauselens_core::index::{SearchHit, VectorIndex};
use clauselens_core::reference::ReferenceSet;
use clauselens_core::CoreError;

use crate::clauses::{embed_reference_clauses, load_clause_file};
use crate::config::Config;
use crate::embedding::{create_provider, embed_query, embed_texts, EmbeddingService};
use crate::generation::{create_generator, generate_best_effort, TextGenerator};
use crate::prompts::{
    build_context, fallback_summary, render_template, suspicion_note, with_disclaimer, NO_ANSWER,
    NOTHING_INDEXED, NOTHING_RELEVANT,
};
use crate::retry::RetryPolicy;

/// Per-call switches for [`Engine::process_document`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessOptions {
    pub summarize: bool,
}

/// Outcome of processing one document.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub total_chunks: usize,
    /// Missing reference clause names, in reference order.
    pub missing_clauses: Vec<String>,
    pub is_suspicious: bool,
    pub suspicion_note: Option<String>,
    /// Why the coverage check did not run, if it did not.
    pub coverage_skipped: Option<String>,
    pub summary: Option<String>,
    /// Wall-clock seconds, rounded to two decimals.
    pub processing_time_secs: f64,
}

/// A retrieved fragment backing an answer.
#[derive(Debug, Clone, Serialize)]
pub struct SourceFragment {
    pub position: usize,
    pub score: f32,
    pub text: String,
}

impl From<SearchHit> for SourceFragment {
    fn from(hit: SearchHit) -> Self {
        Self {
            position: hit.position,
            score: hit.score,
            text: hit.text,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub answer: String,
    pub fragments: Vec<SourceFragment>,
}

/// One caller's indexed documents.
#[derive(Debug, Default)]
pub struct Session {
    index: VectorIndex,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from a reloaded index.
    pub fn from_index(index: VectorIndex) -> Self {
        Self { index }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

/// Shared, read-only processing state.
pub struct Engine {
    config: Config,
    embedder: Arc<dyn EmbeddingService>,
    generator: Arc<dyn TextGenerator>,
    references: ReferenceSet,
    /// Set when startup could not build the reference set.
    degraded: Option<String>,
}

impl Engine {
    pub fn new(
        config: Config,
        embedder: Arc<dyn EmbeddingService>,
        generator: Arc<dyn TextGenerator>,
        references: ReferenceSet,
    ) -> Self {
        Self {
            config,
            embedder,
            generator,
            references,
            degraded: None,
        }
    }

    /// Build providers from `config` and embed the reference clause file.
    ///
    /// A missing clause file or a failed embedding run leaves the engine
    /// running with an empty reference set; see [`Engine::degraded`].
    pub async fn start(config: Config) -> Result<Self> {
        let Self {
            config,
            embedder,
            generator,
            ..
        } = Self::connect(config)?;
        let entries = load_clause_file(&config.clauses.path)?;

        let (references, degraded) = if entries.is_empty() {
            (
                ReferenceSet::empty(),
                Some(format!(
                    "no reference clauses in {}",
                    config.clauses.path.display()
                )),
            )
        } else if !config.embedding.is_enabled() {
            tracing::warn!("embedding provider is disabled; reference clauses not embedded");
            (
                ReferenceSet::empty(),
                Some("embedding provider is disabled".to_string()),
            )
        } else {
            match embed_reference_clauses(embedder.as_ref(), &config.embedding, &entries).await {
                Ok(set) => {
                    tracing::info!(clauses = set.len(), "reference clauses embedded");
                    (set, None)
                }
                Err(err) => {
                    tracing::warn!(error = %format!("{:#}", err), "starting without reference clauses");
                    (ReferenceSet::empty(), Some(format!("{:#}", err)))
                }
            }
        };

        Ok(Self {
            degraded,
            ..Self::new(config, embedder, generator, references)
        })
    }

    /// Build providers only. Coverage checks are skipped; use this when
    /// answering from a reloaded store.
    pub fn connect(config: Config) -> Result<Self> {
        let embedder = create_provider(&config.embedding)?;
        let generator = create_generator(&config.generation)?;
        Ok(Self::new(config, embedder, generator, ReferenceSet::empty()))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn embedder(&self) -> &dyn EmbeddingService {
        self.embedder.as_ref()
    }

    pub fn generator(&self) -> &dyn TextGenerator {
        self.generator.as_ref()
    }

    pub fn references(&self) -> &ReferenceSet {
        &self.references
    }

    /// Reason the reference set is empty, when startup fell back.
    pub fn degraded(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    fn generation_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.config.generation.max_retries,
            self.config.generation.backoff_base_ms,
        )
    }

    /// Chunk, embed, check coverage, and index one document.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidInput`] (via `anyhow`) when the text has no
    /// words; embedding failures after retries; dimension mismatches
    /// between the document and the session index or reference set.
    pub async fn process_document(
        &self,
        session: &mut Session,
        text: &str,
        options: ProcessOptions,
    ) -> Result<DocumentReport> {
        let started = Instant::now();

        let fragments = chunk_words(text, self.config.chunking.size)?;
        if fragments.is_empty() {
            return Err(CoreError::invalid("document contains no text").into());
        }

        let embeddings = embed_texts(self.embedder.as_ref(), &self.config.embedding, &fragments)
            .await
            .context("Failed to embed document fragments")?;

        let (missing_clauses, coverage_skipped) = if self.references.is_empty() {
            (Vec::new(), Some("no reference clauses loaded".to_string()))
        } else {
            let missing = find_missing(
                &embeddings,
                &self.references,
                self.config.coverage.threshold,
            )?;
            (missing, None)
        };
        let note = suspicion_note(&missing_clauses, self.config.coverage.display_limit);

        session.index.add(&embeddings, &fragments)?;
        tracing::info!(
            fragments = fragments.len(),
            indexed = session.index.len(),
            missing = missing_clauses.len(),
            "document processed"
        );

        let summary = if options.summarize {
            Some(self.summarize(&fragments).await)
        } else {
            None
        };

        let elapsed = started.elapsed().as_secs_f64();
        Ok(DocumentReport {
            total_chunks: fragments.len(),
            is_suspicious: !missing_clauses.is_empty(),
            missing_clauses,
            suspicion_note: note,
            coverage_skipped,
            summary,
            processing_time_secs: (elapsed * 100.0).round() / 100.0,
        })
    }

    /// Plain-language summary of `fragments`, always ending with the disclaimer.
    pub async fn summarize(&self, fragments: &[String]) -> String {
        let prompts = &self.config.prompts;
        let context = build_context(fragments, self.config.retrieval.max_context_chars);
        let prompt = render_template(&prompts.summary_template, &[("context", context.as_str())]);

        let body = match generate_best_effort(
            self.generator.as_ref(),
            &self.generation_policy(),
            &prompt,
        )
        .await
        {
            Some(text) => text,
            None => fallback_summary(&context),
        };
        with_disclaimer(&body, &prompts.disclaimer)
    }

    /// Answer `question` from the session's indexed fragments.
    ///
    /// # Errors
    ///
    /// [`CoreError::InvalidInput`] for a blank question; embedding failures
    /// after retries.
    pub async fn answer(&self, session: &Session, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(CoreError::invalid("question must not be empty").into());
        }
        if session.index.is_empty() {
            return Ok(Answer {
                answer: NOTHING_INDEXED.to_string(),
                fragments: Vec::new(),
            });
        }

        let query = embed_query(self.embedder.as_ref(), &self.config.embedding, question)
            .await
            .context("Failed to embed question")?;
        let hits = session
            .index
            .search_scored(&query, self.config.retrieval.top_k)?;
        if hits.is_empty() {
            return Ok(Answer {
                answer: NOTHING_RELEVANT.to_string(),
                fragments: Vec::new(),
            });
        }

        let prompts = &self.config.prompts;
        let texts: Vec<&str> = hits.iter().map(|h| h.text.as_str()).collect();
        let context = build_context(&texts, self.config.retrieval.max_context_chars);
        let prompt = render_template(
            &prompts.qa_template,
            &[("question", question), ("context", context.as_str())],
        );

        let body = generate_best_effort(self.generator.as_ref(), &self.generation_policy(), &prompt)
            .await
            .unwrap_or_else(|| NO_ANSWER.to_string());

        Ok(Answer {
            answer: with_disclaimer(&body, &prompts.disclaimer),
            fragments: hits.into_iter().map(SourceFragment::from).collect(),
        })
    }
}
