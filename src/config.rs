//! Typed configuration loaded from a TOML file.
//!
//! Every section is optional; missing keys fall back to the defaults
//! defined next to each struct. [`load_config`] validates the parsed file
//! once so the rest of the application can trust the values.
//!
//! ```toml
//! [chunking]
//! size = 200
//!
//! [coverage]
//! threshold = 0.65
//!
//! [embedding]
//! provider = "openai"
//! model = "text-embedding-3-small"
//! dims = 1536
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

use clauselens_core::tune::{DiscoveryParams, SearchGrid, TargetRange};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub coverage: CoverageConfig,
    #[serde(default)]
    pub clauses: ClausesConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    /// Words per fragment.
    #[serde(default = "default_chunk_size")]
    pub size: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            size: default_chunk_size(),
        }
    }
}

fn default_chunk_size() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// Context passed to the generator is cut at this many characters.
    #[serde(default = "default_max_context_chars")]
    pub max_context_chars: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            max_context_chars: default_max_context_chars(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_max_context_chars() -> usize {
    8000
}

#[derive(Debug, Deserialize, Clone)]
pub struct CoverageConfig {
    #[serde(default = "default_coverage_threshold")]
    pub threshold: f32,
    /// Missing clause names listed in the suspicion note before `+N more`.
    #[serde(default = "default_display_limit")]
    pub display_limit: usize,
}

impl Default for CoverageConfig {
    fn default() -> Self {
        Self {
            threshold: default_coverage_threshold(),
            display_limit: default_display_limit(),
        }
    }
}

fn default_coverage_threshold() -> f32 {
    0.65
}
fn default_display_limit() -> usize {
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct ClausesConfig {
    #[serde(default = "default_clauses_path")]
    pub path: PathBuf,
}

impl Default for ClausesConfig {
    fn default() -> Self {
        Self {
            path: default_clauses_path(),
        }
    }
}

fn default_clauses_path() -> PathBuf {
    PathBuf::from("config/clauses.toml")
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (OpenAI-compatible or Ollama server).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            dims: None,
            url: None,
            api_key_env: default_api_key_env(),
            batch_size: default_batch_size(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_provider() -> String {
    "disabled".to_string()
}
fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_max_retries() -> u32 {
    5
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_backoff_base_ms() -> u64 {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Tried in order until one answers.
    #[serde(default = "default_generation_models")]
    pub models: Vec<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_generation_retries")]
    pub max_retries: u32,
    #[serde(default = "default_generation_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            models: default_generation_models(),
            url: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            max_retries: default_generation_retries(),
            timeout_secs: default_generation_timeout_secs(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl GenerationConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

fn default_generation_models() -> Vec<String> {
    vec!["gpt-4o-mini".to_string()]
}
fn default_temperature() -> f32 {
    0.2
}
fn default_generation_retries() -> u32 {
    2
}
fn default_generation_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    /// Directory of sample agreements.
    #[serde(default = "default_dataset")]
    pub dataset: PathBuf,
    /// Where the discovered clause file is written; defaults to `[clauses].path`.
    #[serde(default)]
    pub output: Option<PathBuf>,
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
    #[serde(default = "default_min_cluster_size")]
    pub min_cluster_size: usize,
    #[serde(default = "default_discovery_coverage")]
    pub coverage_threshold: f64,
    #[serde(default = "default_target_min")]
    pub target_min: usize,
    #[serde(default = "default_target_max")]
    pub target_max: usize,
    /// Paragraphs with this many characters or fewer are skipped.
    #[serde(default = "default_min_paragraph_chars")]
    pub min_paragraph_chars: usize,
    #[serde(default = "default_similarity_candidates")]
    pub similarity_candidates: Vec<f64>,
    #[serde(default = "default_coverage_candidates")]
    pub coverage_candidates: Vec<f64>,
    #[serde(default = "default_min_size_candidates")]
    pub min_size_candidates: Vec<usize>,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            dataset: default_dataset(),
            output: None,
            similarity_threshold: default_similarity_threshold(),
            min_cluster_size: default_min_cluster_size(),
            coverage_threshold: default_discovery_coverage(),
            target_min: default_target_min(),
            target_max: default_target_max(),
            min_paragraph_chars: default_min_paragraph_chars(),
            similarity_candidates: default_similarity_candidates(),
            coverage_candidates: default_coverage_candidates(),
            min_size_candidates: default_min_size_candidates(),
        }
    }
}

impl DiscoveryConfig {
    pub fn base_params(&self) -> DiscoveryParams {
        DiscoveryParams {
            similarity_threshold: self.similarity_threshold,
            coverage_threshold: self.coverage_threshold,
            min_cluster_size: self.min_cluster_size,
        }
    }

    /// Search grid with the configured base values tried first.
    pub fn grid(&self) -> SearchGrid {
        SearchGrid::with_base(
            self.base_params(),
            &self.similarity_candidates,
            &self.coverage_candidates,
            &self.min_size_candidates,
        )
    }

    pub fn target(&self) -> Result<TargetRange> {
        Ok(TargetRange::new(self.target_min, self.target_max)?)
    }
}

fn default_dataset() -> PathBuf {
    PathBuf::from("dataset")
}
fn default_similarity_threshold() -> f64 {
    0.50
}
fn default_min_cluster_size() -> usize {
    5
}
fn default_discovery_coverage() -> f64 {
    0.65
}
fn default_target_min() -> usize {
    10
}
fn default_target_max() -> usize {
    15
}
fn default_min_paragraph_chars() -> usize {
    20
}
fn default_similarity_candidates() -> Vec<f64> {
    vec![0.55, 0.50, 0.60, 0.45]
}
fn default_coverage_candidates() -> Vec<f64> {
    vec![0.60, 0.55, 0.50, 0.45, 0.40]
}
fn default_min_size_candidates() -> Vec<usize> {
    vec![6, 5, 4, 3]
}

#[derive(Debug, Deserialize, Clone)]
pub struct PromptsConfig {
    /// `{context}` is replaced with the document excerpts.
    #[serde(default = "default_summary_template")]
    pub summary_template: String,
    /// `{question}` and `{context}` placeholders.
    #[serde(default = "default_qa_template")]
    pub qa_template: String,
    /// Appended to every generated summary and answer.
    #[serde(default = "default_disclaimer")]
    pub disclaimer: String,
    /// `{clause}` is replaced with the representative clause text.
    #[serde(default = "default_naming_template")]
    pub naming_template: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            summary_template: default_summary_template(),
            qa_template: default_qa_template(),
            disclaimer: default_disclaimer(),
            naming_template: default_naming_template(),
        }
    }
}

fn default_summary_template() -> String {
    concat!(
        "You are a meticulous legal analyst tasked with demystifying a rental agreement. ",
        "Work ONLY with the provided document excerpts. Do not invent facts or rely on outside knowledge.\n\n",
        "Goals:\n",
        "- Produce a clear, plain-language summary suitable for a non-lawyer.\n",
        "- Extract concrete facts (names, dates, amounts, addresses) exactly as written.\n",
        "- Highlight obligations of each party, fees/penalties, and key risks.\n",
        "- Note any sections that are not specified in the excerpts.\n\n",
        "Output format (use short bullets, keep it crisp):\n",
        "- Title: Plain-language Summary\n",
        "- Parties & Property: ...\n",
        "- Financial Terms (amounts, frequency, due dates, deposits): ...\n",
        "- Term & Termination (start/end, notice, renewal): ...\n",
        "- Obligations (landlord vs tenant): ...\n",
        "- Restrictions/Usage rules: ...\n",
        "- Maintenance/Repairs: ...\n",
        "- Penalties/Liability/Indemnity: ...\n",
        "- Notices & Jurisdiction: ...\n",
        "- Other Material Terms: ...\n",
        "- Unknown/Not specified: bullet list of important items that are missing from the excerpts.\n\n",
        "Guidelines:\n",
        "- Quote numbers/dates/amounts exactly as they appear.\n",
        "- If a field is missing in the excerpts, write: Not specified in excerpts.\n\n",
        "Document Excerpts:\n{context}"
    )
    .to_string()
}

fn default_qa_template() -> String {
    concat!(
        "You are an expert legal assistant. Answer the user's question strictly and ONLY from the provided document excerpts.\n",
        "If the answer is not present in the text, reply exactly: \"I cannot answer this question based on the document.\"\n\n",
        "Instructions:\n",
        "- Be concise and precise; quote exact amounts/dates/names when relevant.\n",
        "- If only partial information is available, state what is known and note what is not specified in the excerpts.\n",
        "- Do not speculate or use outside knowledge.\n\n",
        "User question: {question}\n\n",
        "Document excerpts:\n{context}"
    )
    .to_string()
}

fn default_disclaimer() -> String {
    "The information provided is for informational purposes only. All responses are AI-generated and may be inaccurate."
        .to_string()
}

fn default_naming_template() -> String {
    concat!(
        "You are an expert legal analyst. Read the following legal clause and provide a short, 2-4 word descriptive title for it.\n",
        "For example, if the clause is \"Tenant shall pay Landlord a monthly rent...\", the title should be \"Rent Payment\".\n\n",
        "Clause: \"{clause}\"\n\n",
        "Title:"
    )
    .to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Open sessions kept at once; the least recently used is evicted first.
    #[serde(default = "default_max_sessions")]
    pub max_sessions: usize,
    /// Sessions idle for longer than this are dropped.
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_sessions: default_max_sessions(),
            session_ttl_secs: default_session_ttl_secs(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_max_sessions() -> usize {
    64
}

fn default_session_ttl_secs() -> u64 {
    3600
}

impl Config {
    /// Path the discovery run writes to.
    pub fn discovery_output(&self) -> &Path {
        self.discovery
            .output
            .as_deref()
            .unwrap_or(self.clauses.path.as_path())
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Check value ranges and cross-field requirements.
pub fn validate(config: &Config) -> Result<()> {
    if config.chunking.size == 0 {
        anyhow::bail!("chunking.size must be > 0");
    }

    if config.retrieval.top_k == 0 {
        anyhow::bail!("retrieval.top_k must be >= 1");
    }
    if config.retrieval.max_context_chars == 0 {
        anyhow::bail!("retrieval.max_context_chars must be > 0");
    }

    if !(0.0..=1.0).contains(&config.coverage.threshold) {
        anyhow::bail!("coverage.threshold must be in [0.0, 1.0]");
    }

    // Validate embedding
    if config.embedding.is_enabled() && config.embedding.provider != "local" {
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            anyhow::bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.model.is_none() {
            anyhow::bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        anyhow::bail!("embedding.batch_size must be > 0");
    }

    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }

    // Validate generation
    match config.generation.provider.as_str() {
        "disabled" | "openai" | "ollama" => {}
        other => anyhow::bail!(
            "Unknown generation provider: '{}'. Must be disabled, openai, or ollama.",
            other
        ),
    }
    if config.generation.is_enabled() && config.generation.models.is_empty() {
        anyhow::bail!(
            "generation.models must list at least one model when provider is '{}'",
            config.generation.provider
        );
    }

    // Validate discovery
    let d = &config.discovery;
    if d.target_min > d.target_max {
        anyhow::bail!(
            "discovery.target_min ({}) must be <= discovery.target_max ({})",
            d.target_min,
            d.target_max
        );
    }
    for (name, value) in [
        ("discovery.similarity_threshold", d.similarity_threshold),
        ("discovery.coverage_threshold", d.coverage_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            anyhow::bail!("{} must be in [0.0, 1.0]", name);
        }
    }
    if d.similarity_candidates
        .iter()
        .chain(d.coverage_candidates.iter())
        .any(|v| !(0.0..=1.0).contains(v))
    {
        anyhow::bail!("discovery candidate thresholds must be in [0.0, 1.0]");
    }
    if d.min_cluster_size == 0 || d.min_size_candidates.contains(&0) {
        anyhow::bail!("discovery cluster sizes must be > 0");
    }

    if config.server.max_sessions == 0 {
        anyhow::bail!("server.max_sessions must be > 0");
    }
    if config.server.session_ttl_secs == 0 {
        anyhow::bail!("server.session_ttl_secs must be > 0");
    }

    if !config.prompts.qa_template.contains("{question}") {
        tracing::warn!("prompts.qa_template has no {{question}} placeholder");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_text: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_text)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.chunking.size, 200);
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.retrieval.max_context_chars, 8000);
        assert!((config.coverage.threshold - 0.65).abs() < 1e-6);
        assert_eq!(config.coverage.display_limit, 5);
        assert_eq!(config.embedding.provider, "disabled");
        assert_eq!(config.embedding.batch_size, 64);
        assert_eq!(config.discovery.target_min, 10);
        assert_eq!(config.discovery.target_max, 15);
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert_eq!(config.server.max_sessions, 64);
        assert_eq!(config.server.session_ttl_secs, 3600);
        assert_eq!(config.discovery_output(), Path::new("config/clauses.toml"));
    }

    #[test]
    fn test_grid_starts_with_base() {
        let config = parse("").unwrap();
        let grid = config.discovery.grid();
        assert_eq!(grid.similarity, vec![0.50, 0.55, 0.60, 0.45]);
        assert_eq!(grid.coverage, vec![0.65, 0.60, 0.55, 0.50, 0.45, 0.40]);
        assert_eq!(grid.min_size, vec![5, 6, 4, 3]);
    }

    #[test]
    fn test_zero_chunk_size_rejected() {
        let err = parse("[chunking]\nsize = 0\n").unwrap_err();
        assert!(err.to_string().contains("chunking.size"));
    }

    #[test]
    fn test_threshold_range() {
        assert!(parse("[coverage]\nthreshold = 1.5\n").is_err());
        assert!(parse("[coverage]\nthreshold = 0.0\n").is_ok());
    }

    #[test]
    fn test_enabled_embedding_requires_model_and_dims() {
        let err = parse("[embedding]\nprovider = \"openai\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.dims"));

        let err = parse("[embedding]\nprovider = \"openai\"\ndims = 8\n").unwrap_err();
        assert!(err.to_string().contains("embedding.model"));

        let ok = parse("[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n");
        assert!(ok.is_ok());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = parse("[embedding]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown embedding provider"));

        let err = parse("[generation]\nprovider = \"magic\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown generation provider"));
    }

    #[test]
    fn test_inverted_target_rejected() {
        let err = parse("[discovery]\ntarget_min = 20\ntarget_max = 10\n").unwrap_err();
        assert!(err.to_string().contains("target_min"));
    }

    #[test]
    fn test_session_limits_must_be_positive() {
        let err = parse("[server]\nmax_sessions = 0\n").unwrap_err();
        assert!(err.to_string().contains("server.max_sessions"));
        let err = parse("[server]\nsession_ttl_secs = 0\n").unwrap_err();
        assert!(err.to_string().contains("server.session_ttl_secs"));
    }

    #[test]
    fn test_discovery_output_override() {
        let config = parse("[discovery]\noutput = \"out/clauses.toml\"\n").unwrap();
        assert_eq!(config.discovery_output(), Path::new("out/clauses.toml"));
    }
}
