//! Discovery → clause file → processing → store dump → answers, with fakes.

use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use clauselens::clauses::{embed_reference_clauses, load_clause_file, save_clause_file};
use clauselens::config::{Config, EmbeddingConfig};
use clauselens::discover::{
    corpus_files, discover_reference_clauses, read_corpus, DiscoverySettings,
};
use clauselens::embedding::EmbeddingService;
use clauselens::generation::TextGenerator;
use clauselens::persist::{load_store, save_store};
use clauselens::retry::ServiceError;
use clauselens::session::{Engine, ProcessOptions, Session};
use clauselens_core::embedding::Embedding;

const TOPICS: [&str; 4] = ["rent", "deposit", "notice", "pets"];

/// One axis per topic keyword, with a small shared component.
struct TopicEmbedder;

fn topic_vector(text: &str) -> Embedding {
    let t = text.to_lowercase();
    let mut v = vec![0.05; TOPICS.len() + 1];
    match TOPICS.iter().position(|k| t.contains(k)) {
        Some(i) => v[i] = 1.0,
        None => v[TOPICS.len()] = 1.0,
    }
    v
}

#[async_trait]
impl EmbeddingService for TopicEmbedder {
    fn model_name(&self) -> &str {
        "topics"
    }
    fn dims(&self) -> usize {
        TOPICS.len() + 1
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, ServiceError> {
        Ok(texts.iter().map(|t| topic_vector(t)).collect())
    }
}

/// Titles clauses by their topic keyword; answers questions with a fixed line.
struct TopicNamer(Vec<String>);

#[async_trait]
impl TextGenerator for TopicNamer {
    fn models(&self) -> &[String] {
        &self.0
    }
    async fn generate(&self, _model: &str, prompt: &str) -> Result<String, ServiceError> {
        if let Some(start) = prompt.find("Clause: \"") {
            let clause = prompt[start + 9..]
                .split('"')
                .next()
                .unwrap_or("")
                .to_lowercase();
            let title = match TOPICS.iter().find(|k| clause.contains(*k)) {
                Some(&"rent") => "Payment of Rent",
                Some(&"deposit") => "Security Deposit",
                Some(&"notice") => "Termination by Notice",
                _ => "",
            };
            return Ok(title.to_string());
        }
        Ok("Answer from excerpts.".to_string())
    }
}

fn write_corpus(dir: &std::path::Path) {
    std::fs::create_dir_all(dir).unwrap();
    for i in 0..5 {
        let mut lines = vec![
            format!("The lessee shall pay the monthly rent of {} rupees on the 5th", 9000 + i),
            format!("A refundable deposit of {} rupees is held by the owner", 40000 + i),
            "Either party may end this agreement by giving three months notice".to_string(),
        ];
        if i == 0 {
            lines.push("No pets are allowed anywhere on the premises at all".to_string());
        }
        std::fs::write(dir.join(format!("lease-{}.txt", i)), lines.join("\n")).unwrap();
    }
}

#[tokio::test]
async fn test_discovered_clauses_drive_coverage_and_answers() {
    let tmp = TempDir::new().unwrap();
    let dataset = tmp.path().join("dataset");
    write_corpus(&dataset);

    let mut config = Config::default();
    config.chunking.size = 12;
    config.discovery.target_min = 2;
    config.discovery.target_max = 4;
    config.embedding.backoff_base_ms = 1;

    let embedder = Arc::new(TopicEmbedder);
    let generator = Arc::new(TopicNamer(vec!["m".into()]));

    // Discovery
    let corpus = read_corpus(&corpus_files(&dataset).unwrap());
    assert!(corpus.skipped.is_empty());
    let corpus = corpus.documents;
    assert_eq!(corpus.len(), 5);
    let settings = DiscoverySettings::from_config(&config).unwrap();
    let report = discover_reference_clauses(
        embedder.as_ref(),
        &config.embedding,
        generator.as_ref(),
        &corpus,
        &settings,
    )
    .await
    .unwrap();
    assert!(!report.is_degraded());
    let names: Vec<&str> = report.clauses.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["Payment of Rent", "Security Deposit", "Termination by Notice"]
    );
    assert!(report.clauses.iter().all(|c| c.text.ends_with('.')));

    // Clause file round trip
    let clause_path = tmp.path().join("config/clauses.toml");
    save_clause_file(&clause_path, &report.clauses).unwrap();
    let entries = load_clause_file(&clause_path).unwrap();
    assert_eq!(entries, report.clauses);

    let references = embed_reference_clauses(embedder.as_ref(), &EmbeddingConfig::default(), &entries)
        .await
        .unwrap();
    assert_eq!(references.len(), 3);

    // Processing an agreement without a notice clause
    let engine = Engine::new(config, embedder.clone(), generator.clone(), references);
    let mut session = Session::new();
    let report = engine
        .process_document(
            &mut session,
            "The tenant pays rent of 12000 on the first day of each month. \
             A deposit of 50000 is refundable when the tenancy ends.",
            ProcessOptions::default(),
        )
        .await
        .unwrap();
    assert_eq!(report.missing_clauses, vec!["Termination by Notice"]);
    assert!(report.is_suspicious);

    // Dump, reload, and answer from the reloaded store
    let store = tmp.path().join("store");
    save_store(&store, session.index()).unwrap();
    let reloaded = Session::from_index(load_store(&store).unwrap());

    let live = engine.answer(&session, "How much is the deposit?").await.unwrap();
    let restored = engine.answer(&reloaded, "How much is the deposit?").await.unwrap();
    assert_eq!(live.answer, restored.answer);
    assert!(live.answer.starts_with("Answer from excerpts."));
    let live_texts: Vec<&str> = live.fragments.iter().map(|f| f.text.as_str()).collect();
    let restored_texts: Vec<&str> = restored.fragments.iter().map(|f| f.text.as_str()).collect();
    assert_eq!(live_texts, restored_texts);
    assert!(live_texts[0].contains("deposit"));
}
