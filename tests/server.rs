//! HTTP API end to end, with in-process fake providers.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use clauselens::config::Config;
use clauselens::embedding::EmbeddingService;
use clauselens::generation::TextGenerator;
use clauselens::retry::ServiceError;
use clauselens::server::{router, AppState};
use clauselens::session::Engine;
use clauselens_core::embedding::Embedding;
use clauselens_core::reference::{ReferenceClause, ReferenceSet};

/// "rent" → x, "deposit" → y, anything else → z.
struct Keywords;

fn keyword_vector(text: &str) -> Embedding {
    let t = text.to_lowercase();
    if t.contains("rent") {
        vec![1.0, 0.0, 0.0]
    } else if t.contains("deposit") {
        vec![0.0, 1.0, 0.0]
    } else {
        vec![0.0, 0.0, 1.0]
    }
}

#[async_trait]
impl EmbeddingService for Keywords {
    fn model_name(&self) -> &str {
        "keywords"
    }
    fn dims(&self) -> usize {
        3
    }
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, ServiceError> {
        Ok(texts.iter().map(|t| keyword_vector(t)).collect())
    }
}

/// Answers every prompt with a fixed string.
struct Fixed(Vec<String>);

#[async_trait]
impl TextGenerator for Fixed {
    fn models(&self) -> &[String] {
        &self.0
    }
    async fn generate(&self, _model: &str, _prompt: &str) -> Result<String, ServiceError> {
        Ok("Rent is due on the 5th.".to_string())
    }
}

fn references() -> ReferenceSet {
    ReferenceSet::new(vec![
        ReferenceClause {
            name: "Payment of Rent".into(),
            text: "rent".into(),
            embedding: keyword_vector("rent"),
        },
        ReferenceClause {
            name: "Security Deposit".into(),
            text: "deposit".into(),
            embedding: keyword_vector("deposit"),
        },
    ])
    .unwrap()
}

fn test_config() -> Config {
    let mut config = Config::default();
    config.chunking.size = 5;
    config
}

async fn spawn(references: ReferenceSet) -> String {
    spawn_with(test_config(), references).await
}

async fn spawn_with(config: Config, references: ReferenceSet) -> String {
    let engine = Engine::new(
        config,
        Arc::new(Keywords),
        Arc::new(Fixed(vec!["m".into()])),
        references,
    );
    let app = router(AppState::new(Arc::new(engine)));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[tokio::test]
async fn test_health_reports_clause_count() {
    let base = spawn(references()).await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert!(body.get("reason").is_none());
    assert_eq!(body["reference_clauses"], 2);
    assert_eq!(body["sessions"], 0);
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn test_health_degraded_without_clauses() {
    let base = spawn(ReferenceSet::empty()).await;
    let body: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "degraded");
    assert_eq!(body["reason"], "no reference clauses loaded");
}

#[tokio::test]
async fn test_process_then_chat() {
    let base = spawn(references()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/process-document", base))
        .json(&json!({"text": "The tenant pays the rent monthly to the owner."}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let report: Value = resp.json().await.unwrap();
    assert_eq!(report["total_chunks"], 2);
    assert_eq!(report["is_suspicious"], true);
    assert_eq!(report["missing_clauses"], json!(["Security Deposit"]));
    assert!(report["summary"]
        .as_str()
        .unwrap()
        .starts_with("Rent is due on the 5th."));
    let session_id = report["session_id"].as_str().unwrap().to_string();

    let resp = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"session_id": session_id, "query": "When is rent due?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let answer: Value = resp.json().await.unwrap();
    assert!(answer["answer"]
        .as_str()
        .unwrap()
        .starts_with("Rent is due on the 5th.\n\n"));
    assert_eq!(answer["fragments"][0]["text"], "The tenant pays the rent");
}

#[tokio::test]
async fn test_second_document_appends_to_session() {
    let base = spawn(references()).await;
    let client = reqwest::Client::new();

    let first: Value = client
        .post(format!("{}/api/process-document", base))
        .json(&json!({"text": "rent is due", "summarize": false}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(first["summary"].is_null());
    let id = first["session_id"].as_str().unwrap();

    let second: Value = client
        .post(format!("{}/api/process-document", base))
        .json(&json!({"text": "deposit is held", "session_id": id, "summarize": false}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(second["session_id"], id);
    assert_eq!(second["missing_clauses"], json!(["Payment of Rent"]));

    let health: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["sessions"], 1);
}

#[tokio::test]
async fn test_error_envelopes() {
    let base = spawn(references()).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"session_id": "missing", "query": "rent?"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "not_found");

    let resp = client
        .post(format!("{}/api/chat", base))
        .json(&json!({"session_id": "missing", "query": "   "}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    let resp = client
        .post(format!("{}/api/process-document", base))
        .json(&json!({"text": ""}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

async fn open_session(client: &reqwest::Client, base: &str, text: &str) -> String {
    let body: Value = client
        .post(format!("{}/api/process-document", base))
        .json(&json!({"text": text, "summarize": false}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["session_id"].as_str().unwrap().to_string()
}

async fn chat_status(client: &reqwest::Client, base: &str, session_id: &str) -> u16 {
    client
        .post(format!("{}/api/chat", base))
        .json(&json!({"session_id": session_id, "query": "rent?"}))
        .send()
        .await
        .unwrap()
        .status()
        .as_u16()
}

#[tokio::test]
async fn test_deleted_session_is_gone() {
    let base = spawn(references()).await;
    let client = reqwest::Client::new();
    let id = open_session(&client, &base, "rent is due").await;
    assert_eq!(chat_status(&client, &base, &id).await, 200);

    let resp = client
        .delete(format!("{}/api/session/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(chat_status(&client, &base, &id).await, 404);

    let resp = client
        .delete(format!("{}/api/session/{}", base, id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn test_oldest_session_evicted_at_capacity() {
    let mut config = test_config();
    config.server.max_sessions = 2;
    let base = spawn_with(config, references()).await;
    let client = reqwest::Client::new();

    let first = open_session(&client, &base, "rent is due").await;
    let second = open_session(&client, &base, "deposit is held").await;
    let third = open_session(&client, &base, "rent and deposit").await;

    assert_eq!(chat_status(&client, &base, &first).await, 404);
    assert_eq!(chat_status(&client, &base, &second).await, 200);
    assert_eq!(chat_status(&client, &base, &third).await, 200);

    let health: Value = reqwest::get(format!("{}/health", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["sessions"], 2);
}
