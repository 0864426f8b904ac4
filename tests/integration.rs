use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn lens_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("lens");
    path
}

fn setup_test_env(extra: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let files_dir = root.join("files");
    fs::create_dir_all(&files_dir).unwrap();
    fs::write(
        files_dir.join("lease.txt"),
        "The Tenant shall pay rent on the 5th of every month.\n\
         A security deposit of two months rent is payable on signing.",
    )
    .unwrap();

    fs::write(
        config_dir.join("clauses.toml"),
        r#"[[clause]]
name = "Payment of Rent"
text = "The lessee agrees to pay rent on or before the 5th of every month."

[[clause]]
name = "Termination by Notice"
text = "This agreement can be terminated by three months notice on either side."
"#,
    )
    .unwrap();

    let config_content = format!(
        r#"[chunking]
size = 10

[clauses]
path = "{root}/config/clauses.toml"

[discovery]
dataset = "{root}/dataset"

{extra}
"#,
        root = root.display(),
        extra = extra
    );

    let config_path = config_dir.join("lens.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_lens(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = lens_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run lens binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_help_lists_commands() {
    let output = Command::new(lens_binary()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for cmd in ["chunk", "process", "ask", "clauses", "discover", "serve"] {
        assert!(stdout.contains(cmd), "help is missing {}", cmd);
    }
}

#[test]
fn test_chunk_prints_fragments() {
    let (tmp, config) = setup_test_env("");
    let file = tmp.path().join("files/lease.txt");
    let (stdout, stderr, success) = run_lens(&config, &["chunk", file.to_str().unwrap()]);
    assert!(success, "chunk failed: {}", stderr);
    // 22 words at 10 words per fragment
    assert!(stdout.contains("fragments: 3"), "stdout: {}", stdout);
    assert!(stdout.contains("[0] (10 words)"));
    assert!(stdout.contains("[2] (2 words)"));
}

#[test]
fn test_chunk_size_override() {
    let (tmp, config) = setup_test_env("");
    let file = tmp.path().join("files/lease.txt");
    let (stdout, _, success) =
        run_lens(&config, &["chunk", file.to_str().unwrap(), "--size", "100"]);
    assert!(success);
    assert!(stdout.contains("fragments: 1"));
}

#[test]
fn test_chunk_zero_size_is_rejected() {
    let (tmp, config) = setup_test_env("");
    let file = tmp.path().join("files/lease.txt");
    let (_, stderr, success) =
        run_lens(&config, &["chunk", file.to_str().unwrap(), "--size", "0"]);
    assert!(!success);
    assert!(stderr.contains("chunk size must be > 0"), "stderr: {}", stderr);
}

#[test]
fn test_clauses_lists_file() {
    let (_tmp, config) = setup_test_env("");
    let (stdout, stderr, success) = run_lens(&config, &["clauses"]);
    assert!(success, "clauses failed: {}", stderr);
    assert!(stdout.contains("count: 2"));
    assert!(stdout.contains("- Payment of Rent: The lessee agrees"));
    assert!(stdout.contains("- Termination by Notice"));
}

#[test]
fn test_missing_config_fails() {
    let (_, stderr, success) = run_lens(Path::new("/nonexistent/lens.toml"), &["clauses"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_config_fails() {
    let (_tmp, config) = setup_test_env("[coverage]\nthreshold = 2.0\n");
    let (_, stderr, success) = run_lens(&config, &["clauses"]);
    assert!(!success);
    assert!(stderr.contains("coverage.threshold"), "stderr: {}", stderr);
}

#[test]
fn test_process_with_embeddings_disabled_fails() {
    let (tmp, config) = setup_test_env("");
    let file = tmp.path().join("files/lease.txt");
    let (_, stderr, success) = run_lens(&config, &["process", file.to_str().unwrap()]);
    assert!(!success);
    assert!(
        stderr.contains("Embedding provider is disabled"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_ask_without_store_fails() {
    let (tmp, config) = setup_test_env("");
    let store = tmp.path().join("store");
    let (_, stderr, success) = run_lens(
        &config,
        &["ask", "When is rent due?", "--store", store.to_str().unwrap()],
    );
    assert!(!success);
    assert!(stderr.contains("index.bin"), "stderr: {}", stderr);
}

#[test]
fn test_discover_missing_dataset_fails() {
    let (_tmp, config) = setup_test_env("");
    let (_, stderr, success) = run_lens(&config, &["discover", "--dry-run"]);
    assert!(!success);
    assert!(
        stderr.contains("Dataset directory not found"),
        "stderr: {}",
        stderr
    );
}

#[test]
fn test_discover_without_usable_sentences_writes_empty_set() {
    let (tmp, config) = setup_test_env("");
    let dataset = tmp.path().join("dataset");
    fs::create_dir_all(&dataset).unwrap();
    fs::write(dataset.join("a.txt"), "short\ntiny\n").unwrap();
    fs::write(dataset.join("b.txt"), "brief\n").unwrap();
    fs::write(dataset.join("c.docx"), "not a zip archive").unwrap();

    let (stdout, stderr, success) = run_lens(&config, &["discover"]);
    assert!(success, "discover failed: {}", stderr);
    assert!(stdout.contains("documents: 2"));
    assert!(stdout.contains("skipped: 1"), "stdout: {}", stdout);
    assert!(stdout.contains("c.docx"));
    assert!(stdout.contains("selected: none"));
    assert!(stdout.contains("backup: "));

    let (stdout, _, _) = run_lens(&config, &["clauses"]);
    assert!(stdout.contains("count: 0"));

    let backups: Vec<_> = fs::read_dir(tmp.path().join("config"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("clauses.backup."))
        .collect();
    assert_eq!(backups.len(), 1);
}
