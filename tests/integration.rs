use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docmgr_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_docmgr-index"))
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let ticket = root.join("ttmp/2025/12/12/MEN-1--payments");
    fs::create_dir_all(&ticket).unwrap();
    fs::write(
        ticket.join("index.md"),
        "---\nTitle: Payments\nTicket: MEN-1\nDocType: index\nTopics: [backend]\nRelatedFiles:\n  - Path: backend/main.go\n    Note: entrypoint\n---\n# Payments\n",
    )
    .unwrap();
    fs::write(
        ticket.join("tasks.md"),
        "---\nTitle: Tasks\nTicket: MEN-1\nDocType: tasks\n---\n",
    )
    .unwrap();
    fs::write(
        ticket.join("broken.md"),
        "---\nTitle: Broken\nTopics: [a\n---\n",
    )
    .unwrap();

    let config_content = r#"[workspace]
root = "ttmp"
config_dir = "."
repo_root = "."

[index]
include_body = false
exclude_globs = []

[vocabulary]
topics = ["backend", "frontend"]
"#;
    let config_path = root.join("docmgr.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_docmgr(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docmgr_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("DOCMGR_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docmgr-index at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_index_reports_counts() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_docmgr(&config, &["index"]);
    assert!(ok, "index failed: {}", stderr);
    assert!(stdout.contains("docs:           3"), "stdout: {}", stdout);
    assert!(stdout.contains("parse failures: 1"), "stdout: {}", stdout);
    assert!(stdout.contains("related files:  1"), "stdout: {}", stdout);
}

#[test]
fn test_index_json_diagnostics() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_docmgr(&config, &["index", "--json"]);
    assert!(ok, "index failed: {}", stderr);
    let diags: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let symptoms: Vec<&str> = diags
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["symptom"].as_str())
        .collect();
    assert!(symptoms.contains(&"yaml_syntax"), "{:?}", symptoms);
    assert!(symptoms.contains(&"missing_file"), "{:?}", symptoms);
}

#[test]
fn test_query_by_related_file() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_docmgr(&config, &["query", "--file", "main.go"]);
    assert!(ok, "query failed: {}", stderr);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let docs = result["docs"].as_array().unwrap();
    assert_eq!(docs.len(), 1);
    assert!(docs[0]["path"].as_str().unwrap().ends_with("index.md"));
    assert_eq!(
        docs[0]["document"]["RelatedFiles"][0]["Path"],
        "backend/main.go"
    );
}

#[test]
fn test_query_ticket_scope_with_control_docs() {
    let (_tmp, config) = setup_test_env();
    let (stdout, _, ok) = run_docmgr(&config, &["query", "--scope-ticket", "MEN-1"]);
    assert!(ok);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["docs"].as_array().unwrap().len(), 1);

    let (stdout, _, ok) = run_docmgr(
        &config,
        &["query", "--scope-ticket", "MEN-1", "--include-control-docs"],
    );
    assert!(ok);
    let result: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(result["docs"].as_array().unwrap().len(), 2);
}

#[test]
fn test_contradictory_query_fails() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, ok) = run_docmgr(
        &config,
        &["query", "--scope-ticket", "MEN-1", "--ticket", "MEN-2"],
    );
    assert!(!ok);
    assert!(stderr.contains("contradicts"), "stderr: {}", stderr);
}

#[test]
fn test_invalid_order_by_rejected() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, ok) = run_docmgr(&config, &["query", "--order-by", "size"]);
    assert!(!ok);
    assert!(stderr.contains("size"), "stderr: {}", stderr);
}

#[test]
fn test_stats_json() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_docmgr(&config, &["stats", "--json"]);
    assert!(ok, "stats failed: {}", stderr);
    let stats: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(stats["docs"], 3);
    assert_eq!(stats["parse_failures"], 1);
    assert_eq!(stats["doc_topics"], 1);
}

#[test]
fn test_check_and_rewrite() {
    let (tmp, config) = setup_test_env();
    let index = tmp
        .path()
        .join("ttmp/2025/12/12/MEN-1--payments/index.md");
    let broken = tmp
        .path()
        .join("ttmp/2025/12/12/MEN-1--payments/broken.md");

    let (stdout, _, ok) = run_docmgr(&config, &["check", index.to_str().unwrap()]);
    assert!(ok);
    assert!(stdout.starts_with("ok "));

    let (_, _, ok) = run_docmgr(&config, &["check", broken.to_str().unwrap()]);
    assert!(!ok);

    let (_, stderr, ok) = run_docmgr(&config, &["rewrite", index.to_str().unwrap()]);
    assert!(ok, "rewrite failed: {}", stderr);
    let content = fs::read_to_string(&index).unwrap();
    assert!(content.starts_with("---\nTitle: Payments\n"));
    assert!(content.contains("- Path: backend/main.go\n"));
    assert!(content.contains("Note: entrypoint\n"));
    assert!(content.ends_with("---\n\n# Payments\n"));
}

#[test]
fn test_missing_workspace_arguments() {
    let output = Command::new(docmgr_binary())
        .args(["stats"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--root"), "stderr: {}", stderr);
}
