//! Integration tests for the `prism` binary, driven by mock models.

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes a config file pointing the data directory into `temp_dir`.
fn write_config(temp_dir: &TempDir) -> PathBuf {
    let data_dir = temp_dir.path().join("data").display().to_string();
    let config = format!("models = [\"mock-a\", \"mock-b\"]\ndata_dir = {:?}\n", data_dir);
    let path = temp_dir.path().join("prism.toml");
    std::fs::write(&path, config).unwrap();
    path
}

fn prism(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("prism").unwrap();
    cmd.env("NO_COLOR", "1").arg("--config").arg(config);
    cmd
}

#[test]
fn test_help_lists_commands() {
    let mut cmd = Command::cargo_bin("prism").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("generate"))
        .stdout(predicate::str::contains("similar"))
        .stdout(predicate::str::contains("ingest"));
}

#[test]
fn test_generate_prints_reports_in_selection_order() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir);

    let assert = prism(&config).arg("generate").arg("Electric Vehicle Market").assert().success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout).to_string();

    let a = stdout.find("# Mock report from mock-a").expect("mock-a report missing");
    let b = stdout.find("# Mock report from mock-b").expect("mock-b report missing");
    assert!(a < b);
    assert!(stdout.contains("## Conclusion"));
}

#[test]
fn test_generate_json_keeps_failures() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir);

    let assert = prism(&config)
        .args(["generate", "Solar", "--model", "mock-fail", "--model", "mock-a", "--json"])
        .assert()
        .success();
    let stdout = String::from_utf8_lossy(&assert.get_output().stdout);
    let json: serde_json::Value = serde_json::from_str(&stdout).expect("valid JSON");

    let reports = json.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["model_id"], "mock-fail");
    assert_eq!(reports[0]["outcome"]["status"], "failure");
    assert_eq!(reports[0]["outcome"]["stage"], "expanding");
    assert_eq!(reports[1]["outcome"]["status"], "success");
}

#[test]
fn test_generate_all_failed_exits_with_error() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir);

    prism(&config)
        .args(["generate", "Solar", "--model", "mock-fail"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("# Report generation failed"))
        .stdout(predicate::str::contains("**Model:** `mock-fail`"));
}

#[test]
fn test_saved_reports_are_listed_and_searchable() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir);

    prism(&config)
        .args(["generate", "Electric Vehicle Market", "--model", "mock-a", "--save"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Saved mock-a as report #1"));

    prism(&config)
        .arg("themes")
        .assert()
        .success()
        .stdout(predicate::str::contains("Electric Vehicle Mar"));

    prism(&config)
        .args(["list", "Electric Vehicle Mar"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#1"))
        .stdout(predicate::str::contains("mock-a"));

    prism(&config)
        .args(["show", "1"])
        .assert()
        .success()
        .stdout(predicate::str::starts_with("# Mock report from mock-a"));

    prism(&config)
        .args(["similar", "electric vehicles", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"original_topic\": \"Electric Vehicle Market\""));
}

#[test]
fn test_save_file_and_missing_report() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir);
    let report = temp_dir.path().join("report.md");
    std::fs::write(&report, "# Hand written\n").unwrap();

    prism(&config)
        .args(["save", "--topic", "Battery Recycling", "--model", "Qwen/Qwen2.5:7B"])
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("Qwen-Qwen2.5-7B_"));

    prism(&config)
        .args(["show", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not found"));
}

#[test]
fn test_chat_rejects_unknown_alias() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir);

    prism(&config)
        .args(["chat", "--model", "claude", "hello"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown model alias: 'claude'"));
}

#[test]
fn test_ingest_reports_document_count() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir);
    let docs = temp_dir.path().join("docs");
    std::fs::create_dir_all(&docs).unwrap();
    std::fs::write(docs.join("notes.md"), "Charging networks expanded quickly.").unwrap();

    prism(&config)
        .arg("ingest")
        .arg(&docs)
        .assert()
        .success()
        .stdout(predicate::str::contains("Ingested 1 document(s)"));
}

#[test]
fn test_onnx_provider_without_model_fails_clearly() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir);
    let model_dir = temp_dir.path().join("no-model").display().to_string();
    let mut contents = std::fs::read_to_string(&config).unwrap();
    contents.push_str(&format!("\n[embedding]\nprovider = \"onnx\"\nmodel_dir = {:?}\n", model_dir));
    std::fs::write(&config, contents).unwrap();
    let docs = temp_dir.path().join("docs");
    std::fs::create_dir_all(&docs).unwrap();

    prism(&config)
        .arg("ingest")
        .arg(&docs)
        .assert()
        .failure()
        .stderr(predicate::str::contains("onnx"))
        .stderr(predicate::str::contains("no-model"));
}

#[test]
fn test_unknown_embedding_provider_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let config = write_config(&temp_dir);
    let mut contents = std::fs::read_to_string(&config).unwrap();
    contents.push_str("\n[embedding]\nprovider = \"word2vec\"\n");
    std::fs::write(&config, contents).unwrap();

    prism(&config)
        .args(["similar", "EV"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown embedding provider 'word2vec'"));
}
