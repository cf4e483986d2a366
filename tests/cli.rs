//! CLI integration tests: drive the compiled `docrag` binary end to end
//! against a temporary database.

use std::fs;
use std::process::Command;
use tempfile::TempDir;

fn docrag_binary() -> std::path::PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop();
    path.pop();
    path.push("docrag");
    path
}

/// Write a config pointing storage at the temp directory.
fn write_config(dir: &TempDir) -> std::path::PathBuf {
    let config_path = dir.path().join("docrag.toml");
    let db_path = dir.path().join("docrag.sqlite");
    fs::write(
        &config_path,
        format!(
            r#"
[storage]
path = "{}"
"#,
            db_path.display()
        ),
    )
    .unwrap();
    config_path
}

fn run(config: &std::path::Path, args: &[&str]) -> std::process::Output {
    Command::new(docrag_binary())
        .arg("--config")
        .arg(config)
        .args(args)
        .output()
        .expect("failed to run docrag binary")
}

#[test]
fn init_add_query_list_delete_round_trip() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    let out = run(&config, &["init"]);
    assert!(out.status.success(), "init failed: {:?}", out);

    // Ingest a small text document.
    let doc_path = dir.path().join("llamas.txt");
    fs::write(
        &doc_path,
        "Llamas hum to communicate. Llamas sleep standing up. Llamas dislike rain.",
    )
    .unwrap();

    let out = run(&config, &["add", doc_path.to_str().unwrap()]);
    assert!(out.status.success(), "add failed: {:?}", out);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("llamas.txt"));
    assert!(stdout.contains("1 chunks"));

    // Extract the assigned document id from the add output.
    let doc_id = stdout
        .split_whitespace()
        .find(|w| w.starts_with("doc-"))
        .expect("add output should contain a document id")
        .to_string();

    // The document shows up in list.
    let out = run(&config, &["list"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains(&doc_id));
    assert!(stdout.contains("llamas.txt"));

    // A name-targeted query returns its content at full score.
    let out = run(&config, &["query", "Tell me about llamas.txt"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("llamas.txt"));
    assert!(stdout.contains("[1.000]"));

    // get prints metadata and the extracted content.
    let out = run(&config, &["get", &doc_id]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Llamas hum to communicate"));

    // Delete, then verify it is gone.
    let out = run(&config, &["delete", &doc_id]);
    assert!(out.status.success());

    let out = run(&config, &["list"]);
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("No documents."));

    let out = run(&config, &["get", &doc_id]);
    assert!(!out.status.success());
}

#[test]
fn state_persists_across_invocations() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    run(&config, &["init"]);

    let doc_path = dir.path().join("facts.txt");
    fs::write(&doc_path, "The observatory budget doubled in 2026.").unwrap();
    let out = run(&config, &["add", doc_path.to_str().unwrap()]);
    assert!(out.status.success());

    // A separate process invocation sees the same state.
    let out = run(&config, &["query", "observatory budget"]);
    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("facts.txt"));
}

#[test]
fn unsupported_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let config = write_config(&dir);

    run(&config, &["init"]);

    let doc_path = dir.path().join("binary.exe");
    fs::write(&doc_path, [0u8, 1, 2, 3]).unwrap();
    let out = run(&config, &["add", doc_path.to_str().unwrap()]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("unsupported document type"));
}
