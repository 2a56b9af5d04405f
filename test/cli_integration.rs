//! CLI Integration Tests for Baton
//!
//! Runs the `baton` binary against temporary blueprint files.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn baton(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_baton"))
        .args(args)
        .current_dir(cwd)
        .env_remove("BATON_THREADPOOL_SIZE")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to run baton")
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).expect("Failed to write input");
    path
}

/// One JSON document per stdout line (requires `--compact`)
fn documents(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("stdout line is not JSON"))
        .collect()
}

// ============================================================================
// Parse Command
// ============================================================================

#[test]
fn test_parse_valid_file() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "notes.apib", "# Notes API\n## Notes [/notes]\n### List [GET]\n");

    let output = baton(&["parse", "--compact", input.to_str().unwrap()], dir.path());
    assert!(
        output.status.success(),
        "Parse failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let docs = documents(&output);
    assert_eq!(docs.len(), 1);
    assert!(docs[0]["error"].is_null());
    assert_eq!(docs[0]["result"]["ast"]["name"], "Notes API");
    assert!(docs[0]["result"].get("sourcemap").is_none());
}

#[test]
fn test_parse_reports_errors_with_exit_code() {
    let dir = TempDir::new().unwrap();
    let good = write(&dir, "good.apib", "# Good\n");
    let bad = write(&dir, "bad.apib", "# Bad\n## List [/list]\n### Read [FETCH]\n");

    let output = baton(
        &[
            "parse",
            "--compact",
            good.to_str().unwrap(),
            bad.to_str().unwrap(),
        ],
        dir.path(),
    );
    assert_eq!(output.status.code(), Some(1));

    let docs = documents(&output);
    assert_eq!(docs.len(), 2);
    assert!(docs[0]["error"].is_null());
    assert_eq!(docs[1]["error"]["line"], 3);
    assert_eq!(docs[1]["result"]["ast"]["name"], "Bad");
}

#[test]
fn test_parse_options() {
    let dir = TempDir::new().unwrap();
    let named = write(&dir, "named.apib", "# Named\n");
    let unnamed = write(&dir, "unnamed.apib", "## Items [/items]\n");

    let output = baton(
        &["parse", "--compact", "--sourcemap", named.to_str().unwrap()],
        dir.path(),
    );
    assert!(output.status.success());
    assert!(documents(&output)[0]["result"]["sourcemap"].is_object());

    let output = baton(
        &["parse", "--compact", "--require-name", unnamed.to_str().unwrap()],
        dir.path(),
    );
    assert_eq!(output.status.code(), Some(1));
    assert!(documents(&output)[0]["error"]["message"]
        .as_str()
        .unwrap()
        .contains("API name"));
}

#[test]
fn test_parse_missing_file() {
    let dir = TempDir::new().unwrap();
    let output = baton(&["parse", "does-not-exist.apib"], dir.path());

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to read input"));
}

#[test]
fn test_parse_rejects_invalid_utf8() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("binary.apib");
    fs::write(&input, [b'#', b' ', 0xff, 0xfe, b'\n']).unwrap();

    let output = baton(&["parse", input.to_str().unwrap()], dir.path());

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("not valid UTF-8"));
    assert!(output.stdout.is_empty());
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn test_invalid_worker_count_rejected() {
    let dir = TempDir::new().unwrap();
    let input = write(&dir, "a.apib", "# A\n");

    let output = baton(
        &["--workers", "0", "parse", input.to_str().unwrap()],
        dir.path(),
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("pool.workers"));
}

#[test]
fn test_config_file_discovered_in_cwd() {
    let dir = TempDir::new().unwrap();
    write(&dir, "baton.toml", "[pool]\nworkers = 3\n");

    let output = baton(&["bench", "--count", "10"], dir.path());
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("Workers: 3"));
}

#[test]
fn test_malformed_config_file() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "custom.toml", "[pool\nworkers = 3\n");

    let output = baton(
        &["--config", config.to_str().unwrap(), "bench", "--count", "1"],
        dir.path(),
    );
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Failed to load config"));
}

// ============================================================================
// Bench Command
// ============================================================================

#[test]
fn test_bench_verifies_lifecycles() {
    let dir = TempDir::new().unwrap();
    let output = baton(
        &["--workers", "4", "bench", "--count", "200", "--verify"],
        dir.path(),
    );

    assert!(
        output.status.success(),
        "Bench failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Dispatched: 200"));
    assert!(stdout.contains("Verified lifecycles: 200"));
}
