//! Binary-level tests for argument handling, config resolution and JSON
//! output. None of these reach a server: `kind` only builds the client.

use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

fn rstore(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_rstore"))
        .args(args)
        .env("RSTORE_CONFIG_DIR", config_dir)
        .env_remove("RSTORE_BUCKET")
        .env_remove("RSTORE_ENDPOINT")
        .env_remove("RSTORE_DEBUG")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute rstore")
}

fn write_config(dir: &TempDir, content: &str) {
    std::fs::write(dir.path().join("config.toml"), content).expect("write config");
}

fn stdout_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(&stdout).expect("Output should be valid JSON")
}

#[test]
fn test_kind_json() {
    let dir = TempDir::new().unwrap();
    write_config(
        &dir,
        "bucket = \"backups\"\nendpoint = \"http://127.0.0.1:9000\"\nforce_path_style = true\n",
    );

    let output = rstore(dir.path(), &["kind", "--json"]);
    assert!(output.status.success(), "Command should succeed");

    insta::assert_json_snapshot!(stdout_json(&output), @r#"
    {
      "bucket": "backups",
      "kind": "S3"
    }
    "#);
}

#[test]
fn test_kind_plain() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "bucket = \"backups\"\nendpoint = \"http://127.0.0.1:9000\"\n");

    let output = rstore(dir.path(), &["kind"]);
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "S3");
}

#[test]
fn test_bucket_from_flag_without_config_file() {
    let dir = TempDir::new().unwrap();

    let output = rstore(
        dir.path(),
        &["--bucket", "from-flag", "--endpoint", "http://127.0.0.1:9000", "kind", "--json"],
    );
    assert!(output.status.success());
    assert_eq!(stdout_json(&output)["bucket"], "from-flag");
}

#[test]
fn test_missing_bucket_is_config_error() {
    let dir = TempDir::new().unwrap();

    let output = rstore(dir.path(), &["stat", "a.bin", "--json"]);
    assert_eq!(output.status.code(), Some(5), "Exit code should be 5 (CONFIG)");

    let stderr = String::from_utf8_lossy(&output.stderr);
    let error: serde_json::Value = serde_json::from_str(&stderr).expect("error should be JSON");
    assert!(error["error"].as_str().unwrap().contains("bucket must be set"));
}

#[test]
fn test_explicit_config_must_exist() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("nope.toml");

    let output = rstore(dir.path(), &["--config", missing.to_str().unwrap(), "kind"]);
    assert_eq!(output.status.code(), Some(5));
}

#[test]
fn test_put_missing_local_file_is_usage_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.bin");

    let output = rstore(dir.path(), &["put", missing.to_str().unwrap(), "remote.bin"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unknown_command_is_usage_error() {
    let dir = TempDir::new().unwrap();

    let output = rstore(dir.path(), &["frobnicate"]);
    assert_eq!(output.status.code(), Some(2));
}
