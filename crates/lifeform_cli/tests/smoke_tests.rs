//! CLI smoke tests: run the built binary.

use std::path::Path;
use std::process::{Command, Output};

fn cli_bin() -> Command {
    Command::new(env!("CARGO_BIN_EXE_lifeform"))
}

/// Binary pointed at a scratch directory with the template provider.
fn run_in(dir: &Path, args: &[&str]) -> Output {
    cli_bin()
        .env_remove("CONFIG_PATH")
        .env_remove("OPENAI_API_KEY")
        .env_remove("DATABASE_URL")
        .env_remove("DATABASE_PATH")
        .env("LLM_PROVIDER", "template")
        .env("APP_ENV", "testing")
        .env("RUST_LOG", "warn")
        .env("LOG_FILE_PATH", dir.join("logs").join("app.jsonl"))
        .arg("--config")
        .arg(dir.join("missing.toml"))
        .arg("--db")
        .arg(dir.join("lifeform.db"))
        .args(args)
        .output()
        .expect("failed to run")
}

#[test]
fn test_help_flag() {
    let output = cli_bin().arg("--help").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Usage"), "Expected usage info in --help output");
    assert!(stdout.contains("seed"));
    assert!(stdout.contains("history"));
}

#[test]
fn test_version_flag() {
    let output = cli_bin().arg("--version").output().expect("failed to run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("lifeform"), "Expected binary name in --version output");
}

#[test]
fn test_seed_is_repeatable() {
    let dir = tempfile::TempDir::new().unwrap();

    for _ in 0..2 {
        let output = run_in(dir.path(), &["seed"]);
        assert!(
            output.status.success(),
            "seed failed: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        assert!(String::from_utf8_lossy(&output.stdout).contains("Seed complete."));
    }
    assert!(dir.path().join("lifeform.db").exists());
    assert!(dir.path().join("logs").exists());
}

#[test]
fn test_history_empty() {
    let dir = tempfile::TempDir::new().unwrap();

    let output = run_in(dir.path(), &["history", "--limit", "5"]);

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("No answered questions yet."));
}

#[test]
fn test_history_rejects_negative_limit() {
    let dir = tempfile::TempDir::new().unwrap();

    let output = run_in(dir.path(), &["history", "--limit", "-1"]);

    assert!(!output.status.success());
    assert!(!dir.path().join("lifeform.db").exists());
}
