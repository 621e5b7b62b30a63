use anyhow::Result;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::{tempdir, TempDir};

fn gistscout(dir: &TempDir) -> Result<Command> {
    let mut cmd = Command::cargo_bin("gistscout")?;
    cmd.current_dir(dir.path())
        .env_remove("RUST_LOG")
        .env("GISTSCOUT_API_BASE_URL", "http://127.0.0.1:9");
    Ok(cmd)
}

#[test]
fn test_help_lists_search_options() -> Result<()> {
    let dir = tempdir()?;
    gistscout(&dir)?
        .args(["search", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--user"))
        .stdout(predicate::str::contains("--pattern"))
        .stdout(predicate::str::contains("--streaming-threshold"));
    Ok(())
}

#[test]
fn test_invalid_pattern_fails_fast() -> Result<()> {
    let dir = tempdir()?;
    gistscout(&dir)?
        .args(["search", "--user", "acme", "--pattern", "("])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid pattern"))
        .stderr(predicate::str::contains("invalid_pattern"));
    Ok(())
}

#[test]
fn test_blank_user_fails() -> Result<()> {
    let dir = tempdir()?;
    gistscout(&dir)?
        .args(["search", "--user", "  ", "--pattern", "requests"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid input"));
    Ok(())
}

#[test]
fn test_json_failure_shape() -> Result<()> {
    let dir = tempdir()?;
    let output = gistscout(&dir)?
        .args(["search", "-u", "acme", "-p", "", "--json"])
        .output()?;

    assert!(!output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["status"], "failed");
    assert_eq!(json["username"], "acme");
    assert_eq!(json["error"]["kind"], "invalid_pattern");
    assert_eq!(json["error"]["message"], "Invalid pattern: empty pattern");
    Ok(())
}

#[test]
fn test_invalid_config_file_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let config_path = dir.path().join("custom.yaml");
    fs::write(&config_path, "per_page: 500\n")?;

    gistscout(&dir)?
        .args(["search", "-u", "acme", "-p", "requests", "--config"])
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("per_page"));
    Ok(())
}

#[test]
fn test_unknown_encoding_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    gistscout(&dir)?
        .args(["search", "-u", "acme", "-p", "x", "--encoding", "latin1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown encoding mode"));
    Ok(())
}
