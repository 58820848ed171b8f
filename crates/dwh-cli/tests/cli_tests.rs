//! End-to-end tests for the dwh binary
//!
//! These run without AWS or a warehouse: they cover argument handling, the
//! offline `statements` command and configuration errors raised before any
//! remote call.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

const FULL_CONFIG: &str = "\
[AWS]
KEY=AKIAEXAMPLE
SECRET=secret
REGION=us-west-2

[CLUSTER]
HOST=
DB_NAME=dwh
DB_USER=dwhuser
DB_PASSWORD=Passw0rd
DB_PORT=5439
CLUSTER_TYPE=multi-node
NUM_NODES=4
NODE_TYPE=dc2.large
CLUSTER_IDENTIFIER=dwhCluster

[IAM_ROLE]
IAM_ROLE_NAME=dwhRole
ARN=arn:aws:iam::123456789012:role/dwhRole

[S3]
LOG_DATA='s3://udacity-dend/log_data'
LOG_JSONPATH='s3://udacity-dend/log_json_path.json'
SONG_DATA='s3://udacity-dend/song_data'
";

fn config_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

/// `dwh` with a clean environment and colors off
fn dwh() -> Command {
    let mut cmd = Command::cargo_bin("dwh").unwrap();
    cmd.env_remove("DWH_CONFIG")
        .env_remove("DWH_LOG_LEVEL")
        .env("NO_COLOR", "1");
    cmd
}

// ============================================================================
// Argument Handling
// ============================================================================

#[test]
fn test_help_lists_commands() {
    dwh()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("provision"))
        .stdout(predicate::str::contains("create-tables"))
        .stdout(predicate::str::contains("teardown"))
        .stdout(predicate::str::contains("--no-input"));
}

#[test]
fn test_markdown_help() {
    dwh()
        .arg("--markdown-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("dwh statements"));
}

#[test]
fn test_subcommand_required() {
    dwh()
        .assert()
        .code(2)
        .stderr(predicate::str::contains("subcommand is required"));
}

#[test]
fn test_yes_conflicts_with_no_input() {
    let config = config_file(FULL_CONFIG);
    dwh()
        .args(["--yes", "--no-input", "statements", "--config"])
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_invalid_mode_rejected() {
    dwh()
        .args(["--mode", "yolo", "statements"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown failure mode"));
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_statements_prints_resolved_catalog() {
    let config = config_file(FULL_CONFIG);
    dwh()
        .arg("statements")
        .arg("--config")
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("-- ==== create-tables ===="))
        .stdout(predicate::str::contains("-- copy_staging_events (staging_events)"))
        .stdout(predicate::str::contains(
            "'aws_iam_role=arn:aws:iam::123456789012:role/dwhRole'",
        ))
        .stdout(predicate::str::contains("'s3://udacity-dend/log_data'"))
        .stdout(predicate::str::contains("-- songplays_per_artist"));
}

#[test]
fn test_statements_single_phase() {
    let config = config_file(FULL_CONFIG);
    dwh()
        .args(["statements", "--phase", "copy_staging", "--config"])
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("COPY staging_songs"))
        .stdout(predicate::str::contains("CREATE TABLE").not());
}

#[test]
fn test_statements_unknown_phase() {
    let config = config_file(FULL_CONFIG);
    dwh()
        .args(["statements", "--phase", "vacuum", "--config"])
        .arg(config.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown phase 'vacuum'"));
}

#[test]
fn test_config_path_from_environment() {
    let config = config_file(FULL_CONFIG);
    dwh()
        .env("DWH_CONFIG", config.path())
        .args(["statements", "--phase", "analytics"])
        .assert()
        .success()
        .stdout(predicate::str::contains("-- ==== analytics ===="));
}

#[test]
fn test_environment_overrides_config_value() {
    let config = config_file(FULL_CONFIG);
    dwh()
        .env("DWH_S3__SONG_DATA", "s3://other-bucket/songs")
        .args(["statements", "--phase", "copy-staging", "--config"])
        .arg(config.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("'s3://other-bucket/songs'"));
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[test]
fn test_missing_config_file() {
    dwh()
        .args(["statements", "--config", "/definitely/not/here/dwh.cfg"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_missing_s3_value_names_key() {
    let config = config_file(&FULL_CONFIG.replace("LOG_DATA='s3://udacity-dend/log_data'\n", ""));
    dwh()
        .arg("statements")
        .arg("--config")
        .arg(config.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("LOG_DATA"))
        .stderr(predicate::str::contains("[S3]"));
}

#[test]
fn test_create_tables_without_host_fails_before_connecting() {
    let config = config_file(FULL_CONFIG);
    dwh()
        .args(["--no-input", "create-tables", "--config"])
        .arg(config.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("'HOST'"));
}

#[test]
fn test_teardown_without_credentials_fails_before_aws() {
    let config = config_file(&FULL_CONFIG.replace("KEY=AKIAEXAMPLE\n", ""));
    dwh()
        .args(["--no-input", "teardown", "--config"])
        .arg(config.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("'KEY'"))
        .stderr(predicate::str::contains("[AWS]"));
}
