//! CLI integration tests for mssql-script-export.
//!
//! These tests cover argument parsing, help output, and exit codes for
//! configuration errors and an unreachable catalog.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// Get a command for the mssql-script-export binary.
fn cmd() -> Command {
    Command::cargo_bin("mssql-script-export").unwrap()
}

// =============================================================================
// Help and Version Tests
// =============================================================================

#[test]
fn test_help_shows_all_commands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("health-check"));
}

#[test]
fn test_run_subcommand_help() {
    cmd()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--category"))
        .stdout(predicate::str::contains("--output-dir"))
        .stdout(predicate::str::contains("--workers"));
}

#[test]
fn test_version_flag() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mssql-script-export"));
}

// =============================================================================
// Global Flag Tests
// =============================================================================

#[test]
fn test_output_json_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-json"));
}

#[test]
fn test_connection_string_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--connection-string"));
}

#[test]
fn test_log_format_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--log-format"))
        .stdout(predicate::str::contains("[default: text]"));
}

#[test]
fn test_verbosity_flag_exists() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--verbosity"))
        .stdout(predicate::str::contains("[default: info]"));
}

// =============================================================================
// Exit Code Tests - Config Errors (Exit Code 1)
// =============================================================================

#[test]
fn test_missing_config_exits_with_code_7() {
    // Missing file is an IO error (code 7), not config error (code 1)
    cmd()
        .args(["--config", "nonexistent_config_file.yaml", "health-check"])
        .assert()
        .code(7);
}

#[test]
fn test_invalid_yaml_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "invalid: yaml: content: [").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_empty_config_exits_with_code_1() {
    let file = tempfile::NamedTempFile::new().unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(1);
}

#[test]
fn test_missing_required_fields_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    // Valid YAML, but no host/database/user and no connection string
    writeln!(file, "source:").unwrap();
    writeln!(file, "  port: 1433").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "run"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("source.host"));
}

#[test]
fn test_blank_connection_string_exits_with_code_1() {
    cmd()
        .args([
            "--config",
            "nonexistent_config_file.yaml",
            "--connection-string",
            "  ",
            "health-check",
        ])
        .assert()
        .code(1);
}

#[test]
fn test_zero_workers_exits_with_code_1() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  host: localhost").unwrap();
    writeln!(file, "  database: AppDb").unwrap();
    writeln!(file, "  user: sa").unwrap();

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "run",
            "--workers",
            "0",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("workers"));
}

#[test]
fn test_unknown_category_is_rejected() {
    cmd()
        .args(["run", "--category", "trigger"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("trigger"));
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[test]
fn test_health_check_reports_unreachable_server() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  host: 127.0.0.1").unwrap();
    writeln!(file, "  port: 1").unwrap();
    writeln!(file, "  database: AppDb").unwrap();
    writeln!(file, "  user: sa").unwrap();
    writeln!(file, "  encrypt: \"false\"").unwrap();

    cmd()
        .args([
            "--config",
            file.path().to_str().unwrap(),
            "--output-json",
            "health-check",
        ])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("\"connected\": false"))
        .stdout(predicate::str::contains("\"db_type\": \"mssql\""));
}

#[test]
fn test_health_check_text_output_on_failure() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "source:").unwrap();
    writeln!(file, "  host: 127.0.0.1").unwrap();
    writeln!(file, "  port: 1").unwrap();
    writeln!(file, "  database: AppDb").unwrap();
    writeln!(file, "  user: sa").unwrap();
    writeln!(file, "  encrypt: \"false\"").unwrap();

    cmd()
        .args(["--config", file.path().to_str().unwrap(), "health-check"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("FAILED"));
}

// =============================================================================
// Subcommand Existence Tests
// =============================================================================

#[test]
fn test_health_check_command_exists() {
    cmd()
        .args(["health-check", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Test the catalog connection"));
}

// =============================================================================
// Config Path Tests
// =============================================================================

#[test]
fn test_config_default_path() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("[default: config.yaml]"));
}

#[test]
fn test_short_config_flag() {
    // -c should work as short for --config
    cmd()
        .args(["-c", "some_config.yaml", "--help"])
        .assert()
        .success();
}

// =============================================================================
// No Subcommand Tests
// =============================================================================

#[test]
fn test_no_subcommand_shows_help() {
    cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage:"));
}
