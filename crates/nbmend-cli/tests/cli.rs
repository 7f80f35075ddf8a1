use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

fn nbmend(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nbmend"))
        .args(args)
        .env_remove("GEMINI_API_KEY")
        .env_remove("RUST_LOG")
        .output()
        .expect("run nbmend")
}

fn write_notebook(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).expect("write notebook");
    path
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

#[test]
fn validate_clean_notebook_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_notebook(
        &dir,
        "ok.ipynb",
        r#"{"cells": [{"cell_type": "code", "source": ["print(1)"]}]}"#,
    );

    let output = nbmend(&["validate", arg(&path)]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("Validation successful"));
}

#[test]
fn validate_reports_unbalanced_paren_in_cell_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_notebook(
        &dir,
        "bad.ipynb",
        r#"{"cells": [{"cell_type": "code", "source": ["print(1"]}]}"#,
    );

    let output = nbmend(&["validate", arg(&path)]);
    assert_eq!(output.status.code(), Some(1));

    let out = stdout(&output);
    assert_eq!(out.matches("--- Syntax Error Found in").count(), 1);
    assert!(out.contains("Cell 1 ---"));
    assert!(out.contains("```python"));
    assert!(out.contains("Validation failed for"));
}

#[test]
fn validate_aggregates_every_failing_cell() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_notebook(
        &dir,
        "multi.ipynb",
        r#"{"cells": [
            {"cell_type": "code", "source": ["def f(:\n", "  pass"]},
            {"cell_type": "markdown", "source": ["not ( python"]},
            {"cell_type": "code", "source": ["   "]},
            {"cell_type": "code", "source": ["x = = 1"]}
        ]}"#,
    );

    let output = nbmend(&["validate", arg(&path)]);
    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert!(out.contains("Cell 1 ---"));
    assert!(out.contains("Cell 4 ---"));
    assert!(!out.contains("Cell 2 ---"));
    assert!(!out.contains("Cell 3 ---"));
}

#[test]
fn validate_rejects_assignment_to_literal() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_notebook(
        &dir,
        "target.ipynb",
        r#"{"cells": [{"cell_type": "code", "source": ["x = 1\n", "1 = x"]}]}"#,
    );

    let output = nbmend(&["validate", arg(&path)]);
    assert_eq!(output.status.code(), Some(1));
    let out = stdout(&output);
    assert_eq!(out.matches("--- Syntax Error Found in").count(), 1);
    assert!(out.contains("Line 2, Offset 1: cannot assign to literal"));
}

#[test]
fn validate_ignores_contents_of_non_code_cells() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_notebook(
        &dir,
        "loose.ipynb",
        r#"{"cells": [
            {"cell_type": "markdown", "source": null},
            {"cell_type": 7, "source": {"x": 1}},
            {"cell_type": "code", "source": ["def g(x, x):\n", "    return x"]}
        ]}"#,
    );

    let output = nbmend(&["validate", arg(&path)]);
    assert!(output.status.success(), "stdout: {}", stdout(&output));
    assert!(stdout(&output).contains("Validation successful"));
}

#[test]
fn validate_invalid_json_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_notebook(&dir, "trunc.ipynb", r#"{"cells": ["#);

    let output = nbmend(&["validate", arg(&path)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Error: Invalid JSON in"));
}

#[test]
fn validate_missing_cells_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_notebook(&dir, "nocells.ipynb", r#"{"cells": {"a": 1}}"#);

    let output = nbmend(&["validate", arg(&path)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stdout(&output).contains("Missing or invalid 'cells' list"));
}

#[test]
fn validate_wrong_argument_count_prints_usage() {
    for args in [vec!["validate"], vec!["validate", "a.ipynb", "b.ipynb"]] {
        let output = nbmend(&args);
        assert_eq!(output.status.code(), Some(1));
        let err = String::from_utf8_lossy(&output.stderr);
        assert!(err.contains("Usage"), "stderr: {err}");
    }
}

#[test]
fn repair_without_credential_exits_before_touching_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("never-created.ipynb");

    let output = nbmend(&["repair", arg(&path)]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("GEMINI_API_KEY"));
    assert!(!path.exists());
    assert!(stdout(&output).is_empty());
}

#[test]
fn repair_of_valid_notebook_needs_no_agent() {
    let dir = tempfile::tempdir().unwrap();
    let body = r#"{
 "cells": [],
 "metadata": {},
 "nbformat": 4,
 "nbformat_minor": 5
}
"#;
    let path = write_notebook(&dir, "valid.ipynb", body);

    let output = Command::new(env!("CARGO_BIN_EXE_nbmend"))
        .args(["repair", arg(&path), "--max-retries", "2"])
        .env("GEMINI_API_KEY", "test-key")
        .output()
        .expect("run nbmend");

    assert!(output.status.success());
    let out = stdout(&output);
    assert!(out.contains("Attempt 1/2"));
    assert!(out.contains("Successfully validated"));
    assert!(!out.contains("Attempting fix"));
    assert_eq!(std::fs::read_to_string(&path).unwrap(), body);

    let parsed: serde_json::Value = serde_json::from_str(body).unwrap();
    assert_eq!(parsed["nbformat"], 4);
}
