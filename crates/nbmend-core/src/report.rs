//! Console rendering for validation results.
//!
//! The block shapes here are what users and scripts grep for; keep them
//! stable.

use std::fmt::Write;
use std::path::Path;

use crate::diagnostic::{Diagnostic, ValidationReport};
use crate::error::{LoadError, StructureError};

/// Render one per-cell syntax error block.
pub fn render_syntax_error(path: &Path, diag: &Diagnostic) -> String {
    let mut out = String::new();
    let cell = diag.cell.map(|c| c.to_string()).unwrap_or_else(|| "?".to_string());
    let line = diag.line.map(|l| l.to_string()).unwrap_or_else(|| "?".to_string());
    let offset = diag.offset.map(|o| o.to_string()).unwrap_or_else(|| "?".to_string());

    let _ = writeln!(
        out,
        "--- Syntax Error Found in {}, Cell {} ---",
        path.display(),
        cell
    );
    let _ = writeln!(out, "Line {}, Offset {}: {}", line, offset, diag.message);
    let _ = writeln!(out, "```python");
    let _ = writeln!(out, "{}", diag.text.as_deref().unwrap_or_default());
    if let Some(caret) = diag.caret() {
        let _ = writeln!(out, "{caret}");
    }
    out.push_str("```");
    out
}

/// Render every diagnostic in `report`, one block each.
pub fn render_report(path: &Path, report: &ValidationReport) -> Vec<String> {
    report
        .diagnostics
        .iter()
        .map(|d| render_syntax_error(path, d))
        .collect()
}

pub fn render_load_error(path: &Path, err: &LoadError) -> String {
    match err {
        LoadError::Decode { message, .. } => format!(
            "Error: Invalid JSON in {}.\nDetails: {}",
            path.display(),
            message
        ),
        LoadError::Io { source, .. } => {
            format!("Error: Could not read {}.\nDetails: {}", path.display(), source)
        }
    }
}

pub fn render_structure_error(path: &Path, err: &StructureError) -> String {
    match err {
        StructureError::MissingCells => format!("Error: {} in {}.", err, path.display()),
        StructureError::MalformedCell { .. } => {
            format!("Error: Invalid cell in {}.\nDetails: {}", path.display(), err)
        }
    }
}

pub fn render_success(path: &Path) -> String {
    format!(
        "Validation successful: {} is a valid notebook with correct Python syntax.",
        path.display()
    )
}

pub fn render_failure(path: &Path) -> String {
    format!("Validation failed for {}.", path.display())
}
