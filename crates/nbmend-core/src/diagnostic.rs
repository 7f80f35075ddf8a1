//! Normalized validation diagnostics.

use serde::{Deserialize, Serialize};

/// A single validation or syntax failure, with location and message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    /// Cell position (1-indexed); `None` for whole-document errors.
    pub cell: Option<usize>,

    /// Line number within the cell source (1-indexed).
    pub line: Option<usize>,

    /// Column offset within the line (1-indexed).
    pub offset: Option<usize>,

    /// Human-readable message.
    pub message: String,

    /// Offending source line, stripped of surrounding whitespace.
    pub text: Option<String>,
}

impl Diagnostic {
    /// Create a whole-document diagnostic without location detail.
    pub fn document(message: impl Into<String>) -> Self {
        Self {
            cell: None,
            line: None,
            offset: None,
            message: message.into(),
            text: None,
        }
    }

    /// Create a diagnostic anchored to a code cell.
    pub fn in_cell(
        cell: usize,
        line: usize,
        offset: usize,
        message: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            cell: Some(cell),
            line: Some(line),
            offset: Some(offset),
            message: message.into(),
            text: Some(text.into()),
        }
    }

    /// Marker pointing at the offending column, if the diagnostic has one.
    pub fn caret(&self) -> Option<String> {
        self.offset.map(caret_line)
    }
}

/// `offset - 1` spaces followed by `^`. Offsets of zero produce no padding.
pub fn caret_line(offset: usize) -> String {
    format!("{}^", " ".repeat(offset.saturating_sub(1)))
}

/// Outcome of a validation pass: valid iff no diagnostics were produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationReport {
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn push(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }
}

impl From<Diagnostic> for ValidationReport {
    fn from(diagnostic: Diagnostic) -> Self {
        Self {
            diagnostics: vec![diagnostic],
        }
    }
}
