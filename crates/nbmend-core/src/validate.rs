//! Pure validator: load, lenient structural check, per-cell syntax check.
//!
//! Read-only; never touches the network.

use std::path::Path;

use crate::diagnostic::ValidationReport;
use crate::error::{LoadError, StructureError};
use crate::loader::load_json;
use crate::notebook::Notebook;
use crate::syntax::check_cells;

/// Reasons the pure validator stops before checking any cell.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Structure(#[from] StructureError),
}

/// Validate the notebook at `path`.
///
/// Returns the aggregated per-cell report; a document that cannot be
/// decoded or lacks a `cells` list is an error instead.
pub fn validate_notebook(path: &Path) -> Result<ValidationReport, ValidateError> {
    let value = load_json(path)?;
    let notebook = Notebook::from_value(&value)?;
    Ok(check_cells(&notebook))
}
