//! Typed notebook document model.
//!
//! Raw JSON is decoded once at the boundary via [`Notebook::from_value`];
//! everything downstream works on [`Notebook`] and [`Cell`].

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StructureError;

/// Kind of a notebook cell. Only [`CellType::Code`] is syntax-checked.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CellType {
    Code,
    Markdown,
    Raw,
    #[default]
    Missing,
    Unknown(String),
}

impl From<String> for CellType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "code" => CellType::Code,
            "markdown" => CellType::Markdown,
            "raw" => CellType::Raw,
            _ => CellType::Unknown(value),
        }
    }
}

impl From<CellType> for String {
    fn from(value: CellType) -> Self {
        match value {
            CellType::Code => "code".to_string(),
            CellType::Markdown => "markdown".to_string(),
            CellType::Raw => "raw".to_string(),
            CellType::Missing => String::new(),
            CellType::Unknown(other) => other,
        }
    }
}

/// Cell source: either a list of lines or a single string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Source {
    Lines(Vec<String>),
    Text(String),
}

impl Default for Source {
    fn default() -> Self {
        Source::Lines(Vec::new())
    }
}

impl Source {
    /// Concatenate the source lines with no separator.
    pub fn text(&self) -> String {
        match self {
            Source::Lines(lines) => lines.concat(),
            Source::Text(text) => text.clone(),
        }
    }
}

/// One ordered element of a notebook.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Cell {
    #[serde(default)]
    pub cell_type: CellType,

    #[serde(default)]
    pub source: Source,
}

impl Cell {
    pub fn code(source: impl Into<String>) -> Self {
        Self {
            cell_type: CellType::Code,
            source: Source::Text(source.into()),
        }
    }

    pub fn is_code(&self) -> bool {
        self.cell_type == CellType::Code
    }
}

/// Deserialized notebook with cells in source order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Notebook {
    pub cells: Vec<Cell>,

    /// `(nbformat, nbformat_minor)` when the document declares them.
    pub format_version: Option<(u64, u64)>,
}

impl Notebook {
    /// Lenient structural decode: requires only a top-level `cells` array.
    pub fn from_value(value: &Value) -> Result<Self, StructureError> {
        let cells = value
            .get("cells")
            .and_then(Value::as_array)
            .ok_or(StructureError::MissingCells)?;

        let cells = cells
            .iter()
            .enumerate()
            .map(|(i, raw)| decode_cell(i + 1, raw))
            .collect::<Result<Vec<_>, _>>()?;

        let format_version = match (
            value.get("nbformat").and_then(Value::as_u64),
            value.get("nbformat_minor").and_then(Value::as_u64),
        ) {
            (Some(major), Some(minor)) => Some((major, minor)),
            _ => None,
        };

        Ok(Self {
            cells,
            format_version,
        })
    }

    /// Code cells paired with their 1-based position in the notebook.
    pub fn code_cells(&self) -> impl Iterator<Item = (usize, &Cell)> {
        self.cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.is_code())
            .map(|(i, cell)| (i + 1, cell))
    }
}

/// Decode one cell without enforcing any schema.
///
/// Only code cells have their `source` read; every other cell keeps an
/// empty source whatever its `source` holds.
fn decode_cell(index: usize, raw: &Value) -> Result<Cell, StructureError> {
    let fields = raw
        .as_object()
        .ok_or_else(|| StructureError::MalformedCell {
            index,
            reason: "cell is not a JSON object".to_string(),
        })?;

    let cell_type = match fields.get("cell_type") {
        None | Some(Value::Null) => CellType::Missing,
        Some(Value::String(name)) => CellType::from(name.clone()),
        Some(other) => CellType::Unknown(other.to_string()),
    };

    let source = match fields.get("source") {
        Some(raw) if cell_type == CellType::Code => {
            Source::deserialize(raw).map_err(|e| StructureError::MalformedCell {
                index,
                reason: format!("invalid code cell source: {e}"),
            })?
        }
        _ => Source::default(),
    };

    Ok(Cell { cell_type, source })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_missing_cells_key_is_rejected() {
        let err = Notebook::from_value(&json!({"metadata": {}})).unwrap_err();
        assert_eq!(err, StructureError::MissingCells);
    }

    #[test]
    fn test_non_array_cells_is_rejected() {
        for value in [
            json!({"cells": {}}),
            json!({"cells": "code"}),
            json!({"cells": null}),
            json!([1, 2, 3]),
        ] {
            assert_eq!(
                Notebook::from_value(&value).unwrap_err(),
                StructureError::MissingCells
            );
        }
    }

    #[test]
    fn test_source_list_and_string_forms_concatenate() {
        let nb = Notebook::from_value(&json!({
            "cells": [
                {"cell_type": "code", "source": ["a = 1\n", "b = 2"]},
                {"cell_type": "code", "source": "c = 3"}
            ]
        }))
        .unwrap();
        assert_eq!(nb.cells[0].source.text(), "a = 1\nb = 2");
        assert_eq!(nb.cells[1].source.text(), "c = 3");
    }

    #[test]
    fn test_unknown_and_missing_cell_types() {
        let nb = Notebook::from_value(&json!({
            "cells": [
                {"cell_type": "heading", "source": []},
                {"source": ["x"]}
            ]
        }))
        .unwrap();
        assert_eq!(nb.cells[0].cell_type, CellType::Unknown("heading".to_string()));
        assert_eq!(nb.cells[1].cell_type, CellType::Missing);
        assert_eq!(nb.code_cells().count(), 0);
    }

    #[test]
    fn test_non_object_cell_is_malformed() {
        let err = Notebook::from_value(&json!({"cells": [{"cell_type": "raw"}, 42]})).unwrap_err();
        match err {
            StructureError::MalformedCell { index, .. } => assert_eq!(index, 2),
            other => panic!("expected MalformedCell, got {other:?}"),
        }
    }

    #[test]
    fn test_non_code_cells_are_not_inspected() {
        for cell in [
            json!({"cell_type": "markdown", "source": null}),
            json!({"cell_type": "markdown", "source": ["a", 1]}),
            json!({"cell_type": 7, "source": []}),
            json!({"cell_type": "markdown", "source": {"x": 1}}),
        ] {
            let nb = Notebook::from_value(&json!({"cells": [cell.clone()]}))
                .unwrap_or_else(|e| panic!("{cell} rejected: {e:?}"));
            assert_eq!(nb.cells.len(), 1);
            assert_eq!(nb.code_cells().count(), 0);
            assert_eq!(nb.cells[0].source, Source::default());
        }
    }

    #[test]
    fn test_non_string_cell_type_is_unknown() {
        let nb = Notebook::from_value(&json!({"cells": [{"cell_type": 7}, {"cell_type": null}]}))
            .unwrap();
        assert_eq!(nb.cells[0].cell_type, CellType::Unknown("7".to_string()));
        assert_eq!(nb.cells[1].cell_type, CellType::Missing);
    }

    #[test]
    fn test_code_cell_with_bad_source_is_malformed() {
        let err = Notebook::from_value(&json!({
            "cells": [
                {"cell_type": "markdown", "source": null},
                {"cell_type": "code", "source": ["x = 1", 2]}
            ]
        }))
        .unwrap_err();
        match err {
            StructureError::MalformedCell { index, .. } => assert_eq!(index, 2),
            other => panic!("expected MalformedCell, got {other:?}"),
        }
    }

    #[test]
    fn test_code_cells_use_one_based_positions() {
        let nb = Notebook::from_value(&json!({
            "cells": [
                {"cell_type": "markdown", "source": ["# Title"]},
                {"cell_type": "code", "source": ["print(1)"]}
            ],
            "nbformat": 4,
            "nbformat_minor": 5
        }))
        .unwrap();
        let positions: Vec<usize> = nb.code_cells().map(|(i, _)| i).collect();
        assert_eq!(positions, vec![2]);
        assert_eq!(nb.format_version, Some((4, 5)));
    }
}
