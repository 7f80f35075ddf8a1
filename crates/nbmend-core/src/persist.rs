//! Notebook persistence: canonical serialization and atomic replacement.

use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::error::RepairError;

/// Serialize a notebook the way it is stored on disk: 1-space indent,
/// sorted keys, trailing newline.
pub fn to_notebook_json(value: &Value) -> Result<Vec<u8>, serde_json::Error> {
    let mut buf = Vec::new();
    let formatter = PrettyFormatter::with_indent(b" ");
    let mut ser = Serializer::with_formatter(&mut buf, formatter);
    sorted(value).serialize(&mut ser)?;
    buf.push(b'\n');
    Ok(buf)
}

fn sorted(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), sorted(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(sorted).collect()),
        other => other.clone(),
    }
}

/// Replace `path` with `data` atomically.
///
/// Writes to a temp file in the same directory, then renames over `path`.
pub fn write_atomic(path: &Path, data: &[u8]) -> Result<(), RepairError> {
    let io_err = |source: std::io::Error| RepairError::Io {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir).map_err(io_err)?;
    tmp.write_all(data).map_err(io_err)?;
    tmp.as_file().sync_all().map_err(io_err)?;
    tmp.persist(path).map_err(|e| io_err(e.error))?;
    Ok(())
}

/// Hex SHA-256 of `data`.
pub fn content_digest(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_notebook_json_uses_single_space_indent() {
        let out = to_notebook_json(&json!({"cells": [], "nbformat": 4})).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "{\n \"cells\": [],\n \"nbformat\": 4\n}\n");
    }

    #[test]
    fn test_keys_are_written_in_sorted_order() {
        let value: Value = serde_json::from_str(r#"{"nbformat": 4, "cells": [], "metadata": {}}"#).unwrap();
        let text = String::from_utf8(to_notebook_json(&value).unwrap()).unwrap();
        let cells = text.find("\"cells\"").unwrap();
        let metadata = text.find("\"metadata\"").unwrap();
        let nbformat = text.find("\"nbformat\"").unwrap();
        assert!(cells < metadata && metadata < nbformat);
    }

    #[test]
    fn test_write_atomic_replaces_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nb.ipynb");
        std::fs::write(&path, b"old contents that are longer").unwrap();

        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");

        let entries: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_content_digest_is_stable() {
        let a = content_digest(b"notebook");
        assert_eq!(a, content_digest(b"notebook"));
        assert_ne!(a, content_digest(b"notebook2"));
        assert_eq!(a.len(), 64);
    }
}
