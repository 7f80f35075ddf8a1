//! Document loader: path -> UTF-8 -> JSON.

use std::path::Path;

use serde_json::Value;

use crate::error::LoadError;

/// Read `path` and parse it as UTF-8 JSON.
pub fn load_json(path: &Path) -> Result<Value, LoadError> {
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_json(&bytes)
}

/// Parse already-read bytes as UTF-8 JSON.
pub fn parse_json(bytes: &[u8]) -> Result<Value, LoadError> {
    let text = std::str::from_utf8(bytes).map_err(|e| LoadError::from_utf8(&e))?;
    serde_json::from_str(text).map_err(|e| LoadError::from_json(&e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_valid_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nb.ipynb");
        std::fs::write(&path, r#"{"cells": []}"#).unwrap();

        let value = load_json(&path).unwrap();
        assert!(value["cells"].is_array());
    }

    #[test]
    fn test_truncated_json_is_decode_error() {
        match parse_json(br#"{"cells": ["#) {
            Err(LoadError::Decode { line, column, .. }) => {
                assert_eq!(line, 1);
                assert!(column > 0);
            }
            other => panic!("expected Decode, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_utf8_is_decode_error() {
        assert!(matches!(
            parse_json(&[0x7b, 0xff, 0xfe, 0x7d]),
            Err(LoadError::Decode { .. })
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_json(&dir.path().join("absent.ipynb")).unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
