//! Strict structural validation against the nbformat v4 schema.
//!
//! Returns the closed classification used by the repair loop:
//! decode failure, schema violation, or anything else.

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::error::StrictError;
use crate::loader::parse_json;
use crate::notebook::Notebook;

const NBFORMAT_V4_SCHEMA: &str = include_str!("../schemas/nbformat.v4.schema.json");

/// Validate raw notebook bytes: UTF-8 JSON, nbformat v4 schema, typed decode.
pub fn validate_strict(bytes: &[u8]) -> Result<Notebook, StrictError> {
    let value = parse_json(bytes).map_err(|e| StrictError::Decode(e.to_string()))?;
    check_schema(&value)?;
    Notebook::from_value(&value).map_err(|e| StrictError::Unexpected(e.to_string()))
}

/// Check an already-parsed document against the nbformat v4 schema.
pub fn check_schema(value: &Value) -> Result<(), StrictError> {
    let schema: Value = serde_json::from_str(NBFORMAT_V4_SCHEMA)
        .map_err(|e| StrictError::Unexpected(format!("schema parse error: {e}")))?;
    let compiled = JSONSchema::compile(&schema)
        .map_err(|e| StrictError::Unexpected(format!("schema compile error: {e}")))?;

    let result = compiled.validate(value);
    match result {
        Ok(()) => Ok(()),
        Err(errors) => {
            let msgs: Vec<String> = errors
                .map(|e| {
                    let pointer = e.instance_path.to_string();
                    let at = if pointer.is_empty() { "/" } else { pointer.as_str() };
                    format!("at {at}: {e}")
                })
                .collect();
            Err(StrictError::Schema(msgs.join("; ")))
        }
    }
}
