//! Error taxonomy for notebook loading, validation and repair.

use std::path::PathBuf;

/// Fixed diagnostic for a document without a usable `cells` array.
pub const MISSING_CELLS_MESSAGE: &str = "Missing or invalid 'cells' list";

/// Errors produced while reading a notebook file into JSON.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The bytes are not UTF-8 encoded JSON.
    #[error("{message}")]
    Decode {
        message: String,
        line: usize,
        column: usize,
    },
}

impl LoadError {
    pub(crate) fn from_json(err: &serde_json::Error) -> Self {
        LoadError::Decode {
            message: err.to_string(),
            line: err.line(),
            column: err.column(),
        }
    }

    pub(crate) fn from_utf8(err: &std::str::Utf8Error) -> Self {
        LoadError::Decode {
            message: format!("invalid UTF-8: {err}"),
            line: 0,
            column: 0,
        }
    }
}

/// Errors produced by the lenient structural check.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StructureError {
    #[error("{}", MISSING_CELLS_MESSAGE)]
    MissingCells,

    #[error("cell {index} is malformed: {reason}")]
    MalformedCell { index: usize, reason: String },
}

/// Closed classification of a strict validation failure.
///
/// The message of each variant is handed verbatim to the repair agent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StrictError {
    #[error("DecodeError: {0}")]
    Decode(String),

    #[error("SchemaError: {0}")]
    Schema(String),

    #[error("UnexpectedError: {0}")]
    Unexpected(String),
}

impl StrictError {
    /// Stable lowercase tag, used in logs and repair records.
    pub fn kind(&self) -> &'static str {
        match self {
            StrictError::Decode(_) => "decode",
            StrictError::Schema(_) => "schema",
            StrictError::Unexpected(_) => "unexpected",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            StrictError::Decode(m) | StrictError::Schema(m) | StrictError::Unexpected(m) => m,
        }
    }
}

/// Failures of the remote repair agent.
#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("network error: {0}")]
    Network(String),

    #[error("service returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for AgentError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            AgentError::InvalidResponse(err.to_string())
        } else {
            AgentError::Network(err.to_string())
        }
    }
}

/// Fatal errors that abort the repair loop.
#[derive(Debug, thiserror::Error)]
pub enum RepairError {
    #[error("invalid repair policy: {0}")]
    InvalidPolicy(String),

    #[error("notebook io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
