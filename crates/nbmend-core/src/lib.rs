//! nbmend core library
//!
//! Notebook validation (JSON, structure, Python syntax per code cell) and a
//! bounded, LLM-assisted structural repair loop.

pub mod diagnostic;
pub mod error;
pub mod loader;
pub mod notebook;
pub mod obs;
pub mod persist;
pub mod repair;
pub mod report;
pub mod strict;
pub mod syntax;
pub mod telemetry;
pub mod validate;

pub use diagnostic::{caret_line, Diagnostic, ValidationReport};
pub use error::{
    AgentError, LoadError, RepairError, StrictError, StructureError, MISSING_CELLS_MESSAGE,
};
pub use loader::{load_json, parse_json};
pub use notebook::{Cell, CellType, Notebook, Source};
pub use persist::{content_digest, to_notebook_json, write_atomic};
pub use repair::{
    execute_repair_loop, strip_code_fences, AttemptOutcome, CycleEvent, GeminiAgent,
    GeminiConfig, RepairAgent, RepairAttempt, RepairLog, RepairOutcome, RepairPolicy,
    DEFAULT_GEMINI_MODEL, DEFAULT_MAX_RETRIES,
};
pub use strict::validate_strict;
pub use syntax::{check_cells, check_source, SyntaxFault};
pub use telemetry::init_tracing;
pub use validate::{validate_notebook, ValidateError};

/// nbmend version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
