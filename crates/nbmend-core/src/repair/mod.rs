//! Self-healing repair pipeline: strict validation, agent proposal,
//! persistence, re-validation.

pub mod agent;
pub mod controller;
pub mod gemini;

pub use agent::{build_prompt, strip_code_fences, RepairAgent};
pub use controller::{
    execute_repair_loop, AttemptOutcome, CycleEvent, RepairAttempt, RepairLog, RepairOutcome,
    RepairPolicy, DEFAULT_MAX_RETRIES,
};
pub use gemini::{GeminiAgent, GeminiConfig, DEFAULT_GEMINI_BASE_URL, DEFAULT_GEMINI_MODEL};
