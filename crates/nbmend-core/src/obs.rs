//! Structured observability hooks for the repair loop.
//!
//! Events are emitted at `info!` level (warnings for agent failures) inside
//! a run-scoped span, so `RUST_LOG` and `--json` control what is kept.

use std::path::Path;

use tracing::{info, warn};

/// RAII guard that enters a repair-run span for the duration of a run.
pub struct RepairSpan {
    _span: tracing::span::EnteredSpan,
}

impl RepairSpan {
    /// Create and enter a span tagged with the run id and notebook path.
    pub fn enter(run_id: &str, path: &Path) -> Self {
        let span = tracing::info_span!(
            "nbmend.repair",
            run_id = %run_id,
            notebook = %path.display(),
        );
        Self {
            _span: span.entered(),
        }
    }
}

pub fn emit_repair_started(run_id: &str, max_retries: u32) {
    info!(event = "repair.started", run_id = %run_id, max_retries = max_retries);
}

/// Emit event: one strict validation pass finished.
pub fn emit_cycle_checked(attempt: u32, valid: bool, kind: Option<&str>) {
    info!(
        event = "repair.cycle",
        attempt = attempt,
        valid = valid,
        kind = kind.unwrap_or("none"),
    );
}

/// Emit event: the agent's proposal was written to disk.
pub fn emit_repair_persisted(attempt: u32, digest: &str) {
    info!(event = "repair.persisted", attempt = attempt, digest = %digest);
}

/// Emit event: the cycle ended without touching the file.
pub fn emit_repair_skipped(attempt: u32, reason: &str) {
    info!(event = "repair.skipped", attempt = attempt, reason = %reason);
}

/// Emit event: the repair agent call failed (warning level).
pub fn emit_agent_error(attempt: u32, error: &dyn std::fmt::Display) {
    warn!(event = "repair.agent_error", attempt = attempt, error = %error);
}

pub fn emit_repair_finished(run_id: &str, cycles: u32, recovered: bool) {
    info!(
        event = "repair.finished",
        run_id = %run_id,
        cycles = cycles,
        recovered = recovered,
    );
}
