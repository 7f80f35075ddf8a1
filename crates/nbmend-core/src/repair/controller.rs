//! Bounded validate -> repair -> persist loop.
//!
//! Each cycle re-reads the notebook from disk, runs strict validation and,
//! on failure, asks the [`RepairAgent`] for a corrected document. Proposals
//! that parse as JSON are written back even if they still fail the schema;
//! anything else leaves the file untouched. The attempt budget bounds the
//! number of validation cycles, not agent calls.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::agent::RepairAgent;
use crate::error::{RepairError, StrictError};
use crate::notebook::Notebook;
use crate::obs::{
    emit_agent_error, emit_cycle_checked, emit_repair_finished, emit_repair_persisted,
    emit_repair_skipped, emit_repair_started, RepairSpan,
};
use crate::persist::{content_digest, to_notebook_json, write_atomic};
use crate::strict::validate_strict;

pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Bounded repair policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairPolicy {
    /// Total validation cycles, including the first check.
    pub max_retries: u32,

    /// Pause after a failed agent call before the next cycle.
    pub agent_error_backoff: Duration,
}

impl Default for RepairPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            agent_error_backoff: Duration::from_secs(2),
        }
    }
}

/// What a repair cycle did to the notebook.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    /// The proposal parsed as JSON and replaced the file.
    Persisted,
    /// The proposal was not JSON; the file was left as is.
    UnparsableResponse,
    /// The agent call itself failed.
    AgentError,
}

/// One repair cycle in the run timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairAttempt {
    pub attempt: u32,
    /// `decode`, `schema` or `unexpected`.
    pub trigger_kind: String,
    pub diagnostic: String,
    pub response: Option<String>,
    pub outcome: AttemptOutcome,
    pub error: Option<String>,
    pub digest_before: String,
    pub digest_after: String,
}

impl RepairAttempt {
    pub fn mutated_file(&self) -> bool {
        self.digest_before != self.digest_after
    }
}

/// Repair loop final state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairOutcome {
    Recovered,
    Exhausted,
}

/// Full record of one repair run. Returned to the caller, never stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairLog {
    pub run_id: String,
    pub policy: RepairPolicy,
    pub attempts: Vec<RepairAttempt>,
    pub outcome: RepairOutcome,
    pub cycles_used: u32,
    pub final_error: Option<String>,
    pub finished_at: DateTime<Utc>,

    /// The notebook that passed strict validation, when recovered.
    #[serde(skip)]
    pub notebook: Option<Notebook>,
}

impl RepairLog {
    pub fn recovered(&self) -> bool {
        self.outcome == RepairOutcome::Recovered
    }

    /// Number of cycles that called the agent.
    pub fn agent_calls(&self) -> usize {
        self.attempts.len()
    }
}

/// Loop transitions reported to the caller as they happen.
#[derive(Debug, Clone, Copy)]
pub enum CycleEvent<'a> {
    Valid { attempt: u32 },
    Invalid { attempt: u32, error: &'a StrictError },
    Repairing { attempt: u32 },
    Persisted { attempt: u32 },
    Skipped { attempt: u32, outcome: AttemptOutcome },
    Exhausted { attempts: u32 },
}

/// Run the bounded repair loop against the notebook at `path`.
///
/// Only I/O failures on the notebook itself abort the loop; agent failures
/// and unparsable proposals consume an attempt.
pub async fn execute_repair_loop<F>(
    path: &Path,
    agent: &dyn RepairAgent,
    policy: &RepairPolicy,
    mut on_event: F,
) -> Result<RepairLog, RepairError>
where
    F: FnMut(CycleEvent<'_>),
{
    if policy.max_retries == 0 {
        return Err(RepairError::InvalidPolicy(
            "max_retries must be at least 1".to_string(),
        ));
    }

    let run_id = Uuid::new_v4().to_string();
    let _span = RepairSpan::enter(&run_id, path);
    emit_repair_started(&run_id, policy.max_retries);

    let mut attempts: Vec<RepairAttempt> = Vec::new();
    let mut attempt = 1u32;

    loop {
        let bytes = std::fs::read(path).map_err(|source| RepairError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let digest_before = content_digest(&bytes);

        let failure = match validate_strict(&bytes) {
            Ok(notebook) => {
                emit_cycle_checked(attempt, true, None);
                on_event(CycleEvent::Valid { attempt });
                emit_repair_finished(&run_id, attempt, true);
                return Ok(RepairLog {
                    run_id,
                    policy: policy.clone(),
                    attempts,
                    outcome: RepairOutcome::Recovered,
                    cycles_used: attempt,
                    final_error: None,
                    finished_at: Utc::now(),
                    notebook: Some(notebook),
                });
            }
            Err(failure) => failure,
        };

        emit_cycle_checked(attempt, false, Some(failure.kind()));
        on_event(CycleEvent::Invalid {
            attempt,
            error: &failure,
        });

        if attempt >= policy.max_retries {
            on_event(CycleEvent::Exhausted { attempts: attempt });
            emit_repair_finished(&run_id, attempt, false);
            return Ok(RepairLog {
                run_id,
                policy: policy.clone(),
                attempts,
                outcome: RepairOutcome::Exhausted,
                cycles_used: attempt,
                final_error: Some(failure.to_string()),
                finished_at: Utc::now(),
                notebook: None,
            });
        }

        on_event(CycleEvent::Repairing { attempt });
        let raw = String::from_utf8_lossy(&bytes);
        let diagnostic = failure.to_string();

        let (outcome, response, error, digest_after) =
            match agent.propose_fix(&raw, &diagnostic).await {
                Ok(response) => match serde_json::from_str::<Value>(&response) {
                    Ok(value) => {
                        let data = to_notebook_json(&value)?;
                        write_atomic(path, &data)?;
                        let digest_after = content_digest(&data);
                        emit_repair_persisted(attempt, &digest_after);
                        on_event(CycleEvent::Persisted { attempt });
                        (AttemptOutcome::Persisted, Some(response), None, digest_after)
                    }
                    Err(e) => {
                        emit_repair_skipped(attempt, "response is not valid JSON");
                        on_event(CycleEvent::Skipped {
                            attempt,
                            outcome: AttemptOutcome::UnparsableResponse,
                        });
                        (
                            AttemptOutcome::UnparsableResponse,
                            Some(response),
                            Some(e.to_string()),
                            digest_before.clone(),
                        )
                    }
                },
                Err(e) => {
                    emit_agent_error(attempt, &e);
                    tokio::time::sleep(policy.agent_error_backoff).await;
                    on_event(CycleEvent::Skipped {
                        attempt,
                        outcome: AttemptOutcome::AgentError,
                    });
                    (
                        AttemptOutcome::AgentError,
                        None,
                        Some(e.to_string()),
                        digest_before.clone(),
                    )
                }
            };

        attempts.push(RepairAttempt {
            attempt,
            trigger_kind: failure.kind().to_string(),
            diagnostic,
            response,
            outcome,
            error,
            digest_before,
            digest_after,
        });

        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AgentError;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Garbage {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RepairAgent for Garbage {
        async fn propose_fix(&self, _raw: &str, _diag: &str) -> Result<String, AgentError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok("I fixed it for you!".to_string())
        }
    }

    fn fast_policy(max_retries: u32) -> RepairPolicy {
        RepairPolicy {
            max_retries,
            agent_error_backoff: Duration::ZERO,
        }
    }

    #[test]
    fn test_repair_policy_default() {
        let policy = RepairPolicy::default();
        assert_eq!(policy.max_retries, 5);
        assert_eq!(policy.agent_error_backoff, Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_zero_retries_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nb.ipynb");
        std::fs::write(&path, "{}").unwrap();
        let agent = Garbage {
            calls: AtomicUsize::new(0),
        };
        let err = execute_repair_loop(&path, &agent, &fast_policy(0), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, RepairError::InvalidPolicy(_)));
    }

    #[tokio::test]
    async fn test_missing_file_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let agent = Garbage {
            calls: AtomicUsize::new(0),
        };
        let err = execute_repair_loop(
            &dir.path().join("absent.ipynb"),
            &agent,
            &fast_policy(3),
            |_| {},
        )
        .await
        .unwrap_err();
        assert!(matches!(err, RepairError::Io { .. }));
        assert_eq!(agent.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_garbage_agent_exhausts_budget() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nb.ipynb");
        std::fs::write(&path, r#"{"cells": ["#).unwrap();
        let agent = Garbage {
            calls: AtomicUsize::new(0),
        };

        let mut checks = 0;
        let log = execute_repair_loop(&path, &agent, &fast_policy(4), |event| {
            if matches!(event, CycleEvent::Invalid { .. }) {
                checks += 1;
            }
        })
        .await
        .unwrap();

        assert_eq!(log.outcome, RepairOutcome::Exhausted);
        assert_eq!(log.cycles_used, 4);
        assert_eq!(checks, 4);
        assert_eq!(agent.calls.load(Ordering::SeqCst), 3);
        assert!(log
            .attempts
            .iter()
            .all(|a| a.outcome == AttemptOutcome::UnparsableResponse && !a.mutated_file()));
        assert_eq!(std::fs::read(&path).unwrap(), br#"{"cells": ["#);
    }
}
