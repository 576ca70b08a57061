//! Lifecycle event domain types

use serde::{Deserialize, Serialize};

use crate::domain::run::{Run, RunStatus};

/// Fallback message for runs that failed without reporting an error
pub const UNKNOWN_ERROR: &str = "Unknown error";

/// Lifecycle event delivered to consumers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    /// A run finished successfully
    RunCompleted {
        id: String,
        result: Option<serde_json::Value>,
    },

    /// A run finished with an error
    RunFailed { id: String, error: String },
}

impl RunEvent {
    /// Identifier of the run the event refers to
    pub fn run_id(&self) -> &str {
        match self {
            RunEvent::RunCompleted { id, .. } | RunEvent::RunFailed { id, .. } => id,
        }
    }

    /// Terminal status the event announces
    pub fn status(&self) -> RunStatus {
        match self {
            RunEvent::RunCompleted { .. } => RunStatus::Completed,
            RunEvent::RunFailed { .. } => RunStatus::Failed,
        }
    }
}

/// A run observed moving into a terminal status
///
/// Produced by reconciliation and handed to the notifier, which turns it
/// into at most one [`RunEvent`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub run_id: String,
    pub status: RunStatus,
    pub result: Option<serde_json::Value>,
    pub error: Option<String>,
}

impl Transition {
    /// Builds a transition from a terminal run, `None` for active runs
    pub fn from_run(run: &Run) -> Option<Self> {
        if !run.is_terminal() {
            return None;
        }

        Some(Self {
            run_id: run.id.clone(),
            status: run.status,
            result: run.result.clone(),
            error: run.error.clone(),
        })
    }

    /// Idempotency key: one event per run and terminal status
    pub fn key(&self) -> String {
        transition_key(&self.run_id, self.status)
    }

    /// Converts into the event consumers receive
    pub fn into_event(self) -> RunEvent {
        match self.status {
            RunStatus::Failed => RunEvent::RunFailed {
                id: self.run_id,
                error: self
                    .error
                    .filter(|e| !e.trim().is_empty())
                    .unwrap_or_else(|| UNKNOWN_ERROR.to_string()),
            },
            _ => RunEvent::RunCompleted {
                id: self.run_id,
                result: self.result,
            },
        }
    }
}

/// Formats the idempotency key for a run and status
pub fn transition_key(run_id: &str, status: RunStatus) -> String {
    format!("{}-{}", run_id, status.as_str())
}
