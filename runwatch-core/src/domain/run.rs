//! Run domain model
//!
//! Represents one execution of a remote job as tracked by the client.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;

/// A tracked remote job execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Run {
    /// Stable identifier, primary key in the store
    pub id: String,

    /// Current lifecycle status
    pub status: RunStatus,

    /// When the run was created
    pub created_at: DateTime<Utc>,

    /// Last time the remote source touched the record
    pub updated_at: DateTime<Utc>,

    /// When the run reached a terminal status
    pub completed_at: Option<DateTime<Utc>>,

    /// Error reported by the remote source
    pub error: Option<String>,

    /// Opaque result payload, never interpreted by the engine
    pub result: Option<serde_json::Value>,

    /// Free-form label, may be provisional before the remote record exists
    pub display_name: String,
}

impl Run {
    /// Creates a run announced locally, before the remote source has it
    pub fn provisional(
        id: impl Into<String>,
        display_name: impl Into<String>,
        status: RunStatus,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            status,
            created_at: now,
            updated_at: now,
            completed_at: None,
            error: None,
            result: None,
            display_name: display_name.into(),
        }
    }

    /// Returns true while the run is in flight
    pub fn is_active(&self) -> bool {
        self.status.is_active()
    }

    /// Returns true once the run has completed or failed
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Wall-clock duration of a finished run
    pub fn duration(&self) -> Option<Duration> {
        self.completed_at.map(|done| done - self.created_at)
    }

    /// Enforces the completion timestamp invariants of a terminal run.
    ///
    /// A terminal run always carries `completed_at`, falling back to
    /// `updated_at` when the remote omitted it. If the resulting timestamp is
    /// not strictly after `created_at`, it is moved to `created_at + epsilon`.
    /// Non-terminal runs are left untouched.
    pub fn normalize_completion(&mut self, epsilon: Duration) {
        if !self.is_terminal() {
            return;
        }

        let completed_at = self.completed_at.unwrap_or(self.updated_at);
        self.completed_at = if completed_at <= self.created_at {
            Some(self.created_at + epsilon)
        } else {
            Some(completed_at)
        };
    }
}

/// Run lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RunStatus {
    Pending,
    Queued,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    /// Pending, queued and running runs belong to the active set
    pub fn is_active(self) -> bool {
        matches!(
            self,
            RunStatus::Pending | RunStatus::Queued | RunStatus::Running
        )
    }

    /// Completed and failed runs are terminal
    pub fn is_terminal(self) -> bool {
        !self.is_active()
    }

    /// Lowercase name used in idempotency keys and logs
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Pending => "pending",
            RunStatus::Queued => "queued",
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Pending => write!(f, "Pending"),
            RunStatus::Queued => write!(f, "Queued"),
            RunStatus::Running => write!(f, "Running"),
            RunStatus::Completed => write!(f, "Completed"),
            RunStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// Error returned when a status string names no known status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown run status: {0:?}")]
pub struct UnknownStatus(pub String);

impl FromStr for RunStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(RunStatus::Pending),
            "queued" => Ok(RunStatus::Queued),
            "running" => Ok(RunStatus::Running),
            "completed" | "succeeded" | "success" => Ok(RunStatus::Completed),
            "failed" | "error" => Ok(RunStatus::Failed),
            _ => Err(UnknownStatus(s.to_string())),
        }
    }
}

impl<'de> Deserialize<'de> for RunStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
