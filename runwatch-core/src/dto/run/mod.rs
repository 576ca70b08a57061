//! Run DTOs exchanged with the remote run API and the job launcher

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::run::{Run, RunStatus, UnknownStatus};

/// Run as returned by the remote source
///
/// Every field is optional on the wire, and a field holding a value of the
/// wrong shape reads as absent. Conversion into a [`Run`] only fails when a
/// structurally required field is missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    #[serde(default, deserialize_with = "lenient")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    pub error: Option<String>,
    #[serde(default)]
    pub result: Option<serde_json::Value>,
    #[serde(default, alias = "name", deserialize_with = "lenient")]
    pub display_name: Option<String>,
}

/// Reads any JSON value, keeping it only if it has the expected type
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// Reasons a fetched record cannot become a [`Run`]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    #[error("record is missing required field `{0}`")]
    MissingField(&'static str),

    #[error(transparent)]
    InvalidStatus(#[from] UnknownStatus),
}

impl TryFrom<RunRecord> for Run {
    type Error = RecordError;

    fn try_from(record: RunRecord) -> Result<Self, Self::Error> {
        let id = record
            .id
            .filter(|id| !id.trim().is_empty())
            .ok_or(RecordError::MissingField("id"))?;
        let status: RunStatus = record
            .status
            .ok_or(RecordError::MissingField("status"))?
            .parse()?;
        let created_at = record
            .created_at
            .ok_or(RecordError::MissingField("createdAt"))?;

        let display_name = record
            .display_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| id.clone());

        Ok(Run {
            id,
            status,
            created_at,
            updated_at: record.updated_at.unwrap_or(created_at),
            completed_at: record.completed_at,
            error: record.error.filter(|e| !e.trim().is_empty()),
            result: record.result,
            display_name,
        })
    }
}

impl From<Run> for RunRecord {
    fn from(run: Run) -> Self {
        Self {
            id: Some(run.id),
            status: Some(run.status.as_str().to_string()),
            created_at: Some(run.created_at),
            updated_at: Some(run.updated_at),
            completed_at: run.completed_at,
            error: run.error,
            result: run.result,
            display_name: Some(run.display_name),
        }
    }
}

/// Announcement of a freshly launched run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunAnnounced {
    pub id: String,
    pub display_name: String,
    pub initial_status: RunStatus,
}

impl From<RunAnnounced> for Run {
    fn from(announced: RunAnnounced) -> Self {
        Run::provisional(
            announced.id,
            announced.display_name,
            announced.initial_status,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_deserializes_camel_case() {
        let record: RunRecord = serde_json::from_str(
            r#"{
                "id": "job-7",
                "status": "RUNNING",
                "createdAt": "2024-01-01T00:00:00Z",
                "displayName": "nightly export"
            }"#,
        )
        .unwrap();

        let run = Run::try_from(record).unwrap();
        assert_eq!(run.id, "job-7");
        assert_eq!(run.status, RunStatus::Running);
        assert_eq!(run.updated_at, run.created_at);
        assert_eq!(run.display_name, "nightly export");
    }

    #[test]
    fn test_badly_typed_fields_read_as_absent() {
        let page: Vec<RunRecord> = serde_json::from_str(
            r#"[
                {"id": "job-1", "status": "completed", "createdAt": "2024-01-01T00:00:00Z",
                 "completedAt": "2024-01-01T00:05:00Z"},
                {"id": "job-2", "status": "failed", "createdAt": "2024-01-01T00:00:00Z",
                 "completedAt": "not-a-date", "error": {"code": 137}, "displayName": 42}
            ]"#,
        )
        .unwrap();

        assert_eq!(page.len(), 2);
        assert!(page[0].completed_at.is_some());
        assert_eq!(page[1].completed_at, None);
        assert_eq!(page[1].error, None);

        let run = Run::try_from(page[1].clone()).unwrap();
        assert_eq!(run.status, RunStatus::Failed);
        assert_eq!(run.display_name, "job-2");
    }

    #[test]
    fn test_badly_typed_required_field_is_missing() {
        let record: RunRecord =
            serde_json::from_str(r#"{"id": 17, "status": "queued", "createdAt": "yesterday"}"#)
                .unwrap();
        assert_eq!(
            Run::try_from(record),
            Err(RecordError::MissingField("id"))
        );
    }

    #[test]
    fn test_missing_required_fields_are_rejected() {
        let record = RunRecord {
            status: Some("running".to_string()),
            created_at: Some(Utc::now()),
            ..Default::default()
        };
        assert_eq!(
            Run::try_from(record),
            Err(RecordError::MissingField("id"))
        );

        let record = RunRecord {
            id: Some("job-1".to_string()),
            status: Some("running".to_string()),
            ..Default::default()
        };
        assert_eq!(
            Run::try_from(record),
            Err(RecordError::MissingField("createdAt"))
        );
    }

    #[test]
    fn test_unknown_status_is_rejected() {
        let record = RunRecord {
            id: Some("job-1".to_string()),
            status: Some("exploded".to_string()),
            created_at: Some(Utc::now()),
            ..Default::default()
        };
        assert!(matches!(
            Run::try_from(record),
            Err(RecordError::InvalidStatus(_))
        ));
    }

    #[test]
    fn test_optional_fields_are_defaulted() {
        let record = RunRecord {
            id: Some("job-1".to_string()),
            status: Some("failed".to_string()),
            created_at: Some(Utc::now()),
            display_name: Some("   ".to_string()),
            error: Some(String::new()),
            ..Default::default()
        };
        let run = Run::try_from(record).unwrap();
        assert_eq!(run.display_name, "job-1");
        assert_eq!(run.error, None);
    }

    #[test]
    fn test_announcement_becomes_provisional_run() {
        let run: Run = RunAnnounced {
            id: "job-9".to_string(),
            display_name: "backfill".to_string(),
            initial_status: RunStatus::Queued,
        }
        .into();
        assert!(run.is_active());
        assert_eq!(run.completed_at, None);
    }
}
