use serde::Deserialize;
use serde::Serialize;

/// Backend-reported lifecycle of an enrichment job. Terminal once
/// `Complete` or `Error`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    #[default]
    Pending,
    Running,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Error)
    }
}

/// One observation of a job's counters, as returned by the status
/// endpoint and the job list endpoint.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: String,
    pub status: JobStatus,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub processed: u32,
    #[serde(default)]
    pub succeeded: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request body for launching a batch enrichment job.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BatchJobRequest {
    pub targets: Vec<String>,
    pub action: String,
}

/// Response to a batch job launch.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobCreated {
    pub job_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_terminality() {
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Complete.is_terminal());
        assert!(JobStatus::Error.is_terminal());
    }

    #[test]
    fn snapshot_counters_default_to_zero() {
        let snapshot: JobSnapshot =
            serde_json::from_str(r#"{"id":"job-1","status":"running"}"#).unwrap();
        assert_eq!(snapshot.status, JobStatus::Running);
        assert_eq!(snapshot.processed, 0);
        assert_eq!(snapshot.error, None);
    }
}
