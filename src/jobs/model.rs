//! Job record and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Status of a generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created and queued, not yet picked up.
    Pending,
    /// The drain loop is advancing it through the chain.
    Processing,
    /// Finished with a result.
    Completed,
    /// Finished with an error.
    Failed,
}

impl JobStatus {
    /// Check if this status allows transitioning to another status.
    /// Terminal states are set exactly once and are immutable thereafter.
    pub fn can_transition_to(&self, target: JobStatus) -> bool {
        use JobStatus::*;

        matches!(
            (self, target),
            (Pending, Processing) | (Processing, Completed) | (Processing, Failed)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// A trackable unit of asynchronous generation work.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    pub id: Uuid,
    /// Identifier of the blueprint record this job populates.
    pub subject_id: String,
    pub status: JobStatus,
    /// Advisory completion percentage; monotonically non-decreasing.
    pub progress: u8,
    /// Human-readable description of the active pipeline stage.
    pub current_step: String,
    /// Present only when FAILED.
    pub error: Option<String>,
    /// Present only when COMPLETED.
    pub result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// When the drain loop picked the job up.
    pub started_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(subject_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            subject_id: subject_id.into(),
            status: JobStatus::Pending,
            progress: 0,
            current_step: "Queued".to_string(),
            error: None,
            result: None,
            created_at: now,
            updated_at: now,
            started_at: None,
        }
    }

    /// Transition to a new status. Terminal states reject all further
    /// transitions.
    pub fn transition_to(&mut self, target: JobStatus) -> Result<(), String> {
        if !self.status.can_transition_to(target) {
            return Err(format!(
                "Cannot transition from {} to {}",
                self.status, target
            ));
        }
        self.status = target;
        self.updated_at = Utc::now();
        if target == JobStatus::Processing && self.started_at.is_none() {
            self.started_at = Some(self.updated_at);
        }
        Ok(())
    }

    /// Record an advisory progress update. Progress never decreases; stale
    /// or out-of-order updates are clamped, and terminal jobs ignore late
    /// events entirely.
    pub fn update_progress(&mut self, percent: u8, step: impl Into<String>) {
        if self.status.is_terminal() {
            return;
        }
        self.progress = self.progress.max(percent.min(100));
        self.current_step = step.into();
        self.updated_at = Utc::now();
    }

    pub fn complete(&mut self, result: Value) -> Result<(), String> {
        self.transition_to(JobStatus::Completed)?;
        self.progress = 100;
        self.current_step = "Completed".to_string();
        self.result = Some(result);
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), String> {
        self.transition_to(JobStatus::Failed)?;
        self.error = Some(message.into());
        self.current_step = "Failed".to_string();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn lifecycle_pending_processing_completed() {
        let mut job = Job::new("bp-1");
        assert_eq!(job.status, JobStatus::Pending);

        job.transition_to(JobStatus::Processing).unwrap();
        job.complete(json!({"summary": "done"})).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.result.is_some());
        assert!(job.error.is_none());
    }

    #[test]
    fn terminal_states_are_immutable() {
        let mut job = Job::new("bp-1");
        job.transition_to(JobStatus::Processing).unwrap();
        job.fail("model call failed").unwrap();

        assert!(job.transition_to(JobStatus::Processing).is_err());
        assert!(job.transition_to(JobStatus::Completed).is_err());
        assert!(job.complete(json!({})).is_err());
    }

    #[test]
    fn cannot_complete_from_pending() {
        let mut job = Job::new("bp-1");
        assert!(job.transition_to(JobStatus::Completed).is_err());
    }

    #[test]
    fn progress_is_monotonic() {
        let mut job = Job::new("bp-1");
        job.transition_to(JobStatus::Processing).unwrap();
        job.update_progress(40, "Agent 2/5");
        job.update_progress(20, "stale update");
        assert_eq!(job.progress, 40);
        job.update_progress(60, "Agent 3/5");
        assert_eq!(job.progress, 60);
    }

    #[test]
    fn late_progress_event_ignored_after_terminal() {
        let mut job = Job::new("bp-1");
        job.transition_to(JobStatus::Processing).unwrap();
        job.fail("budget exceeded").unwrap();
        let frozen_at = job.updated_at;

        job.update_progress(80, "Agent 4/5");
        assert_eq!(job.current_step, "Failed");
        assert_eq!(job.updated_at, frozen_at);
    }

    #[test]
    fn progress_clamps_at_100() {
        let mut job = Job::new("bp-1");
        job.transition_to(JobStatus::Processing).unwrap();
        job.update_progress(250, "overflow");
        assert_eq!(job.progress, 100);
    }

    #[test]
    fn updated_at_moves_on_mutation() {
        let mut job = Job::new("bp-1");
        let created = job.updated_at;
        std::thread::sleep(std::time::Duration::from_millis(5));
        job.update_progress(10, "init");
        assert!(job.updated_at > created);
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_string(&JobStatus::Processing).unwrap(),
            "\"processing\""
        );
    }
}
