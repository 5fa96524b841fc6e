//! Job queue types for asynchronous route optimization

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::route::OptimizationResult;

/// Monotone job state. Once `Done` or `Failed`, a job never transitions again.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Done { result: OptimizationResult },
    Failed { reason: String },
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Done { .. } | JobState::Failed { .. })
    }
}

/// A submitted optimization job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: Uuid,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Job {
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            state: JobState::Queued,
            created_at: Utc::now(),
            completed_at: None,
        }
    }
}

/// Wire projection of a submitted job, returned from `vrptw.routes.optimize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmitResponse {
    pub job_id: Uuid,
    pub status: &'static str,
}

/// Wire projection of a job's current state, returned from `vrptw.routes.status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub status: String,
    pub result: Option<OptimizationResult>,
    pub reason: Option<String>,
}

impl From<&Job> for JobStatusResponse {
    fn from(job: &Job) -> Self {
        match &job.state {
            JobState::Queued => Self { status: "queued".into(), result: None, reason: None },
            JobState::Running => Self { status: "running".into(), result: None, reason: None },
            JobState::Done { result } => Self {
                status: "done".into(),
                result: Some(result.clone()),
                reason: None,
            },
            JobState::Failed { reason } => Self {
                status: "failed".into(),
                result: None,
                reason: Some(reason.clone()),
            },
        }
    }
}
