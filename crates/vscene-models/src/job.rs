//! Job identity, lifecycle state and the polling view.
//!
//! A [`JobRecord`] is an immutable snapshot. Every change produces a new
//! record through [`JobRecord::apply`], which is where the state machine
//! lives:
//!
//! ```text
//! queued -> processing -> completed
//!                      \-> failed
//! ```
//!
//! Terminal records reject further updates and progress never decreases.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::clip::Clip;

/// Unique job identifier, formatted as `YYYYmmddHHMMSS_<8 hex>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new job ID from the current time and a random suffix.
    pub fn new() -> Self {
        let stamp = Utc::now().format("%Y%m%d%H%M%S");
        let suffix = Uuid::new_v4().simple().to_string();
        Self(format!("{}_{}", stamp, &suffix[..8]))
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Coarse job status, as exposed to pollers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Job is registered and waiting for a pipeline slot
    #[default]
    Queued,
    /// Pipeline is running
    Processing,
    /// Job finished and holds its clip list
    Completed,
    /// Job finished with an error
    Failed,
}

impl JobStatus {
    /// Get string representation of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    /// Check if this is a terminal state (no more updates expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Pipeline stage reported while a job is processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Downloading,
    Transcoding,
    Detecting,
    Validating,
    Extracting,
    Finalizing,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Downloading => "downloading",
            Stage::Transcoding => "transcoding",
            Stage::Detecting => "detecting",
            Stage::Validating => "validating",
            Stage::Extracting => "extracting",
            Stage::Finalizing => "finalizing",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Status together with the payload that belongs to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Processing {
        stage: Stage,
        clips_done: u32,
        clips_total: u32,
    },
    Completed {
        scenes: Vec<Clip>,
        #[serde(skip_serializing_if = "Option::is_none")]
        used_threshold: Option<f64>,
    },
    Failed {
        error: String,
        error_kind: String,
    },
}

impl JobState {
    pub fn status(&self) -> JobStatus {
        match self {
            JobState::Queued => JobStatus::Queued,
            JobState::Processing { .. } => JobStatus::Processing,
            JobState::Completed { .. } => JobStatus::Completed,
            JobState::Failed { .. } => JobStatus::Failed,
        }
    }
}

/// A requested change to a job record.
#[derive(Debug, Clone, PartialEq)]
pub enum JobUpdate {
    /// Enter a pipeline stage with the given progress.
    Stage { stage: Stage, progress: u8 },
    /// Clip workers reported completions.
    Clips { done: u32, total: u32, progress: u8 },
    /// Pipeline finished successfully.
    Complete {
        scenes: Vec<Clip>,
        used_threshold: Option<f64>,
    },
    /// Pipeline aborted.
    Fail { kind: String, message: String },
}

/// Rejected state transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("job {job_id} is already {status}")]
    Terminal { job_id: JobId, status: JobStatus },
}

/// Snapshot of a job, stored whole in the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub job_id: JobId,
    pub source_url: String,
    /// Progress percentage (0-100), never decreases
    pub progress: u8,
    pub state: JobState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl JobRecord {
    /// Create a queued record.
    pub fn new(job_id: JobId, source_url: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            job_id,
            source_url: source_url.into(),
            progress: 0,
            state: JobState::Queued,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn status(&self) -> JobStatus {
        self.state.status()
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    /// Produce the record that results from applying `update`.
    pub fn apply(&self, update: JobUpdate) -> Result<JobRecord, TransitionError> {
        if self.is_terminal() {
            return Err(TransitionError::Terminal {
                job_id: self.job_id.clone(),
                status: self.status(),
            });
        }

        let mut next = self.clone();
        next.updated_at = Utc::now();

        match update {
            JobUpdate::Stage { stage, progress } => {
                next.progress = self.advance(progress);
                next.state = JobState::Processing {
                    stage,
                    clips_done: 0,
                    clips_total: 0,
                };
            }
            JobUpdate::Clips {
                done,
                total,
                progress,
            } => {
                next.progress = self.advance(progress);
                next.state = JobState::Processing {
                    stage: Stage::Extracting,
                    clips_done: done,
                    clips_total: total,
                };
            }
            JobUpdate::Complete {
                scenes,
                used_threshold,
            } => {
                next.progress = 100;
                next.state = JobState::Completed {
                    scenes,
                    used_threshold,
                };
            }
            JobUpdate::Fail { kind, message } => {
                next.state = JobState::Failed {
                    error: message,
                    error_kind: kind,
                };
            }
        }

        Ok(next)
    }

    fn advance(&self, progress: u8) -> u8 {
        self.progress.max(progress.min(100))
    }
}

/// Polling payload returned by `GET /status/{job_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobView {
    pub job_id: JobId,
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub state: JobState,
}

impl From<&JobRecord> for JobView {
    fn from(record: &JobRecord) -> Self {
        Self {
            job_id: record.job_id.clone(),
            progress: record.progress,
            created_at: record.created_at,
            updated_at: record.updated_at,
            state: record.state.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> JobRecord {
        JobRecord::new(JobId::from_string("job-1"), "https://example.com/a.mp4")
    }

    #[test]
    fn test_job_id_format() {
        let id = JobId::new();
        let (stamp, suffix) = id.as_str().split_once('_').unwrap();
        assert_eq!(stamp.len(), 14);
        assert!(stamp.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_progress_is_monotonic() {
        let rec = record()
            .apply(JobUpdate::Stage {
                stage: Stage::Detecting,
                progress: 40,
            })
            .unwrap();
        let rec = rec
            .apply(JobUpdate::Stage {
                stage: Stage::Validating,
                progress: 10,
            })
            .unwrap();
        assert_eq!(rec.progress, 40);
        assert_eq!(rec.status(), JobStatus::Processing);
    }

    #[test]
    fn test_complete_sets_full_progress() {
        let rec = record()
            .apply(JobUpdate::Complete {
                scenes: vec![],
                used_threshold: Some(27.0),
            })
            .unwrap();
        assert_eq!(rec.progress, 100);
        assert!(rec.is_terminal());
    }

    #[test]
    fn test_terminal_rejects_updates() {
        let rec = record()
            .apply(JobUpdate::Fail {
                kind: "download_error".into(),
                message: "boom".into(),
            })
            .unwrap();
        let err = rec
            .apply(JobUpdate::Stage {
                stage: Stage::Extracting,
                progress: 50,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            TransitionError::Terminal {
                status: JobStatus::Failed,
                ..
            }
        ));
    }

    #[test]
    fn test_view_is_discriminated_by_status() {
        let rec = record()
            .apply(JobUpdate::Clips {
                done: 1,
                total: 4,
                progress: 55,
            })
            .unwrap();
        let json = serde_json::to_value(JobView::from(&rec)).unwrap();
        assert_eq!(json["status"], "processing");
        assert_eq!(json["progress"], 55);
        assert_eq!(json["stage"], "extracting");
        assert_eq!(json["job_id"], "job-1");

        let failed = rec
            .apply(JobUpdate::Fail {
                kind: "detection_timeout".into(),
                message: "oracle did not become ready".into(),
            })
            .unwrap();
        let json = serde_json::to_value(JobView::from(&failed)).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error_kind"], "detection_timeout");
        assert!(json.get("scenes").is_none());
    }
}
