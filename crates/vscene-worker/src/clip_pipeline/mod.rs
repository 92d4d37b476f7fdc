//! Clip worker pool: bounded fan-out over validated scenes, fan-in in
//! scene order.

use std::sync::Arc;

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tracing::{debug, warn};
use vscene_models::{Clip, JobUpdate};

use crate::error::{WorkerError, WorkerResult};
use crate::registry::JobRegistry;

pub mod clip;
pub mod tasks;

pub use clip::{process_single_clip, ClipContext, CLIP_MIME_TYPE};
pub use tasks::{generate_clip_tasks, ClipTask};

/// Progress reported when extraction starts.
pub const EXTRACT_PROGRESS_START: u8 = 45;
/// Progress reported once every clip has finished.
pub const EXTRACT_PROGRESS_END: u8 = 99;

/// Outcome of one pool run.
#[derive(Debug)]
pub struct ClipProcessingResults {
    /// Published clips in scene order
    pub clips: Vec<Clip>,
    /// Permanent per-clip failures with their scene index
    pub failures: Vec<(u32, WorkerError)>,
    pub total: usize,
}

impl ClipProcessingResults {
    pub fn failure_ratio(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.failures.len() as f64 / self.total as f64
        }
    }

    /// Fail when the failed share exceeds `max_ratio`.
    ///
    /// The reported error is the failure of the earliest scene.
    pub fn check_tolerance(self, max_ratio: f64) -> WorkerResult<Vec<Clip>> {
        if self.failures.is_empty() || self.failure_ratio() <= max_ratio {
            if !self.failures.is_empty() {
                warn!(
                    failed = self.failures.len(),
                    total = self.total,
                    "Omitting failed clips from the result"
                );
            }
            return Ok(self.clips);
        }

        let failed = self.failures.len();
        let total = self.total;
        let (index, first) = self
            .failures
            .into_iter()
            .min_by_key(|(index, _)| *index)
            .unwrap_or((0, WorkerError::publish("unknown clip failure")));

        let message = format!(
            "{} of {} clips failed; clip {}: {}",
            failed, total, index, first
        );
        Err(match first {
            WorkerError::Publish(_) => WorkerError::publish(message),
            WorkerError::ClipExtraction { retryable, .. } => {
                WorkerError::ClipExtraction { message, retryable }
            }
            other => other,
        })
    }
}

fn extraction_progress(done: usize, total: usize) -> u8 {
    if total == 0 {
        return EXTRACT_PROGRESS_END;
    }
    let span = (EXTRACT_PROGRESS_END - EXTRACT_PROGRESS_START) as usize;
    EXTRACT_PROGRESS_START + (done * span / total) as u8
}

/// Run every task with at most `max_workers` in flight.
///
/// Completions are reported to the registry as they arrive; the result
/// list is re-sorted into scene order before returning.
pub async fn process_clips(
    ctx: Arc<ClipContext>,
    tasks: Vec<ClipTask>,
    max_workers: usize,
    registry: &dyn JobRegistry,
) -> WorkerResult<ClipProcessingResults> {
    let total = tasks.len();
    let permits = Arc::new(Semaphore::new(max_workers.max(1)));

    tokio::fs::create_dir_all(&ctx.clips_dir)
        .await
        .map_err(|e| WorkerError::ClipExtraction {
            message: format!("cannot create clip directory: {}", e),
            retryable: false,
        })?;

    let mut in_flight: FuturesUnordered<_> = tasks
        .into_iter()
        .map(|task| {
            let ctx = Arc::clone(&ctx);
            let permits = Arc::clone(&permits);
            async move {
                let result = match permits.acquire_owned().await {
                    Ok(_permit) => process_single_clip(&ctx, &task).await,
                    Err(_) => Err(WorkerError::publish("clip worker pool closed")),
                };
                (task.index, result)
            }
        })
        .collect();

    let mut clips = Vec::with_capacity(total);
    let mut failures = Vec::new();
    let mut done = 0usize;

    while let Some((index, result)) = in_flight.next().await {
        done += 1;
        match result {
            Ok(clip) => clips.push(clip),
            Err(e) => failures.push((index, e)),
        }

        let update = JobUpdate::Clips {
            done: done as u32,
            total: total as u32,
            progress: extraction_progress(done, total),
        };
        if let Err(e) = registry.update(&ctx.job_id, update).await {
            debug!("Skipping clip progress update: {}", e);
        }
    }

    clips.sort_by_key(|c| c.index);

    Ok(ClipProcessingResults {
        clips,
        failures,
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn results(total: usize, failed: &[u32]) -> ClipProcessingResults {
        ClipProcessingResults {
            clips: vec![],
            failures: failed
                .iter()
                .map(|&i| (i, WorkerError::publish(format!("upload {} failed", i))))
                .collect(),
            total,
        }
    }

    #[test]
    fn test_progress_spans_extraction_range() {
        assert_eq!(extraction_progress(0, 5), 45);
        assert_eq!(extraction_progress(5, 5), 99);
        assert!(extraction_progress(2, 5) < extraction_progress(3, 5));
        assert_eq!(extraction_progress(0, 0), 99);
    }

    #[test]
    fn test_tolerated_failures_are_omitted() {
        assert!(results(5, &[3]).check_tolerance(0.5).is_ok());
        assert!(results(4, &[0, 1]).check_tolerance(0.5).is_ok());
    }

    #[test]
    fn test_too_many_failures_fail_the_job() {
        let err = results(5, &[4, 1, 2]).check_tolerance(0.5).unwrap_err();
        assert_eq!(err.kind(), "publish_error");
        assert!(err.to_string().contains("3 of 5 clips failed; clip 1"));
    }

    #[test]
    fn test_zero_tolerance() {
        assert!(results(5, &[]).check_tolerance(0.0).is_ok());
        assert!(results(5, &[2]).check_tolerance(0.0).is_err());
    }
}
