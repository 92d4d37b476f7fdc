use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, info, warn};
use vscene_models::BoundaryCandidate;
use vscene_oracle::{parse_boundaries, scene_prompt, AnalysisOracle, FileRef, FileState};

use super::{BoundaryProvider, Detection, DetectionRequest};
use crate::error::{WorkerError, WorkerResult};

const PROXY_MIME: &str = "video/mp4";

/// Boundary provider backed by a remote analysis oracle.
pub struct RemoteOracleProvider {
    oracle: Arc<dyn AnalysisOracle>,
    poll_interval: Duration,
    wait_ceiling: Duration,
}

impl RemoteOracleProvider {
    pub fn new(
        oracle: Arc<dyn AnalysisOracle>,
        poll_interval: Duration,
        wait_ceiling: Duration,
    ) -> Self {
        Self {
            oracle,
            poll_interval,
            wait_ceiling,
        }
    }

    /// Poll until the uploaded file is usable or the ceiling passes.
    async fn wait_until_active(&self, file: &FileRef) -> WorkerResult<()> {
        let started = Instant::now();
        loop {
            match self.oracle.poll_status(file).await? {
                FileState::Active => return Ok(()),
                FileState::Failed(reason) => {
                    return Err(WorkerError::detection(format!(
                        "oracle could not process {}: {}",
                        file.name, reason
                    )))
                }
                FileState::Pending => {}
            }

            let elapsed = started.elapsed();
            if elapsed >= self.wait_ceiling {
                return Err(WorkerError::DetectionTimeout(self.wait_ceiling.as_secs()));
            }
            let pause = self.poll_interval.min(self.wait_ceiling - elapsed);
            debug!(file = %file.name, "Oracle file still processing, next check in {:?}", pause);
            tokio::time::sleep(pause).await;
        }
    }

    async fn analyze(
        &self,
        file: &FileRef,
        request: &DetectionRequest,
    ) -> WorkerResult<Vec<BoundaryCandidate>> {
        self.wait_until_active(file).await?;

        let prompt = scene_prompt(request.min_scene_secs, request.duration);
        let raw = self.oracle.analyze(file, &prompt).await?;
        let candidates = parse_boundaries(&raw)?;

        if candidates.is_empty() && request.duration > 0.0 {
            info!("Oracle returned no scenes, using the whole source");
            return Ok(vec![BoundaryCandidate::new(0.0, request.duration)]);
        }
        Ok(candidates)
    }
}

/// Deletes the remote file when dropped unless released explicitly.
///
/// Covers the paths where the detection future is dropped mid-flight,
/// such as the job wall clock timeout.
struct RemoteFileGuard {
    oracle: Arc<dyn AnalysisOracle>,
    file: Option<FileRef>,
}

impl RemoteFileGuard {
    fn new(oracle: Arc<dyn AnalysisOracle>, file: FileRef) -> Self {
        Self {
            oracle,
            file: Some(file),
        }
    }

    async fn release(mut self) {
        if let Some(file) = self.file.take() {
            delete_logged(self.oracle.as_ref(), &file).await;
        }
    }
}

impl Drop for RemoteFileGuard {
    fn drop(&mut self) {
        let Some(file) = self.file.take() else {
            return;
        };
        let oracle = Arc::clone(&self.oracle);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    delete_logged(oracle.as_ref(), &file).await;
                });
            }
            Err(_) => warn!(file = %file.name, "No runtime to delete oracle file"),
        }
    }
}

async fn delete_logged(oracle: &dyn AnalysisOracle, file: &FileRef) {
    match oracle.delete(file).await {
        Ok(()) => debug!(file = %file.name, "Deleted oracle file"),
        Err(e) => warn!(file = %file.name, "Failed to delete oracle file: {}", e),
    }
}

#[async_trait]
impl BoundaryProvider for RemoteOracleProvider {
    fn name(&self) -> &'static str {
        "oracle"
    }

    async fn detect(&self, proxy: &Path, request: &DetectionRequest) -> WorkerResult<Detection> {
        let file = self.oracle.upload(proxy, PROXY_MIME).await?;
        info!(file = %file.name, "Uploaded proxy to oracle");

        let guard = RemoteFileGuard::new(Arc::clone(&self.oracle), file.clone());
        let result = self.analyze(&file, request).await;
        guard.release().await;

        let candidates = result?;
        info!(scenes = candidates.len(), "Oracle detection finished");
        Ok(Detection {
            candidates,
            used_threshold: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use vscene_models::ThresholdSpec;
    use vscene_oracle::{OracleError, OracleResult};

    /// Oracle that stays pending for `pending_polls` checks.
    struct ScriptedOracle {
        pending_polls: usize,
        answer: String,
        polls: AtomicUsize,
        deletes: AtomicUsize,
    }

    impl ScriptedOracle {
        fn new(pending_polls: usize, answer: &str) -> Self {
            Self {
                pending_polls,
                answer: answer.to_string(),
                polls: AtomicUsize::new(0),
                deletes: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl AnalysisOracle for ScriptedOracle {
        async fn upload(&self, _: &Path, mime_type: &str) -> OracleResult<FileRef> {
            Ok(FileRef {
                name: "files/abc".to_string(),
                uri: "https://oracle.test/files/abc".to_string(),
                mime_type: mime_type.to_string(),
            })
        }

        async fn poll_status(&self, _: &FileRef) -> OracleResult<FileState> {
            let n = self.polls.fetch_add(1, Ordering::SeqCst);
            if n < self.pending_polls {
                Ok(FileState::Pending)
            } else {
                Ok(FileState::Active)
            }
        }

        async fn analyze(&self, _: &FileRef, _: &str) -> OracleResult<String> {
            if self.answer.is_empty() {
                return Err(OracleError::Api {
                    status: 500,
                    message: "internal".to_string(),
                });
            }
            Ok(self.answer.clone())
        }

        async fn delete(&self, _: &FileRef) -> OracleResult<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn request() -> DetectionRequest {
        DetectionRequest {
            threshold: ThresholdSpec::Auto,
            min_scene_secs: 3.0,
            duration: 60.0,
            fps: 10.0,
        }
    }

    fn provider(oracle: Arc<ScriptedOracle>, ceiling_ms: u64) -> RemoteOracleProvider {
        RemoteOracleProvider::new(
            oracle,
            Duration::from_millis(10),
            Duration::from_millis(ceiling_ms),
        )
    }

    #[tokio::test]
    async fn test_parses_wrapped_answer_and_cleans_up() {
        let answer = concat!(
            "Here you go:\n```json\n",
            r#"[{"start": 0, "end": 12.5, "title": "Intro"}, {"start": "00:00:12.500", "end": 60}]"#,
            "\n```"
        );
        let oracle = Arc::new(ScriptedOracle::new(2, answer));

        let detection = provider(Arc::clone(&oracle), 1_000)
            .detect(Path::new("proxy.mp4"), &request())
            .await
            .unwrap();

        assert_eq!(detection.candidates.len(), 2);
        assert_eq!(detection.candidates[0].title.as_deref(), Some("Intro"));
        assert_eq!(detection.candidates[1].start, 12.5);
        assert_eq!(detection.used_threshold, None);
        assert_eq!(oracle.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_wait_ceiling_times_out() {
        let oracle = Arc::new(ScriptedOracle::new(usize::MAX, "[]"));
        let started = Instant::now();

        let err = provider(Arc::clone(&oracle), 50)
            .detect(Path::new("proxy.mp4"), &request())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "detection_timeout");
        // Ceiling plus one polling interval, with scheduling slack
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(oracle.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_analysis_failure_still_deletes() {
        let oracle = Arc::new(ScriptedOracle::new(0, ""));

        let err = provider(Arc::clone(&oracle), 1_000)
            .detect(Path::new("proxy.mp4"), &request())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "detection_error");
        assert_eq!(oracle.deletes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparseable_answer_is_detection_error() {
        let oracle = Arc::new(ScriptedOracle::new(0, "I could not find any scenes, sorry."));

        let err = provider(oracle, 1_000)
            .detect(Path::new("proxy.mp4"), &request())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "detection_error");
    }

    #[tokio::test]
    async fn test_empty_answer_is_one_scene() {
        let oracle = Arc::new(ScriptedOracle::new(0, "[]"));

        let detection = provider(oracle, 1_000)
            .detect(Path::new("proxy.mp4"), &request())
            .await
            .unwrap();

        assert_eq!(detection.candidates, vec![BoundaryCandidate::new(0.0, 60.0)]);
    }

    #[tokio::test]
    async fn test_dropped_detection_deletes_file() {
        let oracle = Arc::new(ScriptedOracle::new(usize::MAX, "[]"));
        let provider = RemoteOracleProvider::new(
            Arc::clone(&oracle) as Arc<dyn AnalysisOracle>,
            Duration::from_millis(10),
            Duration::from_secs(60),
        );

        let outcome = tokio::time::timeout(
            Duration::from_millis(40),
            provider.detect(Path::new("proxy.mp4"), &request()),
        )
        .await;
        assert!(outcome.is_err());

        // Let the spawned delete run
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(oracle.deletes.load(Ordering::SeqCst), 1);
    }
}
