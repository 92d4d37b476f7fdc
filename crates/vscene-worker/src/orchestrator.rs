//! Pipeline orchestrator.
//!
//! `submit` registers a queued job and spawns its driver task, returning
//! before any stage runs. The driver waits for a global job permit, then
//! walks the stages in order under the job wall clock limit. Every failure
//! ends in the registry as a `failed` record; nothing escapes the task.

use std::any::Any;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{error, info, warn, Instrument};
use vscene_media::{
    FfmpegToolkit, FractionCallback, HttpFetcher, MediaError, MediaToolkit, ProxySpec,
    SourceFetcher,
};
use vscene_models::{
    Clip, ExportMode, JobId, JobRecord, JobUpdate, JobView, SplitOptions, SplitRequest, Stage,
};
use vscene_oracle::GeminiOracle;
use vscene_storage::{store_from_env, ArtifactStore};

use crate::boundary::{
    validate_boundaries, BoundaryProvider, BoundaryRules, DetectionRequest, LocalContentProvider,
    RemoteOracleProvider,
};
use crate::clip_pipeline::{
    generate_clip_tasks, process_clips, ClipContext, EXTRACT_PROGRESS_START,
};
use crate::config::{ProviderKind, WorkerConfig};
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::registry::JobRegistry;
use crate::retry::RetryConfig;

const TRANSCODE_PROGRESS: u8 = 10;
const DETECT_PROGRESS: u8 = 20;
const VALIDATE_PROGRESS: u8 = 40;
const FINALIZE_PROGRESS: u8 = 99;

/// Collaborators shared by every job.
#[derive(Clone)]
pub struct PipelineContext {
    pub toolkit: Arc<dyn MediaToolkit>,
    pub fetcher: Arc<dyn SourceFetcher>,
    pub store: Arc<dyn ArtifactStore>,
    pub provider: Arc<dyn BoundaryProvider>,
}

impl PipelineContext {
    /// Production wiring: FFmpeg, HTTP fetcher, R2 or local store, and the
    /// configured boundary provider.
    pub fn from_config(config: &WorkerConfig) -> WorkerResult<Self> {
        let toolkit: Arc<dyn MediaToolkit> = Arc::new(FfmpegToolkit::new());

        let fetcher = HttpFetcher::new(config.max_source_bytes)
            .map_err(|e| WorkerError::config_error(e.to_string()))?
            .with_retry(config.clip_max_attempts, config.retry_base_delay);

        let store: Arc<dyn ArtifactStore> =
            Arc::from(store_from_env().map_err(|e| WorkerError::config_error(e.to_string()))?);

        let provider: Arc<dyn BoundaryProvider> = match config.provider {
            ProviderKind::Local => Arc::new(LocalContentProvider::new(Arc::clone(&toolkit))),
            ProviderKind::Oracle => {
                let oracle =
                    GeminiOracle::from_env().map_err(|e| WorkerError::config_error(e.to_string()))?;
                Arc::new(RemoteOracleProvider::new(
                    Arc::new(oracle),
                    config.oracle_poll_interval,
                    config.oracle_wait_ceiling,
                ))
            }
        };

        Ok(Self {
            toolkit,
            fetcher: Arc::new(fetcher),
            store,
            provider,
        })
    }
}

fn record_stage(stage: Stage, started: Instant) {
    metrics::record_stage_duration(stage.as_str(), started.elapsed().as_secs_f64());
}

/// Write the terminal record for a job.
async fn record_outcome(
    registry: &dyn JobRegistry,
    job_id: &JobId,
    result: WorkerResult<PipelineOutcome>,
    elapsed: f64,
) {
    let update = match result {
        Ok(outcome) => {
            metrics::record_job_completed(elapsed);
            JobUpdate::Complete {
                scenes: outcome.clips,
                used_threshold: outcome.used_threshold,
            }
        }
        Err(e) => {
            metrics::record_job_failed(e.kind(), elapsed);
            JobUpdate::Fail {
                kind: e.kind().to_string(),
                message: e.to_string(),
            }
        }
    };

    if let Err(e) = registry.update(job_id, update).await {
        error!(job_id = %job_id, "Failed to record job outcome: {}", e);
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("job worker panicked: {}", msg)
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("job worker panicked: {}", msg)
    } else {
        "job worker panicked".to_string()
    }
}

/// Successful pipeline output.
struct PipelineOutcome {
    clips: Vec<Clip>,
    used_threshold: Option<f64>,
}

/// Entry point for job submission and polling.
pub struct Orchestrator {
    config: Arc<WorkerConfig>,
    registry: Arc<dyn JobRegistry>,
    ctx: PipelineContext,
    job_semaphore: Arc<Semaphore>,
    running: Arc<AtomicUsize>,
}

impl Orchestrator {
    pub fn new(config: WorkerConfig, registry: Arc<dyn JobRegistry>, ctx: PipelineContext) -> Self {
        let job_semaphore = Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1)));
        Self {
            config: Arc::new(config),
            registry,
            ctx,
            job_semaphore,
            running: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn registry(&self) -> Arc<dyn JobRegistry> {
        Arc::clone(&self.registry)
    }

    /// Jobs currently holding a job permit.
    pub fn running_jobs(&self) -> usize {
        self.running.load(Ordering::Relaxed)
    }

    /// Validate `request`, register a queued job and start it in the
    /// background. Invalid requests never create a job.
    pub async fn submit(&self, request: SplitRequest) -> WorkerResult<JobView> {
        let options = request
            .into_options()
            .map_err(|e| WorkerError::validation(e.to_string()))?;
        self.submit_options(options).await
    }

    pub async fn submit_options(&self, options: SplitOptions) -> WorkerResult<JobView> {
        let job_id = JobId::new();
        let record = JobRecord::new(job_id.clone(), options.source_url.clone());
        let view = JobView::from(&record);
        self.registry.insert(record).await?;
        metrics::record_job_submitted();

        info!(
            job_id = %job_id,
            mode = %options.mode,
            min_scene_ms = options.min_scene_ms,
            "Job queued"
        );

        let driver = JobDriver {
            job_id,
            options,
            config: Arc::clone(&self.config),
            registry: Arc::clone(&self.registry),
            ctx: self.ctx.clone(),
        };
        let semaphore = Arc::clone(&self.job_semaphore);
        let running = Arc::clone(&self.running);

        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    driver
                        .finish(Err(WorkerError::config_error("job scheduler is shut down")), 0.0)
                        .await;
                    return;
                }
            };
            let job_id = driver.job_id.clone();
            let registry = Arc::clone(&driver.registry);
            let started = Instant::now();

            metrics::set_jobs_running(running.fetch_add(1, Ordering::Relaxed) + 1);
            // A panicking stage surfaces here as a JoinError
            let joined = tokio::spawn(driver.run()).await;
            metrics::set_jobs_running(running.fetch_sub(1, Ordering::Relaxed).saturating_sub(1));

            if let Err(e) = joined {
                let err = WorkerError::Internal(if e.is_panic() {
                    panic_message(e.into_panic())
                } else {
                    "job task was cancelled".to_string()
                });
                error!(job_id = %job_id, "Job driver aborted: {}", err);
                record_outcome(
                    registry.as_ref(),
                    &job_id,
                    Err(err),
                    started.elapsed().as_secs_f64(),
                )
                .await;
            }
        });

        Ok(view)
    }

    /// Current view of a job, or `None` for unknown or evicted ids.
    pub async fn poll(&self, job_id: &JobId) -> Option<JobView> {
        self.registry
            .get(job_id)
            .await
            .map(|record| JobView::from(record.as_ref()))
    }
}

/// Drives one job from its permit to a terminal record.
struct JobDriver {
    job_id: JobId,
    options: SplitOptions,
    config: Arc<WorkerConfig>,
    registry: Arc<dyn JobRegistry>,
    ctx: PipelineContext,
}

impl JobDriver {
    async fn run(self) {
        let logger = JobLogger::new(&self.job_id, "scene_split");
        let span = logger.create_span();

        async {
            logger.log_start(&self.options.source_url);
            let started = Instant::now();
            let limit = self.config.job_timeout;

            let result = match tokio::time::timeout(limit, self.run_pipeline(&logger)).await {
                Ok(result) => result,
                Err(_) => Err(WorkerError::Timeout(limit.as_secs())),
            };

            match &result {
                Ok(outcome) => logger.log_completion(&format!("{} clips", outcome.clips.len())),
                Err(e) => logger.log_error(&format!("{} ({})", e, e.kind())),
            }
            self.finish(result, started.elapsed().as_secs_f64()).await;
        }
        .instrument(span)
        .await
    }

    async fn finish(&self, result: WorkerResult<PipelineOutcome>, elapsed: f64) {
        record_outcome(self.registry.as_ref(), &self.job_id, result, elapsed).await;
    }

    async fn enter(&self, logger: &JobLogger, stage: Stage, progress: u8) {
        logger.log_stage(stage, progress);
        if let Err(e) = self
            .registry
            .update(&self.job_id, JobUpdate::Stage { stage, progress })
            .await
        {
            warn!(job_id = %self.job_id, "Failed to record stage {}: {}", stage, e);
        }
    }

    async fn run_pipeline(&self, logger: &JobLogger) -> WorkerResult<PipelineOutcome> {
        tokio::fs::create_dir_all(&self.config.work_dir)
            .await
            .map_err(|e| WorkerError::config_error(format!("work dir unavailable: {}", e)))?;
        let scratch = tempfile::Builder::new()
            .prefix(&format!("{}-", self.job_id))
            .tempdir_in(&self.config.work_dir)
            .map_err(|e| WorkerError::config_error(format!("cannot create scratch dir: {}", e)))?;
        let work = scratch.path();

        // Download and validate
        self.enter(logger, Stage::Downloading, 0).await;
        let stage_started = Instant::now();
        let source = work.join("source.mp4");
        let bytes = self
            .ctx
            .fetcher
            .fetch(&self.options.source_url, &source)
            .await
            .map_err(|e| WorkerError::download(e.detail()))?;
        let info = self.ctx.toolkit.probe(&source).await.map_err(|e| {
            WorkerError::download(format!(
                "downloaded file is not a readable video: {}",
                e.detail()
            ))
        })?;
        record_stage(Stage::Downloading, stage_started);
        logger.log_progress(&format!(
            "source {} bytes, {:.1}s, {}x{}",
            bytes, info.duration, info.width, info.height
        ));

        // Analysis proxy
        self.enter(logger, Stage::Transcoding, TRANSCODE_PROGRESS).await;
        let stage_started = Instant::now();
        let proxy = work.join("proxy.mp4");
        self.transcode_proxy(&source, &proxy, info.duration).await?;
        record_stage(Stage::Transcoding, stage_started);

        // Boundary detection
        self.enter(logger, Stage::Detecting, DETECT_PROGRESS).await;
        let stage_started = Instant::now();
        let request = DetectionRequest {
            threshold: self.options.threshold,
            min_scene_secs: self.options.min_scene_secs(),
            duration: info.duration,
            fps: self.config.proxy_fps,
        };
        let detection = self.ctx.provider.detect(&proxy, &request).await?;
        record_stage(Stage::Detecting, stage_started);
        logger.log_progress(&format!(
            "{} provider returned {} candidates",
            self.ctx.provider.name(),
            detection.candidates.len()
        ));

        // Validation
        self.enter(logger, Stage::Validating, VALIDATE_PROGRESS).await;
        let scenes = validate_boundaries(
            detection.candidates,
            &BoundaryRules {
                min_scene_secs: self.options.min_scene_secs(),
                trim_start: self.config.trim_start.as_secs_f64(),
                trim_end: self.config.trim_end.as_secs_f64(),
                duration: info.duration,
            },
        );

        let keyframes = match self.options.mode {
            ExportMode::Fast => match self.ctx.toolkit.keyframes(&source).await {
                Ok(keyframes) => keyframes,
                Err(e) => {
                    logger.log_warning(&format!(
                        "keyframe listing failed, using requested times: {}",
                        e
                    ));
                    Vec::new()
                }
            },
            ExportMode::Precise => Vec::new(),
        };
        let tasks = generate_clip_tasks(&scenes, self.options.mode, &keyframes);

        // Clip extraction
        self.enter(logger, Stage::Extracting, EXTRACT_PROGRESS_START).await;
        let stage_started = Instant::now();
        let clip_ctx = Arc::new(ClipContext {
            job_id: self.job_id.clone(),
            toolkit: Arc::clone(&self.ctx.toolkit),
            store: Arc::clone(&self.ctx.store),
            source: source.clone(),
            clips_dir: work.join("clips"),
            mode: self.options.mode,
            include_audio: self.options.include_audio,
            storage_prefix: self.config.storage_prefix.clone(),
            retry: RetryConfig::new("clip")
                .with_max_attempts(self.config.clip_max_attempts)
                .with_base_delay(self.config.retry_base_delay)
                .with_max_delay(self.config.retry_max_delay),
        });
        let results = process_clips(
            clip_ctx,
            tasks,
            self.config.max_clip_workers,
            self.registry.as_ref(),
        )
        .await?;
        record_stage(Stage::Extracting, stage_started);
        let clips = results.check_tolerance(self.config.max_clip_failure_ratio)?;

        self.enter(logger, Stage::Finalizing, FINALIZE_PROGRESS).await;
        Ok(PipelineOutcome {
            clips,
            used_threshold: detection.used_threshold,
        })
    }

    /// Transcode the proxy, mapping encoder progress onto 10..20.
    async fn transcode_proxy(
        &self,
        source: &Path,
        proxy: &Path,
        duration: f64,
    ) -> WorkerResult<()> {
        let spec = ProxySpec {
            height: self.config.proxy_height,
            fps: self.config.proxy_fps,
            include_audio: false,
        };

        let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel::<f64>();
        let on_progress: FractionCallback = Box::new(move |fraction| {
            let _ = tx.send(fraction);
        });

        let transcode = self
            .ctx
            .toolkit
            .transcode_proxy(source, proxy, &spec, duration, on_progress);
        tokio::pin!(transcode);

        let result = loop {
            tokio::select! {
                result = &mut transcode => break result,
                Some(fraction) = rx.recv() => {
                    let span = (DETECT_PROGRESS - TRANSCODE_PROGRESS) as f64;
                    let progress = TRANSCODE_PROGRESS + (fraction.clamp(0.0, 1.0) * span) as u8;
                    let update = JobUpdate::Stage { stage: Stage::Transcoding, progress };
                    let _ = self.registry.update(&self.job_id, update).await;
                }
            }
        };

        result.map_err(|e| match e {
            MediaError::Timeout(secs) => {
                WorkerError::transcode(format!("proxy transcode timed out after {}s", secs))
            }
            other => WorkerError::transcode(other.detail()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::Duration;

    use async_trait::async_trait;
    use vscene_media::{ContentScores, MediaResult, SegmentSpec, VideoInfo};
    use vscene_models::{BoundaryCandidate, JobState, JobStatus};
    use vscene_oracle::{AnalysisOracle, FileRef, FileState, OracleResult};
    use vscene_storage::{LocalStore, StorageError, StorageResult, StoredObject};

    use crate::boundary::{Detection, MockBoundaryProvider};
    use crate::registry::InMemoryJobRegistry;

    const SOURCE_SECS: f64 = 60.0;

    struct StubFetcher;

    #[async_trait]
    impl SourceFetcher for StubFetcher {
        async fn fetch(&self, url: &str, dest: &Path) -> MediaResult<u64> {
            if url.contains("huge") {
                return Err(MediaError::SourceTooLarge { limit: 1024 });
            }
            tokio::fs::write(dest, b"source").await?;
            Ok(6)
        }
    }

    /// Clip files hold their own duration so probing them is meaningful.
    struct StubToolkit {
        keyframe_step: f64,
        transcode_delay: Duration,
    }

    impl Default for StubToolkit {
        fn default() -> Self {
            Self {
                keyframe_step: 1.0,
                transcode_delay: Duration::ZERO,
            }
        }
    }

    #[async_trait]
    impl MediaToolkit for StubToolkit {
        async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
            let body = tokio::fs::read_to_string(path).await?;
            Ok(VideoInfo {
                duration: body.trim().parse().unwrap_or(SOURCE_SECS),
                width: 1280,
                height: 720,
                fps: 30.0,
                codec: "h264".to_string(),
                size: body.len() as u64,
                has_audio: true,
            })
        }

        async fn keyframes(&self, _: &Path) -> MediaResult<Vec<f64>> {
            let count = (SOURCE_SECS / self.keyframe_step) as usize;
            Ok((0..=count).map(|k| k as f64 * self.keyframe_step).collect())
        }

        async fn transcode_proxy(
            &self,
            _: &Path,
            output: &Path,
            _: &ProxySpec,
            _: f64,
            on_progress: FractionCallback,
        ) -> MediaResult<()> {
            tokio::time::sleep(self.transcode_delay).await;
            on_progress(0.5);
            on_progress(1.0);
            tokio::fs::write(output, b"proxy").await?;
            Ok(())
        }

        async fn export_segment(
            &self,
            _: &Path,
            output: &Path,
            spec: &SegmentSpec,
        ) -> MediaResult<u64> {
            let body = format!("{:.3}", spec.duration());
            tokio::fs::write(output, &body).await?;
            Ok(body.len() as u64)
        }

        async fn content_scores(&self, _: &Path, fps: f64) -> MediaResult<ContentScores> {
            Ok(ContentScores {
                scores: vec![],
                fps,
            })
        }
    }

    /// Local store whose uploads for the given sequences always fail.
    struct FlakyStore {
        inner: LocalStore,
        failing: HashSet<String>,
    }

    #[async_trait]
    impl ArtifactStore for FlakyStore {
        async fn put(
            &self,
            key: &str,
            path: &Path,
            content_type: &str,
        ) -> StorageResult<StoredObject> {
            if self.failing.iter().any(|suffix| key.ends_with(suffix.as_str())) {
                return Err(StorageError::upload_failed("503 Service Unavailable"));
            }
            self.inner.put(key, path, content_type).await
        }

        fn public_url(&self, key: &str) -> String {
            self.inner.public_url(key)
        }

        fn provider(&self) -> &'static str {
            self.inner.provider()
        }
    }

    struct PendingOracle;

    #[async_trait]
    impl AnalysisOracle for PendingOracle {
        async fn upload(&self, _: &Path, mime_type: &str) -> OracleResult<FileRef> {
            Ok(FileRef {
                name: "files/pending".to_string(),
                uri: "https://oracle.test/files/pending".to_string(),
                mime_type: mime_type.to_string(),
            })
        }

        async fn poll_status(&self, _: &FileRef) -> OracleResult<FileState> {
            Ok(FileState::Pending)
        }

        async fn analyze(&self, _: &FileRef, _: &str) -> OracleResult<String> {
            Ok("[]".to_string())
        }

        async fn delete(&self, _: &FileRef) -> OracleResult<()> {
            Ok(())
        }
    }

    fn mock_provider(spans: &[(f64, f64)], threshold: Option<f64>) -> Arc<dyn BoundaryProvider> {
        let candidates: Vec<BoundaryCandidate> = spans
            .iter()
            .map(|&(start, end)| BoundaryCandidate::new(start, end))
            .collect();

        let mut provider = MockBoundaryProvider::new();
        provider.expect_name().return_const("mock");
        provider.expect_detect().returning(move |_, _| {
            Ok(Detection {
                candidates: candidates.clone(),
                used_threshold: threshold,
            })
        });
        Arc::new(provider)
    }

    struct Harness {
        orchestrator: Orchestrator,
        _dirs: (tempfile::TempDir, tempfile::TempDir),
    }

    fn harness(
        provider: Arc<dyn BoundaryProvider>,
        toolkit: StubToolkit,
        failing: &[&str],
        tweak: impl FnOnce(&mut WorkerConfig),
    ) -> Harness {
        let work = tempfile::tempdir().unwrap();
        let store_dir = tempfile::tempdir().unwrap();

        let mut config = WorkerConfig {
            work_dir: work.path().to_string_lossy().into_owned(),
            retry_base_delay: Duration::from_millis(1),
            retry_max_delay: Duration::from_millis(5),
            ..WorkerConfig::default()
        };
        tweak(&mut config);

        let ctx = PipelineContext {
            toolkit: Arc::new(toolkit),
            fetcher: Arc::new(StubFetcher),
            store: Arc::new(FlakyStore {
                inner: LocalStore::new(store_dir.path(), "https://cdn.test"),
                failing: failing.iter().map(|s| s.to_string()).collect(),
            }),
            provider,
        };

        Harness {
            orchestrator: Orchestrator::new(config, Arc::new(InMemoryJobRegistry::new()), ctx),
            _dirs: (work, store_dir),
        }
    }

    fn request(mode: &str) -> SplitRequest {
        SplitRequest {
            mode: Some(mode.to_string()),
            min_scene_ms: Some(3000),
            ..SplitRequest::new("https://videos.test/source.mp4")
        }
    }

    async fn wait_terminal(orchestrator: &Orchestrator, job_id: &JobId) -> JobView {
        for _ in 0..500 {
            if let Some(view) = orchestrator.poll(job_id).await {
                if view.state.status().is_terminal() {
                    return view;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {} did not finish", job_id);
    }

    fn completed_clips(view: &JobView) -> &[Clip] {
        match &view.state {
            JobState::Completed { scenes, .. } => scenes,
            other => panic!("expected completed job, got {:?}", other),
        }
    }

    fn failure_kind(view: &JobView) -> &str {
        match &view.state {
            JobState::Failed { error_kind, .. } => error_kind,
            other => panic!("expected failed job, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_three_scenes_complete_in_order() {
        let provider = mock_provider(&[(0.0, 10.0), (10.0, 40.0), (40.0, 60.0)], Some(12.5));
        let h = harness(provider, StubToolkit::default(), &[], |_| {});

        let submitted = h.orchestrator.submit(request("precise")).await.unwrap();
        let early = h.orchestrator.poll(&submitted.job_id).await.unwrap();
        assert!(matches!(
            early.state.status(),
            JobStatus::Queued | JobStatus::Processing
        ));

        let view = wait_terminal(&h.orchestrator, &submitted.job_id).await;
        assert_eq!(view.progress, 100);
        assert!(matches!(
            view.state,
            JobState::Completed { used_threshold: Some(t), .. } if t == 12.5
        ));

        let clips = completed_clips(&view);
        let spans: Vec<(u64, u64)> = clips.iter().map(|c| (c.start_ms, c.end_ms)).collect();
        assert_eq!(spans, vec![(0, 10_000), (10_000, 40_000), (40_000, 60_000)]);
        assert_eq!(clips[1].duration_ms, 30_000);
        assert_eq!(
            clips[0].object_key,
            format!("video-clips/{}/001.mp4", submitted.job_id)
        );
        assert_eq!(
            clips[2].public_url,
            format!("https://cdn.test/video-clips/{}/003.mp4", submitted.job_id)
        );
        assert_eq!(clips[0].storage_provider, "local");

        // Terminal payloads are stable
        let again = h.orchestrator.poll(&submitted.job_id).await.unwrap();
        assert_eq!(view, again);
    }

    #[tokio::test]
    async fn test_short_candidates_merge_before_extraction() {
        let provider = mock_provider(&[(0.0, 1.0), (1.0, 2.0), (2.0, 50.0), (50.0, 60.0)], None);
        let h = harness(provider, StubToolkit::default(), &[], |_| {});

        let job = h.orchestrator.submit(request("precise")).await.unwrap();
        let view = wait_terminal(&h.orchestrator, &job.job_id).await;

        let spans: Vec<(u64, u64)> = completed_clips(&view)
            .iter()
            .map(|c| (c.start_ms, c.end_ms))
            .collect();
        assert_eq!(spans, vec![(0, 50_000), (50_000, 60_000)]);
    }

    #[tokio::test]
    async fn test_fast_mode_snaps_to_keyframes() {
        let provider = mock_provider(&[(0.0, 10.0), (10.0, 40.0), (40.0, 60.0)], None);
        let toolkit = StubToolkit {
            keyframe_step: 4.0,
            ..StubToolkit::default()
        };
        let h = harness(provider, toolkit, &[], |_| {});

        let job = h.orchestrator.submit(request("fast")).await.unwrap();
        let view = wait_terminal(&h.orchestrator, &job.job_id).await;
        let clips = completed_clips(&view);

        assert_eq!(clips.len(), 3);
        for clip in clips {
            assert!(clip.start_ms >= clip.requested_start_ms);
            assert!(clip.start_ms - clip.requested_start_ms <= 4_000);
        }
        for pair in clips.windows(2) {
            assert!(pair[0].end_ms <= pair[1].start_ms);
        }
        assert_eq!((clips[1].start_ms, clips[1].requested_start_ms), (12_000, 10_000));
    }

    #[tokio::test]
    async fn test_one_failed_clip_of_five_is_omitted() {
        let spans = [(0.0, 12.0), (12.0, 24.0), (24.0, 36.0), (36.0, 48.0), (48.0, 60.0)];
        let h = harness(
            mock_provider(&spans, None),
            StubToolkit::default(),
            &["/003.mp4"],
            |_| {},
        );

        let job = h.orchestrator.submit(request("precise")).await.unwrap();
        let view = wait_terminal(&h.orchestrator, &job.job_id).await;

        let indices: Vec<u32> = completed_clips(&view).iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 1, 3, 4]);
    }

    #[tokio::test]
    async fn test_zero_tolerance_fails_on_any_clip() {
        let spans = [(0.0, 30.0), (30.0, 60.0)];
        let h = harness(
            mock_provider(&spans, None),
            StubToolkit::default(),
            &["/002.mp4"],
            |c| c.max_clip_failure_ratio = 0.0,
        );

        let job = h.orchestrator.submit(request("precise")).await.unwrap();
        let view = wait_terminal(&h.orchestrator, &job.job_id).await;
        assert_eq!(failure_kind(&view), "publish_error");
    }

    #[tokio::test]
    async fn test_oversize_source_fails_with_download_error() {
        let h = harness(mock_provider(&[], None), StubToolkit::default(), &[], |_| {});

        let job = h
            .orchestrator
            .submit(SplitRequest::new("https://videos.test/huge.mp4"))
            .await
            .unwrap();
        let view = wait_terminal(&h.orchestrator, &job.job_id).await;

        assert_eq!(failure_kind(&view), "download_error");
        match &view.state {
            JobState::Failed { error, .. } => assert!(error.contains("maximum size")),
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_invalid_request_creates_no_job() {
        let h = harness(mock_provider(&[], None), StubToolkit::default(), &[], |_| {});

        let err = h
            .orchestrator
            .submit(SplitRequest::new("ftp://videos.test/a.mp4"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "validation_error");

        let mut bad_mode = SplitRequest::new("https://videos.test/a.mp4");
        bad_mode.mode = Some("slow".to_string());
        assert!(h.orchestrator.submit(bad_mode).await.is_err());

        assert_eq!(h.orchestrator.registry().len().await, 0);
    }

    #[tokio::test]
    async fn test_wall_clock_timeout_fails_job() {
        let toolkit = StubToolkit {
            transcode_delay: Duration::from_secs(30),
            ..StubToolkit::default()
        };
        let h = harness(mock_provider(&[], None), toolkit, &[], |c| {
            c.job_timeout = Duration::from_millis(100)
        });

        let job = h.orchestrator.submit(request("fast")).await.unwrap();
        let view = wait_terminal(&h.orchestrator, &job.job_id).await;
        assert_eq!(failure_kind(&view), "timeout");
    }

    #[tokio::test]
    async fn test_oracle_wait_ceiling_fails_job() {
        let provider = Arc::new(RemoteOracleProvider::new(
            Arc::new(PendingOracle),
            Duration::from_millis(10),
            Duration::from_millis(60),
        ));
        let h = harness(provider, StubToolkit::default(), &[], |_| {});

        let started = std::time::Instant::now();
        let job = h.orchestrator.submit(request("fast")).await.unwrap();
        let view = wait_terminal(&h.orchestrator, &job.job_id).await;

        assert_eq!(failure_kind(&view), "detection_timeout");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_panicking_stage_fails_job() {
        let mut provider = MockBoundaryProvider::new();
        provider.expect_name().return_const("mock");
        provider
            .expect_detect()
            .returning(|_, _| panic!("detector crashed"));
        let h = harness(Arc::new(provider), StubToolkit::default(), &[], |_| {});

        let job = h.orchestrator.submit(request("fast")).await.unwrap();
        let view = wait_terminal(&h.orchestrator, &job.job_id).await;

        assert_eq!(failure_kind(&view), "internal_error");
        match &view.state {
            JobState::Failed { error, .. } => assert!(error.contains("detector crashed")),
            _ => unreachable!(),
        }
        assert_eq!(h.orchestrator.running_jobs(), 0);
    }

    #[tokio::test]
    async fn test_jobs_wait_for_a_permit() {
        let toolkit = StubToolkit {
            transcode_delay: Duration::from_millis(200),
            ..StubToolkit::default()
        };
        let h = harness(mock_provider(&[(0.0, 60.0)], None), toolkit, &[], |c| {
            c.max_concurrent_jobs = 1
        });

        let first = h.orchestrator.submit(request("fast")).await.unwrap();
        let second = h.orchestrator.submit(request("fast")).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let view = h.orchestrator.poll(&second.job_id).await.unwrap();
        assert_eq!(view.state.status(), JobStatus::Queued);

        wait_terminal(&h.orchestrator, &first.job_id).await;
        let done = wait_terminal(&h.orchestrator, &second.job_id).await;
        assert_eq!(completed_clips(&done).len(), 1);
    }
}
