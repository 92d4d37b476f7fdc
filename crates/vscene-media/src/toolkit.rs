//! Media operations behind one trait so the pipeline can run against a stub.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;

use crate::command::{check_ffmpeg, check_ffprobe};
use crate::detection::{content_scores, ContentScores};
use crate::error::MediaResult;
use crate::probe::{keyframe_times, probe_video, VideoInfo};
use crate::proxy::{transcode_proxy, ProxySpec};
use crate::segment::{export_segment, SegmentSpec};

/// Fraction-complete callback for long transcodes.
pub type FractionCallback = Box<dyn Fn(f64) + Send + Sync>;

/// Transcoder operations used by the pipeline.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo>;

    async fn keyframes(&self, path: &Path) -> MediaResult<Vec<f64>>;

    async fn transcode_proxy(
        &self,
        input: &Path,
        output: &Path,
        spec: &ProxySpec,
        source_duration: f64,
        on_progress: FractionCallback,
    ) -> MediaResult<()>;

    /// Export one segment, returning the output size in bytes.
    async fn export_segment(
        &self,
        input: &Path,
        output: &Path,
        spec: &SegmentSpec,
    ) -> MediaResult<u64>;

    async fn content_scores(&self, path: &Path, fps: f64) -> MediaResult<ContentScores>;
}

/// FFmpeg/FFprobe CLI implementation.
#[derive(Debug, Clone, Default)]
pub struct FfmpegToolkit;

impl FfmpegToolkit {
    pub fn new() -> Self {
        Self
    }

    /// Fail fast when the binaries are missing from `PATH`.
    pub fn check_available(&self) -> MediaResult<()> {
        check_ffmpeg()?;
        check_ffprobe()?;
        Ok(())
    }
}

fn record(operation: &'static str, started: Instant) {
    metrics::histogram!("vscene_ffmpeg_duration_seconds", "operation" => operation)
        .record(started.elapsed().as_secs_f64());
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    async fn probe(&self, path: &Path) -> MediaResult<VideoInfo> {
        probe_video(path).await
    }

    async fn keyframes(&self, path: &Path) -> MediaResult<Vec<f64>> {
        keyframe_times(path).await
    }

    async fn transcode_proxy(
        &self,
        input: &Path,
        output: &Path,
        spec: &ProxySpec,
        source_duration: f64,
        on_progress: FractionCallback,
    ) -> MediaResult<()> {
        let started = Instant::now();
        let result = transcode_proxy(input, output, spec, source_duration, on_progress).await;
        record("proxy", started);
        result
    }

    async fn export_segment(
        &self,
        input: &Path,
        output: &Path,
        spec: &SegmentSpec,
    ) -> MediaResult<u64> {
        let started = Instant::now();
        let result = export_segment(input, output, spec).await;
        record(spec.mode.as_str(), started);
        result
    }

    async fn content_scores(&self, path: &Path, fps: f64) -> MediaResult<ContentScores> {
        let started = Instant::now();
        let result = content_scores(path, fps).await;
        record("content_scores", started);
        result
    }
}
