use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};
use vscene_media::{MediaToolkit, SegmentSpec};
use vscene_models::{secs_to_ms, Clip, ExportMode, JobId};
use vscene_storage::{object_key, ArtifactStore};

use super::tasks::ClipTask;
use crate::error::{WorkerError, WorkerResult};
use crate::metrics;
use crate::retry::{retry_async, RetryConfig, RetryResult};

pub const CLIP_MIME_TYPE: &str = "video/mp4";

/// Everything a clip worker needs, shared by all workers of one job.
pub struct ClipContext {
    pub job_id: JobId,
    pub toolkit: Arc<dyn MediaToolkit>,
    pub store: Arc<dyn ArtifactStore>,
    /// Downloaded source the clips are cut from
    pub source: PathBuf,
    pub clips_dir: PathBuf,
    pub mode: ExportMode,
    pub include_audio: bool,
    pub storage_prefix: String,
    pub retry: RetryConfig,
}

/// Export, probe and publish one clip, retrying transient failures.
pub async fn process_single_clip(ctx: &ClipContext, task: &ClipTask) -> WorkerResult<Clip> {
    let output = ctx.clips_dir.join(format!("{:03}.mp4", task.sequence()));

    debug!(
        index = task.index,
        start = task.start,
        end = task.end,
        mode = %ctx.mode,
        "Starting clip"
    );

    let result = retry_async(&ctx.retry, WorkerError::is_retryable, || {
        attempt_clip(ctx, task, &output)
    })
    .await;

    if let Err(e) = tokio::fs::remove_file(&output).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %output.display(), "Failed to remove clip file: {}", e);
        }
    }

    match result {
        RetryResult::Success(clip) => {
            metrics::record_clip_published(ctx.mode.as_str());
            info!(
                index = task.index,
                key = %clip.object_key,
                size_bytes = clip.size_bytes,
                "Clip published"
            );
            Ok(clip)
        }
        RetryResult::Failed { error, attempts } => {
            metrics::record_clip_failure(error.kind());
            warn!(
                index = task.index,
                attempts,
                kind = error.kind(),
                "Clip failed: {}",
                error
            );
            Err(error)
        }
    }
}

async fn attempt_clip(ctx: &ClipContext, task: &ClipTask, output: &Path) -> WorkerResult<Clip> {
    metrics::record_clip_attempt(ctx.mode.as_str());

    let spec = SegmentSpec {
        start: task.start,
        end: task.end,
        mode: ctx.mode,
        include_audio: ctx.include_audio,
    };

    ctx.toolkit
        .export_segment(&ctx.source, output, &spec)
        .await
        .map_err(|e| WorkerError::extraction(&e))?;

    let info = ctx
        .toolkit
        .probe(output)
        .await
        .map_err(|e| WorkerError::extraction(&e))?;

    let key = object_key(
        &ctx.storage_prefix,
        ctx.job_id.as_str(),
        task.sequence(),
        "mp4",
    );
    let stored = ctx.store.put(&key, output, CLIP_MIME_TYPE).await?;

    let start_ms = secs_to_ms(task.start);
    let end_ms = secs_to_ms(task.end);
    let duration_ms = if info.duration > 0.0 {
        secs_to_ms(info.duration)
    } else {
        end_ms.saturating_sub(start_ms)
    };

    Ok(Clip {
        index: task.index,
        start_ms,
        end_ms,
        duration_ms,
        requested_start_ms: secs_to_ms(task.requested_start),
        requested_end_ms: secs_to_ms(task.requested_end),
        width: info.width,
        height: info.height,
        size_bytes: stored.size_bytes,
        mode: ctx.mode,
        object_key: stored.key,
        public_url: stored.public_url,
        storage_provider: stored.provider,
        mime_type: CLIP_MIME_TYPE.to_string(),
        title: task.title.clone(),
        description: task.description.clone(),
    })
}
