use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use vscene_media::{scenes_from_scores, MediaError, MediaToolkit};

use super::{BoundaryProvider, Detection, DetectionRequest};
use crate::error::{WorkerError, WorkerResult};

/// Frame content-difference detector run on the proxy.
pub struct LocalContentProvider {
    toolkit: Arc<dyn MediaToolkit>,
}

impl LocalContentProvider {
    pub fn new(toolkit: Arc<dyn MediaToolkit>) -> Self {
        Self { toolkit }
    }
}

#[async_trait]
impl BoundaryProvider for LocalContentProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn detect(&self, proxy: &Path, request: &DetectionRequest) -> WorkerResult<Detection> {
        let signal = self
            .toolkit
            .content_scores(proxy, request.fps)
            .await
            .map_err(|e| match e {
                MediaError::Timeout(secs) => WorkerError::DetectionTimeout(secs),
                other => WorkerError::detection(other.detail()),
            })?;

        debug!(
            frames = signal.frame_count(),
            fps = signal.fps,
            "Computed content scores"
        );

        let result = scenes_from_scores(
            &signal,
            request.threshold,
            request.min_scene_secs,
            request.duration,
        );

        info!(
            scenes = result.scenes.len(),
            threshold = result.threshold,
            "Local detection finished"
        );

        Ok(Detection {
            candidates: result.scenes,
            used_threshold: Some(result.threshold),
        })
    }
}
