//! Scene boundary providers.
//!
//! Both variants take the analysis proxy and return ordered candidates.
//! The orchestrator picks one from configuration and never looks past the
//! trait.

mod local;
mod remote;
mod validate;

use std::path::Path;

use async_trait::async_trait;
use vscene_models::{BoundaryCandidate, ThresholdSpec};

use crate::error::WorkerResult;

pub use local::LocalContentProvider;
pub use remote::RemoteOracleProvider;
pub use validate::{validate_boundaries, BoundaryRules};

/// Inputs for one detection run.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRequest {
    pub threshold: ThresholdSpec,
    pub min_scene_secs: f64,
    /// Source duration in seconds (0 when unknown)
    pub duration: f64,
    /// Frame rate of the proxy
    pub fps: f64,
}

/// Detected candidates and, for threshold-based providers, the threshold used.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    pub candidates: Vec<BoundaryCandidate>,
    pub used_threshold: Option<f64>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BoundaryProvider: Send + Sync {
    /// Short name used in logs and metrics.
    fn name(&self) -> &'static str;

    async fn detect(&self, proxy: &Path, request: &DetectionRequest) -> WorkerResult<Detection>;
}
