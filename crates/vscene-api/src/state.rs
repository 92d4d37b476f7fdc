//! Application state.

use std::sync::Arc;

use vscene_worker::{
    InMemoryJobRegistry, JobRegistry, Orchestrator, PipelineContext, WorkerConfig, WorkerResult,
};

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Wire the production pipeline from the environment.
    pub fn new(config: ApiConfig, worker_config: WorkerConfig) -> WorkerResult<Self> {
        let ctx = PipelineContext::from_config(&worker_config)?;
        let registry: Arc<dyn JobRegistry> = Arc::new(InMemoryJobRegistry::new());
        let orchestrator = Orchestrator::new(worker_config, registry, ctx);
        Ok(Self::with_orchestrator(config, Arc::new(orchestrator)))
    }

    pub fn with_orchestrator(config: ApiConfig, orchestrator: Arc<Orchestrator>) -> Self {
        Self {
            config,
            orchestrator,
        }
    }
}
