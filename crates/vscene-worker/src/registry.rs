//! Job registry: the single source of truth for status polling.
//!
//! Records are immutable `Arc<JobRecord>` snapshots. A write computes the
//! next record from the current one and swaps it in under the write lock,
//! so a reader always holds a complete record whose status and payload
//! belong together.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;
use vscene_models::{JobId, JobRecord, JobUpdate};

use crate::error::{WorkerError, WorkerResult};

/// Keyed job store.
#[async_trait]
pub trait JobRegistry: Send + Sync {
    /// Register a new record. Fails if the id is already present.
    async fn insert(&self, record: JobRecord) -> WorkerResult<()>;

    async fn get(&self, job_id: &JobId) -> Option<Arc<JobRecord>>;

    /// Apply `update` and store the resulting record.
    async fn update(&self, job_id: &JobId, update: JobUpdate) -> WorkerResult<Arc<JobRecord>>;

    /// Remove terminal records last updated before `cutoff`.
    async fn evict_terminal_before(&self, cutoff: DateTime<Utc>) -> usize;

    async fn len(&self) -> usize;
}

/// Process-local registry.
#[derive(Debug, Default)]
pub struct InMemoryJobRegistry {
    jobs: RwLock<HashMap<JobId, Arc<JobRecord>>>,
}

impl InMemoryJobRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobRegistry for InMemoryJobRegistry {
    async fn insert(&self, record: JobRecord) -> WorkerResult<()> {
        let mut jobs = self.jobs.write().await;
        if jobs.contains_key(&record.job_id) {
            return Err(WorkerError::registry(format!(
                "job {} already exists",
                record.job_id
            )));
        }
        jobs.insert(record.job_id.clone(), Arc::new(record));
        Ok(())
    }

    async fn get(&self, job_id: &JobId) -> Option<Arc<JobRecord>> {
        self.jobs.read().await.get(job_id).cloned()
    }

    async fn update(&self, job_id: &JobId, update: JobUpdate) -> WorkerResult<Arc<JobRecord>> {
        let mut jobs = self.jobs.write().await;
        let current = jobs
            .get(job_id)
            .ok_or_else(|| WorkerError::registry(format!("job {} not found", job_id)))?;

        let next = Arc::new(
            current
                .apply(update)
                .map_err(|e| WorkerError::registry(e.to_string()))?,
        );
        jobs.insert(job_id.clone(), Arc::clone(&next));
        Ok(next)
    }

    async fn evict_terminal_before(&self, cutoff: DateTime<Utc>) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, record| !(record.is_terminal() && record.updated_at < cutoff));
        let evicted = before - jobs.len();
        if evicted > 0 {
            debug!("Evicted {} expired jobs", evicted);
        }
        evicted
    }

    async fn len(&self) -> usize {
        self.jobs.read().await.len()
    }
}
