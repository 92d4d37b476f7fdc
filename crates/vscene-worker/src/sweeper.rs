//! Background eviction of expired job records.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{debug, info};

use crate::metrics;
use crate::registry::JobRegistry;

/// Periodically removes terminal jobs older than the retention window.
pub struct RegistrySweeper {
    registry: Arc<dyn JobRegistry>,
    ttl: Duration,
    every: Duration,
}

impl RegistrySweeper {
    pub fn new(registry: Arc<dyn JobRegistry>, ttl: Duration, every: Duration) -> Self {
        Self {
            registry,
            ttl,
            every,
        }
    }

    /// Run forever; spawn as a background task.
    pub async fn run(&self) {
        info!(
            "Starting registry sweeper (ttl: {:?}, interval: {:?})",
            self.ttl, self.every
        );

        let mut ticker = interval(self.every);
        // First tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            self.sweep_once().await;
        }
    }

    /// Evict once and return the number of removed records.
    pub async fn sweep_once(&self) -> usize {
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or(chrono::Duration::MAX);
        let cutoff = Utc::now()
            .checked_sub_signed(ttl)
            .unwrap_or(chrono::DateTime::<Utc>::MIN_UTC);

        let evicted = self.registry.evict_terminal_before(cutoff).await;
        if evicted > 0 {
            metrics::record_jobs_evicted(evicted);
            info!(evicted, "Evicted expired jobs");
        } else {
            debug!("No expired jobs to evict");
        }
        evicted
    }

    /// Spawn [`run`](Self::run) on the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move { self.run().await })
    }
}
