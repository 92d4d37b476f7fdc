//! Worker configuration.

use std::str::FromStr;
use std::time::Duration;

/// Which boundary provider the pipeline uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProviderKind {
    /// Frame content-difference detector run locally
    #[default]
    Local,
    /// Remote analysis oracle
    Oracle,
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "local" | "content" => Ok(ProviderKind::Local),
            "oracle" | "remote" | "gemini" => Ok(ProviderKind::Oracle),
            other => Err(format!("unknown boundary provider '{}'", other)),
        }
    }
}

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Jobs running their pipeline at once; others wait queued
    pub max_concurrent_jobs: usize,
    /// Clip workers per job
    pub max_clip_workers: usize,
    /// Wall clock limit for one job
    pub job_timeout: Duration,
    /// Parent directory for per-job scratch directories
    pub work_dir: String,
    /// Maximum source size in bytes
    pub max_source_bytes: u64,
    /// Attempts per clip before it counts as failed
    pub clip_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    /// Failed/total clip ratio above which the whole job fails
    pub max_clip_failure_ratio: f64,
    pub provider: ProviderKind,
    /// Offset trimmed from each scene start
    pub trim_start: Duration,
    /// Offset trimmed from each scene end
    pub trim_end: Duration,
    pub proxy_height: u32,
    pub proxy_fps: f64,
    /// Terminal jobs older than this are evicted
    pub job_ttl: Duration,
    pub sweep_interval: Duration,
    pub oracle_poll_interval: Duration,
    pub oracle_wait_ceiling: Duration,
    /// Object key prefix for published clips
    pub storage_prefix: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 4,
            max_clip_workers: 4,
            job_timeout: Duration::from_secs(3600), // 1 hour
            work_dir: std::env::temp_dir().join("vscene").to_string_lossy().into_owned(),
            max_source_bytes: 524_288_000,
            clip_max_attempts: 5,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
            max_clip_failure_ratio: 0.5,
            provider: ProviderKind::Local,
            trim_start: Duration::ZERO,
            trim_end: Duration::ZERO,
            proxy_height: 360,
            proxy_fps: 10.0,
            job_ttl: Duration::from_secs(86_400),
            sweep_interval: Duration::from_secs(300),
            oracle_poll_interval: Duration::from_secs(5),
            oracle_wait_ceiling: Duration::from_secs(600),
            storage_prefix: "video-clips".to_string(),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

impl WorkerConfig {
    /// Create config from `VSCENE_*` environment variables.
    pub fn from_env() -> Self {
        let d = Self::default();
        Self {
            max_concurrent_jobs: env_parse("VSCENE_MAX_CONCURRENT_JOBS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(d.max_concurrent_jobs),
            max_clip_workers: env_parse("VSCENE_MAX_CLIP_WORKERS")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(d.max_clip_workers),
            job_timeout: env_parse("VSCENE_JOB_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.job_timeout),
            work_dir: std::env::var("VSCENE_WORK_DIR").unwrap_or(d.work_dir),
            max_source_bytes: env_parse("VSCENE_MAX_SOURCE_BYTES").unwrap_or(d.max_source_bytes),
            clip_max_attempts: env_parse("VSCENE_CLIP_MAX_ATTEMPTS")
                .filter(|n: &u32| *n > 0)
                .unwrap_or(d.clip_max_attempts),
            retry_base_delay: env_parse("VSCENE_RETRY_BASE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.retry_base_delay),
            retry_max_delay: env_parse("VSCENE_RETRY_MAX_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.retry_max_delay),
            max_clip_failure_ratio: env_parse("VSCENE_MAX_CLIP_FAILURE_RATIO")
                .filter(|r: &f64| (0.0..=1.0).contains(r))
                .unwrap_or(d.max_clip_failure_ratio),
            provider: env_parse("VSCENE_BOUNDARY_PROVIDER").unwrap_or(d.provider),
            trim_start: env_parse("VSCENE_TRIM_START_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.trim_start),
            trim_end: env_parse("VSCENE_TRIM_END_MS")
                .map(Duration::from_millis)
                .unwrap_or(d.trim_end),
            proxy_height: env_parse("VSCENE_PROXY_HEIGHT").unwrap_or(d.proxy_height),
            proxy_fps: env_parse("VSCENE_PROXY_FPS")
                .filter(|f: &f64| *f > 0.0)
                .unwrap_or(d.proxy_fps),
            job_ttl: env_parse("VSCENE_JOB_TTL_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.job_ttl),
            sweep_interval: env_parse("VSCENE_SWEEP_INTERVAL_SECS")
                .filter(|n: &u64| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(d.sweep_interval),
            oracle_poll_interval: env_parse("VSCENE_ORACLE_POLL_INTERVAL_SECS")
                .filter(|n: &u64| *n > 0)
                .map(Duration::from_secs)
                .unwrap_or(d.oracle_poll_interval),
            oracle_wait_ceiling: env_parse("VSCENE_ORACLE_WAIT_CEILING_SECS")
                .map(Duration::from_secs)
                .unwrap_or(d.oracle_wait_ceiling),
            storage_prefix: std::env::var("VSCENE_STORAGE_PREFIX").unwrap_or(d.storage_prefix),
        }
    }
}
