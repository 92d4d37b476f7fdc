//! Pipeline metrics. Recorded through the `metrics` facade; the server
//! installs the Prometheus recorder.

use metrics::{counter, gauge, histogram};

pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "vscene_jobs_submitted_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vscene_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vscene_jobs_failed_total";
    pub const JOBS_RUNNING: &str = "vscene_jobs_running";
    pub const JOB_DURATION_SECONDS: &str = "vscene_job_duration_seconds";
    pub const STAGE_DURATION_SECONDS: &str = "vscene_stage_duration_seconds";

    pub const CLIP_ATTEMPTS_TOTAL: &str = "vscene_clip_attempts_total";
    pub const CLIPS_PUBLISHED_TOTAL: &str = "vscene_clips_published_total";
    pub const CLIP_FAILURES_TOTAL: &str = "vscene_clip_failures_total";

    pub const JOBS_EVICTED_TOTAL: &str = "vscene_jobs_evicted_total";
}

pub fn record_job_submitted() {
    counter!(names::JOBS_SUBMITTED_TOTAL).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "completed").record(duration_secs);
}

pub fn record_job_failed(kind: &'static str, duration_secs: f64) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "failed").record(duration_secs);
}

pub fn set_jobs_running(count: usize) {
    gauge!(names::JOBS_RUNNING).set(count as f64);
}

pub fn record_stage_duration(stage: &'static str, duration_secs: f64) {
    histogram!(names::STAGE_DURATION_SECONDS, "stage" => stage).record(duration_secs);
}

pub fn record_clip_attempt(mode: &'static str) {
    counter!(names::CLIP_ATTEMPTS_TOTAL, "mode" => mode).increment(1);
}

pub fn record_clip_published(mode: &'static str) {
    counter!(names::CLIPS_PUBLISHED_TOTAL, "mode" => mode).increment(1);
}

pub fn record_clip_failure(kind: &'static str) {
    counter!(names::CLIP_FAILURES_TOTAL, "kind" => kind).increment(1);
}

pub fn record_jobs_evicted(count: usize) {
    counter!(names::JOBS_EVICTED_TOTAL).increment(count as u64);
}
