//! Shared data models for the VScene backend.
//!
//! This crate provides Serde-serializable types for:
//! - Jobs, their lifecycle state and the polling view
//! - Scene boundary candidates produced by detectors
//! - Clip descriptors published to object storage
//! - Split requests and their validated options

pub mod clip;
pub mod job;
pub mod request;
pub mod scene;
pub mod timestamp;

pub use clip::{secs_to_ms, Clip, ExportMode};
pub use job::{JobId, JobRecord, JobState, JobStatus, JobUpdate, JobView, Stage, TransitionError};
pub use request::{RequestError, SplitOptions, SplitRequest, ThresholdInput, ThresholdSpec};
pub use scene::BoundaryCandidate;
pub use timestamp::{parse_timestamp, TimestampError};
