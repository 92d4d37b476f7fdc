//! VScene worker: the scene-split job pipeline.
//!
//! This crate owns everything between an accepted request and a terminal
//! job record:
//! - `registry`: job records and their state machine
//! - `boundary`: local and remote scene boundary providers plus validation
//! - `clip_pipeline`: the bounded clip worker pool
//! - `orchestrator`: submission, stage sequencing and failure mapping
//! - `sweeper`: eviction of expired records

pub mod boundary;
pub mod clip_pipeline;
pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod registry;
pub mod retry;
pub mod sweeper;

pub use boundary::{BoundaryProvider, Detection, DetectionRequest};
pub use config::{ProviderKind, WorkerConfig};
pub use error::{WorkerError, WorkerResult};
pub use orchestrator::{Orchestrator, PipelineContext};
pub use registry::{InMemoryJobRegistry, JobRegistry};
pub use sweeper::RegistrySweeper;
