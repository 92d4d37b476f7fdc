//! Axum HTTP API for scene-split jobs.
//!
//! Exposes job submission (`POST /start`), status polling
//! (`GET /status/:job_id`), health probes and Prometheus metrics.

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
