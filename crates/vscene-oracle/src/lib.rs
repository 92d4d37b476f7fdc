//! Remote video analysis oracle.
//!
//! The oracle is a stateful remote service: a proxy video is uploaded,
//! processed asynchronously, analysed with a prompt and finally deleted.
//! `AnalysisOracle` captures those four steps; `GeminiOracle` implements
//! them against the Gemini Files API.

pub mod error;
pub mod gemini;
pub mod response;

use std::path::Path;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::{OracleError, OracleResult};
pub use gemini::{GeminiConfig, GeminiOracle};
pub use response::{extract_json, parse_boundaries};

/// Handle to a file held by the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRef {
    /// Resource name used for status and delete calls
    pub name: String,
    /// URI referenced from analysis requests
    pub uri: String,
    pub mime_type: String,
}

/// Processing state of an uploaded file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileState {
    Pending,
    Active,
    Failed(String),
}

/// Stateful remote analysis service.
#[async_trait]
pub trait AnalysisOracle: Send + Sync {
    async fn upload(&self, path: &Path, mime_type: &str) -> OracleResult<FileRef>;

    async fn poll_status(&self, file: &FileRef) -> OracleResult<FileState>;

    /// Run `prompt` against the file and return the raw answer text.
    async fn analyze(&self, file: &FileRef, prompt: &str) -> OracleResult<String>;

    async fn delete(&self, file: &FileRef) -> OracleResult<()>;
}

/// Prompt asking for contiguous scenes no shorter than `min_scene_secs`.
pub fn scene_prompt(min_scene_secs: f64, duration: f64) -> String {
    format!(
        r#"You are a video editor. Watch the attached video ({duration:.1} seconds long) and split it into its distinct scenes.

A new scene starts at a camera cut, a change of location, or a clear change of subject.

Return ONLY a JSON array and nothing else, using this schema:
[
  {{"start": "HH:MM:SS.mmm", "end": "HH:MM:SS.mmm", "title": "Short label", "description": "One sentence describing the scene"}}
]

Rules:
- Scenes are in chronological order and do not overlap.
- The first scene starts at 00:00:00.000 and the last ends at the end of the video.
- Every scene lasts at least {min_scene_secs:.1} seconds; merge shorter ones into a neighbour.
"#
    )
}
