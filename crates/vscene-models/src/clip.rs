//! Clip descriptors and export modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How a clip is cut from the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExportMode {
    /// Keyframe-aligned stream copy, no re-encoding
    #[default]
    Fast,
    /// Re-encoded, frame-accurate cut
    #[serde(alias = "precision")]
    Precise,
}

impl ExportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportMode::Fast => "fast",
            ExportMode::Precise => "precise",
        }
    }
}

impl fmt::Display for ExportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fast" => Ok(ExportMode::Fast),
            "precise" | "precision" => Ok(ExportMode::Precise),
            other => Err(format!("unsupported mode '{}'", other)),
        }
    }
}

/// A published clip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Clip {
    /// Position of the source boundary in the validated sequence
    pub index: u32,
    /// Exported start (after keyframe alignment in fast mode)
    pub start_ms: u64,
    pub end_ms: u64,
    pub duration_ms: u64,
    /// Boundary as requested by detection
    pub requested_start_ms: u64,
    pub requested_end_ms: u64,
    pub width: u32,
    pub height: u32,
    pub size_bytes: u64,
    pub mode: ExportMode,
    pub object_key: String,
    pub public_url: String,
    pub storage_provider: String,
    pub mime_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Convert seconds to whole milliseconds, rounding to nearest.
pub fn secs_to_ms(seconds: f64) -> u64 {
    (seconds.max(0.0) * 1000.0).round() as u64
}
