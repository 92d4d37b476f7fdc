//! Scene boundary candidates.

use serde::{Deserialize, Serialize};

/// A candidate scene, as produced by a boundary provider.
///
/// Offsets are seconds from the start of the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundaryCandidate {
    pub start: f64,
    pub end: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl BoundaryCandidate {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            title: None,
            description: None,
        }
    }

    /// Attach an optional label and description.
    pub fn with_label(mut self, title: Option<String>, description: Option<String>) -> Self {
        self.title = title;
        self.description = description;
        self
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Finite, non-negative and strictly increasing.
    pub fn is_well_formed(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0 && self.start < self.end
    }
}
