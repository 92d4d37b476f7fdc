//! Split requests and validated split options.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

use crate::clip::ExportMode;

/// Default minimum scene duration in milliseconds.
pub const DEFAULT_MIN_SCENE_MS: u64 = 3000;

/// Request validation failure. Surfaces as a 400 at the API edge.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("invalid request: {0}")]
    Invalid(String),

    #[error("unsupported URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),

    #[error("{0}")]
    InvalidMode(String),

    #[error("invalid threshold value: {0}")]
    InvalidThreshold(String),
}

/// Threshold as sent by clients: a number, or a string such as `"auto"` or `"30"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ThresholdInput {
    Number(f64),
    Text(String),
}

/// Scene detection sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdSpec {
    /// Pick a threshold from a first analysis pass
    #[default]
    Auto,
    Fixed(f64),
}

impl ThresholdSpec {
    /// Interpret client input. Absent, empty or `auto` means automatic.
    pub fn parse(input: Option<&ThresholdInput>) -> Result<Self, RequestError> {
        let value = match input {
            None => return Ok(ThresholdSpec::Auto),
            Some(ThresholdInput::Number(n)) => *n,
            Some(ThresholdInput::Text(text)) => {
                let text = text.trim().to_lowercase();
                if text.is_empty() || text == "auto" {
                    return Ok(ThresholdSpec::Auto);
                }
                text.parse::<f64>()
                    .map_err(|_| RequestError::InvalidThreshold(text.clone()))?
            }
        };

        if !value.is_finite() || value < 0.0 {
            return Err(RequestError::InvalidThreshold(value.to_string()));
        }
        Ok(ThresholdSpec::Fixed(value))
    }
}

/// Body of `POST /start`.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct SplitRequest {
    #[validate(url, length(max = 4096))]
    pub url: String,
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default)]
    #[validate(range(max = 3_600_000))]
    pub min_scene_ms: Option<u64>,
    #[serde(default)]
    pub include_audio: Option<bool>,
    #[serde(default)]
    pub threshold: Option<ThresholdInput>,
}

impl SplitRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            mode: None,
            min_scene_ms: None,
            include_audio: None,
            threshold: None,
        }
    }

    /// Validate the request and apply defaults.
    pub fn into_options(self) -> Result<SplitOptions, RequestError> {
        self.validate()
            .map_err(|e| RequestError::Invalid(e.to_string()))?;

        let url = self.url.trim().to_string();
        let parsed = url::Url::parse(&url).map_err(|e| RequestError::Invalid(e.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(RequestError::UnsupportedScheme(parsed.scheme().to_string()));
        }

        let mode = match self.mode.as_deref() {
            None => ExportMode::default(),
            Some(m) => m.parse().map_err(RequestError::InvalidMode)?,
        };

        Ok(SplitOptions {
            source_url: url,
            mode,
            min_scene_ms: self.min_scene_ms.unwrap_or(DEFAULT_MIN_SCENE_MS),
            include_audio: self.include_audio.unwrap_or(true),
            threshold: ThresholdSpec::parse(self.threshold.as_ref())?,
        })
    }
}

/// Validated options driving one job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SplitOptions {
    pub source_url: String,
    pub mode: ExportMode,
    pub min_scene_ms: u64,
    pub include_audio: bool,
    pub threshold: ThresholdSpec,
}

impl SplitOptions {
    pub fn min_scene_secs(&self) -> f64 {
        self.min_scene_ms as f64 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied() {
        let opts = SplitRequest::new("https://cdn.example.com/video.mp4")
            .into_options()
            .unwrap();
        assert_eq!(opts.mode, ExportMode::Fast);
        assert_eq!(opts.min_scene_ms, DEFAULT_MIN_SCENE_MS);
        assert!(opts.include_audio);
        assert_eq!(opts.threshold, ThresholdSpec::Auto);
    }

    #[test]
    fn test_rejects_bad_url() {
        assert!(matches!(
            SplitRequest::new("not a url").into_options(),
            Err(RequestError::Invalid(_))
        ));
        assert!(matches!(
            SplitRequest::new("ftp://example.com/a.mp4").into_options(),
            Err(RequestError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_rejects_unknown_mode() {
        let mut req = SplitRequest::new("https://example.com/a.mp4");
        req.mode = Some("turbo".into());
        assert!(matches!(req.into_options(), Err(RequestError::InvalidMode(_))));
    }

    #[test]
    fn test_threshold_parsing() {
        assert_eq!(ThresholdSpec::parse(None).unwrap(), ThresholdSpec::Auto);
        assert_eq!(
            ThresholdSpec::parse(Some(&ThresholdInput::Text(" AUTO ".into()))).unwrap(),
            ThresholdSpec::Auto
        );
        assert_eq!(
            ThresholdSpec::parse(Some(&ThresholdInput::Text("".into()))).unwrap(),
            ThresholdSpec::Auto
        );
        assert_eq!(
            ThresholdSpec::parse(Some(&ThresholdInput::Text("30.5".into()))).unwrap(),
            ThresholdSpec::Fixed(30.5)
        );
        assert_eq!(
            ThresholdSpec::parse(Some(&ThresholdInput::Number(12.0))).unwrap(),
            ThresholdSpec::Fixed(12.0)
        );
        assert!(ThresholdSpec::parse(Some(&ThresholdInput::Text("high".into()))).is_err());
        assert!(ThresholdSpec::parse(Some(&ThresholdInput::Number(-1.0))).is_err());
    }

    #[test]
    fn test_request_json_shape() {
        let req: SplitRequest = serde_json::from_str(
            r#"{"url":"https://example.com/a.mp4","mode":"precision","min_scene_ms":1500,"include_audio":false,"threshold":"auto"}"#,
        )
        .unwrap();
        let opts = req.into_options().unwrap();
        assert_eq!(opts.mode, ExportMode::Precise);
        assert_eq!(opts.min_scene_ms, 1500);
        assert!(!opts.include_audio);
        assert!((opts.min_scene_secs() - 1.5).abs() < 1e-9);
    }
}
