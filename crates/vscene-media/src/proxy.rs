//! Analysis proxy transcoding.
//!
//! The proxy is a reduced resolution and frame rate copy of the source used
//! only for boundary detection, never for the published clips.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::progress::FfmpegProgress;

/// Target parameters for the analysis proxy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxySpec {
    /// Output height in pixels; width keeps the aspect ratio
    pub height: u32,
    /// Output frame rate
    pub fps: f64,
    /// Keep a low bitrate mono audio track
    pub include_audio: bool,
}

impl Default for ProxySpec {
    fn default() -> Self {
        Self {
            height: 360,
            fps: 10.0,
            include_audio: false,
        }
    }
}

impl ProxySpec {
    /// Build the FFmpeg command producing this proxy.
    pub fn command(&self, input: &Path, output: &Path) -> FfmpegCommand {
        let cmd = FfmpegCommand::new(input, output)
            .video_filter(format!("scale=-2:{},fps={}", self.height, self.fps))
            .video_codec("libx264")
            .preset("veryfast")
            .crf(28);

        let cmd = if self.include_audio {
            cmd.audio_codec("aac")
                .audio_bitrate("64k")
                .output_args(["-ac", "1"])
        } else {
            cmd.no_audio()
        };

        cmd.faststart()
    }
}

/// Transcode `input` into an analysis proxy at `output`.
///
/// `on_progress` receives the completed fraction of `source_duration`.
pub async fn transcode_proxy<F>(
    input: &Path,
    output: &Path,
    spec: &ProxySpec,
    source_duration: f64,
    on_progress: F,
) -> MediaResult<()>
where
    F: Fn(f64) + Send + 'static,
{
    info!(
        "Transcoding proxy {} -> {} ({}p @ {}fps)",
        input.display(),
        output.display(),
        spec.height,
        spec.fps
    );

    let total_ms = (source_duration * 1000.0) as i64;
    let cmd = spec.command(input, output);
    FfmpegRunner::new()
        .run_with_progress(&cmd, move |p: FfmpegProgress| on_progress(p.fraction(total_ms)))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_proxy_command_without_audio() {
        let args = ProxySpec::default()
            .command(Path::new("src.mp4"), Path::new("proxy.mp4"))
            .build_args();
        assert!(args.contains(&"scale=-2:360,fps=10".to_string()));
        assert!(args.contains(&"-an".to_string()));
        assert!(!args.contains(&"-c:a".to_string()));
    }

    #[test]
    fn test_proxy_command_with_audio() {
        let spec = ProxySpec {
            height: 240,
            fps: 1.0,
            include_audio: true,
        };
        let args = spec
            .command(Path::new("src.mp4"), Path::new("proxy.mp4"))
            .build_args();
        assert!(args.contains(&"scale=-2:240,fps=1".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-c:a" && w[1] == "aac"));
    }
}
