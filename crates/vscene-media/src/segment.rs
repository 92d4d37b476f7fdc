//! Segment export in fast (stream copy) and precise (re-encode) modes.

use std::path::Path;

use tracing::debug;
use vscene_models::ExportMode;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::{MediaError, MediaResult};

/// Segments shorter than this after alignment are not exported.
pub const MIN_SEGMENT_SECS: f64 = 0.05;

/// One segment to cut from the source.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentSpec {
    pub start: f64,
    pub end: f64,
    pub mode: ExportMode,
    pub include_audio: bool,
}

impl SegmentSpec {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Build the FFmpeg command for this segment.
    pub fn command(&self, input: &Path, output: &Path) -> FfmpegCommand {
        match self.mode {
            ExportMode::Fast => {
                let cmd = FfmpegCommand::new(input, output)
                    .seek(self.start)
                    .duration(self.duration())
                    .codec_copy();
                let cmd = if self.include_audio { cmd } else { cmd.no_audio() };
                cmd.zero_timestamps()
            }
            ExportMode::Precise => {
                let cmd = FfmpegCommand::new(input, output)
                    .output_seek(self.start)
                    .to(self.end)
                    .video_codec("libx264")
                    .preset("veryfast")
                    .crf(23);
                let cmd = if self.include_audio {
                    cmd.audio_codec("aac").audio_bitrate("192k")
                } else {
                    cmd.no_audio()
                };
                cmd.faststart().zero_timestamps()
            }
        }
    }
}

/// Snap a segment onto keyframes for stream copy.
///
/// The start moves forward to the first keyframe at or after `start` and the
/// end moves back to the last keyframe at or before `end`, so neighbouring
/// segments never overlap. Without keyframes the requested times are kept.
pub fn align_to_keyframes(start: f64, end: f64, keyframes: &[f64]) -> (f64, f64) {
    if keyframes.is_empty() {
        return (start, end);
    }

    let si = keyframes.partition_point(|&k| k < start);
    let aligned_start = keyframes.get(si).copied().unwrap_or(start);

    let ei = keyframes.partition_point(|&k| k <= end);
    let aligned_end = if ei > 0 { keyframes[ei - 1] } else { end };

    (aligned_start, aligned_end)
}

/// Export one segment of `input` to `output` and check the result is non-empty.
pub async fn export_segment(input: &Path, output: &Path, spec: &SegmentSpec) -> MediaResult<u64> {
    if spec.duration() < MIN_SEGMENT_SECS {
        return Err(MediaError::InvalidVideo(format!(
            "segment {:.3}-{:.3} is too short to export",
            spec.start, spec.end
        )));
    }

    debug!(
        "Exporting {} segment {:.3}-{:.3} to {}",
        spec.mode,
        spec.start,
        spec.end,
        output.display()
    );

    FfmpegRunner::new().run(&spec.command(input, output)).await?;

    let size = tokio::fs::metadata(output)
        .await
        .map(|m| m.len())
        .unwrap_or(0);
    if size == 0 {
        return Err(MediaError::ffmpeg_failed(
            "Output file is empty",
            None,
            None,
        ));
    }
    Ok(size)
}
