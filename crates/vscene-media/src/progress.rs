//! FFmpeg progress parsing.

use serde::{Deserialize, Serialize};

/// Progress information from FFmpeg's `-progress pipe:2` output.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FfmpegProgress {
    /// Current frame number
    pub frame: u64,
    /// Output time in milliseconds
    pub out_time_ms: i64,
    /// Encoding speed (e.g., 1.5 = 1.5x realtime)
    pub speed: f64,
    /// Whether encoding is complete
    pub is_complete: bool,
}

impl FfmpegProgress {
    /// Fraction of the total duration processed, in [0, 1].
    pub fn fraction(&self, total_duration_ms: i64) -> f64 {
        if self.is_complete {
            return 1.0;
        }
        if total_duration_ms <= 0 {
            return 0.0;
        }
        (self.out_time_ms as f64 / total_duration_ms as f64).clamp(0.0, 1.0)
    }
}

/// Callback type for progress updates.
pub type ProgressCallback = Box<dyn Fn(FfmpegProgress) + Send + Sync + 'static>;

/// Fold one `key=value` progress line into `current`.
///
/// Returns a snapshot on each `progress=` line, which FFmpeg emits at the
/// end of every progress block.
pub(crate) fn parse_progress_line(
    line: &str,
    current: &mut FfmpegProgress,
) -> Option<FfmpegProgress> {
    let (key, value) = line.trim().split_once('=')?;

    match key {
        "out_time_us" | "out_time_ms" => {
            // FFmpeg reports microseconds under both keys
            if let Ok(us) = value.parse::<i64>() {
                current.out_time_ms = us / 1000;
            }
        }
        "frame" => {
            if let Ok(frame) = value.parse() {
                current.frame = frame;
            }
        }
        "speed" => {
            if let Some(speed) = value.strip_suffix('x').and_then(|s| s.trim().parse().ok()) {
                current.speed = speed;
            }
        }
        "progress" => {
            current.is_complete = value == "end";
            return Some(current.clone());
        }
        _ => {}
    }

    None
}

/// Whether a stderr line is part of the progress protocol rather than a message.
pub(crate) fn is_progress_key(line: &str) -> bool {
    const KEYS: &[&str] = &[
        "frame", "fps", "stream_", "bitrate", "total_size", "out_time", "dup_frames",
        "drop_frames", "speed", "progress",
    ];
    match line.split_once('=') {
        Some((key, _)) => KEYS.iter().any(|k| key.starts_with(k)),
        None => false,
    }
}
