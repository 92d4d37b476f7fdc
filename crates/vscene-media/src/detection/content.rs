//! Frame-to-frame content difference signal.
//!
//! FFmpeg decodes the proxy into small rgb24 frames on stdout; each frame is
//! converted to HSV (8-bit scale, hue in 0..180) and compared with the
//! previous one. Frames are consumed one at a time so memory stays flat
//! regardless of source length.

use std::path::Path;
use std::process::Stdio;

use tokio::io::{AsyncReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::command::check_ffmpeg;
use crate::error::{MediaError, MediaResult};

/// Analysis frame size.
pub const FRAME_WIDTH: usize = 160;
pub const FRAME_HEIGHT: usize = 90;
const FRAME_BYTES: usize = FRAME_WIDTH * FRAME_HEIGHT * 3;

/// Per-frame content scores sampled at `fps`.
///
/// `scores[i]` is the difference between frame `i - 1` and frame `i`;
/// the first entry is always zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentScores {
    pub scores: Vec<f64>,
    pub fps: f64,
}

impl ContentScores {
    pub fn frame_count(&self) -> usize {
        self.scores.len()
    }

    /// Timestamp of frame `index` in seconds.
    pub fn frame_time(&self, index: usize) -> f64 {
        index as f64 / self.fps
    }

    /// Duration covered by the decoded frames.
    pub fn covered_duration(&self) -> f64 {
        self.scores.len() as f64 / self.fps
    }
}

/// HSV planes of one frame.
#[derive(Debug, Clone)]
pub(crate) struct HsvFrame {
    h: Vec<f32>,
    s: Vec<f32>,
    v: Vec<f32>,
}

impl HsvFrame {
    pub(crate) fn from_rgb(rgb: &[u8]) -> Self {
        let pixels = rgb.len() / 3;
        let mut frame = Self {
            h: Vec::with_capacity(pixels),
            s: Vec::with_capacity(pixels),
            v: Vec::with_capacity(pixels),
        };

        for px in rgb.chunks_exact(3) {
            let (h, s, v) = rgb_to_hsv(
                px[0] as f32 / 255.0,
                px[1] as f32 / 255.0,
                px[2] as f32 / 255.0,
            );
            frame.h.push(h / 2.0);
            frame.s.push(s * 255.0);
            frame.v.push(v * 255.0);
        }
        frame
    }

    /// Mean absolute difference per plane, averaged over the three planes.
    pub(crate) fn delta(&self, other: &HsvFrame) -> f64 {
        fn mean_abs(a: &[f32], b: &[f32]) -> f64 {
            if a.is_empty() {
                return 0.0;
            }
            let sum: f64 = a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y).abs() as f64)
                .sum();
            sum / a.len() as f64
        }

        (mean_abs(&self.h, &other.h) + mean_abs(&self.s, &other.s) + mean_abs(&self.v, &other.v))
            / 3.0
    }
}

/// RGB in [0, 1] to (H in [0, 360), S in [0, 1], V in [0, 1]).
fn rgb_to_hsv(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max == 0.0 { 0.0 } else { delta / max };
    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * ((b - r) / delta + 2.0)
    } else {
        60.0 * ((r - g) / delta + 4.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    (h, s, max)
}

/// Decode `path` at `fps` and compute the content score of every frame.
pub async fn content_scores(path: &Path, fps: f64) -> MediaResult<ContentScores> {
    check_ffmpeg()?;
    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    let filter = format!("fps={},scale={}:{}", fps, FRAME_WIDTH, FRAME_HEIGHT);
    let mut child = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-i"])
        .arg(path)
        .arg("-vf")
        .arg(&filter)
        .args(["-pix_fmt", "rgb24", "-f", "rawvideo", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| MediaError::ffmpeg_failed("FFmpeg stdout not captured", None, None))?;
    let mut stderr = child
        .stderr
        .take()
        .ok_or_else(|| MediaError::ffmpeg_failed("FFmpeg stderr not captured", None, None))?;

    let stderr_handle = tokio::spawn(async move {
        let mut text = String::new();
        let _ = stderr.read_to_string(&mut text).await;
        text
    });

    let mut reader = BufReader::new(stdout);
    let mut buffer = vec![0u8; FRAME_BYTES];
    let mut previous: Option<HsvFrame> = None;
    let mut scores = Vec::new();

    loop {
        match reader.read_exact(&mut buffer).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }
        let frame = HsvFrame::from_rgb(&buffer);
        scores.push(previous.as_ref().map_or(0.0, |p| p.delta(&frame)));
        previous = Some(frame);
    }

    let status = child.wait().await?;
    let stderr = stderr_handle.await.unwrap_or_default();

    if !status.success() {
        if scores.is_empty() {
            return Err(MediaError::ffmpeg_failed(
                "Frame decoding failed",
                Some(stderr),
                status.code(),
            ));
        }
        warn!(
            "FFmpeg exited with {:?} after {} frames, using partial signal",
            status.code(),
            scores.len()
        );
    }

    if scores.is_empty() {
        return Err(MediaError::detection_failed("No frames decoded from proxy"));
    }

    debug!("Computed {} content scores at {} fps", scores.len(), fps);
    Ok(ContentScores { scores, fps })
}
