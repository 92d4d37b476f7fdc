//! FFmpeg CLI wrapper, source fetching and local scene detection.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with progress parsing and timeouts
//! - Source download with a hard size limit and resume
//! - Analysis proxy transcoding and fast/precise segment export
//! - A frame content-difference detector with automatic threshold selection

pub mod command;
pub mod detection;
pub mod error;
pub mod fetch;
pub mod probe;
pub mod progress;
pub mod proxy;
pub mod segment;
pub mod toolkit;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use detection::{scenes_from_scores, ContentScores, SceneDetection, DEFAULT_THRESHOLD};
pub use error::{MediaError, MediaResult};
pub use fetch::{HttpFetcher, SourceFetcher, DEFAULT_MAX_SOURCE_BYTES};
pub use probe::{keyframe_times, probe_video, VideoInfo};
pub use progress::{FfmpegProgress, ProgressCallback};
pub use proxy::{transcode_proxy, ProxySpec};
pub use segment::{align_to_keyframes, export_segment, SegmentSpec, MIN_SEGMENT_SECS};
pub use toolkit::{FfmpegToolkit, FractionCallback, MediaToolkit};
