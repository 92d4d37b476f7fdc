//! Local content-difference scene detection.

mod content;
mod threshold;

pub use content::{content_scores, ContentScores, FRAME_HEIGHT, FRAME_WIDTH};
pub use threshold::{
    choose_threshold, detect_cuts, local_maxima, min_scene_frames, percentile_of_sorted,
    DEFAULT_THRESHOLD,
};

use vscene_models::{BoundaryCandidate, ThresholdSpec};

/// Scenes found in a score signal plus the threshold that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneDetection {
    pub scenes: Vec<BoundaryCandidate>,
    pub threshold: f64,
}

/// Turn a content score signal into contiguous scenes covering `duration`.
///
/// With no cut the whole source is one scene. When `duration` is unknown
/// (zero) the span of the decoded frames is used instead.
pub fn scenes_from_scores(
    signal: &ContentScores,
    spec: ThresholdSpec,
    min_scene_secs: f64,
    duration: f64,
) -> SceneDetection {
    let threshold = match spec {
        ThresholdSpec::Fixed(t) => t,
        ThresholdSpec::Auto => choose_threshold(&signal.scores, signal.fps, min_scene_secs),
    };

    let min_frames = min_scene_frames(min_scene_secs, signal.fps);
    let cuts = detect_cuts(&signal.scores, threshold, min_frames);

    let end = if duration > 0.0 {
        duration
    } else {
        signal.covered_duration()
    };

    let mut edges = Vec::with_capacity(cuts.len() + 2);
    edges.push(0.0);
    edges.extend(
        cuts.iter()
            .map(|&i| signal.frame_time(i))
            .filter(|t| *t < end),
    );
    edges.push(end);

    let scenes = edges
        .windows(2)
        .filter(|w| w[1] > w[0])
        .map(|w| BoundaryCandidate::new(w[0], w[1]))
        .collect();

    SceneDetection { scenes, threshold }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signal(len: usize, spikes: &[usize]) -> ContentScores {
        let mut scores = vec![0.5; len];
        for &i in spikes {
            scores[i] = 45.0;
        }
        ContentScores { scores, fps: 10.0 }
    }

    fn spans(detection: &SceneDetection) -> Vec<(f64, f64)> {
        detection.scenes.iter().map(|s| (s.start, s.end)).collect()
    }

    #[test]
    fn test_two_changes_give_three_scenes() {
        let detection =
            scenes_from_scores(&signal(600, &[100, 400]), ThresholdSpec::Auto, 3.0, 60.0);
        assert_eq!(spans(&detection), vec![(0.0, 10.0), (10.0, 40.0), (40.0, 60.0)]);
    }

    #[test]
    fn test_close_changes_merge_into_first_scene() {
        let detection = scenes_from_scores(
            &signal(600, &[10, 20, 500]),
            ThresholdSpec::Fixed(27.0),
            3.0,
            60.0,
        );
        assert_eq!(spans(&detection), vec![(0.0, 50.0), (50.0, 60.0)]);
        assert_eq!(detection.threshold, 27.0);
    }

    #[test]
    fn test_no_cut_is_single_scene() {
        let detection = scenes_from_scores(&signal(300, &[]), ThresholdSpec::Fixed(27.0), 3.0, 0.0);
        assert_eq!(spans(&detection), vec![(0.0, 30.0)]);
    }
}
