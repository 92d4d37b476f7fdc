//! Threshold selection and cut placement over a content score signal.

use tracing::debug;

/// Threshold used when no score distribution is available.
pub const DEFAULT_THRESHOLD: f64 = 27.0;

/// Percentiles tried as candidate thresholds during automatic selection.
const CANDIDATE_PERCENTILES: [f64; 14] = [
    80.0, 85.0, 90.0, 92.5, 95.0, 97.0, 98.0, 98.5, 99.0, 99.2, 99.4, 99.6, 99.8, 99.9,
];

/// Percentile used when no candidate satisfies the minimum scene length.
const FALLBACK_PERCENTILE: f64 = 98.0;

/// Minimum scene length in frames, never below one.
pub fn min_scene_frames(min_scene_secs: f64, fps: f64) -> usize {
    ((min_scene_secs * fps).floor() as usize).max(1)
}

/// Linear-interpolated percentile of an ascending slice, `percent` in [0, 100].
pub fn percentile_of_sorted(sorted: &[f64], percent: f64) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => return None,
        1 => return Some(sorted[0]),
        _ => {}
    }
    if percent <= 0.0 {
        return Some(sorted[0]);
    }
    if percent >= 100.0 {
        return Some(sorted[n - 1]);
    }

    let rank = percent / 100.0 * (n - 1) as f64;
    let low = rank.floor() as usize;
    let high = (low + 1).min(n - 1);
    let fraction = rank - low as f64;
    Some(sorted[low] * (1.0 - fraction) + sorted[high] * fraction)
}

/// Local maxima of `values`, scanning left to right and skipping indices
/// closer than `min_separation` to the previously accepted peak.
pub fn local_maxima(values: &[f64], min_separation: usize) -> Vec<usize> {
    let mut peaks = Vec::new();
    let mut last: Option<usize> = None;

    for i in 1..values.len().saturating_sub(1) {
        if last.is_some_and(|l| i - l < min_separation) {
            continue;
        }
        if values[i] > values[i - 1] && values[i] >= values[i + 1] {
            peaks.push(i);
            last = Some(i);
        }
    }
    peaks
}

/// Pick a threshold from the score distribution.
///
/// Every candidate percentile is scored by the scenes its peaks would
/// produce; candidates yielding a scene shorter than the minimum are
/// rejected and the one with most scenes (then lowest value) wins.
pub fn choose_threshold(scores: &[f64], fps: f64, min_scene_secs: f64) -> f64 {
    if scores.is_empty() {
        return DEFAULT_THRESHOLD;
    }

    let min_sep = min_scene_frames(min_scene_secs, fps);
    let mut sorted = scores.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut candidates: Vec<f64> = CANDIDATE_PERCENTILES
        .iter()
        .filter_map(|p| percentile_of_sorted(&sorted, *p))
        .collect();
    candidates.sort_by(|a, b| a.total_cmp(b));
    candidates.dedup();

    let peaks = local_maxima(scores, min_sep);
    let last_index = scores.len() - 1;

    let mut best: Option<(usize, f64)> = None;
    for &t in &candidates {
        let kept: Vec<usize> = peaks.iter().copied().filter(|&i| scores[i] > t).collect();
        if kept.is_empty() {
            continue;
        }

        let mut bounds = Vec::with_capacity(kept.len() + 2);
        bounds.push(0);
        bounds.extend(kept);
        bounds.push(last_index);
        if bounds.windows(2).any(|w| w[1].saturating_sub(w[0]) < min_sep) {
            continue;
        }

        let count = bounds.len() - 1;
        let better = match best {
            None => true,
            Some((best_count, best_t)) => count > best_count || (count == best_count && t < best_t),
        };
        if better {
            best = Some((count, t));
        }
    }

    match best {
        Some((count, t)) => {
            debug!("Auto threshold {:.2} yields {} scenes", t, count);
            t
        }
        None => percentile_of_sorted(&sorted, FALLBACK_PERCENTILE).unwrap_or(DEFAULT_THRESHOLD),
    }
}

/// Frame indices where a new scene starts.
///
/// A cut fires where the score exceeds `threshold` and at least
/// `min_frames` have passed since the previous cut, counting from frame 0.
/// Later cuts inside that window are dropped, extending the earlier scene.
pub fn detect_cuts(scores: &[f64], threshold: f64, min_frames: usize) -> Vec<usize> {
    let mut cuts = Vec::new();
    let mut last_cut = 0usize;

    for (i, &score) in scores.iter().enumerate().skip(1) {
        if score > threshold && i - last_cut >= min_frames {
            cuts.push(i);
            last_cut = i;
        }
    }
    cuts
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Flat signal with spikes at the given frame indices.
    fn spiky(len: usize, spikes: &[usize]) -> Vec<f64> {
        let mut scores = vec![0.0; len];
        for &i in spikes {
            scores[i] = 50.0;
        }
        scores
    }

    #[test]
    fn test_percentile_interpolates() {
        let sorted = [1.0, 2.0, 3.0, 4.0, 5.0];
        assert_eq!(percentile_of_sorted(&sorted, 0.0), Some(1.0));
        assert_eq!(percentile_of_sorted(&sorted, 50.0), Some(3.0));
        assert_eq!(percentile_of_sorted(&sorted, 100.0), Some(5.0));
        assert!((percentile_of_sorted(&sorted, 90.0).unwrap() - 4.6).abs() < 1e-9);
        assert_eq!(percentile_of_sorted(&[], 50.0), None);
        assert_eq!(percentile_of_sorted(&[7.0], 99.0), Some(7.0));
    }

    #[test]
    fn test_local_maxima_respects_separation() {
        let values = [0.0, 5.0, 0.0, 6.0, 0.0, 0.0, 4.0, 4.0, 0.0];
        assert_eq!(local_maxima(&values, 1), vec![1, 3, 6]);
        assert_eq!(local_maxima(&values, 3), vec![1, 6]);
    }

    #[test]
    fn test_choose_threshold_without_scores() {
        assert_eq!(choose_threshold(&[], 10.0, 3.0), DEFAULT_THRESHOLD);
    }

    #[test]
    fn test_detect_cuts_debounces_from_start() {
        // Changes at 1s, 2s and 50s at 10 fps, minimum scene 3s
        let scores = spiky(600, &[10, 20, 500]);
        assert_eq!(detect_cuts(&scores, 20.0, 30), vec![500]);
    }

    #[test]
    fn test_auto_threshold_finds_both_changes() {
        // Changes at 10s and 40s of a 60s source sampled at 10 fps
        let scores = spiky(600, &[100, 400]);
        let threshold = choose_threshold(&scores, 10.0, 3.0);
        assert!(threshold < 50.0);
        assert_eq!(detect_cuts(&scores, threshold, 30), vec![100, 400]);
    }

    #[test]
    fn test_auto_threshold_falls_back_when_scenes_too_short() {
        let scores = spiky(600, &[10, 20, 500]);
        let threshold = choose_threshold(&scores, 10.0, 3.0);
        let sorted = {
            let mut s = scores.clone();
            s.sort_by(|a, b| a.total_cmp(b));
            s
        };
        assert_eq!(threshold, percentile_of_sorted(&sorted, 98.0).unwrap());
        assert_eq!(detect_cuts(&scores, threshold, 30), vec![500]);
    }

    #[test]
    fn test_fixed_threshold_above_signal_has_no_cuts() {
        let scores = spiky(600, &[100, 400]);
        assert!(detect_cuts(&scores, 60.0, 30).is_empty());
    }
}
