//! Shared boundary validation, applied to every provider's output.

use tracing::debug;
use vscene_models::BoundaryCandidate;

/// Parameters for [`validate_boundaries`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryRules {
    pub min_scene_secs: f64,
    /// Seconds trimmed from each scene start
    pub trim_start: f64,
    /// Seconds trimmed from each scene end
    pub trim_end: f64,
    /// Source duration; candidates are clamped to it when positive
    pub duration: f64,
}

/// Clean provider candidates into ordered, non-overlapping scenes.
///
/// Steps, in order:
/// 1. drop ill-formed candidates and clamp to the source duration
/// 2. sort by start time
/// 3. a candidate touching or overlapping the previous scene is merged into
///    it when either is shorter than the minimum; otherwise the overlap is
///    cut from the later one
/// 4. drop isolated scenes shorter than the minimum
/// 5. apply start/end trims and drop what falls under the minimum
pub fn validate_boundaries(
    candidates: Vec<BoundaryCandidate>,
    rules: &BoundaryRules,
) -> Vec<BoundaryCandidate> {
    let received = candidates.len();
    let min = rules.min_scene_secs.max(0.0);

    let mut ordered: Vec<BoundaryCandidate> = candidates
        .into_iter()
        .filter(BoundaryCandidate::is_well_formed)
        .filter_map(|mut c| {
            if rules.duration > 0.0 {
                c.end = c.end.min(rules.duration);
            }
            c.is_well_formed().then_some(c)
        })
        .collect();
    ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut merged: Vec<BoundaryCandidate> = Vec::with_capacity(ordered.len());
    for mut candidate in ordered {
        let Some(prev) = merged.last_mut() else {
            merged.push(candidate);
            continue;
        };

        if candidate.start > prev.end {
            merged.push(candidate);
            continue;
        }

        if prev.duration() < min || candidate.duration() < min {
            absorb(prev, candidate);
            continue;
        }

        candidate.start = candidate.start.max(prev.end);
        if candidate.end <= candidate.start {
            continue;
        }
        if candidate.duration() < min {
            absorb(prev, candidate);
        } else {
            merged.push(candidate);
        }
    }

    let scenes: Vec<BoundaryCandidate> = merged
        .into_iter()
        .filter(|c| c.duration() >= min)
        .filter_map(|mut c| {
            c.start += rules.trim_start.max(0.0);
            c.end -= rules.trim_end.max(0.0);
            (c.end > c.start && c.duration() >= min).then_some(c)
        })
        .collect();

    debug!(
        received,
        kept = scenes.len(),
        min_scene_secs = min,
        "Validated scene boundaries"
    );
    scenes
}

/// Extend `prev` over `next`, keeping the first label seen.
fn absorb(prev: &mut BoundaryCandidate, next: BoundaryCandidate) {
    prev.end = prev.end.max(next.end);
    if prev.title.is_none() {
        prev.title = next.title;
    }
    if prev.description.is_none() {
        prev.description = next.description;
    }
}
