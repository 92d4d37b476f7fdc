use tracing::info;
use vscene_media::{align_to_keyframes, MIN_SEGMENT_SECS};
use vscene_models::{BoundaryCandidate, ExportMode};

/// One segment to cut, export and publish.
#[derive(Debug, Clone, PartialEq)]
pub struct ClipTask {
    /// Position of the scene in the validated sequence
    pub index: u32,
    /// Scene boundary as detected
    pub requested_start: f64,
    pub requested_end: f64,
    /// Export range; keyframe aligned in fast mode
    pub start: f64,
    pub end: f64,
    pub title: Option<String>,
    pub description: Option<String>,
}

impl ClipTask {
    /// 1-based sequence used in the object key.
    pub fn sequence(&self) -> u32 {
        self.index + 1
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Build one task per scene.
///
/// Fast mode snaps each range inward onto keyframes. Ranges left shorter
/// than [`MIN_SEGMENT_SECS`] cannot be exported and are skipped.
pub fn generate_clip_tasks(
    scenes: &[BoundaryCandidate],
    mode: ExportMode,
    keyframes: &[f64],
) -> Vec<ClipTask> {
    let mut tasks = Vec::with_capacity(scenes.len());

    for (i, scene) in scenes.iter().enumerate() {
        let (start, end) = match mode {
            ExportMode::Fast => align_to_keyframes(scene.start, scene.end, keyframes),
            ExportMode::Precise => (scene.start, scene.end),
        };

        if end - start < MIN_SEGMENT_SECS {
            info!(
                index = i,
                requested_start = scene.start,
                requested_end = scene.end,
                "Skipping scene with no exportable range"
            );
            continue;
        }

        tasks.push(ClipTask {
            index: i as u32,
            requested_start: scene.start,
            requested_end: scene.end,
            start,
            end,
            title: scene.title.clone(),
            description: scene.description.clone(),
        });
    }

    tasks
}
