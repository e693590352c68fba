//! Frame scheduling: which scene a frame belongs to and how far into it.

use inkreel_ir::Scene;

/// Frames covering `duration_ms` at `fps`, rounded half up.
pub fn frames_for_duration(duration_ms: u64, fps: u32) -> u64 {
    (duration_ms.saturating_mul(fps as u64).saturating_add(500)) / 1000
}

/// Position of one output frame within the scene sequence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePosition {
    /// Global frame index.
    pub frame: u64,
    pub scene_index: usize,
    /// Index of the frame within its scene.
    pub scene_frame: u64,
    /// Frame count of the scene.
    pub scene_frames: u64,
    /// `scene_frame / max(1, scene_frames)`, clamped to `[0, 1]`.
    pub progress: f64,
}

impl FramePosition {
    /// Frames left in the scene after this one.
    pub fn frames_remaining(&self) -> u64 {
        self.scene_frames.saturating_sub(self.scene_frame + 1)
    }
}

/// Frame plan for an ordered list of scenes.
///
/// The video length is rounded once from the summed durations while each
/// scene's length is rounded on its own, so the two can drift apart by a few
/// frames. Frames past the last scene are not scheduled.
#[derive(Debug, Clone)]
pub struct Timeline {
    fps: u32,
    scene_frames: Vec<u64>,
    scene_starts: Vec<u64>,
    total_frames: u64,
}

impl Timeline {
    pub fn new(durations_ms: impl IntoIterator<Item = u64>, fps: u32) -> Self {
        let durations: Vec<u64> = durations_ms.into_iter().collect();
        let total_ms: u64 = durations.iter().sum();
        let scene_frames: Vec<u64> = durations
            .iter()
            .map(|&ms| frames_for_duration(ms, fps))
            .collect();
        let mut scene_starts = Vec::with_capacity(scene_frames.len());
        let mut acc = 0;
        for count in &scene_frames {
            scene_starts.push(acc);
            acc += count;
        }
        Self {
            fps,
            scene_frames,
            scene_starts,
            total_frames: frames_for_duration(total_ms, fps),
        }
    }

    pub fn for_scenes(scenes: &[Scene], fps: u32) -> Self {
        Self::new(scenes.iter().map(|s| s.duration_ms), fps)
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Nominal frame count of the whole video.
    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    /// Frames actually scheduled: the nominal count, capped by the scenes.
    pub fn scheduled_frames(&self) -> u64 {
        self.total_frames.min(self.scene_frames.iter().sum())
    }

    pub fn scene_count(&self) -> usize {
        self.scene_frames.len()
    }

    pub fn scene_frame_count(&self, scene_index: usize) -> Option<u64> {
        self.scene_frames.get(scene_index).copied()
    }

    pub fn scene_start(&self, scene_index: usize) -> Option<u64> {
        self.scene_starts.get(scene_index).copied()
    }

    /// Locate `frame`. `None` when it lies past the nominal length or past
    /// the last scene.
    pub fn locate(&self, frame: u64) -> Option<FramePosition> {
        if frame >= self.total_frames {
            return None;
        }
        let mut start = 0u64;
        for (scene_index, &count) in self.scene_frames.iter().enumerate() {
            if frame < start + count {
                let scene_frame = frame - start;
                let progress = (scene_frame as f64 / count.max(1) as f64).clamp(0.0, 1.0);
                return Some(FramePosition {
                    frame,
                    scene_index,
                    scene_frame,
                    scene_frames: count,
                    progress,
                });
            }
            start += count;
        }
        None
    }

    /// All scheduled frames in order, stopping at the first unplaceable one.
    pub fn frames(&self) -> impl Iterator<Item = FramePosition> + '_ {
        (0..self.total_frames).map_while(move |f| self.locate(f))
    }
}
