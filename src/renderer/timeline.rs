use crate::graph::RenderScene;
use serde::Serialize;

/// Frames occupied by one scene; `end_frame` is inclusive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneRange {
    pub scene_index: usize,
    pub start_frame: u64,
    pub end_frame: u64,
}

impl SceneRange {
    pub fn frame_count(&self) -> u64 {
        self.end_frame - self.start_frame + 1
    }

    pub fn contains(&self, frame: u64) -> bool {
        frame >= self.start_frame && frame <= self.end_frame
    }
}

/// Number of frames a scene of `duration` seconds occupies; never zero
pub fn scene_frames(duration: f64, fps: u32) -> u64 {
    let frames = (duration * fps as f64).round();
    if frames.is_finite() && frames >= 1.0 {
        frames as u64
    } else {
        1
    }
}

/// Scenes laid out back to back on a global frame axis
#[derive(Debug, Clone, PartialEq)]
pub struct Timeline {
    fps: u32,
    total_frames: u64,
    ranges: Vec<SceneRange>,
}

impl Timeline {
    /// Assign each scene a contiguous frame range, in order, from frame 0
    pub fn layout(scenes: &[RenderScene], fps: u32) -> Self {
        Self::from_durations(scenes.iter().map(|s| s.duration), fps)
    }

    /// Frame arithmetic saturates, so absurd durations pin the timeline at
    /// `u64::MAX` instead of wrapping.
    pub fn from_durations(durations: impl IntoIterator<Item = f64>, fps: u32) -> Self {
        let fps = fps.max(1);
        let mut ranges = Vec::new();
        let mut current_frame: u64 = 0;

        for (scene_index, duration) in durations.into_iter().enumerate() {
            let frames = scene_frames(duration, fps);
            ranges.push(SceneRange {
                scene_index,
                start_frame: current_frame,
                end_frame: current_frame.saturating_add(frames - 1),
            });
            current_frame = current_frame.saturating_add(frames);
        }

        Self {
            fps,
            total_frames: current_frame,
            ranges,
        }
    }

    pub fn ranges(&self) -> &[SceneRange] {
        &self.ranges
    }

    /// Range of the scene showing at `frame`
    pub fn scene_at_frame(&self, frame: u64) -> Option<&SceneRange> {
        if frame >= self.total_frames {
            return None;
        }
        let idx = self.ranges.partition_point(|r| r.end_frame < frame);
        self.ranges.get(idx)
    }

    /// Scene-local time of a global frame
    pub fn local_time(&self, frame: u64) -> Option<(usize, f64)> {
        self.scene_at_frame(frame).map(|r| {
            (
                r.scene_index,
                (frame - r.start_frame) as f64 / self.fps as f64,
            )
        })
    }

    /// Global frame showing at `seconds`, clamped to the timeline
    pub fn frame_at_time(&self, seconds: f64) -> u64 {
        let last = self.total_frames.saturating_sub(1);
        if !(seconds > 0.0) {
            return 0;
        }
        // tolerate float error so frame_to_time round-trips
        let frame = (seconds * self.fps as f64 + 1e-6).floor();
        if frame >= last as f64 {
            last
        } else {
            frame as u64
        }
    }

    pub fn total_frames(&self) -> u64 {
        self.total_frames
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    pub fn duration(&self) -> f64 {
        self.frame_to_time(self.total_frames)
    }

    /// Convert frame number to time in seconds
    pub fn frame_to_time(&self, frame: u64) -> f64 {
        frame as f64 / self.fps as f64
    }
}
