use crate::captions::{CaptionLoader, CaptionTrack};
use crate::eval::{evaluate_scene, FrameState};
use crate::graph::SceneGraph;
use crate::renderer::Timeline;
use serde::Serialize;

/// What the preview shows at one tick
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewFrame {
    pub scene_index: usize,
    pub frame: u64,
    pub local_time: f64,
    pub state: FrameState,
}

/// Interactive playback over a scene graph.
///
/// Caption tracks are resolved up front so `tick` never does I/O.
pub struct PreviewSession {
    graph: SceneGraph,
    timeline: Timeline,
    tracks: Vec<CaptionTrack>,
    position: f64,
}

impl PreviewSession {
    pub fn new(graph: SceneGraph, captions: &CaptionLoader) -> Self {
        let tracks = captions.tracks_for(&graph);
        Self::with_tracks(graph, tracks)
    }

    /// Session over already-resolved tracks, one per scene. Missing tracks
    /// are estimated from scene text.
    pub fn with_tracks(graph: SceneGraph, mut tracks: Vec<CaptionTrack>) -> Self {
        for scene in graph.scenes.iter().skip(tracks.len()) {
            tracks.push(CaptionTrack::from_plain_text(&scene.text, scene.duration));
        }
        let timeline = Timeline::layout(&graph.scenes, graph.fps);
        Self {
            graph,
            timeline,
            tracks,
            position: 0.0,
        }
    }

    pub fn graph(&self) -> &SceneGraph {
        &self.graph
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    pub fn track(&self, scene_index: usize) -> Option<&CaptionTrack> {
        self.tracks.get(scene_index)
    }

    pub fn duration(&self) -> f64 {
        self.timeline.duration()
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    /// Move the playhead without evaluating
    pub fn seek(&mut self, seconds: f64) {
        self.position = if seconds.is_finite() {
            seconds.clamp(0.0, self.duration())
        } else {
            0.0
        };
    }

    /// Evaluate the frame showing at `global_seconds`
    pub fn tick(&mut self, global_seconds: f64) -> Option<PreviewFrame> {
        self.seek(global_seconds);
        let frame = self.timeline.frame_at_time(self.position);
        let (scene_index, local_time) = self.timeline.local_time(frame)?;
        let scene = self.graph.scenes.get(scene_index)?;
        let track = self.tracks.get(scene_index)?;

        Some(PreviewFrame {
            scene_index,
            frame,
            local_time,
            state: evaluate_scene(scene, track, local_time),
        })
    }
}
