use crate::assets::AssetLoader;
use crate::captions::{CaptionLoader, CaptionTrack};
use crate::eval::evaluate_scene;
use crate::graph::SceneGraph;
use crate::renderer::encoder::{place_audio, EncodeJob, VideoEncoder};
use crate::renderer::{Compositor, FrameBuffer, RenderBackend, Timeline};
use anyhow::{Context, Result};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Share of progress spent painting frames; encoding takes the rest
const FRAME_PROGRESS: u64 = 90;
const FRAME_PATTERN: &str = "frame_%06d.png";

fn frame_file(frame: u64) -> String {
    format!("frame_{:06}.png", frame)
}

/// In-process renderer: paints every frame, then muxes with ffmpeg
pub struct NativeBackend {
    compositor: Compositor,
    captions: CaptionLoader,
    threads: usize,
    keep_frames: bool,
}

impl NativeBackend {
    pub fn new(assets: Arc<AssetLoader>) -> Self {
        Self {
            compositor: Compositor::new(Arc::clone(&assets)),
            captions: CaptionLoader::new(assets),
            threads: num_cpus::get().max(1),
            keep_frames: false,
        }
    }

    pub fn threads(mut self, threads: usize) -> Self {
        self.threads = threads.max(1);
        self
    }

    pub fn keep_frames(mut self, keep: bool) -> Self {
        self.keep_frames = keep;
        self
    }

    /// Paint one global frame. `None` past the end of the timeline.
    pub fn render_frame(
        &self,
        graph: &SceneGraph,
        timeline: &Timeline,
        tracks: &[CaptionTrack],
        frame: u64,
    ) -> Option<FrameBuffer> {
        let (scene_index, local_time) = timeline.local_time(frame)?;
        let scene = graph.scenes.get(scene_index)?;
        let track = tracks.get(scene_index)?;

        let state = evaluate_scene(scene, track, local_time);
        let mut buffer = FrameBuffer::new(graph.width, graph.height);
        self.compositor.paint(&mut buffer, scene, track, &state);
        Some(buffer)
    }

    /// Write every frame as a PNG into `frames_dir`; returns the frame count
    pub fn render_frames(
        &self,
        graph: &SceneGraph,
        frames_dir: &Path,
        progress: &dyn Fn(u8),
    ) -> Result<u64> {
        fs::create_dir_all(frames_dir)
            .with_context(|| format!("Failed to create frames dir: {}", frames_dir.display()))?;

        let timeline = Timeline::layout(&graph.scenes, graph.fps);
        let tracks = self.captions.tracks_for(graph);
        let total = timeline.total_frames();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .context("Failed to build render thread pool")?;

        info!(frames = total, threads = self.threads, "painting frames");
        let chunk = (self.threads as u64 * 4).max(graph.fps as u64).max(1);
        let mut done = 0;
        while done < total {
            let end = (done + chunk).min(total);
            pool.install(|| {
                (done..end).into_par_iter().try_for_each(|frame| -> Result<()> {
                    if let Some(buffer) = self.render_frame(graph, &timeline, &tracks, frame) {
                        buffer.save_png(&frames_dir.join(frame_file(frame)))?;
                    }
                    Ok(())
                })
            })?;
            done = end;
            debug!(done, total, "frames written");
            progress((done * FRAME_PROGRESS / total) as u8);
        }
        Ok(total)
    }
}

impl RenderBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    #[tracing::instrument(
        skip_all,
        fields(output = %output.display(), scenes = graph.scenes.len())
    )]
    fn render(&self, graph: &SceneGraph, output: &Path, progress: &dyn Fn(u8)) -> Result<PathBuf> {
        let started = Instant::now();
        let frames_dir = output.with_extension("frames");
        let frames = self.render_frames(graph, &frames_dir, progress)?;

        let timeline = Timeline::layout(&graph.scenes, graph.fps);
        let job = EncodeJob {
            frame_pattern: frames_dir.join(FRAME_PATTERN),
            output: output.to_path_buf(),
            fps: graph.fps,
            width: graph.width,
            height: graph.height,
            duration: timeline.duration(),
            audio: place_audio(graph, &timeline),
        };
        let result = VideoEncoder::encode(&job);

        if !self.keep_frames {
            remove_frames(&frames_dir);
        }
        let path = result?;

        progress(100);
        info!(frames, elapsed = ?started.elapsed(), "native render complete");
        Ok(path)
    }
}

/// Delete a frames directory, logging instead of failing the render
fn remove_frames(frames_dir: &Path) -> bool {
    match fs::remove_dir_all(frames_dir) {
        Ok(()) => true,
        Err(e) => {
            warn!(dir = %frames_dir.display(), error = %e, "failed to remove frames");
            false
        }
    }
}
