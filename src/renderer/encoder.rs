use crate::error::StoryreelError;
use crate::graph::SceneGraph;
use crate::renderer::Timeline;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info};

/// An audio stream placed on the global timeline
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedAudio {
    pub url: String,
    /// Seconds from the start of the video
    pub offset: f64,
    pub volume: f64,
}

/// Every scene's audio, shifted to where the scene starts
pub fn place_audio(graph: &SceneGraph, timeline: &Timeline) -> Vec<PlacedAudio> {
    timeline
        .ranges()
        .iter()
        .filter_map(|range| {
            let scene = graph.scenes.get(range.scene_index)?;
            let scene_start = timeline.frame_to_time(range.start_frame);
            Some(scene.audio_tracks().into_iter().map(move |track| PlacedAudio {
                url: track.url,
                offset: scene_start + track.start_time,
                volume: track.volume,
            }))
        })
        .flatten()
        .filter(|a| !a.url.is_empty() && a.volume > 0.0)
        .collect()
}

/// Inputs for one encode
#[derive(Debug, Clone)]
pub struct EncodeJob {
    /// printf-style frame pattern, e.g. `frames/frame_%06d.png`
    pub frame_pattern: PathBuf,
    pub output: PathBuf,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
    pub duration: f64,
    pub audio: Vec<PlacedAudio>,
}

/// Handles video encoding using external FFmpeg process
pub struct VideoEncoder;

impl VideoEncoder {
    /// Check if FFmpeg is available
    pub fn is_available() -> bool {
        Command::new("ffmpeg").arg("-version").output().is_ok()
    }

    /// Command line for `job`, without the program name
    pub fn args(job: &EncodeJob) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-y".into(),
            "-hide_banner".into(),
            "-loglevel".into(),
            "error".into(),
            "-f".into(),
            "image2".into(),
            "-framerate".into(),
            job.fps.to_string(),
            "-i".into(),
            job.frame_pattern.to_string_lossy().into_owned(),
        ];

        for audio in &job.audio {
            args.push("-i".into());
            args.push(audio.url.clone());
        }

        if !job.audio.is_empty() {
            let mut filter = String::new();
            for (i, audio) in job.audio.iter().enumerate() {
                let delay = (audio.offset.max(0.0) * 1000.0).round() as u64;
                filter.push_str(&format!(
                    "[{}:a]adelay={}|{},volume={:.3}[a{}];",
                    i + 1,
                    delay,
                    delay,
                    audio.volume,
                    i
                ));
            }
            for i in 0..job.audio.len() {
                filter.push_str(&format!("[a{}]", i));
            }
            filter.push_str(&format!(
                "amix=inputs={}:duration=longest:normalize=0[aout]",
                job.audio.len()
            ));

            args.extend([
                "-filter_complex".into(),
                filter,
                "-map".into(),
                "0:v".into(),
                "-map".into(),
                "[aout]".into(),
                "-c:a".into(),
                "aac".into(),
            ]);
        }

        args.extend([
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-s".into(),
            format!("{}x{}", job.width, job.height),
            "-t".into(),
            format!("{:.3}", job.duration),
            job.output.to_string_lossy().into_owned(),
        ]);
        args
    }

    /// Encode a sequence of frames, mixing in the job's audio
    pub fn encode(job: &EncodeJob) -> Result<PathBuf> {
        if !Self::is_available() {
            return Err(StoryreelError::EncoderUnavailable.into());
        }

        info!(output = %job.output.display(), tracks = job.audio.len(), "encoding video");
        let args = Self::args(job);
        debug!(?args, "ffmpeg");

        let output = Command::new("ffmpeg")
            .args(&args)
            .output()
            .context("Failed to execute ffmpeg")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            let reason = tail.into_iter().rev().collect::<Vec<_>>().join("\n");
            return Err(StoryreelError::EncoderFailed(reason).into());
        }

        ensure_output(&job.output)?;
        Ok(job.output.clone())
    }
}

pub(crate) fn ensure_output(path: &Path) -> Result<()> {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() > 0 => Ok(()),
        _ => Err(StoryreelError::MissingOutput(path.to_path_buf()).into()),
    }
}
