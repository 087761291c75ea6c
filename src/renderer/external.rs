use crate::captions::CaptionStyle;
use crate::config::ExternalConfig;
use crate::error::StoryreelError;
use crate::graph::{Asset, SceneGraph};
use crate::renderer::encoder::ensure_output;
use crate::renderer::RenderBackend;
use anyhow::{Context, Result};
use regex::Regex;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const STDERR_TAIL: usize = 20;

/// Percentage from a `Progress: N%` line
pub fn parse_progress(line: &str) -> Option<u8> {
    static PROGRESS: OnceLock<Regex> = OnceLock::new();
    let re = PROGRESS.get_or_init(|| {
        Regex::new(r"(?i)progress:?\s*(\d+(?:\.\d+)?)\s*%").expect("valid regex")
    });
    let caps = re.captures(line)?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    Some(value.clamp(0.0, 100.0).round() as u8)
}

/// A scene as the external renderer reads it.
///
/// The scenes file is a bare JSON array of these. Audio is carried as
/// `voiceUrl` plus `sfxUrls`; `mediaUrl` is always null because legacy media
/// has already become an asset.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RendererScene<'a> {
    pub id: &'a str,
    pub text: &'a str,
    pub duration: f64,
    pub assets: &'a [Asset],
    pub media_url: Option<&'a str>,
    pub voice_url: Option<&'a str>,
    pub captions_url: Option<&'a str>,
    pub caption_style: &'a CaptionStyle,
    pub sfx_urls: &'a [String],
    pub transition: &'a str,
}

pub fn renderer_payload(graph: &SceneGraph) -> Vec<RendererScene<'_>> {
    graph
        .scenes
        .iter()
        .map(|scene| RendererScene {
            id: &scene.id,
            text: &scene.text,
            duration: scene.duration,
            assets: &scene.assets,
            media_url: None,
            voice_url: scene.voiceover.as_ref().map(|v| v.url.as_str()),
            captions_url: scene.captions_url.as_deref(),
            caption_style: &scene.caption_style,
            sfx_urls: &scene.sfx_urls,
            transition: &scene.transition,
        })
        .collect()
}

/// Removes the scene payload file however the render ends
struct PayloadFile(PathBuf);

impl Drop for PayloadFile {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.0) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %self.0.display(), error = %e, "failed to remove scenes file");
            }
        }
    }
}

enum ChildOutput {
    Stdout(String),
    Stderr(String),
}

/// Hands the scene graph to an out-of-process renderer.
///
/// The program is invoked as `program [args..] <projectId> <output> <scenesFile>`,
/// where the scenes file holds [`renderer_payload`] as JSON. Frame rate and
/// resolution are the renderer's own.
pub struct ExternalBackend {
    program: String,
    args: Vec<String>,
    timeout: Duration,
    cache_dir: PathBuf,
    project_id: String,
}

impl ExternalBackend {
    pub fn new(
        config: &ExternalConfig,
        project_id: impl Into<String>,
        cache_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            timeout: Duration::from_secs(config.timeout_secs.max(1)),
            cache_dir: cache_dir.into(),
            project_id: project_id.into(),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Cache key: payload plus the command that would consume it
    fn calculate_hash(&self, payload: &[u8], output: &Path) -> String {
        let mut hasher = Sha256::new();
        hasher.update(payload);
        hasher.update(self.program.as_bytes());
        for arg in &self.args {
            hasher.update(arg.as_bytes());
        }
        hasher.update(output.to_string_lossy().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn marker(&self, hash: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.done", hash))
    }

    fn run(&self, scenes_file: &Path, output: &Path, progress: &dyn Fn(u8)) -> Result<()> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .arg(&self.project_id)
            .arg(output)
            .arg(scenes_file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn renderer: {}", self.program))?;

        info!(pid = child.id(), program = %self.program, "renderer started");

        let (tx, rx) = mpsc::channel();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone(), ChildOutput::Stdout);
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx.clone(), ChildOutput::Stderr);
        }
        drop(tx);

        let deadline = Instant::now() + self.timeout;
        let mut stderr_tail: Vec<String> = Vec::new();
        let mut last_progress = 0;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(timeout = ?self.timeout, "renderer timed out, killing it");
                let _ = child.kill();
                let _ = child.wait();
                return Err(StoryreelError::RendererTimeout(self.timeout.as_secs()).into());
            }

            match rx.recv_timeout(remaining.min(POLL_INTERVAL)) {
                Ok(ChildOutput::Stdout(line)) => {
                    debug!(target: "storyreel::renderer", "{}", line);
                    if let Some(p) = parse_progress(&line) {
                        if p >= last_progress {
                            last_progress = p;
                            progress(p);
                        }
                    }
                }
                Ok(ChildOutput::Stderr(line)) => {
                    debug!(target: "storyreel::renderer", stderr = true, "{}", line);
                    if stderr_tail.len() == STDERR_TAIL {
                        stderr_tail.remove(0);
                    }
                    stderr_tail.push(line);
                }
                Err(mpsc::RecvTimeoutError::Timeout) => {}
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        let status = child.wait().context("Failed to wait for renderer")?;
        if !status.success() {
            let mut reason = status.to_string();
            if !stderr_tail.is_empty() {
                reason.push_str(": ");
                reason.push_str(&stderr_tail.join("\n"));
            }
            return Err(StoryreelError::RendererFailed(reason).into());
        }
        Ok(())
    }
}

fn forward_lines<R, F>(reader: R, tx: mpsc::Sender<ChildOutput>, wrap: F)
where
    R: Read + Send + 'static,
    F: Fn(String) -> ChildOutput + Send + 'static,
{
    thread::spawn(move || {
        for line in BufReader::new(reader).lines().map_while(Result::ok) {
            if tx.send(wrap(line)).is_err() {
                break;
            }
        }
    });
}

impl RenderBackend for ExternalBackend {
    fn name(&self) -> &'static str {
        "external"
    }

    #[tracing::instrument(skip_all, fields(project = %self.project_id, output = %output.display()))]
    fn render(&self, graph: &SceneGraph, output: &Path, progress: &dyn Fn(u8)) -> Result<PathBuf> {
        fs::create_dir_all(&self.cache_dir)
            .with_context(|| format!("Failed to create cache dir: {}", self.cache_dir.display()))?;
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let payload =
            serde_json::to_vec(&renderer_payload(graph)).context("Failed to serialize scenes")?;
        let hash = self.calculate_hash(&payload, output);
        let marker = self.marker(&hash);

        if marker.exists() && ensure_output(output).is_ok() {
            info!(%hash, "cache hit, skipping render");
            progress(100);
            return Ok(output.to_path_buf());
        }

        let scenes_file = PayloadFile(self.cache_dir.join(format!(
            "scenes_{}_{}.json",
            self.project_id,
            &hash[..12]
        )));
        fs::write(&scenes_file.0, &payload)
            .with_context(|| format!("Failed to write scenes file: {}", scenes_file.0.display()))?;
        debug!(path = %scenes_file.0.display(), bytes = payload.len(), "wrote scenes file");

        let started = Instant::now();
        self.run(&scenes_file.0, output, progress)?;
        ensure_output(output)?;

        fs::write(&marker, output.to_string_lossy().as_bytes())?;
        progress(100);
        info!(elapsed = ?started.elapsed(), "external render complete");
        Ok(output.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_without_voiceover() {
        let graph = crate::graph::SceneGraphBuilder::new("http://localhost:3001")
            .build(&[crate::project::SceneRecord::new("s1", "hi", 2.0)]);
        let json = serde_json::to_value(renderer_payload(&graph)).unwrap();
        assert!(json[0]["voiceUrl"].is_null());
        assert!(json[0]["captionsUrl"].is_null());
        assert_eq!(json[0]["duration"], 2.0);
        assert_eq!(json[0]["captionStyle"]["fontSize"], 18.0);
    }

    #[test]
    fn test_parse_progress() {
        assert_eq!(parse_progress("Progress: 42%"), Some(42));
        assert_eq!(parse_progress("[Render] progress 99.6 %"), Some(100));
        assert_eq!(parse_progress("Progress: 250%"), Some(100));
        assert_eq!(parse_progress("Bundle created"), None);
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use crate::graph::{AssetKind, SceneGraphBuilder};
        use crate::project::{AssetRecord, SceneRecord};
        use std::cell::RefCell;
        use tempfile::TempDir;

        fn graph() -> SceneGraph {
            let mut scene = SceneRecord::new("s1", "hi", 1.0);
            scene.assets = Some(vec![
                AssetRecord::new("img", AssetKind::Image, "images/a.png"),
                AssetRecord::new("voice", AssetKind::Audio, "/storage/audio/s1.mp3"),
            ]);
            scene.sfx_urls = vec!["/storage/sfx/whoosh.mp3".into()];
            SceneGraphBuilder::new("http://localhost:3001").build(&[scene])
        }

        fn backend(script: &str, cache: &Path) -> ExternalBackend {
            let config = ExternalConfig {
                program: "sh".into(),
                args: vec!["-c".into(), script.into(), "renderer".into()],
                timeout_secs: 30,
            };
            ExternalBackend::new(&config, "p1", cache)
        }

        fn leftover_payloads(cache: &Path) -> usize {
            fs::read_dir(cache)
                .unwrap()
                .filter_map(|e| e.ok())
                .filter(|e| e.file_name().to_string_lossy().starts_with("scenes_"))
                .count()
        }

        #[test]
        fn test_render_reports_progress_and_caches() {
            let dir = TempDir::new().unwrap();
            let cache = dir.path().join("cache");
            let output = dir.path().join("out.mp4");
            let script = r#"echo "Progress: 10%"; cp "$3" "$2"; echo "Progress: 60%""#;
            let seen = RefCell::new(Vec::new());

            let result = backend(script, &cache)
                .render(&graph(), &output, &|p| seen.borrow_mut().push(p))
                .unwrap();
            assert_eq!(result, output);
            assert_eq!(*seen.borrow(), vec![10, 60, 100]);

            // the renderer received the scenes array
            let written: serde_json::Value =
                serde_json::from_slice(&fs::read(&output).unwrap()).unwrap();
            let scenes = written.as_array().unwrap();
            assert_eq!(scenes.len(), 1);
            assert_eq!(scenes[0]["id"], "s1");
            assert_eq!(scenes[0]["voiceUrl"], "http://localhost:3001/storage/audio/s1.mp3");
            assert!(scenes[0]["mediaUrl"].is_null());
            assert_eq!(scenes[0]["sfxUrls"][0], "http://localhost:3001/storage/sfx/whoosh.mp3");
            assert_eq!(scenes[0]["assets"][0]["type"], "image");
            assert_eq!(scenes[0]["assets"][0]["animationType"], "fadeIn");
            assert_eq!(scenes[0]["transition"], "fade");
            assert_eq!(leftover_payloads(&cache), 0);

            // a different command misses the cache and runs
            backend("exit 1", &cache)
                .render(&graph(), &output, &|_| {})
                .unwrap_err();

            // the same command and payload is a cache hit
            let seen = RefCell::new(Vec::new());
            backend(script, &cache)
                .render(&graph(), &output, &|p| seen.borrow_mut().push(p))
                .unwrap();
            assert_eq!(*seen.borrow(), vec![100]);
        }

        #[test]
        fn test_failure_reports_stderr() {
            let dir = TempDir::new().unwrap();
            let err = backend("echo boom >&2; exit 3", dir.path())
                .render(&graph(), &dir.path().join("out.mp4"), &|_| {})
                .unwrap_err();
            match err.downcast_ref::<StoryreelError>() {
                Some(StoryreelError::RendererFailed(reason)) => assert!(reason.contains("boom")),
                other => panic!("unexpected error: {:?}", other),
            }
            assert_eq!(leftover_payloads(dir.path()), 0);
        }

        #[test]
        fn test_missing_output_is_an_error() {
            let dir = TempDir::new().unwrap();
            let err = backend("true", dir.path())
                .render(&graph(), &dir.path().join("out.mp4"), &|_| {})
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<StoryreelError>(),
                Some(StoryreelError::MissingOutput(_))
            ));
        }

        #[test]
        fn test_timeout_kills_renderer() {
            let dir = TempDir::new().unwrap();
            let started = Instant::now();
            let err = backend("exec sleep 10", dir.path())
                .with_timeout(Duration::from_millis(300))
                .render(&graph(), &dir.path().join("out.mp4"), &|_| {})
                .unwrap_err();
            assert!(matches!(
                err.downcast_ref::<StoryreelError>(),
                Some(StoryreelError::RendererTimeout(_))
            ));
            assert!(started.elapsed() < Duration::from_secs(5));
            assert_eq!(leftover_payloads(dir.path()), 0);
        }
    }
}
