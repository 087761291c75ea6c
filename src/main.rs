use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use storyreel::captions::srt::format_timecode;
use storyreel::config::{parse_resolution, BackendKind};
use storyreel::{
    run_render_job, AppConfig, AssetLoader, CaptionLoader, CaptionTrack, ExternalBackend, JobStatus,
    NativeBackend, PreviewSession, Project, ProjectParser, RenderBackend, RenderJob, SceneGraph,
    SceneGraphBuilder, Timeline,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "storyreel")]
#[command(about = "Scene timing, captions and rendering for story videos", long_about = None)]
struct Cli {
    /// Configuration file (defaults to ./storyreel.{toml,json,yaml} if present)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the frame rate
    #[arg(long, global = true)]
    fps: Option<u32>,

    /// Override the output resolution, e.g. 1280x720
    #[arg(long, global = true)]
    resolution: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the renderer-ready scene graph as JSON
    Build {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,
    },
    /// Print each scene's frame range
    Layout {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,
    },
    /// Evaluate the preview at a point in time
    Inspect {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// Seconds from the start of the video
        #[arg(short, long, default_value_t = 0.0)]
        time: f64,
    },
    /// Render the project to a video file
    Render {
        #[arg(value_name = "PROJECT")]
        project: PathBuf,

        /// Output directory (defaults to render.output_dir)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum)]
        backend: Option<BackendKind>,

        /// Job id used for output and status file names
        #[arg(long)]
        job_id: Option<String>,
    },
    /// Show caption entries and word timings of an SRT file
    Captions {
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Report the highlighted word at this time
        #[arg(short, long)]
        time: Option<f64>,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config =
        AppConfig::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(fps) = cli.fps {
        config.render.fps = fps;
    }
    if let Some(resolution) = cli.resolution {
        if parse_resolution(&resolution).is_none() {
            anyhow::bail!("Invalid resolution '{}', expected WIDTHxHEIGHT", resolution);
        }
        config.render.resolution = resolution;
    }

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Build { project } => {
            let (_, graph) = load_graph(&project, &config)?;
            println!("{}", serde_json::to_string_pretty(&graph)?);
        }
        Commands::Layout { project } => {
            let (project, graph) = load_graph(&project, &config)?;
            print_layout(&project, &graph);
        }
        Commands::Inspect { project, time } => {
            let (_, graph) = load_graph(&project, &config)?;
            let assets = Arc::new(asset_loader(&config)?);
            let captions = CaptionLoader::new(assets);
            let mut preview = PreviewSession::new(graph, &captions);

            match preview.tick(time) {
                Some(frame) => println!("{}", serde_json::to_string_pretty(&frame)?),
                None => println!("Nothing to show: the project has no frames"),
            }
        }
        Commands::Render {
            project,
            output,
            backend,
            job_id,
        } => {
            let (project, graph) = load_graph(&project, &config)?;
            let output_dir = output.unwrap_or_else(|| config.render.output_dir.clone());
            let job_id = job_id.unwrap_or_else(|| graph.fingerprint()[..12].to_string());
            let kind = backend.unwrap_or(config.render.backend);

            println!(
                "🎬 Rendering '{}' ({} scenes, {:.2}s)",
                project.id,
                graph.scenes.len(),
                graph.total_duration()
            );
            let backend: Box<dyn RenderBackend> = match kind {
                BackendKind::Native => Box::new(
                    NativeBackend::new(Arc::new(asset_loader(&config)?))
                        .threads(config.render.worker_threads())
                        .keep_frames(config.render.keep_frames),
                ),
                BackendKind::External => Box::new(ExternalBackend::new(
                    &config.external,
                    project.id.clone(),
                    output_dir.join(".cache"),
                )),
            };

            let job = RenderJob::new(job_id, project.id.clone(), &graph);
            let job = run_render_job(job, &graph, backend.as_ref(), &output_dir);

            match job.status {
                JobStatus::Completed => {
                    println!(
                        "✅ Render complete: {}",
                        job.result_url.as_deref().unwrap_or_default()
                    );
                }
                _ => anyhow::bail!(
                    "Render job {} failed: {}",
                    job.job_id,
                    job.error.as_deref().unwrap_or("unknown error")
                ),
            }
        }
        Commands::Captions { file, time } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read caption file: {}", file.display()))?;
            print_captions(&CaptionTrack::from_srt(&content), time);
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn load_graph(path: &Path, config: &AppConfig) -> Result<(Project, SceneGraph)> {
    let project = ProjectParser::parse_json(path)?;
    let (width, height) = config.render.dimensions();
    let graph = SceneGraphBuilder::new(config.storage.base_url.clone())
        .fps(config.render.fps)
        .resolution(width, height)
        .build(&project.scenes);
    Ok((project, graph))
}

fn asset_loader(config: &AppConfig) -> Result<AssetLoader> {
    let builder = SceneGraphBuilder::new(config.storage.base_url.clone());
    AssetLoader::new(
        builder.resolver().clone(),
        &config.storage.storage_path,
        Duration::from_secs(config.captions.fetch_timeout_secs.max(1)),
    )
}

fn print_layout(project: &Project, graph: &SceneGraph) {
    let timeline = Timeline::layout(&graph.scenes, graph.fps);
    println!("📋 {} @ {} fps", project.title.as_deref().unwrap_or(&project.id), timeline.fps());
    for range in timeline.ranges() {
        let scene = &graph.scenes[range.scene_index];
        println!(
            "  Scene {}: '{}' frames {}-{} ({} frames, {:.2}s)",
            range.scene_index + 1,
            scene.id,
            range.start_frame,
            range.end_frame,
            range.frame_count(),
            scene.duration
        );
    }
    println!("Total: {} frames ({:.2}s)", timeline.total_frames(), timeline.duration());
}

fn print_captions(track: &CaptionTrack, time: Option<f64>) {
    if track.is_empty() {
        println!("No caption entries found");
        return;
    }

    for (idx, entry) in track.entries().iter().enumerate() {
        println!(
            "{} {} --> {} {}",
            idx + 1,
            format_timecode(entry.start_time),
            format_timecode(entry.end_time),
            entry.text
        );
        for word in track.entry_words(idx).iter().filter(|w| !w.is_whitespace()) {
            println!("    {:>8.3}-{:<8.3} {}", word.start_time, word.end_time, word.text);
        }
    }

    if let Some(time) = time {
        match track.active_word(time) {
            Some(idx) => println!(
                "Active word at {:.3}s: #{} '{}'",
                time,
                idx,
                track.words()[idx].text
            ),
            None => println!("Active word at {:.3}s: none", time),
        }
    }
}
