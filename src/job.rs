//! Render job status and the runner that drives a backend for one job.

use crate::graph::SceneGraph;
use crate::renderer::RenderBackend;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[default]
    Queued,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_finished(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// Pollable state of one render
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderJob {
    pub job_id: String,
    pub project_id: String,
    pub status: JobStatus,
    /// 0..=100, never decreases
    pub progress: u8,
    pub result_url: Option<String>,
    pub error: Option<String>,
    pub resolution: String,
    pub fps: u32,
    pub format: String,
}

impl RenderJob {
    pub fn new(
        job_id: impl Into<String>,
        project_id: impl Into<String>,
        graph: &SceneGraph,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            project_id: project_id.into(),
            status: JobStatus::Queued,
            progress: 0,
            result_url: None,
            error: None,
            resolution: format!("{}x{}", graph.width, graph.height),
            fps: graph.fps,
            format: "mp4".to_string(),
        }
    }

    pub fn start(&mut self) {
        if self.status == JobStatus::Queued {
            self.status = JobStatus::Processing;
            self.progress = 0;
        }
    }

    /// Record progress; returns whether anything changed
    pub fn set_progress(&mut self, progress: u8) -> bool {
        let progress = progress.min(100);
        if self.status != JobStatus::Processing || progress <= self.progress {
            return false;
        }
        self.progress = progress;
        true
    }

    pub fn complete(&mut self, result_url: impl Into<String>) {
        if !self.status.is_finished() {
            self.status = JobStatus::Completed;
            self.progress = 100;
            self.result_url = Some(result_url.into());
            self.error = None;
        }
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        if !self.status.is_finished() {
            self.status = JobStatus::Failed;
            self.error = Some(message.into());
        }
    }

    pub fn output_file(&self) -> String {
        format!("render_{}.{}", self.job_id, self.format)
    }

    pub fn status_file(&self) -> String {
        format!("render_{}.json", self.job_id)
    }

    /// Write the status JSON into `dir`
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        let path = dir.join(self.status_file());
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)
            .with_context(|| format!("Failed to write job status: {}", path.display()))?;
        Ok(path)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read job status: {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse job status: {}", path.display()))
    }
}

fn persist(job: &RenderJob, dir: &Path) {
    if let Err(e) = job.save(dir) {
        warn!(job = %job.job_id, error = %e, "could not persist job status");
    }
}

/// Drive `backend` for `job`, keeping its status file in `output_dir`
/// current. Failures end up in the returned job rather than as an error.
#[tracing::instrument(skip_all, fields(job = %job.job_id, backend = backend.name()))]
pub fn run_render_job(
    job: RenderJob,
    graph: &SceneGraph,
    backend: &dyn RenderBackend,
    output_dir: &Path,
) -> RenderJob {
    let job = RefCell::new(job);

    if let Err(e) = fs::create_dir_all(output_dir) {
        let mut job = job.into_inner();
        job.fail(format!("Failed to create output dir {}: {}", output_dir.display(), e));
        return job;
    }

    job.borrow_mut().start();
    persist(&job.borrow(), output_dir);

    let output = output_dir.join(job.borrow().output_file());
    info!(output = %output.display(), "render job started");

    let result = backend.render(graph, &output, &|p| {
        let changed = job.borrow_mut().set_progress(p);
        if changed {
            persist(&job.borrow(), output_dir);
        }
    });

    let mut job = job.into_inner();
    match result {
        Ok(path) => {
            job.complete(path.to_string_lossy());
            info!("render job completed");
        }
        Err(e) => {
            error!(error = %format!("{:#}", e), "render job failed");
            job.fail(format!("{:#}", e));
        }
    }
    persist(&job, output_dir);
    job
}
