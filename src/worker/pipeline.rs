use std::io;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tempfile::TempDir;
use tokio::task;

use crate::config::PipelineConfig;
use crate::error::{CiError, Result};
use crate::scheduler::{JobId, JobRecord, JobStatus, JobStore};
use crate::worker::checkout::VersionControl;
use crate::worker::executor::ProcessRunner;

/// Drives one job from `pending` to a terminal status.
///
/// The pipeline owns the only writable copy of a running job's record. Every
/// observable change (status flip, new log lines) is published to the store as
/// a complete snapshot, so readers never see a status paired with a stale log.
pub struct Pipeline {
    vcs: Arc<dyn VersionControl>,
    process: Arc<dyn ProcessRunner>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        vcs: Arc<dyn VersionControl>,
        process: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            vcs,
            process,
            config,
        }
    }

    /// Run `record` to completion, publishing progress into `store`.
    pub async fn run(&self, store: JobStore, record: JobRecord) {
        let mut run = JobRun { store, record };

        run.record.status = JobStatus::Running;
        run.log("Starting job execution").await;
        tracing::info!(job_id = %run.record.id, "Job started");

        match self.execute(&mut run).await {
            Ok(()) => {
                tracing::info!(job_id = %run.record.id, "Job succeeded");
                run.finish(JobStatus::Success, "Command executed successfully")
                    .await;
            }
            Err(e) => {
                tracing::warn!(job_id = %run.record.id, error = %e, "Job failed");
                run.finish(JobStatus::Failure, failure_line(&e)).await;
            }
        }
    }

    /// Clone, check out, and run the command. The working directory is owned
    /// by this call and removed before it returns, on every path.
    async fn execute(&self, run: &mut JobRun) -> Result<()> {
        if run.record.command.trim().is_empty() {
            return Err(CiError::EmptyCommand);
        }

        let workdir = self.create_workdir().await.map_err(CiError::Workspace)?;
        let result = self.checkout_and_run(run, workdir.path()).await;
        remove_workdir(&run.record.id, workdir).await;
        result
    }

    async fn checkout_and_run(&self, run: &mut JobRun, path: &Path) -> Result<()> {
        let repo_uri = run.record.repo_uri.clone();
        let commit = run.record.commit.clone();
        let command = run.record.command.clone();

        run.log(format!("Cloning repository: {}", repo_uri)).await;
        self.vcs.clone_repo(&repo_uri, path).await?;

        run.log(format!("Checking out commit: {}", commit)).await;
        self.vcs.checkout(path, &commit).await?;

        run.log(format!("Repository ready at {}", path.display()))
            .await;
        run.log(format!("Executing command: {}", command)).await;

        let output = self.process.run(&command, path).await?;
        run.record.exit_code = output.exit_code;
        run.log_lines(output.lines().map(|line| format!("> {}", line)))
            .await;
        tracing::debug!(
            job_id = %run.record.id,
            exit_code = ?output.exit_code,
            success = output.success(),
            "Command completed"
        );

        output.check()
    }

    /// Create the job's working directory on the blocking pool.
    async fn create_workdir(&self) -> io::Result<TempDir> {
        let prefix = self.config.dir_prefix.clone();
        let root = self.config.work_root.clone();
        task::spawn_blocking(move || {
            let mut builder = tempfile::Builder::new();
            builder.prefix(&prefix);
            match root {
                Some(root) => builder.tempdir_in(root),
                None => builder.tempdir(),
            }
        })
        .await
        .map_err(io::Error::other)?
    }
}

/// Recursively delete a working directory on the blocking pool, waiting for
/// it so the directory is gone before the terminal status is published.
async fn remove_workdir(job_id: &JobId, workdir: TempDir) {
    let removed = task::spawn_blocking(move || workdir.close())
        .await
        .map_err(io::Error::other)
        .and_then(|result| result);
    if let Err(e) = removed {
        tracing::warn!(job_id = %job_id, error = %e, "Failed to remove working directory");
    }
}

/// Log line recorded when a job fails, describing which step failed.
fn failure_line(error: &CiError) -> String {
    match error {
        CiError::EmptyCommand => "Error: empty command".to_string(),
        CiError::Workspace(e) => format!("Failed to create temp directory: {}", e),
        CiError::Clone { reason, .. } => format!("Failed to clone repository: {}", reason),
        CiError::Checkout { reason, .. } => format!("Failed to checkout commit: {}", reason),
        other => format!("Command execution failed: {}", other),
    }
}

/// The pipeline's private copy of a job, published after every change.
struct JobRun {
    store: JobStore,
    record: JobRecord,
}

impl JobRun {
    async fn log(&mut self, line: impl Into<String>) {
        self.record.logs.push(line.into());
        self.publish().await;
    }

    async fn log_lines(&mut self, lines: impl Iterator<Item = String>) {
        let before = self.record.logs.len();
        self.record.logs.extend(lines);
        if self.record.logs.len() > before {
            self.publish().await;
        }
    }

    /// Record the final log line and terminal status as one snapshot.
    async fn finish(&mut self, status: JobStatus, line: impl Into<String>) {
        self.record.logs.push(line.into());
        self.record.status = status;
        self.record.finished_at = Some(Utc::now());
        self.publish().await;
    }

    async fn publish(&self) {
        self.store.publish(self.record.clone()).await;
    }
}
