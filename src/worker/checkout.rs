use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{CiError, Result};

/// Produces a local working copy of a repository at a given revision.
#[async_trait]
pub trait VersionControl: Send + Sync {
    /// Clone `uri` into `dest`, which already exists and is empty.
    async fn clone_repo(&self, uri: &str, dest: &Path) -> Result<()>;

    /// Check out `revision` in the working copy at `dir`.
    async fn checkout(&self, dir: &Path, revision: &str) -> Result<()>;
}

/// Drives the `git` binary found on `PATH`.
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    pub fn new() -> Self {
        Self
    }

    fn git() -> Command {
        let mut cmd = Command::new("git");
        // Never block on a credential prompt for an unreachable remote.
        cmd.env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    fn failure_reason(output: &std::process::Output) -> String {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stderr = stderr.trim();
        if stderr.is_empty() {
            output.status.to_string()
        } else {
            stderr.to_string()
        }
    }
}

#[async_trait]
impl VersionControl for GitCli {
    async fn clone_repo(&self, uri: &str, dest: &Path) -> Result<()> {
        tracing::debug!(uri, dest = %dest.display(), "git clone");

        let output = Self::git()
            .args(["clone", "--quiet", "--"])
            .arg(uri)
            .arg(dest)
            .output()
            .await
            .map_err(|e| CiError::Clone {
                uri: uri.to_string(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(CiError::Clone {
                uri: uri.to_string(),
                reason: Self::failure_reason(&output),
            });
        }
        Ok(())
    }

    async fn checkout(&self, dir: &Path, revision: &str) -> Result<()> {
        tracing::debug!(dir = %dir.display(), revision, "git checkout");

        let checkout_error = |reason: String| CiError::Checkout {
            dir: dir.to_path_buf(),
            revision: revision.to_string(),
            reason,
        };

        let output = Self::git()
            .arg("-C")
            .arg(dir)
            .args(["checkout", "--quiet", revision, "--"])
            .output()
            .await
            .map_err(|e| checkout_error(e.to_string()))?;

        if !output.status.success() {
            return Err(checkout_error(Self::failure_reason(&output)));
        }
        Ok(())
    }
}
