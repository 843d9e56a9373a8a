//! In-process collaborators for unit tests.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CiError, Result};
use crate::worker::checkout::VersionControl;
use crate::worker::executor::{CommandOutput, ProcessRunner};

#[derive(Debug, Default)]
pub struct FakeVcs {
    pub clone_error: Option<String>,
    pub checkout_error: Option<String>,
}

#[async_trait]
impl VersionControl for FakeVcs {
    async fn clone_repo(&self, uri: &str, dest: &Path) -> Result<()> {
        if let Some(reason) = &self.clone_error {
            return Err(CiError::Clone {
                uri: uri.to_string(),
                reason: reason.clone(),
            });
        }
        tokio::fs::write(dest.join("README"), uri).await?;
        Ok(())
    }

    async fn checkout(&self, dir: &Path, revision: &str) -> Result<()> {
        match &self.checkout_error {
            Some(reason) => Err(CiError::Checkout {
                dir: dir.to_path_buf(),
                revision: revision.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

#[derive(Debug)]
pub struct FakeProcess {
    pub output: String,
    pub exit_code: Option<i32>,
    pub delay: Duration,
}

impl FakeProcess {
    pub fn succeeding(output: &str) -> Self {
        Self {
            output: output.to_string(),
            exit_code: Some(0),
            delay: Duration::ZERO,
        }
    }

    pub fn exiting(output: &str, code: i32) -> Self {
        Self {
            output: output.to_string(),
            exit_code: Some(code),
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl ProcessRunner for FakeProcess {
    async fn run(&self, _command: &str, _work_dir: &Path) -> Result<CommandOutput> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(CommandOutput {
            output: self.output.clone(),
            exit_code: self.exit_code,
        })
    }
}
