use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::error::{CiError, Result};

/// Captured result of a command that was launched and ran to completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    /// stdout and stderr, interleaved as the process wrote them
    pub output: String,
    /// `None` when the process was killed by a signal
    pub exit_code: Option<i32>,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Non-empty lines of the captured output, in order.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.output
            .split('\n')
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !line.is_empty())
    }

    /// Turn a non-zero or signalled exit into an error.
    pub fn check(&self) -> Result<()> {
        match self.exit_code {
            Some(0) => Ok(()),
            Some(code) => Err(CiError::ExitCode(code)),
            None => Err(CiError::Terminated),
        }
    }
}

/// Runs a job's command inside its working directory.
///
/// `Err` is reserved for commands that could not be launched at all; a
/// command that runs and exits non-zero is reported through
/// [`CommandOutput::exit_code`] so its output is not lost.
#[async_trait]
pub trait ProcessRunner: Send + Sync {
    async fn run(&self, command: &str, work_dir: &Path) -> Result<CommandOutput>;
}

/// Executes commands through `sh -c`, with stderr merged into stdout.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

#[async_trait]
impl ProcessRunner for ShellRunner {
    async fn run(&self, command: &str, work_dir: &Path) -> Result<CommandOutput> {
        tracing::debug!(command, work_dir = %work_dir.display(), "Launching command");

        // Redirect the shell's own stderr first so both streams share one pipe
        // and keep their relative order.
        let script = format!("exec 2>&1\n{}", command);

        let result = Command::new("sh")
            .arg("-c")
            .arg(script)
            .current_dir(work_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await;

        Self::process_output(result)
    }
}

impl ShellRunner {
    pub fn new() -> Self {
        Self
    }

    fn process_output(
        result: std::result::Result<std::process::Output, std::io::Error>,
    ) -> Result<CommandOutput> {
        let output = result.map_err(CiError::Launch)?;

        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !combined.is_empty() && !combined.ends_with('\n') {
                combined.push('\n');
            }
            combined.push_str(&stderr);
        }

        let exit_code = output.status.code();
        tracing::debug!(exit_code = ?exit_code, bytes = combined.len(), "Command finished");

        Ok(CommandOutput {
            output: combined,
            exit_code,
        })
    }
}
