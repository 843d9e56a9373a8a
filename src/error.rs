use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CiError {
    #[error("empty command")]
    EmptyCommand,

    #[error("failed to create working directory: {0}")]
    Workspace(#[source] std::io::Error),

    #[error("git clone of {uri} failed: {reason}")]
    Clone { uri: String, reason: String },

    #[error("git checkout of {revision} in {} failed: {reason}", .dir.display())]
    Checkout {
        dir: PathBuf,
        revision: String,
        reason: String,
    },

    #[error("failed to launch command: {0}")]
    Launch(#[source] std::io::Error),

    #[error("exit status: {0}")]
    ExitCode(i32),

    #[error("terminated by signal")]
    Terminated,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CiError>;
