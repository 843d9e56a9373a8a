use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Opaque job identifier.
///
/// Generated ids are UUID v7 strings, so sorting them lexically yields
/// submission order. Lookups accept any string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(String);

impl JobId {
    pub fn generate() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failure,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }

    /// Whether a job currently in `self` may be published as `next`.
    ///
    /// Status only moves `pending -> running -> success | failure`, and a job
    /// must be seen `running` before it can finish.
    pub fn can_become(self, next: JobStatus) -> bool {
        use JobStatus::*;
        match self {
            Pending => matches!(next, Pending | Running),
            Running => !matches!(next, Pending),
            Success | Failure => self == next,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobStatus::Pending => write!(f, "pending"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Success => write!(f, "success"),
            JobStatus::Failure => write!(f, "failure"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: JobId,
    pub status: JobStatus,
    pub repo_uri: String,
    pub commit: String,
    pub command: String,
    pub logs: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
}

impl JobRecord {
    pub fn new(repo_uri: String, commit: String, command: String) -> Self {
        Self {
            id: JobId::generate(),
            status: JobStatus::Pending,
            repo_uri,
            commit,
            command,
            logs: Vec::new(),
            created_at: Some(Utc::now()),
            finished_at: None,
            exit_code: None,
        }
    }

    /// What a lookup of an id the store has never seen reports: a failed job
    /// with nothing else filled in.
    pub fn unknown(id: JobId) -> Self {
        Self {
            id,
            status: JobStatus::Failure,
            repo_uri: String::new(),
            commit: String::new(),
            command: String::new(),
            logs: Vec::new(),
            created_at: None,
            finished_at: None,
            exit_code: None,
        }
    }
}
