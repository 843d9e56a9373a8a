use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Timing for the quiescence monitor behind `/api/wait`.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// How often the job store is polled in both phases
    pub poll_interval: Duration,
    /// How long to wait for the first job to show up before reporting "no jobs"
    pub arrival_window: Duration,
    /// How long to wait for known jobs to finish, measured from the first
    /// observed job
    pub drain_window: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(100),
            arrival_window: Duration::from_secs(30),
            drain_window: Duration::from_secs(300),
        }
    }
}

impl MonitorConfig {
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_arrival_window(mut self, window: Duration) -> Self {
        self.arrival_window = window;
        self
    }

    pub fn with_drain_window(mut self, window: Duration) -> Self {
        self.drain_window = window;
        self
    }
}

/// Where job working directories are created.
///
/// Every job gets its own fresh directory named `<dir_prefix><random>`,
/// created inside `work_root` (or the system temp dir when unset) and removed
/// when the job finishes.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub work_root: Option<PathBuf>,
    pub dir_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            work_root: None,
            dir_prefix: "ci-lite-job-".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn with_work_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.work_root = Some(root.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    pub pipeline: PipelineConfig,
    pub monitor: MonitorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 8080)),
            pipeline: PipelineConfig::default(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn new(listen_addr: SocketAddr) -> Self {
        Self {
            listen_addr,
            ..Default::default()
        }
    }

    pub fn with_pipeline(mut self, pipeline: PipelineConfig) -> Self {
        self.pipeline = pipeline;
        self
    }

    pub fn with_monitor(mut self, monitor: MonitorConfig) -> Self {
        self.monitor = monitor;
        self
    }
}
