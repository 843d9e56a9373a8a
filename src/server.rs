use tokio_util::sync::CancellationToken;

use crate::api::{run_api, ApiState};
use crate::config::ServerConfig;
use crate::error::Result;
use crate::monitor::QuiescenceMonitor;
use crate::scheduler::JobStore;

/// Wires the job store, the quiescence monitor and the HTTP API together.
pub struct Server {
    pub config: ServerConfig,
    pub store: JobStore,
    pub monitor: QuiescenceMonitor,
}

impl Server {
    pub fn new(config: ServerConfig) -> Self {
        let store = JobStore::new(config.pipeline.clone());
        let monitor = QuiescenceMonitor::new(store.clone(), config.monitor.clone());
        Self {
            config,
            store,
            monitor,
        }
    }

    /// Serve the API until `shutdown` is cancelled.
    ///
    /// Jobs still running at shutdown are abandoned along with the runtime;
    /// their working directories are left for the OS temp cleaner.
    pub async fn run(self, shutdown: CancellationToken) -> Result<()> {
        let state = ApiState {
            store: self.store,
            monitor: self.monitor,
            shutdown,
        };
        run_api(self.config.listen_addr, state).await
    }
}
