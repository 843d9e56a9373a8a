pub mod job;
pub mod store;

pub use job::{JobId, JobRecord, JobStatus};
pub use store::JobStore;
