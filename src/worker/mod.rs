//! Job execution.
//!
//! Every submitted job gets its own tokio task running a [`Pipeline`]:
//! - **Checkout**: clone the repository into a fresh temporary directory and
//!   check out the requested commit ([`VersionControl`], [`GitCli`])
//! - **Execution**: run the command in that directory and capture its
//!   combined output ([`ProcessRunner`], [`ShellRunner`])
//!
//! # Execution Flow
//!
//! 1. Job moves to `running`
//! 2. Blank commands fail immediately
//! 3. Clone + checkout into an isolated directory
//! 4. `sh -c <command>`; each output line is logged as `> line`
//! 5. Job moves to `success` or `failure`; the directory is removed
//!
//! Nothing is retried and there is no limit on concurrently running jobs.

pub mod checkout;
pub mod executor;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod testing;

pub use checkout::{GitCli, VersionControl};
pub use executor::{CommandOutput, ProcessRunner, ShellRunner};
pub use pipeline::Pipeline;
