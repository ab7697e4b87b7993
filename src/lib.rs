#![forbid(unsafe_code)]
//! Provisioning of a local Kafka installation for development and testing.
//!
//! The work is split into named tasks: downloading the distribution archive,
//! extracting it, and running the ZooKeeper and broker lifecycle scripts that
//! ship with it. Tasks are declared in a [`Blueprint`], validated into a
//! [`Project`], and executed one at a time in dependency order.
//!
//! ```rust,no_run
//! use kafka_sandbox::config::{Properties, Resolver, Settings};
//! use kafka_sandbox::plugin::{KAFKA, Kafka, START};
//! use kafka_sandbox::{Blueprint, Mode};
//!
//! fn main() -> anyhow::Result<()> {
//!     let settings = Settings::resolve(&Resolver::system(Properties::new()))?;
//!
//!     let mut blueprint = Blueprint::new();
//!     blueprint.apply(&KAFKA);
//!     let project = blueprint.finish()?;
//!
//!     project.execute(&Kafka::new(settings), &[START], Mode::FailFast)?;
//!     Ok(())
//! }
//! ```

pub mod archive;
mod blueprint;
pub mod config;
mod engine;
mod error;
pub mod plugin;
pub mod process;
mod utils;

pub use crate::blueprint::{Blueprint, Project, TaskDef};
pub use crate::engine::{Edge, Report, Task, TaskContext, TaskExecution, TaskState};
pub use crate::error::*;
pub use crate::utils::as_overhead;
#[cfg(feature = "logging")]
pub use crate::utils::init_logging;

/// What happens to the rest of an invocation once a task fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Stop at the first failure, nothing else is started.
    #[default]
    FailFast,
    /// Keep going with every task that doesn't depend on a failed one.
    Continue,
}
