use std::process::ExitStatus;
use std::time::Duration;

use camino::Utf8PathBuf;
use thiserror::Error;

use crate::engine::Report;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Temporary directory is not valid UTF-8.\n{0}")]
    TempDir(#[from] camino::FromPathBufError),

    #[error("Invalid readiness address '{0}'.\n{1}")]
    ReadinessAddr(String, std::io::Error),

    #[error("Readiness address '{0}' did not resolve to any socket address")]
    ReadinessUnresolved(String),

    #[error("Invalid property '{0}', expected key=value")]
    Property(String),

    #[error("Invalid value '{1}' for {0}")]
    Version(String, String),
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Couldn't download {url}.\n{source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Couldn't write downloaded bytes.\n{0}")]
    Write(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Filesystem error at '{0}'.\n{1}")]
    FileSystem(Utf8PathBuf, std::io::Error),

    #[error("Couldn't unpack archive '{0}'.\n{1}")]
    Corrupt(Utf8PathBuf, std::io::Error),
}

#[derive(Debug, Error)]
pub enum ProcessError {
    #[error("Couldn't spawn `{0}`.\n{1}")]
    Spawn(String, std::io::Error),

    #[error("`{0}` exited with {1}")]
    Exit(String, ExitStatus),

    #[error("Nothing accepted connections on {0} within {1:?}")]
    NotReady(String, Duration),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("Task '{0}' is registered twice")]
    Duplicate(String),

    #[error("Task '{0}' not found")]
    UnknownTask(String),

    #[error("Task '{0}' refers to unknown task '{1}'")]
    UnknownReference(String, String),

    #[error("Cycle detected in task graph at '{0}'")]
    Cycle(String),
}

/// A single task that failed during an invocation.
#[derive(Debug)]
pub struct TaskFailure {
    pub name: String,
    pub error: anyhow::Error,
}

#[derive(Debug, Error)]
pub enum BuildError {
    #[error(transparent)]
    Graph(#[from] GraphError),

    #[error("{}", render_failures(.failures))]
    Failed {
        failures: Vec<TaskFailure>,
        report: Report,
    },
}

impl BuildError {
    /// The execution report, if the invocation got as far as running tasks.
    pub fn report(&self) -> Option<&Report> {
        match self {
            BuildError::Graph(_) => None,
            BuildError::Failed { report, .. } => Some(report),
        }
    }
}

fn render_failures(failures: &[TaskFailure]) -> String {
    let mut out = String::new();

    for (i, failure) in failures.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!(
            "Execution failed for task '{}':\n{:#}",
            failure.name, failure.error
        ));
    }

    out
}
