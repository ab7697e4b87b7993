mod plan;
mod report;
mod runner;

use std::borrow::Cow;
use std::fmt::{self, Debug};
use std::sync::Arc;

pub(crate) use crate::engine::plan::plan;
pub use crate::engine::report::{Report, TaskExecution, TaskState};
pub(crate) use crate::engine::runner::run;

pub(crate) type Name = Cow<'static, str>;

type Action<G> = Arc<dyn Fn(&TaskContext<'_, G>) -> anyhow::Result<()> + Send + Sync>;

/// Everything a task action gets to see while it runs.
pub struct TaskContext<'a, G> {
    /// Name of the running task.
    pub name: &'a str,
    /// Data shared by every task of the invocation.
    pub data: &'a G,
}

/// Kind of ordering constraint between two tasks. In the graph every edge
/// points from the task that runs first to the task that runs later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    /// Source is pulled into the invocation and must succeed before target.
    DependsOn,
    /// Source runs before target when both are part of the invocation.
    RunsAfter,
    /// Target is pulled into the invocation and runs after source.
    FinalizedBy,
}

/// A named unit of work registered in a [`Blueprint`](crate::Blueprint).
pub struct Task<G> {
    pub(crate) name: Name,
    pub(crate) group: Option<Name>,
    pub(crate) description: Option<Name>,
    pub(crate) depends_on: Vec<Name>,
    pub(crate) runs_after: Vec<Name>,
    pub(crate) finalized_by: Vec<Name>,
    pub(crate) action: Option<Action<G>>,
}

impl<G> Task<G> {
    pub(crate) fn new(name: Name) -> Self {
        Self {
            name,
            group: None,
            description: None,
            depends_on: Vec::new(),
            runs_after: Vec::new(),
            finalized_by: Vec::new(),
            action: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> Option<&str> {
        self.group.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Outgoing references, paired with the edge they turn into.
    pub(crate) fn references(&self) -> impl Iterator<Item = (&Name, Edge)> {
        let depends_on = self.depends_on.iter().map(|n| (n, Edge::DependsOn));
        let runs_after = self.runs_after.iter().map(|n| (n, Edge::RunsAfter));
        let finalized_by = self.finalized_by.iter().map(|n| (n, Edge::FinalizedBy));
        depends_on.chain(runs_after).chain(finalized_by)
    }

    pub(crate) fn execute(&self, context: &TaskContext<'_, G>) -> anyhow::Result<()> {
        match &self.action {
            Some(action) => action(context),
            None => Ok(()),
        }
    }
}

impl<G> Debug for Task<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("name", &self.name)
            .field("group", &self.group)
            .field("depends_on", &self.depends_on)
            .field("runs_after", &self.runs_after)
            .field("finalized_by", &self.finalized_by)
            .finish_non_exhaustive()
    }
}
