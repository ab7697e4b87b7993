use std::fmt::{self, Display, Write};
use std::time::Duration;

use console::style;

/// Lifecycle of a task within one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Held back because a task it depends on did not succeed.
    Skipped,
}

impl TaskState {
    pub fn is_done(self) -> bool {
        matches!(
            self,
            TaskState::Succeeded | TaskState::Failed | TaskState::Skipped
        )
    }
}

impl Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TaskState::Pending => "PENDING",
            TaskState::Running => "RUNNING",
            TaskState::Succeeded => "SUCCEEDED",
            TaskState::Failed => "FAILED",
            TaskState::Skipped => "SKIPPED",
        };
        f.pad(text)
    }
}

#[derive(Debug, Clone)]
pub struct TaskExecution {
    pub name: String,
    pub state: TaskState,
    /// Wall time of the action, once it has finished.
    pub duration: Option<Duration>,
}

/// Outcome of every task scheduled for an invocation, in execution order.
#[derive(Debug, Default)]
pub struct Report {
    pub(crate) executions: Vec<TaskExecution>,
}

impl Report {
    pub(crate) fn new<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            executions: names
                .into_iter()
                .map(|name| TaskExecution {
                    name: name.to_string(),
                    state: TaskState::Pending,
                    duration: None,
                })
                .collect(),
        }
    }

    pub(crate) fn running(&mut self, slot: usize) {
        debug_assert_eq!(self.executions[slot].state, TaskState::Pending);
        self.executions[slot].state = TaskState::Running;
    }

    pub(crate) fn finished(&mut self, slot: usize, ok: bool, duration: Duration) {
        let execution = &mut self.executions[slot];
        debug_assert_eq!(execution.state, TaskState::Running);

        execution.state = if ok {
            TaskState::Succeeded
        } else {
            TaskState::Failed
        };
        execution.duration = Some(duration);
    }

    pub(crate) fn skipped(&mut self, slot: usize) {
        debug_assert_eq!(self.executions[slot].state, TaskState::Pending);
        self.executions[slot].state = TaskState::Skipped;
    }

    pub fn executions(&self) -> &[TaskExecution] {
        &self.executions
    }

    pub fn state(&self, name: &str) -> Option<TaskState> {
        self.executions
            .iter()
            .find(|execution| execution.name == name)
            .map(|execution| execution.state)
    }

    /// Names of the tasks that succeeded, in the order they ran.
    pub fn completed(&self) -> impl Iterator<Item = &str> {
        self.executions
            .iter()
            .filter(|execution| execution.state == TaskState::Succeeded)
            .map(|execution| execution.name.as_str())
    }

    pub fn render_summary(&self) -> String {
        let width = self
            .executions
            .iter()
            .map(|execution| execution.name.len())
            .max()
            .unwrap_or(0);

        let mut out = String::new();

        for execution in &self.executions {
            let state = format!("{:<9}", execution.state);
            let state = match execution.state {
                TaskState::Succeeded => style(state).green(),
                TaskState::Failed => style(state).red(),
                TaskState::Skipped => style(state).yellow(),
                TaskState::Pending | TaskState::Running => style(state).dim(),
            };

            let time = match execution.duration {
                Some(duration) => format!("{}ms", duration.as_millis()),
                None => String::from("-"),
            };

            // Writing into a String can't fail.
            let _ = writeln!(out, "{:<width$}  {}  {}", execution.name, state, time);
        }

        out
    }
}
