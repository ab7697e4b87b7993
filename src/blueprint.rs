use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use petgraph::Graph;
use petgraph::graph::NodeIndex;

use crate::Mode;
use crate::engine::{Edge, Report, Task, TaskContext};
use crate::error::{BuildError, GraphError};
use crate::plugin::Plugin;

/// The set of tasks a [`Project`] can run.
///
/// Tasks are registered by name and refer to each other by name, so a task
/// may mention another one that is registered later. All references are
/// checked, and cycles rejected, when the blueprint is turned into a
/// [`Project`] with [`Blueprint::finish`].
///
/// # Example
///
/// ```rust
/// use kafka_sandbox::{Blueprint, Mode};
///
/// let mut blueprint = Blueprint::<()>::new();
///
/// blueprint
///     .task("compile")
///     .run(|_| Ok(()));
///
/// blueprint
///     .task("test")
///     .depends_on("compile")
///     .run(|_| Ok(()));
///
/// let project = blueprint.finish().unwrap();
/// assert_eq!(project.plan(&["test"]).unwrap(), vec!["compile", "test"]);
/// ```
pub struct Blueprint<G = ()> {
    tasks: Vec<Task<G>>,
}

impl<G> Blueprint<G> {
    /// Creates a new, empty blueprint.
    pub fn new() -> Self {
        Self { tasks: Vec::new() }
    }

    /// Lets `plugin` register its tasks.
    pub fn apply(&mut self, plugin: &Plugin<G>) -> &mut Self {
        (plugin.func)(self);
        self
    }

    /// Starts declaring a task.
    pub fn task(&mut self, name: impl Into<Cow<'static, str>>) -> TaskDef<'_, G> {
        TaskDef {
            blueprint: self,
            task: Task::new(name.into()),
        }
    }

    pub fn finish(self) -> Result<Project<G>, GraphError> {
        let mut graph = Graph::with_capacity(self.tasks.len(), 0);
        let mut index = HashMap::new();

        for task in self.tasks {
            let name = task.name.to_string();
            let node = graph.add_node(task);
            if index.insert(name.clone(), node).is_some() {
                return Err(GraphError::Duplicate(name));
            }
        }

        let mut edges = Vec::new();

        for node in graph.node_indices() {
            let task = &graph[node];

            for (other, kind) in task.references() {
                let &other = index.get(&**other).ok_or_else(|| {
                    GraphError::UnknownReference(task.name.to_string(), other.to_string())
                })?;

                edges.push(match kind {
                    Edge::DependsOn | Edge::RunsAfter => (other, node, kind),
                    Edge::FinalizedBy => (node, other, kind),
                });
            }
        }

        for (source, target, kind) in edges {
            graph.add_edge(source, target, kind);
        }

        petgraph::algo::toposort(&graph, None)
            .map_err(|cycle| GraphError::Cycle(graph[cycle.node_id()].name.to_string()))?;

        Ok(Project { graph, index })
    }
}

impl<G> Default for Blueprint<G> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for a single task, registered once [`TaskDef::run`] or
/// [`TaskDef::register`] is called.
pub struct TaskDef<'a, G> {
    blueprint: &'a mut Blueprint<G>,
    task: Task<G>,
}

impl<G> TaskDef<'_, G> {
    pub fn group(mut self, group: impl Into<Cow<'static, str>>) -> Self {
        self.task.group = Some(group.into());
        self
    }

    pub fn description(mut self, description: impl Into<Cow<'static, str>>) -> Self {
        self.task.description = Some(description.into());
        self
    }

    /// `name` must succeed before this task, running this task runs `name`.
    pub fn depends_on(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.task.depends_on.push(name.into());
        self
    }

    /// If both are scheduled, `name` runs first.
    pub fn runs_after(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.task.runs_after.push(name.into());
        self
    }

    /// Running this task also runs `name`, after it.
    pub fn finalized_by(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.task.finalized_by.push(name.into());
        self
    }

    pub fn run<F>(mut self, action: F)
    where
        F: Fn(&TaskContext<'_, G>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.task.action = Some(Arc::new(action));
        self.register();
    }

    /// Registers the task without an action of its own.
    pub fn register(self) {
        self.blueprint.tasks.push(self.task);
    }
}

/// A validated task graph, ready to run.
pub struct Project<G = ()> {
    pub(crate) graph: Graph<Task<G>, Edge>,
    index: HashMap<String, NodeIndex>,
}

impl<G> Project<G> {
    /// All tasks in registration order.
    pub fn tasks(&self) -> impl Iterator<Item = &Task<G>> {
        self.graph.node_weights()
    }

    pub fn task(&self, name: &str) -> Option<&Task<G>> {
        self.index.get(name).map(|&index| &self.graph[index])
    }

    fn resolve(&self, targets: &[&str]) -> Result<Vec<NodeIndex>, GraphError> {
        targets
            .iter()
            .map(|name| {
                self.index
                    .get(*name)
                    .copied()
                    .ok_or_else(|| GraphError::UnknownTask(name.to_string()))
            })
            .collect()
    }

    /// The tasks that running `targets` would execute, in order.
    pub fn plan(&self, targets: &[&str]) -> Result<Vec<&str>, GraphError> {
        let targets = self.resolve(targets)?;

        Ok(crate::engine::plan(&self.graph, &targets)
            .into_iter()
            .map(|index| self.graph[index].name())
            .collect())
    }

    /// Runs `targets` and everything they need.
    ///
    /// # Arguments
    ///
    /// * `data` - Shared data handed to every task action.
    /// * `targets` - Names of the requested tasks.
    /// * `mode` - What to do after a task fails.
    pub fn execute(&self, data: &G, targets: &[&str], mode: Mode) -> Result<Report, BuildError> {
        let targets = self.resolve(targets)?;
        let order = crate::engine::plan(&self.graph, &targets);

        tracing::debug!(
            "execution plan: {:?}",
            order.iter().map(|&i| self.graph[i].name()).collect::<Vec<_>>()
        );

        crate::engine::run(&self.graph, data, &order, mode)
    }
}

impl<G> std::fmt::Display for Project<G> {
    /// Renders the task graph as a Mermaid diagram.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "graph LR")?;

        for index in self.graph.node_indices() {
            let name = self.graph[index].name().replace('"', "\\\"");
            writeln!(f, "    {:?}[\"{}\"]", index.index(), name)?;
        }

        for edge in self.graph.raw_edges() {
            let label = match edge.weight {
                Edge::DependsOn => "depends on",
                Edge::RunsAfter => "runs after",
                Edge::FinalizedBy => "finalized by",
            };

            // Arrows point from the dependent task to what it refers to.
            let (from, to) = match edge.weight {
                Edge::DependsOn | Edge::RunsAfter => (edge.target(), edge.source()),
                Edge::FinalizedBy => (edge.source(), edge.target()),
            };

            writeln!(
                f,
                "    {:?} -- \"{}\" --> {:?}",
                from.index(),
                label,
                to.index()
            )?;
        }

        Ok(())
    }
}
