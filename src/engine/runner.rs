use std::collections::HashSet;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::time::Instant;

use petgraph::Direction;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::EdgeRef;
use tracing::Level;
use tracing_indicatif::span_ext::IndicatifSpanExt;

use crate::Mode;
use crate::engine::{Edge, Report, Task, TaskContext};
use crate::error::{BuildError, TaskFailure};

/// Executes `order` one task at a time.
///
/// In [`Mode::FailFast`] the first failure stops the invocation and every
/// task after it stays pending. In [`Mode::Continue`] only the tasks that
/// depend on a failed task, directly or not, are held back and reported as
/// skipped.
pub(crate) fn run<G>(
    graph: &Graph<Task<G>, Edge>,
    data: &G,
    order: &[NodeIndex],
    mode: Mode,
) -> Result<Report, BuildError> {
    let mut report = Report::new(order.iter().map(|&index| graph[index].name()));
    let mut failures = Vec::new();
    let mut blocked = HashSet::new();

    let root_span = tracing::span!(Level::INFO, "running_tasks");
    root_span.pb_set_length(order.len() as u64);
    root_span.pb_set_style(&crate::utils::style_bar());
    root_span.pb_set_message("Running tasks...");
    let _enter = root_span.enter();

    for (slot, &index) in order.iter().enumerate() {
        let task = &graph[index];

        let held_back = graph
            .edges_directed(index, Direction::Incoming)
            .filter(|edge| *edge.weight() == Edge::DependsOn)
            .find(|edge| blocked.contains(&edge.source()));

        if let Some(edge) = held_back {
            tracing::warn!(
                "skipping {}, dependency {} did not succeed",
                task.name(),
                graph[edge.source()].name()
            );
            report.skipped(slot);
            blocked.insert(index);
            root_span.pb_inc(1);
            continue;
        }

        report.running(slot);
        let start = Instant::now();

        let result = {
            let span = tracing::span!(Level::INFO, "task", name = task.name());
            span.pb_set_style(&crate::utils::style_task());
            span.pb_set_message(&format!("Running {}", task.name()));
            let _enter = span.enter();

            tracing::info!("> Task :{}", task.name());

            let context = TaskContext {
                name: task.name(),
                data,
            };

            // A panicking action fails its task instead of tearing down the
            // whole invocation.
            match catch_unwind(AssertUnwindSafe(|| task.execute(&context))) {
                Ok(result) => result,
                Err(panic) => {
                    let msg = if let Some(s) = panic.downcast_ref::<&str>() {
                        format!("Task panicked: {s}")
                    } else if let Some(s) = panic.downcast_ref::<String>() {
                        format!("Task panicked: {s}")
                    } else {
                        String::from("Task panicked with unknown payload")
                    };

                    Err(anyhow::anyhow!(msg))
                }
            }
        };

        report.finished(slot, result.is_ok(), start.elapsed());
        root_span.pb_inc(1);

        if let Err(error) = result {
            tracing::error!("task {} failed: {:#}", task.name(), error);

            failures.push(TaskFailure {
                name: task.name().to_string(),
                error,
            });
            blocked.insert(index);

            if mode == Mode::FailFast {
                break;
            }
        }
    }

    if failures.is_empty() {
        tracing::info!("BUILD SUCCESSFUL ({} tasks)", order.len());
        return Ok(report);
    }

    tracing::info!(
        "BUILD FAILED, completed before the failure: [{}]",
        report.completed().collect::<Vec<_>>().join(", ")
    );

    Err(BuildError::Failed { failures, report })
}
