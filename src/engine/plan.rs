//! Picking and ordering the tasks of a single invocation.
//!
//! The requested tasks are expanded with everything they depend on and
//! everything that finalizes them. The resulting set is then sorted
//! topologically over all edge kinds. Among tasks that are ready at the same
//! time the one registered first goes first, so the order is deterministic.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

use petgraph::Direction;
use petgraph::graph::{Graph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::engine::{Edge, Task};

/// Expects `graph` to be acyclic.
pub(crate) fn plan<G>(graph: &Graph<Task<G>, Edge>, targets: &[NodeIndex]) -> Vec<NodeIndex> {
    let included = closure(graph, targets);
    let order = order(graph, &included);

    debug_assert_eq!(order.len(), included.len(), "cycle in task graph");
    order
}

fn closure<G>(graph: &Graph<Task<G>, Edge>, targets: &[NodeIndex]) -> HashSet<NodeIndex> {
    let mut included = HashSet::new();
    let mut stack = targets.to_vec();

    while let Some(index) = stack.pop() {
        if !included.insert(index) {
            continue;
        }

        for edge in graph.edges_directed(index, Direction::Incoming) {
            if *edge.weight() == Edge::DependsOn {
                stack.push(edge.source());
            }
        }

        for edge in graph.edges_directed(index, Direction::Outgoing) {
            if *edge.weight() == Edge::FinalizedBy {
                stack.push(edge.target());
            }
        }
    }

    included
}

fn order<G>(graph: &Graph<Task<G>, Edge>, included: &HashSet<NodeIndex>) -> Vec<NodeIndex> {
    // Only edges with both ends in the invocation constrain the order.
    let mut pending: HashMap<NodeIndex, usize> = included
        .iter()
        .map(|&index| {
            let count = graph
                .edges_directed(index, Direction::Incoming)
                .filter(|edge| included.contains(&edge.source()))
                .count();
            (index, count)
        })
        .collect();

    let mut ready: BinaryHeap<Reverse<NodeIndex>> = pending
        .iter()
        .filter(|&(_, &count)| count == 0)
        .map(|(&index, _)| Reverse(index))
        .collect();

    let mut order = Vec::with_capacity(included.len());

    while let Some(Reverse(index)) = ready.pop() {
        order.push(index);

        for edge in graph.edges_directed(index, Direction::Outgoing) {
            if let Some(count) = pending.get_mut(&edge.target()) {
                *count -= 1;
                if *count == 0 {
                    ready.push(Reverse(edge.target()));
                }
            }
        }
    }

    order
}
