//! Deterministic topological ordering.
//!
//! Kahn's algorithm with a min-heap keyed on catalog declaration position:
//! whenever several components are ready, the one declared first in the
//! catalog goes next. Identical input therefore always yields the same order.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use crate::cycles::detect_cycles;
use crate::error::GraphIssue;
use crate::graph::DependencyGraph;

/// Order every node so that each dependency precedes its dependents.
///
/// # Errors
///
/// Returns [`GraphIssue::CycleDetected`] naming the first cycle found when
/// the graph is not acyclic.
pub fn topological_order(graph: &DependencyGraph) -> Result<Vec<String>, GraphIssue> {
    let order = order_where(graph, |_| true);
    if order.len() == graph.node_count() {
        return Ok(order);
    }
    let cycle = detect_cycles(graph).into_iter().next().unwrap_or_else(|| {
        graph
            .nodes()
            .map(|c| c.id.clone())
            .filter(|id| !order.contains(id))
            .collect()
    });
    Err(GraphIssue::CycleDetected { cycle })
}

/// Topologically order the nodes accepted by `include`.
///
/// Edges to excluded nodes are ignored. Nodes left over because they sit on
/// a cycle are omitted from the result.
pub(crate) fn order_where(graph: &DependencyGraph, include: impl Fn(&str) -> bool) -> Vec<String> {
    let mut in_degree: HashMap<&str, usize> = graph
        .nodes()
        .filter(|c| include(&c.id))
        .map(|c| (c.id.as_str(), 0))
        .collect();
    for edge in graph.edges() {
        if in_degree.contains_key(edge.dependency.as_str())
            && let Some(deg) = in_degree.get_mut(edge.dependent.as_str())
        {
            *deg += 1;
        }
    }

    let key = |id: &str| graph.position(id).unwrap_or(usize::MAX);
    let mut ready: BinaryHeap<Reverse<(usize, &str)>> = in_degree
        .iter()
        .filter(|&(_, &deg)| deg == 0)
        .map(|(&id, _)| Reverse((key(id), id)))
        .collect();

    let mut order = Vec::with_capacity(in_degree.len());
    while let Some(Reverse((_, current))) = ready.pop() {
        order.push(current.to_string());
        for edge in graph.dependents_of(current) {
            if let Some(deg) = in_degree.get_mut(edge.dependent.as_str()) {
                *deg = deg.saturating_sub(1);
                if *deg == 0 {
                    ready.push(Reverse((key(&edge.dependent), edge.dependent.as_str())));
                }
            }
        }
    }
    order
}
