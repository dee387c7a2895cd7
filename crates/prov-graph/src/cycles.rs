//! Cycle detection using a three-colour depth-first traversal.
//!
//! Nodes start white (unvisited), turn grey while on the DFS stack, and
//! black once every dependency below them has been explored. Reaching a
//! grey node again is a back-edge, and the stack slice from that node to
//! the top is the cycle.

use std::collections::{BTreeSet, HashMap};

use crate::graph::DependencyGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Grey,
    Black,
}

/// Find every dependency cycle in the graph.
///
/// Each cycle is listed in "depends on" order starting from the member
/// reached first in catalog order: `[a, b]` means `a` depends on `b` and
/// `b` depends on `a`. Cycles with identical membership are reported once.
pub fn detect_cycles(graph: &DependencyGraph) -> Vec<Vec<String>> {
    let mut colors: HashMap<&str, Color> = graph.nodes().map(|c| (c.id.as_str(), Color::White)).collect();
    let mut stack: Vec<&str> = Vec::new();
    let mut cycles: Vec<Vec<String>> = Vec::new();
    let mut seen: BTreeSet<Vec<String>> = BTreeSet::new();

    for component in graph.nodes() {
        if colors.get(component.id.as_str()) == Some(&Color::White) {
            visit(graph, &component.id, &mut colors, &mut stack, &mut cycles, &mut seen);
        }
    }

    if !cycles.is_empty() {
        tracing::warn!(count = cycles.len(), "Dependency cycles detected");
    }
    cycles
}

fn visit<'g>(
    graph: &'g DependencyGraph,
    id: &'g str,
    colors: &mut HashMap<&'g str, Color>,
    stack: &mut Vec<&'g str>,
    cycles: &mut Vec<Vec<String>>,
    seen: &mut BTreeSet<Vec<String>>,
) {
    colors.insert(id, Color::Grey);
    stack.push(id);

    for edge in graph.dependencies_of(id) {
        let next = edge.dependency.as_str();
        match colors.get(next).copied().unwrap_or(Color::Black) {
            Color::White => visit(graph, next, colors, stack, cycles, seen),
            Color::Grey => {
                if let Some(start) = stack.iter().position(|&n| n == next) {
                    let cycle: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                    let mut key = cycle.clone();
                    key.sort();
                    if seen.insert(key) {
                        cycles.push(cycle);
                    }
                }
            }
            Color::Black => {}
        }
    }

    stack.pop();
    colors.insert(id, Color::Black);
}
