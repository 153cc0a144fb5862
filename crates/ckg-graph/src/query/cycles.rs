//! Cycle detection over a directed edge list.

use std::collections::HashMap;

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};

/// Strongly connected components that form cycles.
///
/// A component counts when it has more than one member or a self loop.
/// Members are sorted and cycles are returned in sorted order.
pub fn find_cycles(edges: &[(String, String)]) -> Vec<Vec<String>> {
    let mut graph: DiGraph<String, ()> = DiGraph::new();
    let mut indices: HashMap<&str, NodeIndex> = HashMap::new();

    for (source, target) in edges {
        let a = *indices
            .entry(source.as_str())
            .or_insert_with(|| graph.add_node(source.clone()));
        let b = *indices
            .entry(target.as_str())
            .or_insert_with(|| graph.add_node(target.clone()));
        graph.update_edge(a, b, ());
    }

    let mut cycles: Vec<Vec<String>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut members: Vec<String> = scc.into_iter().map(|idx| graph[idx].clone()).collect();
            members.sort();
            members
        })
        .collect();
    cycles.sort();
    cycles
}
