//! Directed dependency graph over a shape's fields
//!
//! An edge `A -> B` means B's evaluation may read A's current value. Edges
//! come from explicit `depends_on` declarations, conditional-predicate reads,
//! cross-field validation references, and data-source reads. The graph is
//! built once per shape when the shape is compiled, and answers two
//! questions: which strongly connected components are cycles (only the
//! convergent engine tolerates those) and what a valid topological order is
//! (the single-pass engine's visitation order).
//!
//! Copyright (c) 2025 Validado Team
//! Licensed under the Apache-2.0 license

use indexmap::IndexMap;
use petgraph::algo::{tarjan_scc, toposort};
use petgraph::graph::{DiGraph, NodeIndex};

/// Field-to-field dependency graph for one compiled shape
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    index: IndexMap<String, NodeIndex>,
}

impl DependencyGraph {
    /// Build from `(field, dependencies)` pairs in declaration order
    ///
    /// Every dependency must name a field present in the input; callers are
    /// expected to have validated references before building.
    pub fn build<'a, I, D>(fields: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, D)>,
        D: IntoIterator<Item = &'a str>,
    {
        let mut graph = DiGraph::new();
        let mut index = IndexMap::new();
        let mut pending_edges = Vec::new();

        for (name, deps) in fields {
            let node = *index
                .entry(name.to_string())
                .or_insert_with(|| graph.add_node(name.to_string()));
            for dep in deps {
                pending_edges.push((dep.to_string(), node));
            }
        }
        for (dep, dependent) in pending_edges {
            if let Some(&dep_node) = index.get(&dep) {
                graph.update_edge(dep_node, dependent, ());
            }
        }

        Self { graph, index }
    }

    /// Direct dependencies of a field, in insertion order
    pub fn dependencies_of(&self, field: &str) -> Vec<String> {
        match self.index.get(field) {
            Some(&node) => self
                .graph
                .neighbors_directed(node, petgraph::Direction::Incoming)
                .map(|n| self.graph[n].clone())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Strongly connected components that form cycles: every SCC with more
    /// than one member, plus any single field that depends on itself
    pub fn cycles(&self) -> Vec<Vec<String>> {
        tarjan_scc(&self.graph)
            .into_iter()
            .filter(|scc| {
                scc.len() > 1
                    || scc
                        .first()
                        .map_or(false, |&n| self.graph.contains_edge(n, n))
            })
            .map(|scc| {
                let mut members: Vec<String> =
                    scc.into_iter().map(|n| self.graph[n].clone()).collect();
                members.sort();
                members
            })
            .collect()
    }

    /// Whether any cycle exists
    pub fn is_cyclic(&self) -> bool {
        !self.cycles().is_empty()
    }

    /// Topological order over field names
    ///
    /// On failure returns the members of the first detected cycle so callers
    /// can report exactly which fields are mutually dependent.
    pub fn topological_order(&self) -> Result<Vec<String>, Vec<String>> {
        match toposort(&self.graph, None) {
            Ok(order) => Ok(order.into_iter().map(|n| self.graph[n].clone()).collect()),
            Err(_) => {
                let members = self
                    .cycles()
                    .into_iter()
                    .next()
                    .unwrap_or_default();
                Err(members)
            }
        }
    }
}
