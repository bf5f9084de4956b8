// src/registry/graph.rs

use std::collections::HashMap;

use petgraph::algo::has_path_connecting;
use petgraph::dot::{Config, Dot};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use petgraph::Direction;

use crate::types::ModuleId;

/// Snapshot of the registry's dependency edges.
///
/// Edges point from a dependency to its dependent, i.e. in the direction a
/// change escalates.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<ModuleId, &'static str>,
    index: HashMap<ModuleId, NodeIndex>,
}

impl DependencyGraph {
    pub fn from_edges(
        nodes: impl IntoIterator<Item = ModuleId>,
        edges: impl IntoIterator<Item = (ModuleId, ModuleId)>,
    ) -> Self {
        let mut this = Self::default();
        let mut nodes: Vec<ModuleId> = nodes.into_iter().collect();
        nodes.sort();
        for id in nodes {
            this.node(id);
        }
        let mut edges: Vec<(ModuleId, ModuleId)> = edges.into_iter().collect();
        edges.sort();
        for (dependency, dependent) in edges {
            let from = this.node(dependency);
            let to = this.node(dependent);
            this.graph.update_edge(from, to, "");
        }
        this
    }

    fn node(&mut self, id: ModuleId) -> NodeIndex {
        if let Some(&ix) = self.index.get(&id) {
            return ix;
        }
        let ix = self.graph.add_node(id.clone());
        self.index.insert(id, ix);
        ix
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Every module a change to `id` reaches when nothing accepts it,
    /// including `id` itself. Sorted.
    pub fn affected_by(&self, id: &ModuleId) -> Vec<ModuleId> {
        let Some(&start) = self.index.get(id) else {
            return Vec::new();
        };
        let mut dfs = Dfs::new(&self.graph, start);
        let mut reached = Vec::new();
        while let Some(ix) = dfs.next(&self.graph) {
            reached.push(self.graph[ix].clone());
        }
        reached.sort();
        reached
    }

    /// Whether a change to `from` can escalate to `to`.
    pub fn reaches(&self, from: &ModuleId, to: &ModuleId) -> bool {
        match (self.index.get(from), self.index.get(to)) {
            (Some(&a), Some(&b)) => has_path_connecting(&self.graph, a, b, None),
            _ => false,
        }
    }

    /// Modules nothing depends on. Sorted.
    pub fn roots(&self) -> Vec<ModuleId> {
        let mut roots: Vec<ModuleId> = self
            .graph
            .node_indices()
            .filter(|&ix| {
                self.graph
                    .neighbors_directed(ix, Direction::Outgoing)
                    .next()
                    .is_none()
            })
            .map(|ix| self.graph[ix].clone())
            .collect();
        roots.sort();
        roots
    }

    /// Graphviz rendering, for diagnostics.
    pub fn to_dot(&self) -> String {
        format!("{}", Dot::with_config(&self.graph, &[Config::EdgeNoLabel]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> ModuleId {
        ModuleId::new(s)
    }

    fn chain() -> DependencyGraph {
        // a imports b, b imports c, d imports c
        DependencyGraph::from_edges(
            [id("a"), id("b"), id("c"), id("d")],
            [(id("b"), id("a")), (id("c"), id("b")), (id("c"), id("d"))],
        )
    }

    #[test]
    fn affected_follows_dependents_transitively() {
        let g = chain();
        assert_eq!(g.affected_by(&id("c")), vec![id("a"), id("b"), id("c"), id("d")]);
        assert_eq!(g.affected_by(&id("b")), vec![id("a"), id("b")]);
        assert!(g.affected_by(&id("zzz")).is_empty());
    }

    #[test]
    fn reaches_follows_escalation_direction() {
        let g = chain();
        assert!(g.reaches(&id("c"), &id("a")));
        assert!(!g.reaches(&id("a"), &id("c")));
        assert!(!g.reaches(&id("d"), &id("a")));
        assert!(!g.reaches(&id("c"), &id("zzz")));
    }

    #[test]
    fn roots_have_no_dependents() {
        assert_eq!(chain().roots(), vec![id("a"), id("d")]);
    }

    #[test]
    fn dot_output_mentions_modules() {
        let dot = chain().to_dot();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains("\"a\""));
        assert_eq!(chain().edge_count(), 3);
    }
}
