//! Dependency graph over resource/component instances.
//!
//! Directed graph where nodes are qualified instance names and an edge
//! `A -> B` means "A depends on B" (B is evaluated first). Node indices are
//! handed out in registration order, which doubles as declaration order for
//! deterministic traversal and tie-breaking.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, trace};

/// Where an edge came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum EdgeKind {
    /// `@dependsOn(...)`
    Explicit,
    /// The dependent's initializer reads the dependency.
    Implicit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("dependency cycle detected: {}", path.join(" -> "))]
pub struct CycleError {
    /// Ordered cycle path; first and last entries are the same node.
    pub path: Vec<String>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    OnStack,
    Done,
}

/// DFS frame: node, its sorted neighbours, next neighbour to look at.
type Frame = (NodeIndex, Vec<NodeIndex>, usize);

#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    graph: DiGraph<String, EdgeKind>,
    index: HashMap<String, NodeIndex>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node; registering an existing name is a no-op.
    pub fn add_node(&mut self, name: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(name) {
            return idx;
        }
        let idx = self.graph.add_node(name.to_string());
        self.index.insert(name.to_string(), idx);
        idx
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Record that `dependent` depends on `dependency`. Both nodes are
    /// registered if missing; duplicate edges collapse (first kind wins).
    pub fn add_edge(&mut self, dependent: &str, dependency: &str, kind: EdgeKind) {
        let from = self.add_node(dependent);
        let to = self.add_node(dependency);
        if self.graph.find_edge(from, to).is_none() {
            trace!(dependent, dependency, ?kind, "dependency edge");
            self.graph.add_edge(from, to, kind);
        }
    }

    /// Direct dependencies of `name` in registration order.
    pub fn dependencies(&self, name: &str) -> Vec<&str> {
        let Some(&idx) = self.index.get(name) else {
            return Vec::new();
        };
        self.sorted_neighbors(idx)
            .into_iter()
            .map(|n| self.graph[n].as_str())
            .collect()
    }

    pub fn edge_kind(&self, dependent: &str, dependency: &str) -> Option<EdgeKind> {
        let from = *self.index.get(dependent)?;
        let to = *self.index.get(dependency)?;
        let edge = self.graph.find_edge(from, to)?;
        self.graph.edge_weight(edge).copied()
    }

    /// Outgoing neighbours sorted by node index; petgraph yields them in
    /// reverse insertion order otherwise.
    fn sorted_neighbors(&self, idx: NodeIndex) -> Vec<NodeIndex> {
        let mut out: Vec<NodeIndex> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .collect();
        out.sort();
        out
    }

    /// Depth-first search from every node (in registration order) with an
    /// on-stack marker. The first back edge found yields the cycle path.
    ///
    /// The walk keeps its own frame stack, so chain length is bounded by
    /// memory rather than by the thread's call stack.
    pub fn detect_cycle(&self) -> Result<(), CycleError> {
        let mut marks = vec![Mark::Unvisited; self.graph.node_count()];
        let mut frames: Vec<Frame> = Vec::new();
        for start in self.graph.node_indices() {
            if marks[start.index()] != Mark::Unvisited {
                continue;
            }
            marks[start.index()] = Mark::OnStack;
            frames.push((start, self.sorted_neighbors(start), 0));

            while let Some((node, neighbors, cursor)) = frames.last_mut() {
                let Some(&next) = neighbors.get(*cursor) else {
                    marks[node.index()] = Mark::Done;
                    frames.pop();
                    continue;
                };
                *cursor += 1;
                match marks[next.index()] {
                    Mark::OnStack => return Err(self.cycle_through(&frames, next)),
                    Mark::Unvisited => {
                        marks[next.index()] = Mark::OnStack;
                        frames.push((next, self.sorted_neighbors(next), 0));
                    }
                    Mark::Done => {}
                }
            }
        }
        Ok(())
    }

    /// Cycle path from the frame holding `back` to the top of the stack,
    /// closed by `back` again.
    fn cycle_through(&self, frames: &[Frame], back: NodeIndex) -> CycleError {
        let pos = frames.iter().position(|(n, _, _)| *n == back).unwrap_or(0);
        let mut path: Vec<String> = frames[pos..]
            .iter()
            .map(|(n, _, _)| self.graph[*n].clone())
            .collect();
        path.push(self.graph[back].clone());
        debug!(cycle = %path.join(" -> "), "dependency cycle");
        CycleError { path }
    }

    /// Evaluation order: every node after all of its dependencies, ties broken
    /// by registration order. Fails with the cycle if the graph is cyclic.
    pub fn topological_order(&self) -> Result<Vec<String>, CycleError> {
        self.detect_cycle()?;

        // remaining dependency count per node
        let mut pending: Vec<usize> = self
            .graph
            .node_indices()
            .map(|n| {
                self.graph
                    .neighbors_directed(n, Direction::Outgoing)
                    .count()
            })
            .collect();

        let mut ready: BinaryHeap<Reverse<NodeIndex>> = self
            .graph
            .node_indices()
            .filter(|n| pending[n.index()] == 0)
            .map(Reverse)
            .collect();

        let mut order = Vec::with_capacity(self.graph.node_count());
        while let Some(Reverse(node)) = ready.pop() {
            order.push(self.graph[node].clone());
            for dependent in self.graph.neighbors_directed(node, Direction::Incoming) {
                pending[dependent.index()] -= 1;
                if pending[dependent.index()] == 0 {
                    ready.push(Reverse(dependent));
                }
            }
        }
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(nodes: &[&str], edges: &[(&str, &str)]) -> DependencyGraph {
        let mut g = DependencyGraph::new();
        for n in nodes {
            g.add_node(n);
        }
        for (from, to) in edges {
            g.add_edge(from, to, EdgeKind::Explicit);
        }
        g
    }

    #[test]
    fn order_respects_dependencies_and_declaration_order() {
        let g = graph(
            &["first", "second", "third"],
            &[("second", "first"), ("second", "third")],
        );
        assert_eq!(
            g.topological_order().unwrap(),
            vec!["first", "third", "second"]
        );
    }

    #[test]
    fn independent_nodes_keep_declaration_order() {
        let g = graph(&["c", "a", "b"], &[]);
        assert_eq!(g.topological_order().unwrap(), vec!["c", "a", "b"]);
    }

    #[test]
    fn cycle_path_is_ordered_and_closed() {
        let g = graph(&["a", "b", "c"], &[("a", "b"), ("b", "c"), ("c", "a")]);
        let err = g.detect_cycle().unwrap_err();
        assert_eq!(err.path, vec!["a", "b", "c", "a"]);
        assert_eq!(err.to_string(), "dependency cycle detected: a -> b -> c -> a");
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let g = graph(&["a"], &[("a", "a")]);
        assert_eq!(g.detect_cycle().unwrap_err().path, vec!["a", "a"]);
    }

    #[test]
    fn cycle_found_regardless_of_declaration_order() {
        let forward = graph(&["second", "third"], &[("second", "third"), ("third", "second")]);
        let backward = graph(&["third", "second"], &[("second", "third"), ("third", "second")]);
        assert!(forward.topological_order().is_err());
        assert!(backward.topological_order().is_err());
    }

    #[test]
    fn duplicate_edges_collapse() {
        let mut g = graph(&["a", "b"], &[("a", "b")]);
        g.add_edge("a", "b", EdgeKind::Implicit);
        assert_eq!(g.edge_count(), 1);
        assert_eq!(g.edge_kind("a", "b"), Some(EdgeKind::Explicit));
        assert_eq!(g.dependencies("a"), vec!["b"]);
    }

    #[test]
    fn long_chains_do_not_exhaust_the_stack() {
        const N: usize = 100_000;
        let mut g = DependencyGraph::new();
        for i in 0..N {
            g.add_node(&format!("r{i}"));
        }
        for i in 0..N - 1 {
            g.add_edge(&format!("r{i}"), &format!("r{}", i + 1), EdgeKind::Explicit);
        }
        let order = g.topological_order().unwrap();
        assert_eq!(order.len(), N);
        assert_eq!(order[0], format!("r{}", N - 1));
        assert_eq!(order[N - 1], "r0");

        g.add_edge(&format!("r{}", N - 1), "r0", EdgeKind::Explicit);
        let err = g.detect_cycle().unwrap_err();
        assert_eq!(err.path.len(), N + 1);
        assert_eq!(err.path.first(), err.path.last());
    }

    #[test]
    fn diamond_is_acyclic() {
        let g = graph(
            &["top", "left", "right", "base"],
            &[("top", "left"), ("top", "right"), ("left", "base"), ("right", "base")],
        );
        assert_eq!(
            g.topological_order().unwrap(),
            vec!["base", "left", "right", "top"]
        );
    }
}
