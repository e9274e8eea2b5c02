//! Dependency view of a task graph.
//!
//! A `TaskNode` tree says *how* tasks are composed; an `ExecutionPlan` says
//! which leaf must finish before which other leaf may start. Lowering a
//! series adds an edge from every sink of step *k* to every source of step
//! *k+1*; a parallel group adds no edges between its children.

use crate::core::graph::TaskNode;
use crate::error::{Error, Result};
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

/// Leaf tasks and their ordering constraints.
pub struct ExecutionPlan {
    graph: DiGraph<String, ()>,
}

impl ExecutionPlan {
    /// Lower a task tree into a dependency graph of its leaves.
    pub fn from_node(node: &TaskNode) -> Self {
        let mut graph = DiGraph::new();
        lower(node, &mut graph);
        Self { graph }
    }

    /// Number of leaf tasks.
    pub fn task_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of ordering constraints.
    pub fn dependency_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether the leaf named `from` must finish before the leaf named `to` starts.
    pub fn has_dependency(&self, from: &str, to: &str) -> bool {
        self.graph.edge_indices().any(|edge| {
            self.graph
                .edge_endpoints(edge)
                .map(|(a, b)| self.graph[a] == from && self.graph[b] == to)
                .unwrap_or(false)
        })
    }

    /// Group leaves into stages: every leaf in a stage depends only on
    /// leaves in earlier stages, so a stage's members may run together.
    pub fn stages(&self) -> Result<Vec<Vec<String>>> {
        let order = toposort(&self.graph, None).map_err(|cycle| {
            Error::Validation(format!(
                "Cycle detected at task: {}",
                self.graph[cycle.node_id()]
            ))
        })?;

        let mut depth = vec![0usize; self.graph.node_count()];
        for &index in &order {
            depth[index.index()] = self
                .graph
                .neighbors_directed(index, Direction::Incoming)
                .map(|dep| depth[dep.index()] + 1)
                .max()
                .unwrap_or(0);
        }

        let mut stages: Vec<Vec<String>> = Vec::new();
        for index in self.graph.node_indices() {
            let level = depth[index.index()];
            if stages.len() <= level {
                stages.resize_with(level + 1, Vec::new);
            }
            stages[level].push(self.graph[index].clone());
        }
        Ok(stages)
    }

    pub fn graph(&self) -> &DiGraph<String, ()> {
        &self.graph
    }
}

/// Returns the (sources, sinks) of the lowered subtree.
fn lower(node: &TaskNode, graph: &mut DiGraph<String, ()>) -> (Vec<NodeIndex>, Vec<NodeIndex>) {
    match node {
        TaskNode::Task(task) => {
            let index = graph.add_node(task.name().to_string());
            (vec![index], vec![index])
        }
        TaskNode::Series(children) => {
            let mut sources: Vec<NodeIndex> = Vec::new();
            let mut sinks: Vec<NodeIndex> = Vec::new();
            for child in children {
                let (child_sources, child_sinks) = lower(child, graph);
                if child_sources.is_empty() {
                    continue;
                }
                if sources.is_empty() {
                    sources = child_sources.clone();
                }
                for &from in &sinks {
                    for &to in &child_sources {
                        graph.add_edge(from, to, ());
                    }
                }
                sinks = child_sinks;
            }
            (sources, sinks)
        }
        TaskNode::Parallel(children) => {
            let mut sources = Vec::new();
            let mut sinks = Vec::new();
            for child in children {
                let (child_sources, child_sinks) = lower(child, graph);
                sources.extend(child_sources);
                sinks.extend(child_sinks);
            }
            (sources, sinks)
        }
    }
}

impl std::fmt::Debug for ExecutionPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionPlan")
            .field("tasks", &self.task_count())
            .field("dependencies", &self.dependency_count())
            .finish()
    }
}
