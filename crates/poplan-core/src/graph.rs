//! The ordering graph: a DAG of "no later than" constraints between steps.

use petgraph::algo::{has_path_connecting, toposort};
use petgraph::graphmap::DiGraphMap;

use crate::error::PlanError;
use crate::ids::StepId;

/// Directed acyclic graph over step ids.
///
/// Edges that would close a cycle are rejected, so the graph is acyclic at
/// all times and [`OrderingGraph::topo_sort`] always covers every node.
/// Nodes and edges iterate in insertion order.
#[derive(Debug, Clone, Default)]
pub struct OrderingGraph {
    graph: DiGraphMap<StepId, ()>,
}

impl OrderingGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// A graph holding the single edge `before -> after`.
    pub fn with_edge(before: StepId, after: StepId) -> Self {
        let mut graph = DiGraphMap::new();
        graph.add_edge(before, after, ());
        Self { graph }
    }

    /// Add `before -> after`.
    ///
    /// Returns `Ok(true)` for a new edge and `Ok(false)` if it was already
    /// present. A self loop, or an edge whose reverse path already exists, is
    /// an [`PlanError::OrderingConflict`] and leaves the graph unchanged.
    pub fn insert(&mut self, before: StepId, after: StepId) -> Result<bool, PlanError> {
        if before == after || self.is_path(after, before) {
            return Err(PlanError::OrderingConflict { before, after });
        }
        if self.graph.contains_edge(before, after) {
            return Ok(false);
        }
        self.graph.add_edge(before, after, ());
        Ok(true)
    }

    /// Whether `to` is reachable from `from` along one or more edges.
    pub fn is_path(&self, from: StepId, to: StepId) -> bool {
        from != to
            && self.graph.contains_node(from)
            && self.graph.contains_node(to)
            && has_path_connecting(&self.graph, from, to, None)
    }

    /// A linearization consistent with every edge.
    ///
    /// The first node ever added leads whenever nothing is ordered before it,
    /// which keeps a plan's initial step at the front.
    pub fn topo_sort(&self) -> Vec<StepId> {
        match toposort(&self.graph, None) {
            Ok(order) => order,
            Err(cycle) => {
                tracing::error!(node = %cycle.node_id(), "ordering graph has a cycle");
                Vec::new()
            }
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = StepId> + '_ {
        self.graph.nodes()
    }

    pub fn edges(&self) -> impl Iterator<Item = (StepId, StepId)> + '_ {
        self.graph.all_edges().map(|(a, b, _)| (a, b))
    }

    pub fn contains_edge(&self, before: StepId, after: StepId) -> bool {
        self.graph.contains_edge(before, after)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}
