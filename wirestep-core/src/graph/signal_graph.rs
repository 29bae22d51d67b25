//! Signal Graph
//!
//! Bundles the topological order, node depths and liveness of an authored
//! graph so that both evaluators (the cycle baker and the tick scheduler)
//! work from the same analysis.

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::liveness::compute_live_nodes;
use super::node::{ConnectionPoint, NodeId, NodeMap, Wire};
use super::topo::sort_with_depths;
use crate::error::CycleError;

/// Number of external input and output connection points of a graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortCounts {
    pub inputs: usize,
    pub outputs: usize,
}

impl PortCounts {
    pub fn new(inputs: usize, outputs: usize) -> Self {
        Self { inputs, outputs }
    }

    /// Smallest port counts covering every connection point the graph mentions.
    pub fn infer(nodes: &NodeMap, wires: &[Wire]) -> Self {
        let mentioned = nodes.keys().chain(
            wires
                .iter()
                .flat_map(|wire| [&wire.source.node_id, &wire.target.node_id]),
        );

        let mut counts = Self::default();
        for id in mentioned {
            match id.connection_point() {
                Some(ConnectionPoint::Input(i)) => counts.inputs = counts.inputs.max(i + 1),
                Some(ConnectionPoint::Output(o)) => counts.outputs = counts.outputs.max(o + 1),
                None => {}
            }
        }
        counts
    }
}

/// Every id a graph evaluates: input CPs, authored nodes, then output CPs.
pub fn graph_node_ids(nodes: &NodeMap, ports: PortCounts) -> Vec<NodeId> {
    let mut ids = Vec::with_capacity(ports.inputs + nodes.len() + ports.outputs);
    ids.extend((0..ports.inputs).map(NodeId::input_cp));
    ids.extend(
        nodes
            .keys()
            .filter(|id| id.connection_point().is_none())
            .cloned(),
    );
    ids.extend((0..ports.outputs).map(NodeId::output_cp));
    ids
}

/// Ordering, depth and liveness of one graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalGraph {
    order: Vec<NodeId>,
    live_order: Vec<NodeId>,
    depths: IndexMap<NodeId, usize>,
    max_depth: usize,
    live: IndexSet<NodeId>,
    ports: PortCounts,
}

impl SignalGraph {
    /// Analyse a graph whose port counts are inferred from its wiring.
    pub fn build(nodes: &NodeMap, wires: &[Wire]) -> Result<Self, CycleError> {
        Self::with_ports(nodes, wires, PortCounts::infer(nodes, wires))
    }

    /// Analyse a graph with explicitly declared port counts.
    pub fn with_ports(nodes: &NodeMap, wires: &[Wire], ports: PortCounts) -> Result<Self, CycleError> {
        let ids = graph_node_ids(nodes, ports);
        let sorted = sort_with_depths(&ids, wires)?;
        let live = compute_live_nodes(&sorted.order, wires);
        let live_order = sorted
            .order
            .iter()
            .filter(|id| live.contains(*id))
            .cloned()
            .collect();

        Ok(Self {
            order: sorted.order,
            live_order,
            depths: sorted.depths,
            max_depth: sorted.max_depth,
            live,
            ports,
        })
    }

    /// All ids in dependency order.
    pub fn order(&self) -> &[NodeId] {
        &self.order
    }

    /// Live ids in dependency order.
    pub fn live_order(&self) -> &[NodeId] {
        &self.live_order
    }

    pub fn depth(&self, id: &NodeId) -> Option<usize> {
        self.depths.get(id).copied()
    }

    pub fn depths(&self) -> &IndexMap<NodeId, usize> {
        &self.depths
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn is_live(&self, id: &NodeId) -> bool {
        self.live.contains(id)
    }

    pub fn live_nodes(&self) -> &IndexSet<NodeId> {
        &self.live
    }

    pub fn ports(&self) -> PortCounts {
        self.ports
    }
}
