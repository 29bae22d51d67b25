//! Cycle runner.
//!
//! Runs a graph over a whole input sequence and records what every wire
//! carried on every cycle, for inspection and playback.

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use super::catalogue::NodeMemory;
use super::GraphBaker;
use crate::error::CycleError;
use crate::graph::{NodeId, NodeMap, PortCounts, SignalGraph, Wire, WireId};

/// Everything observed while running a graph cycle by cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CycleResults {
    /// External outputs, one vector per cycle.
    pub output_values: Vec<Vec<f64>>,
    /// Value carried by each wire, one entry per cycle. Dead wires carry 0.
    pub wire_values: IndexMap<WireId, Vec<f64>>,
    pub processing_order: Vec<NodeId>,
    pub node_depths: IndexMap<NodeId, usize>,
    pub max_depth: usize,
    pub live_node_ids: IndexSet<NodeId>,
    /// Memory of the stateful nodes after the last cycle.
    pub cross_cycle_state: IndexMap<NodeId, NodeMemory>,
}

pub(super) fn run(
    baker: &GraphBaker<'_>,
    ports: PortCounts,
    nodes: &NodeMap,
    wires: &[Wire],
    input_sequence: &[Vec<f64>],
) -> Result<CycleResults, CycleError> {
    let graph = SignalGraph::with_ports(nodes, wires, ports)?;

    let live_nodes: NodeMap = nodes
        .iter()
        .filter(|(id, _)| graph.is_live(id))
        .map(|(id, node)| (id.clone(), node.clone()))
        .collect();
    let is_live_wire =
        |wire: &Wire| graph.is_live(&wire.source.node_id) && graph.is_live(&wire.target.node_id);
    let live_wires: Vec<Wire> = wires
        .iter()
        .filter(|wire| is_live_wire(*wire))
        .cloned()
        .collect();

    let mut evaluator = baker.with_ports(ports).bake(&live_nodes, &live_wires)?.evaluator;

    let mut output_values = Vec::with_capacity(input_sequence.len());
    let mut wire_values: IndexMap<WireId, Vec<f64>> = wires
        .iter()
        .map(|wire| (wire.id.clone(), Vec::with_capacity(input_sequence.len())))
        .collect();

    for inputs in input_sequence {
        output_values.push(evaluator.evaluate(inputs));
        for wire in wires {
            let value = if is_live_wire(wire) {
                evaluator
                    .port_value(&wire.source.node_id, wire.source.port_index)
                    .unwrap_or(0.0)
            } else {
                0.0
            };
            if let Some(values) = wire_values.get_mut(&wire.id) {
                values.push(value);
            }
        }
    }

    Ok(CycleResults {
        output_values,
        wire_values,
        processing_order: evaluator.processing_order().cloned().collect(),
        node_depths: graph.depths().clone(),
        max_depth: graph.max_depth(),
        live_node_ids: graph.live_nodes().clone(),
        cross_cycle_state: evaluator.memory_snapshot(),
    })
}

/// Run a graph over `input_sequence`, inferring its port counts.
pub fn run_cycles(
    nodes: &NodeMap,
    wires: &[Wire],
    input_sequence: &[Vec<f64>],
) -> Result<CycleResults, CycleError> {
    GraphBaker::new().run_cycles(nodes, wires, input_sequence)
}
