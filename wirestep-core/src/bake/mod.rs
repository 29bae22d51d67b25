//! Graph Baking
//!
//! Compiles an authored node/wire graph into a reusable evaluator, so a
//! solved puzzle can be dropped into another board as a single node.
//!
//! # Architecture
//!
//! 1. The graph is sorted (and rejected if it contains a wire cycle)
//! 2. Nodes and wires are copied into [`BakeMetadata`], plain serializable data
//! 3. An [`Evaluator`] is built from that metadata
//!
//! Because step 3 only ever sees metadata, an evaluator rebuilt from a JSON
//! round trip of the metadata runs the exact same plan as the one returned
//! by the bake, cycle for cycle.
//!
//! # Composition
//!
//! `puzzle:` and `utility:` nodes are resolved through a [`CompositeSource`]
//! at bake time. The resolved metadata is embedded in the node's config, so
//! the baked metadata stays self-contained.

mod catalogue;
mod cycle;
mod evaluator;
mod metadata;

pub use catalogue::{clamp_signal, delay_subdivisions, evaluate_node, NodeMemory, Ports};
pub use cycle::{run_cycles, CycleResults};
pub use evaluator::{Evaluate, Evaluator, FnEvaluate};
pub use metadata::{BakeMetadata, BakedEdge, NodeConfig};

use std::collections::HashMap;
use std::hash::BuildHasher;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use crate::error::CycleError;
use crate::graph::{NodeId, NodeMap, NodeState, PortCounts, SignalGraph, Wire};

/// Looks up previously baked graphs by their node type string
/// (e.g. `puzzle:double-invert`).
pub trait CompositeSource {
    fn resolve(&self, reference: &str) -> Option<&BakeMetadata>;
}

impl<S: BuildHasher> CompositeSource for HashMap<String, BakeMetadata, S> {
    fn resolve(&self, reference: &str) -> Option<&BakeMetadata> {
        self.get(reference)
    }
}

impl<S: BuildHasher> CompositeSource for IndexMap<String, BakeMetadata, S> {
    fn resolve(&self, reference: &str) -> Option<&BakeMetadata> {
        self.get(reference)
    }
}

/// The result of a successful bake.
#[derive(Debug)]
pub struct BakedGraph {
    pub evaluator: Evaluator,
    pub metadata: BakeMetadata,
}

impl BakedGraph {
    /// Run one cycle on the baked evaluator.
    pub fn evaluate(&mut self, inputs: &[f64]) -> Vec<f64> {
        self.evaluator.evaluate(inputs)
    }
}

/// Bakes graphs into evaluators.
#[derive(Clone, Copy, Default)]
pub struct GraphBaker<'a> {
    ports: Option<PortCounts>,
    library: Option<&'a dyn CompositeSource>,
}

impl<'a> GraphBaker<'a> {
    /// A baker that infers port counts and leaves composites unresolved.
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare the graph's external port counts instead of inferring them.
    pub fn with_ports(mut self, ports: PortCounts) -> Self {
        self.ports = Some(ports);
        self
    }

    /// Resolve composite nodes through `library`.
    pub fn with_library(mut self, library: &'a dyn CompositeSource) -> Self {
        self.library = Some(library);
        self
    }

    fn ports_for(&self, nodes: &NodeMap, wires: &[Wire]) -> PortCounts {
        self.ports.unwrap_or_else(|| PortCounts::infer(nodes, wires))
    }

    /// Bake a graph into an evaluator and its metadata.
    pub fn bake(&self, nodes: &NodeMap, wires: &[Wire]) -> Result<BakedGraph, CycleError> {
        let metadata = self.bake_metadata(nodes, wires)?;
        let evaluator = Evaluator::from_metadata(metadata.clone());
        Ok(BakedGraph {
            evaluator,
            metadata,
        })
    }

    /// Produce only the metadata of a bake.
    pub fn bake_metadata(&self, nodes: &NodeMap, wires: &[Wire]) -> Result<BakeMetadata, CycleError> {
        let ports = self.ports_for(nodes, wires);
        let graph = SignalGraph::with_ports(nodes, wires, ports)?;
        let known: IndexSet<&NodeId> = graph.order().iter().collect();

        let node_configs: Vec<NodeConfig> = nodes
            .values()
            .filter(|node| node.id.connection_point().is_none())
            .map(|node| self.node_config(node))
            .collect();

        let edges: Vec<BakedEdge> = wires
            .iter()
            .filter(|wire| {
                known.contains(&wire.source.node_id) && known.contains(&wire.target.node_id)
            })
            .map(BakedEdge::from)
            .collect();

        debug!(
            nodes = node_configs.len(),
            edges = edges.len(),
            inputs = ports.inputs,
            outputs = ports.outputs,
            max_depth = graph.max_depth(),
            "baked graph"
        );

        Ok(BakeMetadata {
            topo_order: graph.order().to_vec(),
            node_configs,
            edges,
            input_count: ports.inputs,
            output_count: ports.outputs,
        })
    }

    /// Bake the live part of a graph and run it over `input_sequence`.
    pub fn run_cycles(
        &self,
        nodes: &NodeMap,
        wires: &[Wire],
        input_sequence: &[Vec<f64>],
    ) -> Result<CycleResults, CycleError> {
        let ports = self.ports_for(nodes, wires);
        cycle::run(self, ports, nodes, wires, input_sequence)
    }

    fn node_config(&self, node: &NodeState) -> NodeConfig {
        let mut config = NodeConfig::from(node);
        if node.kind.is_composite() {
            let reference = node.kind.to_string();
            config.baked = self
                .library
                .and_then(|library| library.resolve(&reference))
                .cloned()
                .map(Box::new);
            if config.baked.is_none() {
                warn!(node = %node.id, reference = %reference, "composite node is unresolved; it will emit zeros");
            }
        }
        config
    }
}

/// Bake a graph, inferring its port counts. Composite nodes stay unresolved.
pub fn bake_graph(nodes: &NodeMap, wires: &[Wire]) -> Result<BakedGraph, CycleError> {
    GraphBaker::new().bake(nodes, wires)
}

/// Build a fresh evaluator from metadata, e.g. after loading it from JSON.
///
/// Memory and Delay nodes start from zero.
pub fn reconstruct_from_metadata(metadata: BakeMetadata) -> Evaluator {
    Evaluator::from_metadata(metadata)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{node_map, NodeKind};

    fn inverter_graph() -> (NodeMap, Vec<Wire>) {
        let nodes = node_map([NodeState::new("inv", NodeKind::Invert)]);
        let wires = vec![
            Wire::between("w1", NodeId::input_cp(0), 0, "inv", 0),
            Wire::between("w2", "inv", 0, NodeId::output_cp(0), 0),
        ];
        (nodes, wires)
    }

    #[test]
    fn bake_inverter() {
        let (nodes, wires) = inverter_graph();
        let mut baked = bake_graph(&nodes, &wires).unwrap();

        assert_eq!(baked.evaluate(&[60.0]), vec![-60.0]);
        assert_eq!(
            baked.metadata.topo_order,
            vec![NodeId::input_cp(0), NodeId::from("inv"), NodeId::output_cp(0)]
        );
        assert_eq!(baked.metadata.node_configs.len(), 1);
        assert_eq!((baked.metadata.input_count, baked.metadata.output_count), (1, 1));
    }

    #[test]
    fn declared_ports_widen_the_interface() {
        let (nodes, wires) = inverter_graph();
        let mut baked = GraphBaker::new()
            .with_ports(PortCounts::new(2, 2))
            .bake(&nodes, &wires)
            .unwrap();

        assert_eq!(baked.evaluate(&[10.0, 99.0]), vec![-10.0, 0.0]);
        assert_eq!(baked.metadata.topo_order.len(), 5);
    }

    #[test]
    fn bake_copies_the_graph() {
        let (mut nodes, wires) = inverter_graph();
        let mut baked = bake_graph(&nodes, &wires).unwrap();

        nodes.get_mut("inv").unwrap().kind = NodeKind::Polarizer;

        assert_eq!(baked.evaluate(&[30.0]), vec![-30.0]);
    }

    #[test]
    fn cycles_fail_the_bake() {
        let nodes = node_map([
            NodeState::new("a", NodeKind::Invert),
            NodeState::new("b", NodeKind::Invert),
        ]);
        let wires = vec![
            Wire::between("w1", "a", 0, "b", 0),
            Wire::between("w2", "b", 0, "a", 0),
        ];

        let err = bake_graph(&nodes, &wires).unwrap_err();
        assert_eq!(err.cycle_path.first(), err.cycle_path.last());
    }

    #[test]
    fn composites_resolve_through_the_library() {
        let (nodes, wires) = inverter_graph();
        let inner = bake_graph(&nodes, &wires).unwrap().metadata;
        let mut library: HashMap<String, BakeMetadata> = HashMap::new();
        library.insert("puzzle:inv".into(), inner);

        let outer_nodes = node_map([
            NodeState::new("p", "puzzle:inv").with_ports(1, 1),
            NodeState::new("q", "utility:missing").with_ports(1, 1),
        ]);
        let outer_wires = vec![
            Wire::between("a", NodeId::input_cp(0), 0, "p", 0),
            Wire::between("b", "p", 0, NodeId::output_cp(0), 0),
            Wire::between("c", NodeId::input_cp(0), 0, "q", 0),
            Wire::between("d", "q", 0, NodeId::output_cp(1), 0),
        ];

        let mut baked = GraphBaker::new()
            .with_library(&library)
            .bake(&outer_nodes, &outer_wires)
            .unwrap();

        assert_eq!(baked.evaluate(&[25.0]), vec![-25.0, 0.0]);
        assert!(baked.metadata.node_configs[0].baked.is_some());
        assert!(baked.metadata.node_configs[1].baked.is_none());
    }
}
