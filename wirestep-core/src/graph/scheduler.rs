//! Tick Scheduler
//!
//! Runs a graph in wire time: signals travel along wires for `wts_delay`
//! ticks before they land in their target port, so the render loop can draw
//! them in flight.
//!
//! # Algorithm
//!
//! Each call to [`advance_tick`]:
//!
//! 1. Ages every in-flight signal by one tick
//! 2. Delivers signals that reached 0 into their target's input port, and
//!    removes them from the wire
//! 3. Walks the topological order and evaluates every node that received a
//!    delivery (or an injection) this tick
//! 4. Puts each fired node's outputs on its outgoing wires
//!
//! A wire with `wts_delay == 0` delivers in step 4 of the same tick. Its
//! target comes later in the order, so it fires in the same walk.
//!
//! Nodes that were not triggered keep their previous outputs and emit
//! nothing, so one injected value travels through the graph as one blip.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use smallvec::{smallvec, SmallVec};
use tracing::{debug, trace, warn};

use super::node::{NodeId, NodeMap, NodeState, PortRef, Wire};
use super::signal_graph::SignalGraph;
use crate::bake::{
    clamp_signal, evaluate_node, CompositeSource, Evaluate, Evaluator, NodeMemory, Ports,
};
use crate::config::SchedulerConfig;
use crate::error::CycleError;

/// Live values of one node during a scheduler session.
pub struct NodeRuntimeState {
    /// Last value delivered to each input port. Unconnected ports read 0.
    pub inputs: Ports,
    /// Outputs of the node's last evaluation.
    pub outputs: Ports,
    pub memory: NodeMemory,
    baked: Option<Box<dyn Evaluate>>,
}

impl NodeRuntimeState {
    fn for_node(node: &NodeState) -> Self {
        let memory = NodeMemory::for_node(&node.kind, &node.params);
        Self::with_ports(node.input_count, node.output_count, memory)
    }

    fn with_ports(inputs: usize, outputs: usize, memory: NodeMemory) -> Self {
        Self {
            inputs: smallvec![0.0; inputs],
            outputs: smallvec![0.0; outputs],
            memory,
            baked: None,
        }
    }

    /// Fresh state for `id`, which need not be in `nodes`.
    fn for_id(id: &NodeId, nodes: &NodeMap) -> Self {
        match nodes.get(id) {
            Some(node) => Self::for_node(node),
            // connection points pass one value through
            None if id.connection_point().is_some() => {
                Self::with_ports(1, 1, NodeMemory::Stateless)
            }
            None => Self::with_ports(0, 0, NodeMemory::Stateless),
        }
    }

    /// Ring buffer and write cursor of a Delay node.
    pub fn delay_state(&self) -> Option<(&[f64], usize)> {
        match &self.memory {
            NodeMemory::Delay {
                buffer,
                write_index,
            } => Some((buffer, *write_index)),
            _ => None,
        }
    }

    pub fn has_baked_evaluator(&self) -> bool {
        self.baked.is_some()
    }
}

impl fmt::Debug for NodeRuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRuntimeState")
            .field("inputs", &self.inputs)
            .field("outputs", &self.outputs)
            .field("memory", &self.memory)
            .field("baked", &self.baked.is_some())
            .finish()
    }
}

/// Outgoing wire indices per source node, rebuilt only when the wiring
/// changes between ticks.
#[derive(Debug, Default)]
struct Fanout {
    /// Source node of each wire, in wire order.
    sources: Vec<NodeId>,
    by_node: IndexMap<NodeId, SmallVec<[usize; 4]>>,
}

impl Fanout {
    fn refresh(&mut self, wires: &[Wire]) {
        let unchanged = self.sources.len() == wires.len()
            && self
                .sources
                .iter()
                .zip(wires)
                .all(|(source, wire)| *source == wire.source.node_id);
        if unchanged {
            return;
        }

        self.sources.clear();
        self.by_node.clear();
        for (index, wire) in wires.iter().enumerate() {
            self.sources.push(wire.source.node_id.clone());
            self.by_node
                .entry(wire.source.node_id.clone())
                .or_default()
                .push(index);
        }
    }

    fn of(&self, id: &NodeId) -> &[usize] {
        self.by_node.get(id).map(|wires| wires.as_slice()).unwrap_or_default()
    }
}

/// Runtime state of one scheduler session.
#[derive(Debug, Default)]
pub struct SchedulerState {
    runtime: IndexMap<NodeId, NodeRuntimeState>,
    /// Nodes to evaluate on the current tick.
    triggered: IndexSet<NodeId>,
    fanout: Fanout,
    tick: u64,
}

impl SchedulerState {
    /// One runtime state per node. Composite nodes stay unresolved.
    pub fn new(nodes: &NodeMap) -> Self {
        let runtime = nodes
            .iter()
            .map(|(id, node)| (id.clone(), NodeRuntimeState::for_node(node)))
            .collect();
        Self {
            runtime,
            triggered: IndexSet::new(),
            fanout: Fanout::default(),
            tick: 0,
        }
    }

    /// Like [`SchedulerState::new`], attaching an evaluator to every
    /// composite node `library` resolves.
    pub fn with_library(nodes: &NodeMap, library: &dyn CompositeSource) -> Self {
        let mut state = Self::new(nodes);
        for (id, node) in nodes.iter().filter(|(_, node)| node.kind.is_composite()) {
            match library.resolve(&node.kind.to_string()) {
                Some(metadata) => {
                    let evaluator = Evaluator::from_metadata(metadata.clone());
                    state.attach_evaluator(id, Box::new(evaluator));
                }
                None => warn!(
                    node = %id,
                    kind = %node.kind,
                    "composite node is unresolved; it will emit zeros"
                ),
            }
        }
        state
    }

    /// Delegate the evaluation of `id` to `evaluator`.
    ///
    /// Returns false if the session has no node `id`.
    pub fn attach_evaluator(&mut self, id: &NodeId, evaluator: Box<dyn Evaluate>) -> bool {
        match self.runtime.get_mut(id) {
            Some(runtime) => {
                runtime.baked = Some(evaluator);
                true
            }
            None => false,
        }
    }

    /// Load `value` into input connection point `index`. It fires on the
    /// next tick.
    pub fn inject_input(&mut self, index: usize, value: f64) {
        let id = NodeId::input_cp(index);
        let runtime = self
            .runtime
            .entry(id.clone())
            .or_insert_with(|| NodeRuntimeState::with_ports(1, 1, NodeMemory::Stateless));
        // an input CP declared in the node map has no input port of its own
        if runtime.inputs.is_empty() {
            runtime.inputs.push(0.0);
        }
        runtime.inputs[0] = clamp_signal(value);
        self.triggered.insert(id);
    }

    pub fn node(&self, id: &NodeId) -> Option<&NodeRuntimeState> {
        self.runtime.get(id)
    }

    /// Number of completed ticks.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    fn runtime_mut(&mut self, id: &NodeId, nodes: &NodeMap) -> &mut NodeRuntimeState {
        self.runtime
            .entry(id.clone())
            .or_insert_with(|| NodeRuntimeState::for_id(id, nodes))
    }

    fn deliver(&mut self, target: &PortRef, value: f64, nodes: &NodeMap) {
        let runtime = self.runtime_mut(&target.node_id, nodes);
        match runtime.inputs.get_mut(target.port_index) {
            Some(slot) => {
                *slot = clamp_signal(value);
                self.triggered.insert(target.node_id.clone());
            }
            None => trace!(
                node = %target.node_id,
                port = target.port_index,
                "signal delivered to a missing port; dropping"
            ),
        }
    }

    /// Evaluate `id` from its current inputs and return its new outputs.
    fn fire(&mut self, id: &NodeId, nodes: &NodeMap) -> Ports {
        let node = nodes.get(id);
        let runtime = self.runtime_mut(id, nodes);

        let produced = match (&mut runtime.baked, node) {
            (Some(baked), _) => {
                let count = node.map_or(runtime.outputs.len(), |node| node.output_count);
                let mut out: Ports = baked
                    .evaluate(&runtime.inputs)
                    .into_iter()
                    .map(clamp_signal)
                    .collect();
                out.resize(count, 0.0);
                out
            }
            (None, Some(node)) => evaluate_node(
                &node.kind,
                &node.params,
                &runtime.inputs,
                node.output_count,
                &mut runtime.memory,
            ),
            (None, None) => {
                let mut out: Ports = runtime.inputs.iter().copied().take(1).collect();
                out.resize(runtime.outputs.len(), 0.0);
                out
            }
        };

        runtime.outputs = produced.clone();
        produced
    }
}

/// Fresh runtime state for a scheduler session over `nodes`.
pub fn create_scheduler_state(nodes: &NodeMap) -> SchedulerState {
    SchedulerState::new(nodes)
}

/// Advance the simulation by one tick.
///
/// Mutates the wires' in-flight signals and `state` in place. `topo_order`
/// must come from an acyclic graph; ids missing from it never fire.
pub fn advance_tick(
    wires: &mut [Wire],
    nodes: &NodeMap,
    topo_order: &[NodeId],
    state: &mut SchedulerState,
) {
    state.tick += 1;

    for wire in wires.iter_mut() {
        for signal in &mut wire.signals {
            signal.ticks_remaining = signal.ticks_remaining.saturating_sub(1);
        }
    }

    let mut delivered = 0usize;
    for wire in wires.iter_mut() {
        let target = &wire.target;
        wire.signals.retain(|signal| {
            if signal.ticks_remaining == 0 {
                state.deliver(target, signal.value, nodes);
                delivered += 1;
                false
            } else {
                true
            }
        });
    }

    // taken out so firing can borrow the state mutably
    let mut fanout = std::mem::take(&mut state.fanout);
    fanout.refresh(wires);

    let mut fired = 0usize;
    for id in topo_order {
        if !state.triggered.contains(id) {
            continue;
        }
        let outputs = state.fire(id, nodes);
        fired += 1;

        for &index in fanout.of(id) {
            let wire = &mut wires[index];
            let value = outputs.get(wire.source.port_index).copied().unwrap_or(0.0);
            if wire.wts_delay == 0 {
                state.deliver(&wire.target, value, nodes);
            } else {
                wire.inject(value);
            }
        }
    }

    state.fanout = fanout;
    state.triggered.clear();
    trace!(tick = state.tick, delivered, fired, "advanced tick");
}

/// A scheduler session that owns its graph.
///
/// Validates the graph once on creation and advances it with the cached
/// order, skipping dead nodes unless configured otherwise.
#[derive(Debug)]
pub struct TickScheduler {
    nodes: NodeMap,
    wires: Vec<Wire>,
    graph: SignalGraph,
    state: SchedulerState,
    config: SchedulerConfig,
}

impl TickScheduler {
    pub fn new(nodes: NodeMap, wires: Vec<Wire>) -> Result<Self, CycleError> {
        Self::with_options(nodes, wires, SchedulerConfig::default(), None)
    }

    pub fn with_options(
        nodes: NodeMap,
        wires: Vec<Wire>,
        config: SchedulerConfig,
        library: Option<&dyn CompositeSource>,
    ) -> Result<Self, CycleError> {
        let graph = SignalGraph::build(&nodes, &wires)?;
        let state = match library {
            Some(library) => SchedulerState::with_library(&nodes, library),
            None => SchedulerState::new(&nodes),
        };
        debug!(
            nodes = graph.order().len(),
            live = graph.live_order().len(),
            wires = wires.len(),
            "created scheduler session"
        );
        Ok(Self {
            nodes,
            wires,
            graph,
            state,
            config,
        })
    }

    /// Load `value` into input connection point `index` for the next tick.
    pub fn inject(&mut self, index: usize, value: f64) {
        self.state.inject_input(index, value);
    }

    pub fn advance(&mut self) {
        let order = if self.config.skip_dead_nodes {
            self.graph.live_order()
        } else {
            self.graph.order()
        };
        advance_tick(&mut self.wires, &self.nodes, order, &mut self.state);
    }

    pub fn advance_by(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.advance();
        }
    }

    pub fn wires(&self) -> &[Wire] {
        &self.wires
    }

    pub fn node_state(&self, id: &NodeId) -> Option<&NodeRuntimeState> {
        self.state.node(id)
    }

    pub fn state_mut(&mut self) -> &mut SchedulerState {
        &mut self.state
    }

    /// Last value that reached each output connection point.
    pub fn output_values(&self) -> Vec<f64> {
        (0..self.graph.ports().outputs)
            .map(|index| {
                self.state
                    .node(&NodeId::output_cp(index))
                    .and_then(|runtime| runtime.inputs.first().copied())
                    .unwrap_or(0.0)
            })
            .collect()
    }

    pub fn tick(&self) -> u64 {
        self.state.tick()
    }

    pub fn graph(&self) -> &SignalGraph {
        &self.graph
    }
}
