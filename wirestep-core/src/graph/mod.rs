//! Signal Graph
//!
//! This module holds the authored circuit (nodes and the wires between their
//! ports) and the analyses both evaluation models run on it.
//!
//! # Overview
//!
//! A circuit is a directed acyclic graph where:
//!
//! - Nodes are arithmetic or stateful operators, plus virtual connection
//!   points standing for the circuit's external inputs and outputs
//! - Wires connect one node's output port to another node's input port
//!
//! Feedback is never a wire cycle. Memory and Delay nodes carry their lag
//! internally, so any cycle in the wiring is an authoring error reported
//! with the offending path.
//!
//! # Design Decisions
//!
//! 1. Ordering is computed once per graph and shared: [`SignalGraph`]
//!    bundles the topological order, depths and liveness.
//!
//! 2. Maps are insertion ordered (`IndexMap`), so every traversal and every
//!    tie in the sort follows the order nodes were authored in.
//!
//! 3. The tick scheduler mutates wires and runtime state in place. The
//!    wire fan-out per node is cached in the session state and rebuilt only
//!    when the wiring changes.

mod liveness;
mod node;
mod scheduler;
mod signal_graph;
mod topo;

pub use liveness::compute_live_nodes;
pub use node::{
    node_map, ConnectionPoint, Edge, InFlightSignal, NodeId, NodeKind, NodeMap, NodeState,
    ParamValue, Params, PortRef, PortSide, Position, Wire, WireId,
};
pub use scheduler::{
    advance_tick, create_scheduler_state, NodeRuntimeState, SchedulerState, TickScheduler,
};
pub use signal_graph::{graph_node_ids, PortCounts, SignalGraph};
pub use topo::{sort, sort_with_depths, TopoDepths};
