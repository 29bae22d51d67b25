//! Wirestep Core
//!
//! This crate provides the signal evaluation engine behind Wirestep circuits.
//! It implements:
//!
//! - Topological ordering with cycle diagnostics and node depths
//! - Liveness analysis (which nodes can affect an output)
//! - Graph baking: compiling a circuit into a reusable, serializable evaluator
//! - A tick scheduler that moves signals along wires in wire time
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `graph`: Nodes, wires, ordering, liveness and the tick scheduler
//! - `bake`: Node evaluation, bake metadata and the baked evaluator
//! - `config`: Signal range and timing constants, scheduler options
//! - `error`: The cycle error returned by every fallible operation
//!
//! # Example
//!
//! ```rust
//! use wirestep_core::bake::{bake_graph, reconstruct_from_metadata, BakeMetadata};
//! use wirestep_core::graph::{node_map, NodeId, NodeKind, NodeState, Wire};
//!
//! let nodes = node_map([NodeState::new("inv", NodeKind::Invert)]);
//! let wires = vec![
//!     Wire::between("w1", NodeId::input_cp(0), 0, "inv", 0),
//!     Wire::between("w2", "inv", 0, NodeId::output_cp(0), 0),
//! ];
//!
//! let mut baked = bake_graph(&nodes, &wires).unwrap();
//! assert_eq!(baked.evaluate(&[60.0]), vec![-60.0]);
//!
//! // Solved circuits are stored as JSON and rebuilt later
//! let json = baked.metadata.to_json().unwrap();
//! let mut restored = reconstruct_from_metadata(BakeMetadata::from_json(&json).unwrap());
//! assert_eq!(restored.evaluate(&[60.0]), vec![-60.0]);
//! ```

pub mod bake;
pub mod config;
pub mod error;
pub mod graph;

pub use bake::{bake_graph, reconstruct_from_metadata, BakeMetadata, Evaluator, GraphBaker};
pub use error::CycleError;
pub use graph::{NodeId, NodeKind, NodeState, SignalGraph, TickScheduler, Wire};
