//! Graph Nodes
//!
//! This module defines the values that make up a signal graph: node ids,
//! node kinds, per-node state as authored by the player, and the wires
//! that connect output ports to input ports.
//!
//! # Connection Points
//!
//! The external ports of a graph are modelled as virtual nodes with
//! reserved ids (`cp:input:<n>` and `cp:output:<n>`). They never appear in
//! the authored node map, but they take part in sorting, liveness and
//! evaluation exactly like real nodes.

use std::borrow::Borrow;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::TICKS_PER_WTS;

const INPUT_CP_PREFIX: &str = "cp:input:";
const OUTPUT_CP_PREFIX: &str = "cp:output:";
const PUZZLE_PREFIX: &str = "puzzle:";
const UTILITY_PREFIX: &str = "utility:";

/// Unique identifier for a node in a signal graph.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Id of the virtual node feeding external input `index` into the graph.
    pub fn input_cp(index: usize) -> Self {
        Self(format!("{INPUT_CP_PREFIX}{index}"))
    }

    /// Id of the virtual node collecting external output `index`.
    pub fn output_cp(index: usize) -> Self {
        Self(format!("{OUTPUT_CP_PREFIX}{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse the reserved connection-point id scheme.
    ///
    /// Returns `None` for ordinary node ids.
    pub fn connection_point(&self) -> Option<ConnectionPoint> {
        if let Some(index) = self.0.strip_prefix(INPUT_CP_PREFIX) {
            return index.parse().ok().map(ConnectionPoint::Input);
        }
        if let Some(index) = self.0.strip_prefix(OUTPUT_CP_PREFIX) {
            return index.parse().ok().map(ConnectionPoint::Output);
        }
        None
    }

    pub fn is_input_cp(&self) -> bool {
        matches!(self.connection_point(), Some(ConnectionPoint::Input(_)))
    }

    pub fn is_output_cp(&self) -> bool {
        matches!(self.connection_point(), Some(ConnectionPoint::Output(_)))
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for NodeId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// A parsed connection-point id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionPoint {
    /// External input `n`: one output port, no inputs.
    Input(usize),
    /// External output `n`: one input port, no outputs.
    Output(usize),
}

/// Unique identifier for a wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WireId(String);

impl WireId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WireId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for WireId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for WireId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl Borrow<str> for WireId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The evaluation behavior of a node.
///
/// Serialized as the node's `type` string. Strings that do not name a
/// known kind are kept as [`NodeKind::Unknown`] and evaluate to zeros.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum NodeKind {
    /// `-x`. Also accepts the type string `negate`.
    Invert,
    /// `a * b / 100`. Also accepts the type string `scale`.
    Multiply,
    /// Crossfade between two inputs by the `ratio` param.
    Mix,
    /// Snap to ±100 once `|x|` passes the `level` param.
    Threshold,
    /// `a * (1 + b / 100)`.
    Amp,
    /// `a + b`.
    Offset,
    /// Saturate the sign of the input to ±100.
    Polarizer,
    /// Split one input into two equal halves.
    Diverter,
    /// One-cycle latch.
    Memory,
    /// Ring buffer of `subdivisions + 1` slots.
    Delay,
    /// Copy one input to every output port.
    Duplicate,
    Average,
    Max,
    Min,
    /// `100 * a / b`, saturating on a zero divisor.
    Divide,
    ConnectionInput,
    ConnectionOutput,
    /// A solved puzzle used as a node; holds the reference after `puzzle:`.
    Puzzle(String),
    /// A saved utility graph used as a node; holds the reference after `utility:`.
    Utility(String),
    /// Any type string this engine does not know.
    Unknown(String),
}

impl NodeKind {
    /// Default `(input_count, output_count)` for a freshly placed node.
    pub fn default_ports(&self) -> (usize, usize) {
        match self {
            NodeKind::Invert
            | NodeKind::Threshold
            | NodeKind::Polarizer
            | NodeKind::Memory
            | NodeKind::Delay => (1, 1),
            NodeKind::Multiply
            | NodeKind::Mix
            | NodeKind::Amp
            | NodeKind::Offset
            | NodeKind::Average
            | NodeKind::Max
            | NodeKind::Min
            | NodeKind::Divide => (2, 1),
            NodeKind::Diverter | NodeKind::Duplicate => (1, 2),
            NodeKind::ConnectionInput => (0, 1),
            NodeKind::ConnectionOutput => (1, 0),
            NodeKind::Puzzle(_) | NodeKind::Utility(_) | NodeKind::Unknown(_) => (0, 0),
        }
    }

    /// Whether evaluation carries state from one call to the next.
    pub fn is_stateful(&self) -> bool {
        matches!(self, NodeKind::Memory | NodeKind::Delay)
    }

    /// Whether this node delegates to a previously baked graph.
    pub fn is_composite(&self) -> bool {
        matches!(self, NodeKind::Puzzle(_) | NodeKind::Utility(_))
    }
}

impl From<String> for NodeKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "invert" | "negate" => NodeKind::Invert,
            "multiply" | "scale" => NodeKind::Multiply,
            "mix" => NodeKind::Mix,
            "threshold" => NodeKind::Threshold,
            "amp" => NodeKind::Amp,
            "offset" => NodeKind::Offset,
            "polarizer" => NodeKind::Polarizer,
            "diverter" => NodeKind::Diverter,
            "memory" => NodeKind::Memory,
            "delay" => NodeKind::Delay,
            "duplicate" => NodeKind::Duplicate,
            "average" => NodeKind::Average,
            "max" => NodeKind::Max,
            "min" => NodeKind::Min,
            "divide" => NodeKind::Divide,
            "connection-input" => NodeKind::ConnectionInput,
            "connection-output" => NodeKind::ConnectionOutput,
            other => {
                if let Some(reference) = other.strip_prefix(PUZZLE_PREFIX) {
                    NodeKind::Puzzle(reference.to_string())
                } else if let Some(reference) = other.strip_prefix(UTILITY_PREFIX) {
                    NodeKind::Utility(reference.to_string())
                } else {
                    NodeKind::Unknown(value)
                }
            }
        }
    }
}

impl From<&str> for NodeKind {
    fn from(value: &str) -> Self {
        NodeKind::from(value.to_string())
    }
}

impl From<NodeKind> for String {
    fn from(kind: NodeKind) -> Self {
        kind.to_string()
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeKind::Invert => "invert",
            NodeKind::Multiply => "multiply",
            NodeKind::Mix => "mix",
            NodeKind::Threshold => "threshold",
            NodeKind::Amp => "amp",
            NodeKind::Offset => "offset",
            NodeKind::Polarizer => "polarizer",
            NodeKind::Diverter => "diverter",
            NodeKind::Memory => "memory",
            NodeKind::Delay => "delay",
            NodeKind::Duplicate => "duplicate",
            NodeKind::Average => "average",
            NodeKind::Max => "max",
            NodeKind::Min => "min",
            NodeKind::Divide => "divide",
            NodeKind::ConnectionInput => "connection-input",
            NodeKind::ConnectionOutput => "connection-output",
            NodeKind::Puzzle(reference) => return write!(f, "{PUZZLE_PREFIX}{reference}"),
            NodeKind::Utility(reference) => return write!(f, "{UTILITY_PREFIX}{reference}"),
            NodeKind::Unknown(name) => name,
        };
        f.write_str(name)
    }
}

/// A scalar node parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Text(String),
    /// A missing or non-finite number. JSON has no encoding for NaN or the
    /// infinities and writes them as `null`, so this is what they read back as.
    Null,
}

impl ParamValue {
    /// Numeric view of the parameter, if it has a finite one.
    pub fn as_f64(&self) -> Option<f64> {
        let value = match self {
            ParamValue::Number(n) => *n,
            ParamValue::Bool(b) => f64::from(u8::from(*b)),
            ParamValue::Text(s) => s.trim().parse().ok()?,
            ParamValue::Null => return None,
        };
        value.is_finite().then_some(value)
    }

    /// This value as it survives a JSON round trip.
    pub fn normalized(&self) -> Self {
        match self {
            ParamValue::Number(n) if !n.is_finite() => ParamValue::Null,
            other => other.clone(),
        }
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value).normalized()
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Node parameters, in authoring order.
pub type Params = IndexMap<String, ParamValue>;

/// Canvas position. Carried through untouched; the engine never reads it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A node as placed by the player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeState {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub position: Position,
    #[serde(default)]
    pub params: Params,
    pub input_count: usize,
    pub output_count: usize,
}

impl NodeState {
    /// Create a node with the kind's default port counts and no params.
    pub fn new(id: impl Into<NodeId>, kind: impl Into<NodeKind>) -> Self {
        let kind = kind.into();
        let (input_count, output_count) = kind.default_ports();
        Self {
            id: id.into(),
            kind,
            position: Position::default(),
            params: Params::new(),
            input_count,
            output_count,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn with_ports(mut self, input_count: usize, output_count: usize) -> Self {
        self.input_count = input_count;
        self.output_count = output_count;
        self
    }

    pub fn at(mut self, x: f64, y: f64) -> Self {
        self.position = Position { x, y };
        self
    }
}

/// The authored graph: nodes keyed by id, in insertion order.
pub type NodeMap = IndexMap<NodeId, NodeState>;

/// Collect nodes into a [`NodeMap`] keyed by their ids.
pub fn node_map(nodes: impl IntoIterator<Item = NodeState>) -> NodeMap {
    nodes.into_iter().map(|node| (node.id.clone(), node)).collect()
}

/// Which side of a node a port is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortSide {
    Input,
    Output,
}

/// A reference to one port of one node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortRef {
    pub node_id: NodeId,
    pub port_index: usize,
    pub side: PortSide,
}

impl PortRef {
    pub fn output(node_id: impl Into<NodeId>, port_index: usize) -> Self {
        Self {
            node_id: node_id.into(),
            port_index,
            side: PortSide::Output,
        }
    }

    pub fn input(node_id: impl Into<NodeId>, port_index: usize) -> Self {
        Self {
            node_id: node_id.into(),
            port_index,
            side: PortSide::Input,
        }
    }
}

/// A signal travelling along a wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InFlightSignal {
    pub value: f64,
    /// Ticks left before the value lands in the target port.
    pub ticks_remaining: u32,
}

fn default_wts_delay() -> u32 {
    TICKS_PER_WTS
}

/// A directed connection from an output port to an input port.
///
/// The cycle model only reads `source` and `target`. The tick model also
/// uses `wts_delay` and the queue of in-flight signals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wire {
    pub id: WireId,
    pub source: PortRef,
    pub target: PortRef,
    /// Ticks a signal needs to traverse this wire.
    #[serde(default = "default_wts_delay")]
    pub wts_delay: u32,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub signals: Vec<InFlightSignal>,
}

impl Wire {
    pub fn new(id: impl Into<WireId>, source: PortRef, target: PortRef) -> Self {
        Self {
            id: id.into(),
            source,
            target,
            wts_delay: TICKS_PER_WTS,
            signals: Vec::new(),
        }
    }

    /// Wire `from`'s output port `from_port` to `to`'s input port `to_port`.
    pub fn between(
        id: impl Into<WireId>,
        from: impl Into<NodeId>,
        from_port: usize,
        to: impl Into<NodeId>,
        to_port: usize,
    ) -> Self {
        Self::new(id, PortRef::output(from, from_port), PortRef::input(to, to_port))
    }

    pub fn with_delay(mut self, ticks: u32) -> Self {
        self.wts_delay = ticks;
        self
    }

    /// Put a new signal on the wire, `wts_delay` ticks away from its target.
    pub fn inject(&mut self, value: f64) {
        self.signals.push(InFlightSignal {
            value,
            ticks_remaining: self.wts_delay,
        });
    }

    /// Signals currently travelling along this wire.
    pub fn in_flight(&self) -> &[InFlightSignal] {
        &self.signals
    }
}

/// A directed dependency between two nodes.
///
/// Implemented by every edge representation the topology algorithms run on.
pub trait Edge {
    fn from_node(&self) -> &NodeId;
    fn to_node(&self) -> &NodeId;
}

impl Edge for Wire {
    fn from_node(&self) -> &NodeId {
        &self.source.node_id
    }

    fn to_node(&self) -> &NodeId {
        &self.target.node_id
    }
}
