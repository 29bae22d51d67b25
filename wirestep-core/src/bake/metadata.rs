//! Bake Metadata
//!
//! The plain-data description of a baked graph. It holds everything needed
//! to rebuild an equivalent evaluator: the topological order, a copy of each
//! node's configuration, the edges, and the external port counts. Solved
//! puzzles are persisted as this JSON.

use serde::{Deserialize, Serialize};

use crate::graph::{Edge, NodeId, NodeKind, NodeState, Params, Wire};

/// Configuration of one baked node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub id: NodeId,
    #[serde(rename = "type")]
    pub kind: NodeKind,
    #[serde(default)]
    pub params: Params,
    pub input_count: usize,
    pub output_count: usize,
    /// Resolved graph behind a `puzzle:`/`utility:` node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub baked: Option<Box<BakeMetadata>>,
}

impl From<&NodeState> for NodeConfig {
    fn from(node: &NodeState) -> Self {
        Self {
            id: node.id.clone(),
            kind: node.kind.clone(),
            params: node
                .params
                .iter()
                .map(|(key, value)| (key.clone(), value.normalized()))
                .collect(),
            input_count: node.input_count,
            output_count: node.output_count,
            baked: None,
        }
    }
}

/// A wire, reduced to the ports it connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BakedEdge {
    pub from_node_id: NodeId,
    pub from_port: usize,
    pub to_node_id: NodeId,
    pub to_port: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wts_delay: Option<u32>,
}

impl From<&Wire> for BakedEdge {
    fn from(wire: &Wire) -> Self {
        Self {
            from_node_id: wire.source.node_id.clone(),
            from_port: wire.source.port_index,
            to_node_id: wire.target.node_id.clone(),
            to_port: wire.target.port_index,
            wts_delay: Some(wire.wts_delay),
        }
    }
}

impl Edge for BakedEdge {
    fn from_node(&self) -> &NodeId {
        &self.from_node_id
    }

    fn to_node(&self) -> &NodeId {
        &self.to_node_id
    }
}

/// Serializable description of a baked graph.
///
/// `topo_order` holds every id in `node_configs` plus the connection-point
/// ids, each once, in dependency order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BakeMetadata {
    pub topo_order: Vec<NodeId>,
    pub node_configs: Vec<NodeConfig>,
    pub edges: Vec<BakedEdge>,
    pub input_count: usize,
    pub output_count: usize,
}

impl BakeMetadata {
    /// Parse metadata from JSON.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Compact MessagePack encoding. Field names are kept so the same
    /// defaults apply as for JSON.
    pub fn to_msgpack(&self) -> Result<Vec<u8>, rmp_serde::encode::Error> {
        rmp_serde::to_vec_named(self)
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, rmp_serde::decode::Error> {
        rmp_serde::from_slice(bytes)
    }

    pub fn node_config(&self, id: &NodeId) -> Option<&NodeConfig> {
        self.node_configs.iter().find(|config| &config.id == id)
    }

    pub fn is_empty(&self) -> bool {
        self.topo_order.is_empty()
    }
}
