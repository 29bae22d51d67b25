//! Engine errors
//!
//! A wire cycle is the only way baking or sorting can fail. Everything
//! downstream of a successful sort is total: arithmetic saturates, missing
//! inputs read zero and missing evaluators emit zeros.

use serde::Serialize;
use thiserror::Error;

use crate::graph::NodeId;

/// The wire graph contains a cycle.
///
/// `cycle_path` starts and ends on the same node, and every consecutive
/// pair in it is connected by a wire.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "camelCase")]
#[error("{message}")]
pub struct CycleError {
    pub message: String,
    pub cycle_path: Vec<NodeId>,
}

impl CycleError {
    pub fn from_path(cycle_path: Vec<NodeId>) -> Self {
        let message = if cycle_path.is_empty() {
            "cycle detected".to_string()
        } else {
            let joined = cycle_path
                .iter()
                .map(NodeId::as_str)
                .collect::<Vec<_>>()
                .join(" -> ");
            format!("cycle detected: {joined}")
        };
        Self {
            message,
            cycle_path,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_lists_the_cycle() {
        let err = CycleError::from_path(vec!["a".into(), "b".into(), "a".into()]);
        assert_eq!(err.to_string(), "cycle detected: a -> b -> a");
    }

    #[test]
    fn serializes_with_camel_case_keys() {
        let err = CycleError::from_path(vec!["x".into(), "x".into()]);
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["cyclePath"], serde_json::json!(["x", "x"]));
    }
}
