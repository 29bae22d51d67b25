//! Node Evaluation Catalogue
//!
//! The per-kind evaluation functions shared by the baked evaluator and the
//! tick scheduler. Every function is total: inputs and outputs are clamped
//! to the signal range, NaN reads as 0, and division by zero saturates.
//!
//! Stateful kinds (Memory, Delay) keep their state in a [`NodeMemory`] owned
//! by the caller, so two evaluators never share it.

use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};

use crate::config::{MAX_DELAY_SUBDIVISIONS, SIGNAL_MAX, SIGNAL_MIN};
use crate::graph::{NodeKind, Params};

/// Port values of a single node.
pub type Ports = SmallVec<[f64; 4]>;

/// Saturate a value to the signal range. NaN and negative zero become 0.
pub fn clamp_signal(value: f64) -> f64 {
    if value.is_nan() || value == 0.0 {
        0.0
    } else {
        value.clamp(SIGNAL_MIN, SIGNAL_MAX)
    }
}

fn param_or(params: &Params, key: &str, default: f64) -> f64 {
    params
        .get(key)
        .and_then(|value| value.as_f64())
        .unwrap_or(default)
}

/// Number of slots a Delay node lags behind, from its `subdivisions` param.
pub fn delay_subdivisions(params: &Params) -> usize {
    let subdivisions = param_or(params, "subdivisions", 0.0).max(0.0).floor();
    (subdivisions as usize).min(MAX_DELAY_SUBDIVISIONS)
}

/// Cross-call state of a single node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeMemory {
    Stateless,
    /// Value latched by a Memory node on the previous call.
    Latch { value: f64 },
    /// Ring buffer of a Delay node.
    Delay {
        buffer: Vec<f64>,
        #[serde(rename = "writeIndex")]
        write_index: usize,
    },
}

impl NodeMemory {
    /// Fresh state for a node of the given kind.
    pub fn for_node(kind: &NodeKind, params: &Params) -> Self {
        match kind {
            NodeKind::Memory => NodeMemory::Latch { value: 0.0 },
            NodeKind::Delay => NodeMemory::Delay {
                buffer: vec![0.0; delay_subdivisions(params) + 1],
                write_index: 0,
            },
            _ => NodeMemory::Stateless,
        }
    }

    /// Return to the fresh state, keeping the buffer size.
    pub fn reset(&mut self) {
        match self {
            NodeMemory::Stateless => {}
            NodeMemory::Latch { value } => *value = 0.0,
            NodeMemory::Delay {
                buffer,
                write_index,
            } => {
                buffer.fill(0.0);
                *write_index = 0;
            }
        }
    }

    pub fn is_stateless(&self) -> bool {
        matches!(self, NodeMemory::Stateless)
    }

    /// Replace state that does not fit the node, e.g. after its params changed.
    fn ensure(&mut self, kind: &NodeKind, params: &Params) {
        let fits = match (kind, &*self) {
            (NodeKind::Memory, NodeMemory::Latch { .. }) => true,
            (
                NodeKind::Delay,
                NodeMemory::Delay {
                    buffer,
                    write_index,
                },
            ) => buffer.len() == delay_subdivisions(params) + 1 && *write_index < buffer.len(),
            _ => false,
        };
        if !fits {
            *self = NodeMemory::for_node(kind, params);
        }
    }
}

fn sign_saturate(value: f64) -> f64 {
    if value > 0.0 {
        SIGNAL_MAX
    } else if value < 0.0 {
        SIGNAL_MIN
    } else {
        0.0
    }
}

/// Evaluate one node.
///
/// `inputs` holds one value per input port; missing ports read 0. The
/// result always has exactly `output_count` entries. Composite and unknown
/// kinds have no built-in behavior and return zeros.
pub fn evaluate_node(
    kind: &NodeKind,
    params: &Params,
    inputs: &[f64],
    output_count: usize,
    memory: &mut NodeMemory,
) -> Ports {
    let input = |port: usize| clamp_signal(inputs.get(port).copied().unwrap_or(0.0));
    let all_inputs = || inputs.iter().copied().map(clamp_signal);
    let a = input(0);
    let b = input(1);

    let values: Ports = match kind {
        NodeKind::Invert => smallvec![-a],
        NodeKind::Multiply => smallvec![a * b / 100.0],
        NodeKind::Mix => {
            let ratio = param_or(params, "ratio", 50.0).clamp(0.0, 100.0) / 100.0;
            smallvec![a * (1.0 - ratio) + b * ratio]
        }
        NodeKind::Threshold => {
            let level = param_or(params, "level", 50.0).clamp(0.0, SIGNAL_MAX);
            let out = if a > level {
                SIGNAL_MAX
            } else if a < -level {
                SIGNAL_MIN
            } else {
                0.0
            };
            smallvec![out]
        }
        NodeKind::Amp => smallvec![a * (1.0 + b / 100.0)],
        NodeKind::Offset => smallvec![a + b],
        NodeKind::Polarizer => smallvec![sign_saturate(a)],
        NodeKind::Diverter => smallvec![a / 2.0, a / 2.0],
        NodeKind::Memory => {
            memory.ensure(kind, params);
            match memory {
                NodeMemory::Latch { value } => {
                    let previous = *value;
                    *value = a;
                    smallvec![previous]
                }
                _ => Ports::new(),
            }
        }
        NodeKind::Delay => {
            memory.ensure(kind, params);
            match memory {
                NodeMemory::Delay {
                    buffer,
                    write_index,
                } => {
                    let len = buffer.len();
                    buffer[*write_index] = a;
                    // `subdivisions` slots behind the write cursor
                    let read = (*write_index + 1) % len;
                    let out = buffer[read];
                    *write_index = (*write_index + 1) % len;
                    smallvec![out]
                }
                _ => Ports::new(),
            }
        }
        NodeKind::Duplicate => smallvec![a; output_count],
        NodeKind::Average => {
            if inputs.is_empty() {
                Ports::new()
            } else {
                smallvec![all_inputs().sum::<f64>() / inputs.len() as f64]
            }
        }
        NodeKind::Max => all_inputs().reduce(f64::max).into_iter().collect(),
        NodeKind::Min => all_inputs().reduce(f64::min).into_iter().collect(),
        NodeKind::Divide => {
            if b == 0.0 {
                smallvec![sign_saturate(a)]
            } else {
                smallvec![100.0 * a / b]
            }
        }
        NodeKind::ConnectionInput | NodeKind::ConnectionOutput => smallvec![a],
        NodeKind::Puzzle(_) | NodeKind::Utility(_) | NodeKind::Unknown(_) => Ports::new(),
    };

    let mut outputs: Ports = values.into_iter().map(clamp_signal).collect();
    outputs.resize(output_count, 0.0);
    outputs
}
