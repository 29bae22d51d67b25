//! Baked Evaluator
//!
//! Turns [`BakeMetadata`] into a flat execution plan and runs it once per
//! call. Each call is one simulation cycle: input values are loaded into the
//! input connection points, every step runs in topological order, and the
//! output connection points are read back.
//!
//! # State
//!
//! Memory and Delay state lives in the evaluator's own steps, keyed by
//! position in the plan. Two evaluators built from the same metadata share
//! nothing, and [`Evaluator::reset`] returns one to its freshly built state.

use indexmap::IndexMap;
use smallvec::{smallvec, SmallVec};
use tracing::warn;

use super::catalogue::{clamp_signal, evaluate_node, NodeMemory, Ports};
use super::metadata::BakeMetadata;
use crate::graph::{ConnectionPoint, NodeId};

/// Anything that maps one input vector to one output vector per call.
///
/// Implemented by [`Evaluator`]; the tick scheduler accepts any
/// implementation for composite nodes.
pub trait Evaluate: Send {
    fn evaluate(&mut self, inputs: &[f64]) -> Vec<f64>;

    /// Drop any state carried between calls.
    fn reset(&mut self) {}
}

/// Adapts a closure to [`Evaluate`].
pub struct FnEvaluate<F>(pub F);

impl<F> Evaluate for FnEvaluate<F>
where
    F: FnMut(&[f64]) -> Vec<f64> + Send,
{
    fn evaluate(&mut self, inputs: &[f64]) -> Vec<f64> {
        (self.0)(inputs)
    }
}

/// What a step does when it runs.
#[derive(Debug)]
enum Action {
    /// Emit external input `n`.
    Input(usize),
    /// Publish the value on input port 0 as external output `n`.
    Output(usize),
    /// Built-in evaluation of `node_configs[i]`.
    Node(usize),
    /// `node_configs[i]` is a composite with a resolved graph.
    Nested(usize, Box<Evaluator>),
}

#[derive(Debug)]
struct Step {
    action: Action,
    /// Per input port: `(step, output port)` feeding it.
    sources: SmallVec<[Option<(usize, usize)>; 4]>,
    memory: NodeMemory,
}

/// A runnable baked graph.
#[derive(Debug)]
pub struct Evaluator {
    metadata: BakeMetadata,
    steps: Vec<Step>,
    step_index: IndexMap<NodeId, usize>,
    /// Output values of each step from the last call.
    outputs: Vec<Ports>,
}

impl Evaluator {
    /// Build the execution plan for `metadata`.
    ///
    /// Never fails. Ids in `topo_order` without a config are skipped, edges
    /// to unknown ids or ports are dropped, and both are logged.
    pub fn from_metadata(metadata: BakeMetadata) -> Self {
        let config_index: IndexMap<NodeId, usize> = metadata
            .node_configs
            .iter()
            .enumerate()
            .map(|(i, config)| (config.id.clone(), i))
            .collect();

        let mut steps = Vec::with_capacity(metadata.topo_order.len());
        let mut step_index: IndexMap<NodeId, usize> = IndexMap::new();

        for id in &metadata.topo_order {
            if step_index.contains_key(id) {
                warn!(node = %id, "duplicate id in topoOrder; keeping the first");
                continue;
            }

            let (action, input_ports, memory) = match id.connection_point() {
                Some(ConnectionPoint::Input(n)) => (Action::Input(n), 0, NodeMemory::Stateless),
                Some(ConnectionPoint::Output(n)) => (Action::Output(n), 1, NodeMemory::Stateless),
                None => {
                    let Some(&i) = config_index.get(id) else {
                        warn!(node = %id, "topoOrder references a node without config; skipping");
                        continue;
                    };
                    let config = &metadata.node_configs[i];
                    let action = match &config.baked {
                        Some(nested) if config.kind.is_composite() => {
                            Action::Nested(i, Box::new(Evaluator::from_metadata((**nested).clone())))
                        }
                        _ => Action::Node(i),
                    };
                    (
                        action,
                        config.input_count,
                        NodeMemory::for_node(&config.kind, &config.params),
                    )
                }
            };

            step_index.insert(id.clone(), steps.len());
            steps.push(Step {
                action,
                sources: smallvec![None; input_ports],
                memory,
            });
        }

        for edge in &metadata.edges {
            let (Some(&from), Some(&to)) = (
                step_index.get(&edge.from_node_id),
                step_index.get(&edge.to_node_id),
            ) else {
                warn!(
                    from = %edge.from_node_id,
                    to = %edge.to_node_id,
                    "edge references an unknown node; ignoring"
                );
                continue;
            };
            if from >= to {
                warn!(
                    from = %edge.from_node_id,
                    to = %edge.to_node_id,
                    "edge runs against topoOrder; it will read the previous cycle"
                );
            }
            match steps[to].sources.get_mut(edge.to_port) {
                Some(slot) => *slot = Some((from, edge.from_port)),
                None => warn!(
                    to = %edge.to_node_id,
                    port = edge.to_port,
                    "edge targets a missing input port; ignoring"
                ),
            }
        }

        let outputs = vec![Ports::new(); steps.len()];
        Self {
            metadata,
            steps,
            step_index,
            outputs,
        }
    }

    /// Run one cycle.
    ///
    /// Missing inputs read 0; the result has one value per external output.
    pub fn evaluate(&mut self, inputs: &[f64]) -> Vec<f64> {
        let mut result = vec![0.0; self.metadata.output_count];

        for index in 0..self.steps.len() {
            let gathered: Ports = self.steps[index]
                .sources
                .iter()
                .map(|source| {
                    source
                        .and_then(|(from, port)| self.outputs[from].get(port).copied())
                        .unwrap_or(0.0)
                })
                .collect();

            let step = &mut self.steps[index];
            let produced: Ports = match &mut step.action {
                Action::Input(n) => {
                    smallvec![clamp_signal(inputs.get(*n).copied().unwrap_or(0.0))]
                }
                Action::Output(n) => {
                    let value = gathered.first().copied().unwrap_or(0.0);
                    if let Some(slot) = result.get_mut(*n) {
                        *slot = value;
                    }
                    smallvec![value]
                }
                Action::Node(i) => {
                    let config = &self.metadata.node_configs[*i];
                    evaluate_node(
                        &config.kind,
                        &config.params,
                        &gathered,
                        config.output_count,
                        &mut step.memory,
                    )
                }
                Action::Nested(i, nested) => {
                    let mut out: Ports = nested
                        .evaluate(&gathered)
                        .into_iter()
                        .map(clamp_signal)
                        .collect();
                    out.resize(self.metadata.node_configs[*i].output_count, 0.0);
                    out
                }
            };

            self.outputs[index] = produced;
        }

        result
    }

    /// Return every node to its freshly built state.
    pub fn reset(&mut self) {
        for step in &mut self.steps {
            step.memory.reset();
            if let Action::Nested(_, nested) = &mut step.action {
                nested.reset();
            }
        }
        for outputs in &mut self.outputs {
            outputs.clear();
        }
    }

    pub fn input_count(&self) -> usize {
        self.metadata.input_count
    }

    pub fn output_count(&self) -> usize {
        self.metadata.output_count
    }

    pub fn metadata(&self) -> &BakeMetadata {
        &self.metadata
    }

    /// Ids in the order they are evaluated.
    pub fn processing_order(&self) -> impl Iterator<Item = &NodeId> {
        self.step_index.keys()
    }

    /// Value a node's output port produced on the last call.
    pub fn port_value(&self, id: &NodeId, port: usize) -> Option<f64> {
        let &index = self.step_index.get(id)?;
        self.outputs[index].get(port).copied()
    }

    /// State of every stateful node, keyed by id.
    pub fn memory_snapshot(&self) -> IndexMap<NodeId, NodeMemory> {
        self.step_index
            .iter()
            .filter(|(_, &index)| !self.steps[index].memory.is_stateless())
            .map(|(id, &index)| (id.clone(), self.steps[index].memory.clone()))
            .collect()
    }
}

impl Evaluate for Evaluator {
    fn evaluate(&mut self, inputs: &[f64]) -> Vec<f64> {
        Evaluator::evaluate(self, inputs)
    }

    fn reset(&mut self) {
        Evaluator::reset(self)
    }
}
