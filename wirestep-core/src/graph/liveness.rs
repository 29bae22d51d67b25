//! Liveness Analysis
//!
//! A node is live when it sits on some path from an input connection point
//! to an output connection point. Dead nodes stay in the graph, they are
//! only skipped by evaluators.
//!
//! Skipping is safe because every node kind maps all-zero inputs (with
//! fresh state) to all-zero outputs: a node no input can reach only ever
//! emits zeros, which is what its consumers read when it is skipped.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};

use super::node::{Edge, NodeId};

type Adjacency<'a> = IndexMap<&'a NodeId, Vec<&'a NodeId>>;

/// Compute the live subset of `node_ids`, in `node_ids` order.
pub fn compute_live_nodes<E: Edge>(node_ids: &[NodeId], edges: &[E]) -> IndexSet<NodeId> {
    let known: IndexSet<&NodeId> = node_ids.iter().collect();
    let mut forward: Adjacency<'_> = IndexMap::new();
    let mut backward: Adjacency<'_> = IndexMap::new();

    for edge in edges {
        let (Some(from), Some(to)) = (known.get(edge.from_node()), known.get(edge.to_node()))
        else {
            continue;
        };
        forward.entry(*from).or_default().push(*to);
        backward.entry(*to).or_default().push(*from);
    }

    let from_inputs = reach(known.iter().copied().filter(|id| id.is_input_cp()), &forward);
    let to_outputs = reach(known.iter().copied().filter(|id| id.is_output_cp()), &backward);

    node_ids
        .iter()
        .filter(|id| from_inputs.contains(*id) && to_outputs.contains(*id))
        .cloned()
        .collect()
}

/// Breadth-first reachability from `seeds`, seeds included.
fn reach<'a>(
    seeds: impl Iterator<Item = &'a NodeId>,
    adjacency: &Adjacency<'a>,
) -> IndexSet<&'a NodeId> {
    let mut seen: IndexSet<&NodeId> = IndexSet::new();
    let mut queue: VecDeque<&NodeId> = VecDeque::new();

    for seed in seeds {
        if seen.insert(seed) {
            queue.push_back(seed);
        }
    }

    while let Some(node) = queue.pop_front() {
        for &next in adjacency.get(node).map(Vec::as_slice).unwrap_or_default() {
            if seen.insert(next) {
                queue.push_back(next);
            }
        }
    }

    seen
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Wire;

    fn wire(from: &NodeId, to: &NodeId) -> Wire {
        Wire::between(format!("{from}->{to}"), from.clone(), 0, to.clone(), 0)
    }

    #[test]
    fn path_from_input_to_output_is_live() {
        let input = NodeId::input_cp(0);
        let output = NodeId::output_cp(0);
        let a = NodeId::from("a");
        let b = NodeId::from("b");
        let nodes = vec![input.clone(), a.clone(), b.clone(), output.clone()];
        let wires = vec![wire(&input, &a), wire(&a, &b), wire(&b, &output)];

        let live = compute_live_nodes(&nodes, &wires);

        assert_eq!(live.len(), 4);
        assert!(live.contains(&a));
    }

    #[test]
    fn dangling_branches_are_dead() {
        let input = NodeId::input_cp(0);
        let output = NodeId::output_cp(0);
        let used = NodeId::from("used");
        let sink = NodeId::from("sink");
        let orphan = NodeId::from("orphan");
        let nodes = vec![
            input.clone(),
            used.clone(),
            sink.clone(),
            orphan.clone(),
            output.clone(),
        ];
        let wires = vec![
            wire(&input, &used),
            wire(&used, &output),
            // reachable from the input but never reaches an output
            wire(&used, &sink),
            // reaches the output but no input feeds it
            wire(&orphan, &output),
        ];

        let live = compute_live_nodes(&nodes, &wires);

        assert!(live.contains(&used));
        assert!(!live.contains(&sink));
        assert!(!live.contains(&orphan));
    }

    #[test]
    fn unwired_connection_points_are_dead() {
        let nodes = vec![NodeId::input_cp(0), NodeId::output_cp(0)];
        let live = compute_live_nodes::<Wire>(&nodes, &[]);
        assert!(live.is_empty());
    }

    #[test]
    fn direct_pass_through_is_live() {
        let input = NodeId::input_cp(1);
        let output = NodeId::output_cp(0);
        let nodes = vec![input.clone(), output.clone()];

        let live = compute_live_nodes(&nodes, &[wire(&input, &output)]);

        assert_eq!(live.into_iter().collect::<Vec<_>>(), vec![input, output]);
    }
}
