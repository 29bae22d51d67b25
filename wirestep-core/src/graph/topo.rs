//! Topological Sort
//!
//! Orders node ids so that every wire points forward, using Kahn's
//! algorithm.
//!
//! # Algorithm
//!
//! 1. Count incoming wires per node (wires to or from unknown ids are ignored)
//! 2. Seed a queue with every zero in-degree node, in `node_ids` order
//! 3. Pop a node, append it, and release its successors
//! 4. If nodes remain unsorted, they contain a cycle: walk them with an
//!    explicit-stack DFS until a back edge closes one, and report its path
//!
//! Seeding from `node_ids` rather than from the wires keeps disconnected
//! nodes in the output and makes the order deterministic.

use std::collections::VecDeque;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, warn};

use super::node::{Edge, NodeId};
use crate::error::CycleError;

/// A topological order together with per-node depth.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopoDepths {
    pub order: Vec<NodeId>,
    /// Longest path from any root to the node. Roots have depth 0.
    pub depths: IndexMap<NodeId, usize>,
    pub max_depth: usize,
}

/// Index-based view of the graph shared by the sort and the depth pass.
struct Sorted<'a> {
    ids: IndexSet<&'a NodeId>,
    successors: Vec<Vec<usize>>,
    order: Vec<usize>,
}

fn kahn<'a, E: Edge>(node_ids: &'a [NodeId], edges: &[E]) -> Result<Sorted<'a>, CycleError> {
    let ids: IndexSet<&NodeId> = node_ids.iter().collect();
    let n = ids.len();
    let mut successors = vec![Vec::new(); n];
    let mut in_degree = vec![0usize; n];

    for edge in edges {
        let (Some(from), Some(to)) = (
            ids.get_index_of(edge.from_node()),
            ids.get_index_of(edge.to_node()),
        ) else {
            continue;
        };
        successors[from].push(to);
        in_degree[to] += 1;
    }

    let mut queue: VecDeque<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);

    while let Some(node) = queue.pop_front() {
        order.push(node);
        for &next in &successors[node] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                queue.push_back(next);
            }
        }
    }

    if order.len() < n {
        let mut remaining = vec![true; n];
        for &node in &order {
            remaining[node] = false;
        }
        let path: Vec<NodeId> = find_cycle(&successors, &remaining)
            .into_iter()
            .map(|i| ids[i].clone())
            .collect();
        let err = CycleError::from_path(path);
        warn!(unsorted = n - order.len(), "{}", err.message);
        return Err(err);
    }

    Ok(Sorted {
        ids,
        successors,
        order,
    })
}

/// Find one concrete cycle among the `remaining` nodes.
///
/// Every remaining node has a remaining predecessor, so a DFS over them
/// always hits a back edge. The returned path starts and ends on the node
/// the back edge points to.
fn find_cycle(successors: &[Vec<usize>], remaining: &[bool]) -> Vec<usize> {
    let n = successors.len();
    let mut visited = vec![false; n];
    let mut on_stack = vec![false; n];
    let mut parent: Vec<Option<usize>> = vec![None; n];

    for start in 0..n {
        if !remaining[start] || visited[start] {
            continue;
        }

        // (node, index of the next successor to look at)
        let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
        visited[start] = true;
        on_stack[start] = true;

        while let Some(frame) = stack.last_mut() {
            let node = frame.0;
            let Some(&next) = successors[node].get(frame.1) else {
                on_stack[node] = false;
                stack.pop();
                continue;
            };
            frame.1 += 1;

            if !remaining[next] {
                continue;
            }

            if on_stack[next] {
                let mut path = vec![node];
                let mut cursor = node;
                while cursor != next {
                    match parent[cursor] {
                        Some(up) => {
                            path.push(up);
                            cursor = up;
                        }
                        None => break,
                    }
                }
                path.reverse();
                path.push(next);
                return path;
            }

            if !visited[next] {
                visited[next] = true;
                on_stack[next] = true;
                parent[next] = Some(node);
                stack.push((next, 0));
            }
        }
    }

    Vec::new()
}

/// Sort `node_ids` so that every edge goes from an earlier to a later node.
pub fn sort<E: Edge>(node_ids: &[NodeId], edges: &[E]) -> Result<Vec<NodeId>, CycleError> {
    let sorted = kahn(node_ids, edges)?;
    Ok(sorted
        .order
        .iter()
        .map(|&i| sorted.ids[i].clone())
        .collect())
}

/// Sort and compute each node's depth.
///
/// Nodes are visited in topological order, so every predecessor's depth is
/// final before it is propagated.
pub fn sort_with_depths<E: Edge>(
    node_ids: &[NodeId],
    edges: &[E],
) -> Result<TopoDepths, CycleError> {
    let sorted = kahn(node_ids, edges)?;
    let mut depth = vec![0usize; sorted.ids.len()];

    for &node in &sorted.order {
        for &next in &sorted.successors[node] {
            depth[next] = depth[next].max(depth[node] + 1);
        }
    }

    let order: Vec<NodeId> = sorted
        .order
        .iter()
        .map(|&i| sorted.ids[i].clone())
        .collect();
    let depths: IndexMap<NodeId, usize> = sorted
        .order
        .iter()
        .map(|&i| (sorted.ids[i].clone(), depth[i]))
        .collect();
    let max_depth = depth.iter().copied().max().unwrap_or(0);

    debug!(nodes = order.len(), max_depth, "sorted signal graph");

    Ok(TopoDepths {
        order,
        depths,
        max_depth,
    })
}
