//! Property-based tests for baking and ordering.
//!
//! Uses proptest to check the laws every circuit must satisfy: a baked
//! evaluator and one rebuilt from JSON agree cycle for cycle, pruning dead
//! nodes never changes an output, reported cycles are real cycles, depths
//! follow longest paths, and every node output stays in the signal range.

use proptest::prelude::*;
use wirestep_core::bake::{
    bake_graph, clamp_signal, evaluate_node, reconstruct_from_metadata, run_cycles, BakeMetadata,
    NodeMemory,
};
use wirestep_core::config::{SIGNAL_MAX, SIGNAL_MIN};
use wirestep_core::graph::{
    node_map, sort_with_depths, NodeId, NodeKind, NodeMap, NodeState, ParamValue, Params, Wire,
};

const KINDS: [NodeKind; 15] = [
    NodeKind::Invert,
    NodeKind::Multiply,
    NodeKind::Mix,
    NodeKind::Threshold,
    NodeKind::Amp,
    NodeKind::Offset,
    NodeKind::Polarizer,
    NodeKind::Diverter,
    NodeKind::Memory,
    NodeKind::Delay,
    NodeKind::Duplicate,
    NodeKind::Average,
    NodeKind::Max,
    NodeKind::Min,
    NodeKind::Divide,
];

const INPUTS: usize = 2;
const OUTPUTS: usize = 2;

/// Build an acyclic circuit from random seeds. Wires only run from earlier
/// to later nodes, so the result never contains a cycle.
fn random_dag(count: usize, seeds: &[u32]) -> (NodeMap, Vec<Wire>) {
    let mut seed = seeds.iter().copied().cycle();
    let mut next = move || seed.next().unwrap_or(0) as usize;

    let mut nodes = NodeMap::new();
    let mut sources: Vec<(NodeId, usize)> =
        (0..INPUTS).map(|i| (NodeId::input_cp(i), 0)).collect();
    let mut wires = Vec::new();

    for index in 0..count {
        let kind = KINDS[next() % KINDS.len()].clone();
        let id = NodeId::new(format!("n{index}"));
        let tuning = match kind {
            NodeKind::Delay => Some(("subdivisions", next() % 4)),
            NodeKind::Mix => Some(("ratio", next() % 101)),
            NodeKind::Threshold => Some(("level", next() % 101)),
            _ => None,
        };
        let mut node = NodeState::new(id.clone(), kind);
        if let Some((key, value)) = tuning {
            // some parameters are not finite
            let value = match next() % 9 {
                0 => f64::NAN,
                1 => f64::INFINITY,
                _ => value as f64,
            };
            node.params.insert(key.into(), ParamValue::Number(value));
        }

        for port in 0..node.input_count {
            // leave some ports unconnected
            if next() % 5 == 0 {
                continue;
            }
            let (from, from_port) = sources[next() % sources.len()].clone();
            let wire_id = format!("w{}", wires.len());
            wires.push(Wire::between(wire_id, from, from_port, id.clone(), port));
        }

        sources.extend((0..node.output_count).map(|port| (id.clone(), port)));
        nodes.insert(id, node);
    }

    for output in 0..OUTPUTS {
        let (from, from_port) = sources[next() % sources.len()].clone();
        let wire_id = format!("w{}", wires.len());
        wires.push(Wire::between(wire_id, from, from_port, NodeId::output_cp(output), 0));
    }

    (nodes, wires)
}

fn chain(length: usize) -> (Vec<NodeId>, Vec<Wire>) {
    let ids: Vec<NodeId> = (0..length).map(|i| NodeId::new(format!("c{i}"))).collect();
    let wires = ids
        .windows(2)
        .enumerate()
        .map(|(i, pair)| Wire::between(format!("e{i}"), pair[0].clone(), 0, pair[1].clone(), 0))
        .collect();
    (ids, wires)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    /// A fresh bake and an evaluator rebuilt from a JSON round trip of its
    /// metadata produce bit-identical outputs for every cycle.
    #[test]
    fn json_round_trip_law(
        count in 0usize..10,
        seeds in prop::collection::vec(any::<u32>(), 32),
        inputs in prop::collection::vec(prop::array::uniform2(-150.0f64..150.0), 1..12),
    ) {
        let (nodes, wires) = random_dag(count, &seeds);
        let mut baked = bake_graph(&nodes, &wires).unwrap();

        let json = baked.metadata.to_json().unwrap();
        let metadata = BakeMetadata::from_json(&json).unwrap();
        prop_assert_eq!(&metadata, &baked.metadata);
        let mut restored = reconstruct_from_metadata(metadata);

        for values in &inputs {
            let expected: Vec<u64> = baked.evaluate(values).iter().map(|v| v.to_bits()).collect();
            let actual: Vec<u64> = restored.evaluate(values).iter().map(|v| v.to_bits()).collect();
            prop_assert_eq!(expected, actual);
        }
    }

    /// Running only the live subgraph gives the same outputs as baking the
    /// whole circuit.
    #[test]
    fn pruned_run_matches_full_bake(
        count in 0usize..10,
        seeds in prop::collection::vec(any::<u32>(), 32),
        inputs in prop::collection::vec(prop::array::uniform2(-150.0f64..150.0), 1..12),
    ) {
        let (nodes, wires) = random_dag(count, &seeds);
        let sequence: Vec<Vec<f64>> = inputs.iter().map(|values| values.to_vec()).collect();

        let results = run_cycles(&nodes, &wires, &sequence).unwrap();
        let mut baked = bake_graph(&nodes, &wires).unwrap();
        let expected: Vec<Vec<f64>> = sequence.iter().map(|values| baked.evaluate(values)).collect();

        prop_assert_eq!(results.output_values, expected);
    }

    /// Every output of every cycle is finite and inside the signal range.
    #[test]
    fn baked_outputs_stay_in_range(
        count in 1usize..10,
        seeds in prop::collection::vec(any::<u32>(), 32),
        inputs in prop::collection::vec(prop::array::uniform2(-1.0e6f64..1.0e6), 1..8),
    ) {
        let (nodes, wires) = random_dag(count, &seeds);
        let mut baked = bake_graph(&nodes, &wires).unwrap();

        for values in &inputs {
            for value in baked.evaluate(values) {
                prop_assert!(value.is_finite());
                prop_assert!((SIGNAL_MIN..=SIGNAL_MAX).contains(&value));
            }
        }
    }

    /// A circuit with a back edge fails to bake, and the reported path is a
    /// cycle made of real wires.
    #[test]
    fn reported_cycles_are_real(
        length in 1usize..12,
        back in any::<prop::sample::Index>(),
        span in any::<prop::sample::Index>(),
    ) {
        let (ids, mut wires) = chain(length);
        let from = back.index(length);
        let to = from - span.index(from + 1);
        wires.push(Wire::between("back", ids[from].clone(), 0, ids[to].clone(), 0));

        let nodes = node_map(ids.iter().map(|id| NodeState::new(id.clone(), NodeKind::Invert)));
        let err = bake_graph(&nodes, &wires).unwrap_err();

        prop_assert!(err.cycle_path.len() >= 2);
        prop_assert_eq!(err.cycle_path.first(), err.cycle_path.last());
        for pair in err.cycle_path.windows(2) {
            prop_assert!(wires
                .iter()
                .any(|wire| wire.source.node_id == pair[0] && wire.target.node_id == pair[1]));
        }
    }

    /// Depths along a linear chain are exactly 0, 1, ..., N-1.
    #[test]
    fn chain_depths_count_up(length in 0usize..40) {
        let (ids, wires) = chain(length);
        let sorted = sort_with_depths(&ids, &wires).unwrap();

        prop_assert_eq!(&sorted.order, &ids);
        let depths: Vec<usize> = ids.iter().map(|id| sorted.depths[id]).collect();
        prop_assert_eq!(depths, (0..length).collect::<Vec<_>>());
        prop_assert_eq!(sorted.max_depth, length.saturating_sub(1));
    }

    /// Offset saturates instead of overflowing the signal range.
    #[test]
    fn offset_saturates(a in -1.0e4f64..1.0e4, b in -1.0e4f64..1.0e4) {
        let mut memory = NodeMemory::Stateless;
        let out = evaluate_node(&NodeKind::Offset, &Params::new(), &[a, b], 1, &mut memory);

        prop_assert_eq!(out[0], clamp_signal(clamp_signal(a) + clamp_signal(b)));
        prop_assert!((SIGNAL_MIN..=SIGNAL_MAX).contains(&out[0]));
    }

    /// Every built-in kind stays in range on arbitrary inputs.
    #[test]
    fn every_kind_stays_in_range(
        kind in prop::sample::select(KINDS.to_vec()),
        a in prop::num::f64::ANY,
        b in prop::num::f64::ANY,
    ) {
        let params = Params::new();
        let (_, outputs) = kind.default_ports();
        let mut memory = NodeMemory::for_node(&kind, &params);

        for _ in 0..3 {
            for value in evaluate_node(&kind, &params, &[a, b], outputs, &mut memory) {
                prop_assert!((SIGNAL_MIN..=SIGNAL_MAX).contains(&value));
            }
        }
    }
}
