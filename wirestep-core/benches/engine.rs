//! Criterion benchmarks for the evaluation engine.
//!
//! - **Bake**: sort, liveness and plan construction
//! - **Evaluate**: one cycle of a baked evaluator
//! - **Tick**: one `advance_tick` with signals in flight
//!
//! Run with: `cargo bench -p wirestep-core`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use wirestep_core::bake::{bake_graph, GraphBaker};
use wirestep_core::graph::{node_map, NodeId, NodeKind, NodeMap, NodeState, TickScheduler, Wire};

const CHAIN_LENGTHS: &[usize] = &[5, 20, 100];

/// Input 0 through `length` alternating Invert/Memory nodes to output 0.
fn make_chain(length: usize, wts_delay: u32) -> (NodeMap, Vec<Wire>) {
    let nodes = node_map((0..length).map(|i| {
        let kind = if i % 2 == 0 { NodeKind::Invert } else { NodeKind::Memory };
        NodeState::new(format!("n{i}"), kind)
    }));

    let mut previous = NodeId::input_cp(0);
    let mut wires = Vec::with_capacity(length + 1);
    for (i, id) in nodes.keys().enumerate() {
        let wire = Wire::between(format!("w{i}"), previous, 0, id.clone(), 0);
        wires.push(wire.with_delay(wts_delay));
        previous = id.clone();
    }
    let wire = Wire::between("out", previous, 0, NodeId::output_cp(0), 0);
    wires.push(wire.with_delay(wts_delay));
    (nodes, wires)
}

fn bench_bake(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/bake");

    for &length in CHAIN_LENGTHS {
        let (nodes, wires) = make_chain(length, 0);
        group.bench_with_input(BenchmarkId::new("chain", length), &length, |b, _| {
            b.iter(|| black_box(GraphBaker::new().bake(&nodes, &wires).unwrap()));
        });
    }

    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/evaluate");

    for &length in CHAIN_LENGTHS {
        let (nodes, wires) = make_chain(length, 0);
        let mut baked = bake_graph(&nodes, &wires).unwrap();
        group.bench_with_input(BenchmarkId::new("chain", length), &length, |b, _| {
            b.iter(|| black_box(baked.evaluate(black_box(&[42.0]))));
        });
    }

    group.finish();
}

fn bench_tick(c: &mut Criterion) {
    let mut group = c.benchmark_group("engine/tick");

    for &length in CHAIN_LENGTHS {
        let (nodes, wires) = make_chain(length, 4);
        let mut scheduler = TickScheduler::new(nodes, wires).unwrap();
        group.bench_with_input(BenchmarkId::new("chain", length), &length, |b, _| {
            b.iter(|| {
                scheduler.inject(0, 42.0);
                scheduler.advance();
                black_box(scheduler.output_values());
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_bake, bench_evaluate, bench_tick);
criterion_main!(benches);
