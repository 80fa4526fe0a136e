// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Step throughput across worker counts
//!
//! Fixed, deterministic networks; no I/O. Each iteration is one full
//! `invoke()` including partitioning, the barrier and the commit.

use std::sync::Arc;
use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use neurostep_config::UpdateEngineConfig;
use neurostep_neural::{Network, NodeId, SynapseRule, UpdateRule};
use neurostep_update_engine::{ConcurrentBufferedUpdate, FixedParallelism};

fn create_network(neuron_count: u32, synapses_per_neuron: u32) -> Arc<Network> {
    let net = Arc::new(Network::default());
    for _ in 0..neuron_count {
        net.add_neuron(UpdateRule::Linear {
            slope: 0.5,
            bias: 0.01,
        });
    }
    for source in 0..neuron_count {
        for offset in 0..synapses_per_neuron {
            let target = (source + offset + 1) % neuron_count;
            let weight = if offset % 4 == 0 { -0.2 } else { 0.1 };
            net.connect(NodeId(source), NodeId(target), weight, SynapseRule::Static)
                .expect("bench network wiring");
        }
    }
    net
}

fn bench_step_by_workers(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_by_workers");
    group.measurement_time(Duration::from_secs(5));

    let neurons = 10_000;
    let net = create_network(neurons, 8);
    group.throughput(Throughput::Elements(neurons as u64));

    for workers in [1usize, 2, 4, 8] {
        let config = UpdateEngineConfig {
            blocks_per_worker: 4,
            ..UpdateEngineConfig::default()
        };
        let engine = ConcurrentBufferedUpdate::with_probe(
            &net,
            &config,
            Arc::new(FixedParallelism::new(workers)),
        )
        .expect("engine");

        group.bench_with_input(BenchmarkId::from_parameter(workers), &workers, |b, _| {
            b.iter(|| black_box(engine.invoke().expect("step")));
        });
    }
    group.finish();
}

fn bench_step_by_size(c: &mut Criterion) {
    let mut group = c.benchmark_group("step_by_size");

    for neurons in [100u32, 1_000, 10_000] {
        let net = create_network(neurons, 4);
        let engine = ConcurrentBufferedUpdate::with_probe(
            &net,
            &UpdateEngineConfig::default(),
            Arc::new(FixedParallelism::new(4)),
        )
        .expect("engine");

        group.throughput(Throughput::Elements(neurons as u64));
        group.bench_with_input(BenchmarkId::from_parameter(neurons), &neurons, |b, _| {
            b.iter(|| black_box(engine.invoke().expect("step")));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_step_by_workers, bench_step_by_size);
criterion_main!(benches);
