// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Integration Tests: Input and Output Groups
//!
//! - Input feeds drive clamped groups at the start of each step
//! - Recorders receive committed activations after each step
//! - Group membership follows add/remove notifications

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use neurostep_config::UpdateEngineConfig;
use neurostep_neural::{
    ActivationRecorder, CsvRecorder, InputFeed, MemoryRecorder, Network, NeuronRule,
    RecorderError, RuleInput, SynapseRule, UpdatableNode, UpdateRule, UpdateRuleError,
};
use neurostep_update_engine::{ConcurrentBufferedUpdate, FixedParallelism, UpdateEngineError};

// ═══════════════════════════════════════════════════════════
// Helper Functions
// ═══════════════════════════════════════════════════════════

fn engine(net: &Arc<Network>) -> ConcurrentBufferedUpdate {
    let config = UpdateEngineConfig {
        barrier_timeout_ms: 30_000,
        ..UpdateEngineConfig::default()
    };
    ConcurrentBufferedUpdate::with_probe(net, &config, Arc::new(FixedParallelism::new(2))).unwrap()
}

struct Rejecting;

impl ActivationRecorder for Rejecting {
    fn record(&mut self, _step: u64, _activations: &[f64]) -> Result<(), RecorderError> {
        Err(RecorderError::Rejected("disk full".into()))
    }
}

/// Fails its first update, then holds its value
struct FailOnce(AtomicBool);

impl NeuronRule for FailOnce {
    fn apply(&self, input: &RuleInput<'_>) -> Result<f64, UpdateRuleError> {
        if self.0.swap(false, Ordering::SeqCst) {
            return Err(UpdateRuleError::failed("sensor glitch"));
        }
        Ok(input.activation)
    }
}

// ═══════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════

#[test]
fn test_input_feed_drives_downstream_neuron() {
    let net = Arc::new(Network::default());
    let sensors = net.add_group("sensors", 3, UpdateRule::Increment { delta: 100.0 });
    let reader = net.add_neuron(UpdateRule::default());
    net.connect(sensors.neurons()[0].id(), reader.id(), 2.0, SynapseRule::Static)
        .unwrap();
    let engine = engine(&net);

    let feed = InputFeed::new(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
    sensors.set_input_feed(feed).unwrap();
    let recorder = MemoryRecorder::new();
    let frames = recorder.frames();
    sensors.set_recorder(Box::new(recorder));
    net.fire_group_changed(sensors.id()).unwrap();

    engine.invoke().unwrap();
    assert_eq!(sensors.activations(), vec![1.0, 2.0, 3.0]);
    assert_eq!(reader.activation(), 2.0);

    engine.invoke().unwrap();
    assert_eq!(sensors.activations(), vec![4.0, 5.0, 6.0]);
    assert_eq!(reader.activation(), 8.0);

    engine.invoke().unwrap();
    assert_eq!(
        frames.lock().as_slice(),
        &[
            (1, vec![1.0, 2.0, 3.0]),
            (2, vec![4.0, 5.0, 6.0]),
            (3, vec![1.0, 2.0, 3.0]),
        ]
    );
}

#[test]
fn test_leaving_input_mode_resumes_rule() {
    let net = Arc::new(Network::default());
    let group = net.add_group("g", 2, UpdateRule::Increment { delta: 1.0 });
    let engine = engine(&net);

    group
        .set_input_feed(InputFeed::new(vec![vec![10.0, 20.0]]).unwrap())
        .unwrap();
    net.fire_group_changed(group.id()).unwrap();
    engine.invoke().unwrap();
    assert_eq!(group.activations(), vec![10.0, 20.0]);

    group.clear_input_feed();
    net.fire_group_changed(group.id()).unwrap();
    engine.invoke().unwrap();
    assert_eq!(group.activations(), vec![11.0, 21.0]);
}

#[test]
fn test_csv_recorder_writes_each_step() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.csv");

    let net = Arc::new(Network::default());
    let group = net.add_group("out", 2, UpdateRule::Increment { delta: 0.5 });
    let engine = engine(&net);
    group.set_recorder(Box::new(CsvRecorder::create(&path).unwrap()));
    net.fire_group_changed(group.id()).unwrap();

    engine.invoke().unwrap();
    engine.invoke().unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec!["1,0.5,0.5", "2,1,1"]);
}

#[test]
fn test_recorder_failure_does_not_fail_step() {
    let net = Arc::new(Network::default());
    let group = net.add_group("out", 1, UpdateRule::Increment { delta: 1.0 });
    let engine = engine(&net);
    group.set_recorder(Box::new(Rejecting));
    net.fire_group_changed(group.id()).unwrap();

    let report = engine.invoke().unwrap();
    assert_eq!(report.nodes_committed, 1);
    assert_eq!(group.activations(), vec![1.0]);
}

#[test]
fn test_group_add_and_remove_update_registry() {
    let net = Arc::new(Network::default());
    let engine = engine(&net);

    let group = net.add_group("late", 5, UpdateRule::Increment { delta: 1.0 });
    assert_eq!(engine.registry().len(), 5);
    engine.invoke().unwrap();
    assert_eq!(group.activations(), vec![1.0; 5]);

    net.remove_group(group.id()).unwrap();
    assert!(engine.registry().is_empty());
    engine.invoke().unwrap();
    assert_eq!(group.activations(), vec![1.0; 5]);
}

#[test]
fn test_failed_step_keeps_input_row_and_records_nothing() {
    let net = Arc::new(Network::default());
    let sensors = net.add_group("sensors", 2, UpdateRule::Increment { delta: 100.0 });
    let feed = InputFeed::new(vec![vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    sensors.set_input_feed(feed).unwrap();
    let recorder = MemoryRecorder::new();
    let frames = recorder.frames();
    sensors.set_recorder(Box::new(recorder));
    net.fire_group_changed(sensors.id()).unwrap();
    net.add_neuron(UpdateRule::Custom(Arc::new(FailOnce(AtomicBool::new(true)))));
    let engine = engine(&net);

    let result = engine.invoke();
    assert!(matches!(
        result,
        Err(UpdateEngineError::UpdateRuleFailure { .. })
    ));
    assert_eq!(sensors.activations(), vec![0.0, 0.0]);
    assert!(frames.lock().is_empty());

    engine.invoke().unwrap();
    assert_eq!(sensors.activations(), vec![1.0, 2.0]);
    engine.invoke().unwrap();
    assert_eq!(sensors.activations(), vec![3.0, 4.0]);
    assert_eq!(
        frames.lock().as_slice(),
        &[(1, vec![1.0, 2.0]), (2, vec![3.0, 4.0])]
    );
}
