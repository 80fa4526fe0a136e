// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Neuron groups, external input feeds and activation recorders.
//!
//! A group in *input mode* has its neurons clamped and driven from an
//! [`InputFeed`] row at the start of each step. A group with a recorder
//! receives its committed activations after each successful step.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::neuron::Neuron;
use crate::node::{NodeRef, UpdatableNode};
use crate::types::{GroupId, NetworkError, NodeId, RecorderError};

/// Cyclic table of input rows, one value per neuron
#[derive(Debug, Clone)]
pub struct InputFeed {
    rows: Vec<Vec<f64>>,
    cursor: usize,
}

impl InputFeed {
    pub fn new(rows: Vec<Vec<f64>>) -> crate::types::Result<Self> {
        if rows.is_empty() {
            return Err(NetworkError::EmptyInputFeed);
        }
        let width = rows[0].len();
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(NetworkError::InputWidthMismatch {
                expected: width,
                actual: bad.len(),
            });
        }
        Ok(Self { rows, cursor: 0 })
    }

    pub fn width(&self) -> usize {
        self.rows[0].len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Index of the row `next_row` returns next
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Next row, wrapping around at the end
    pub fn next_row(&mut self) -> &[f64] {
        let idx = self.cursor;
        self.cursor = (self.cursor + 1) % self.rows.len();
        &self.rows[idx]
    }
}

/// Input neuron values and feed position from before a row was applied
#[derive(Debug, Clone, PartialEq)]
pub struct InputCheckpoint {
    cursor: usize,
    values: Vec<(f64, f64)>,
}

/// Sink for committed group activations
pub trait ActivationRecorder: Send {
    fn record(&mut self, step: u64, activations: &[f64]) -> Result<(), RecorderError>;
}

/// Recorded `(step, activations)` frames
pub type RecordedFrames = Arc<Mutex<Vec<(u64, Vec<f64>)>>>;

/// Keeps frames in memory; `frames()` hands out a shared view
#[derive(Default)]
pub struct MemoryRecorder {
    frames: RecordedFrames,
}

impl MemoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> RecordedFrames {
        Arc::clone(&self.frames)
    }
}

impl ActivationRecorder for MemoryRecorder {
    fn record(&mut self, step: u64, activations: &[f64]) -> Result<(), RecorderError> {
        self.frames.lock().push((step, activations.to_vec()));
        Ok(())
    }
}

/// Writes one CSV record per step: `step,a0,a1,...`
pub struct CsvRecorder {
    writer: csv::Writer<File>,
}

impl CsvRecorder {
    pub fn create(path: impl AsRef<Path>) -> Result<Self, RecorderError> {
        let writer = csv::WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(path)?;
        Ok(Self { writer })
    }
}

impl ActivationRecorder for CsvRecorder {
    fn record(&mut self, step: u64, activations: &[f64]) -> Result<(), RecorderError> {
        let record = std::iter::once(step.to_string())
            .chain(activations.iter().map(|v| v.to_string()));
        self.writer.write_record(record)?;
        self.writer.flush()?;
        Ok(())
    }
}

/// A labelled, fixed set of neurons
pub struct NeuronGroup {
    id: GroupId,
    label: String,
    neurons: Vec<Arc<Neuron>>,
    input_feed: Mutex<Option<InputFeed>>,
    recorder: Mutex<Option<Box<dyn ActivationRecorder>>>,
}

impl NeuronGroup {
    pub fn new(id: GroupId, label: impl Into<String>, neurons: Vec<Arc<Neuron>>) -> Self {
        Self {
            id,
            label: label.into(),
            neurons,
            input_feed: Mutex::new(None),
            recorder: Mutex::new(None),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.neurons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.neurons.is_empty()
    }

    pub fn neurons(&self) -> &[Arc<Neuron>] {
        &self.neurons
    }

    pub fn neuron_ids(&self) -> Vec<NodeId> {
        self.neurons.iter().map(|n| n.id()).collect()
    }

    pub fn node_refs(&self) -> Vec<NodeRef> {
        self.neurons
            .iter()
            .map(|n| Arc::clone(n) as NodeRef)
            .collect()
    }

    pub fn activations(&self) -> Vec<f64> {
        self.neurons.iter().map(|n| n.activation()).collect()
    }

    /// Put the group in input mode. Clamps every neuron.
    pub fn set_input_feed(&self, feed: InputFeed) -> crate::types::Result<()> {
        if feed.width() != self.neurons.len() {
            return Err(NetworkError::InputWidthMismatch {
                expected: self.neurons.len(),
                actual: feed.width(),
            });
        }
        for n in &self.neurons {
            n.set_clamped(true);
        }
        *self.input_feed.lock() = Some(feed);
        Ok(())
    }

    /// Leave input mode and release the clamp
    pub fn clear_input_feed(&self) -> Option<InputFeed> {
        for n in &self.neurons {
            n.set_clamped(false);
        }
        self.input_feed.lock().take()
    }

    pub fn is_input_mode(&self) -> bool {
        self.input_feed.lock().is_some()
    }

    /// Apply the next feed row to live and buffered activations.
    ///
    /// Returns `None` when the group is not in input mode. Otherwise the
    /// returned checkpoint undoes the row via [`NeuronGroup::restore_inputs`].
    pub fn apply_next_inputs(&self) -> Option<InputCheckpoint> {
        let mut feed = self.input_feed.lock();
        let feed = feed.as_mut()?;
        let checkpoint = InputCheckpoint {
            cursor: feed.cursor(),
            values: self
                .neurons
                .iter()
                .map(|n| (n.activation(), n.buffered_activation()))
                .collect(),
        };
        let row = feed.next_row();
        for (neuron, value) in self.neurons.iter().zip(row.iter()) {
            neuron.force_set_activation(*value);
        }
        Some(checkpoint)
    }

    /// Put back the activations and feed position saved by `apply_next_inputs`
    pub fn restore_inputs(&self, checkpoint: InputCheckpoint) {
        if let Some(feed) = self.input_feed.lock().as_mut() {
            feed.cursor = checkpoint.cursor % feed.rows.len();
        }
        for (neuron, (live, buffered)) in self.neurons.iter().zip(checkpoint.values) {
            neuron.restore_activation(live, buffered);
        }
    }

    pub fn set_recorder(&self, recorder: Box<dyn ActivationRecorder>) {
        *self.recorder.lock() = Some(recorder);
    }

    pub fn take_recorder(&self) -> Option<Box<dyn ActivationRecorder>> {
        self.recorder.lock().take()
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.lock().is_some()
    }

    /// Hand the current live activations to the recorder, if any
    pub fn record(&self, step: u64) -> Result<(), RecorderError> {
        let mut recorder = self.recorder.lock();
        match recorder.as_mut() {
            Some(r) => r.record(step, &self.activations()),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for NeuronGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NeuronGroup")
            .field("id", &self.id)
            .field("label", &self.label)
            .field("neurons", &self.neurons.len())
            .field("input_mode", &self.is_input_mode())
            .field("recording", &self.is_recording())
            .finish()
    }
}
