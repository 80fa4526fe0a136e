// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Unbounded FIFO between the producer and its consumers.
//!
//! The producer owns the only sender. Consumers hold a [`TaskReceiver`]; once
//! the producer's queue is dropped, a blocked consumer wakes with
//! [`QueueClosed`] instead of hanging.

use crossbeam::channel::{self, Receiver, Sender};
use thiserror::Error;

use crate::work_unit::WorkUnit;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("task queue closed")]
pub struct QueueClosed;

pub struct TaskQueue {
    tx: Sender<WorkUnit>,
    rx: Receiver<WorkUnit>,
}

impl TaskQueue {
    pub fn new() -> Self {
        let (tx, rx) = channel::unbounded();
        Self { tx, rx }
    }

    pub fn push(&self, unit: WorkUnit) -> Result<(), QueueClosed> {
        self.tx.send(unit).map_err(|_| QueueClosed)
    }

    pub fn push_all(&self, units: impl IntoIterator<Item = WorkUnit>) -> Result<(), QueueClosed> {
        for unit in units {
            self.push(unit)?;
        }
        Ok(())
    }

    /// Units enqueued but not yet taken by a consumer
    pub fn len(&self) -> usize {
        self.tx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty()
    }

    /// Handle for a consumer thread
    pub fn receiver(&self) -> TaskReceiver {
        TaskReceiver {
            rx: self.rx.clone(),
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone)]
pub struct TaskReceiver {
    rx: Receiver<WorkUnit>,
}

impl TaskReceiver {
    /// Block until a unit is available
    pub fn pop(&self) -> Result<WorkUnit, QueueClosed> {
        self.rx.recv().map_err(|_| QueueClosed)
    }

    pub fn try_pop(&self) -> Option<WorkUnit> {
        self.rx.try_recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_order() {
        let queue = TaskQueue::new();
        let rx = queue.receiver();
        queue
            .push_all([WorkUnit::BufferedBlock(Vec::new()), WorkUnit::Wait, WorkUnit::Poison])
            .unwrap();
        assert_eq!(queue.len(), 3);

        assert_eq!(rx.pop().unwrap().kind(), "block");
        assert_eq!(rx.pop().unwrap().kind(), "wait");
        assert_eq!(rx.pop().unwrap().kind(), "poison");
        assert!(queue.is_empty());
        assert!(rx.try_pop().is_none());
    }

    #[test]
    fn test_receiver_sees_closed_queue() {
        let queue = TaskQueue::new();
        let rx = queue.receiver();
        queue.push(WorkUnit::Wait).unwrap();
        drop(queue);

        // Buffered units are still delivered before the close
        assert!(rx.pop().unwrap().is_rendezvous());
        assert_eq!(rx.pop().unwrap_err(), QueueClosed);
    }
}
