// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Splitting a registry snapshot into BufferedBlock work units

use std::fmt;

use neurostep_neural::NodeRef;

/// Target nodes per block.
///
/// A non-zero `fixed` wins. Otherwise blocks are sized so that roughly
/// `workers * blocks_per_worker` blocks come out. Never returns zero.
pub fn chunk_size(total: usize, workers: usize, blocks_per_worker: usize, fixed: usize) -> usize {
    if fixed > 0 {
        return fixed;
    }
    let target_blocks = workers.max(1) * blocks_per_worker.max(1);
    total.div_ceil(target_blocks).max(1)
}

/// Split `nodes` into blocks of at most `chunk` nodes.
///
/// Always yields at least one block, even for an empty snapshot.
pub fn partition(nodes: Vec<NodeRef>, chunk: usize) -> Vec<Vec<NodeRef>> {
    let chunk = chunk.max(1);
    if nodes.len() <= chunk {
        return vec![nodes];
    }
    let mut blocks = Vec::with_capacity(nodes.len().div_ceil(chunk));
    let mut rest = nodes.into_iter().peekable();
    while rest.peek().is_some() {
        blocks.push(rest.by_ref().take(chunk).collect());
    }
    blocks
}

/// How the last step's snapshot was spread over the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionSummary {
    pub nodes: usize,
    pub blocks: usize,
    pub chunk_size: usize,
    pub workers: usize,
}

impl fmt::Display for PartitionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} nodes in {} blocks of up to {} across {} workers",
            self.nodes, self.blocks, self.chunk_size, self.workers
        )
    }
}
