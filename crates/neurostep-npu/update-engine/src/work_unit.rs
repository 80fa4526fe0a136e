// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

use std::fmt;

use neurostep_neural::NodeRef;

/// One schedulable task handed from the producer to a consumer
pub enum WorkUnit {
    /// Update a contiguous block of nodes (and their afferent edges)
    BufferedBlock(Vec<NodeRef>),
    /// Rendezvous at the step barrier, then keep consuming
    Wait,
    /// Rendezvous at the step barrier, then exit
    Poison,
}

impl WorkUnit {
    pub fn kind(&self) -> &'static str {
        match self {
            WorkUnit::BufferedBlock(_) => "block",
            WorkUnit::Wait => "wait",
            WorkUnit::Poison => "poison",
        }
    }

    /// True for the units that end a consumer's step
    pub fn is_rendezvous(&self) -> bool {
        matches!(self, WorkUnit::Wait | WorkUnit::Poison)
    }
}

impl fmt::Debug for WorkUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkUnit::BufferedBlock(nodes) => write!(f, "BufferedBlock({} nodes)", nodes.len()),
            WorkUnit::Wait => write!(f, "Wait"),
            WorkUnit::Poison => write!(f, "Poison"),
        }
    }
}
