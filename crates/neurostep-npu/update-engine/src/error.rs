// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error taxonomy of the update engine

use neurostep_neural::{EdgeId, NodeId, UpdateRuleError};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum UpdateEngineError {
    /// Invalid configuration or zero detected workers. The engine stays usable.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A node or edge update callback failed; nothing was committed
    #[error("Update rule failed at {node}{}: {source}", edge_suffix(.edge))]
    UpdateRuleFailure {
        node: NodeId,
        edge: Option<EdgeId>,
        #[source]
        source: UpdateRuleError,
    },

    #[error("Update engine already shut down")]
    EngineDead,

    /// A producer or consumer was torn out of a blocking wait
    #[error("Update engine interrupted: {0}")]
    Interrupted(String),
}

impl UpdateEngineError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn interrupted(msg: impl Into<String>) -> Self {
        Self::Interrupted(msg.into())
    }
}

fn edge_suffix(edge: &Option<EdgeId>) -> String {
    edge.map(|e| format!(" ({e})")).unwrap_or_default()
}

pub type Result<T> = std::result::Result<T, UpdateEngineError>;
