// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types raised by node and edge update callbacks

use super::ids::{EdgeId, GroupId, NodeId};

/// Failure escaping a node or edge update rule
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum UpdateRuleError {
    #[error("update rule failed: {0}")]
    Failed(String),

    #[error("update rule produced a non-finite value ({value}) for {node}")]
    NonFinite { node: NodeId, value: f64 },

    #[error("update rule panicked: {0}")]
    Panicked(String),
}

impl UpdateRuleError {
    pub fn failed(reason: impl Into<String>) -> Self {
        UpdateRuleError::Failed(reason.into())
    }
}

/// Errors raised while editing a network's structure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NetworkError {
    #[error("{0} not found")]
    NodeNotFound(NodeId),

    #[error("{0} not found")]
    EdgeNotFound(EdgeId),

    #[error("{0} not found")]
    GroupNotFound(GroupId),

    #[error("input row has {actual} values but group has {expected} neurons")]
    InputWidthMismatch { expected: usize, actual: usize },

    #[error("input feed is empty")]
    EmptyInputFeed,
}

/// Failures reported by an activation recorder
#[derive(Debug, thiserror::Error)]
pub enum RecorderError {
    #[error("recorder I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("recorder CSV write failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("recorder rejected frame: {0}")]
    Rejected(String),
}

/// Result type for network editing
pub type Result<T> = core::result::Result<T, NetworkError>;
