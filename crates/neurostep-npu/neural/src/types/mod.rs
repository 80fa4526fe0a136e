// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Core type definitions

pub mod atomic_value;
pub mod error;
pub mod ids;

pub use atomic_value::AtomicValue;
pub use error::{NetworkError, RecorderError, Result, UpdateRuleError};
pub use ids::{EdgeId, GroupId, NodeId};
