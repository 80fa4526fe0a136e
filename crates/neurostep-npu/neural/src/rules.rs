// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Update rule variants for neurons and synapses.
//!
//! Rules are tagged variants rather than a type hierarchy. Models that need
//! arbitrary behavior plug in through [`NeuronRule`] via `UpdateRule::Custom`.

use std::fmt;
use std::sync::Arc;

use crate::node::BufferContext;
use crate::types::{NodeId, UpdateRuleError};

/// Inputs visible to a neuron rule for one step
#[derive(Debug, Clone, Copy)]
pub struct RuleInput<'a> {
    pub node: NodeId,
    /// Live activation at the start of the step
    pub activation: f64,
    /// Sum of afferent synapse responses
    pub net_input: f64,
    pub ctx: &'a BufferContext,
}

/// Capability interface for externally supplied neuron models
pub trait NeuronRule: Send + Sync {
    fn apply(&self, input: &RuleInput<'_>) -> Result<f64, UpdateRuleError>;

    fn name(&self) -> &str {
        "custom"
    }
}

/// Neuron update rule
#[derive(Clone)]
pub enum UpdateRule {
    /// `slope * net_input + bias`
    Linear { slope: f64, bias: f64 },
    /// `activation + delta` (ignores inputs)
    Increment { delta: f64 },
    /// `high` when `net_input >= threshold`, otherwise `low`
    Threshold { threshold: f64, high: f64, low: f64 },
    Custom(Arc<dyn NeuronRule>),
}

impl UpdateRule {
    pub fn apply(&self, input: &RuleInput<'_>) -> Result<f64, UpdateRuleError> {
        match self {
            UpdateRule::Linear { slope, bias } => Ok(slope * input.net_input + bias),
            UpdateRule::Increment { delta } => Ok(input.activation + delta),
            UpdateRule::Threshold {
                threshold,
                high,
                low,
            } => Ok(if input.net_input >= *threshold {
                *high
            } else {
                *low
            }),
            UpdateRule::Custom(rule) => rule.apply(input),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            UpdateRule::Linear { .. } => "linear",
            UpdateRule::Increment { .. } => "increment",
            UpdateRule::Threshold { .. } => "threshold",
            UpdateRule::Custom(rule) => rule.name(),
        }
    }
}

impl Default for UpdateRule {
    fn default() -> Self {
        UpdateRule::Linear {
            slope: 1.0,
            bias: 0.0,
        }
    }
}

impl fmt::Debug for UpdateRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateRule::Linear { slope, bias } => f
                .debug_struct("Linear")
                .field("slope", slope)
                .field("bias", bias)
                .finish(),
            UpdateRule::Increment { delta } => {
                f.debug_struct("Increment").field("delta", delta).finish()
            }
            UpdateRule::Threshold {
                threshold,
                high,
                low,
            } => f
                .debug_struct("Threshold")
                .field("threshold", threshold)
                .field("high", high)
                .field("low", low)
                .finish(),
            UpdateRule::Custom(rule) => f.debug_tuple("Custom").field(&rule.name()).finish(),
        }
    }
}

/// Synapse update rule
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SynapseRule {
    #[default]
    Static,
    /// `weight += learning_rate * source * target`, using live activations
    Hebbian { learning_rate: f64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(activation: f64, net_input: f64, ctx: &BufferContext) -> RuleInput<'_> {
        RuleInput {
            node: NodeId(0),
            activation,
            net_input,
            ctx,
        }
    }

    #[test]
    fn test_builtin_rules() {
        let ctx = BufferContext::new(1, 0.1, 0);

        let linear = UpdateRule::Linear {
            slope: 2.0,
            bias: 0.5,
        };
        assert_eq!(linear.apply(&input(9.0, 1.0, &ctx)).unwrap(), 2.5);

        let inc = UpdateRule::Increment { delta: 1.0 };
        assert_eq!(inc.apply(&input(3.0, 100.0, &ctx)).unwrap(), 4.0);

        let thr = UpdateRule::Threshold {
            threshold: 0.5,
            high: 1.0,
            low: 0.0,
        };
        assert_eq!(thr.apply(&input(0.0, 0.5, &ctx)).unwrap(), 1.0);
        assert_eq!(thr.apply(&input(0.0, 0.49, &ctx)).unwrap(), 0.0);
    }

    #[test]
    fn test_custom_rule() {
        struct Doubler;
        impl NeuronRule for Doubler {
            fn apply(&self, input: &RuleInput<'_>) -> Result<f64, UpdateRuleError> {
                Ok(input.activation * 2.0)
            }
            fn name(&self) -> &str {
                "doubler"
            }
        }

        let ctx = BufferContext::new(1, 0.1, 0);
        let rule = UpdateRule::Custom(Arc::new(Doubler));
        assert_eq!(rule.name(), "doubler");
        assert_eq!(rule.apply(&input(1.5, 0.0, &ctx)).unwrap(), 3.0);
    }
}
