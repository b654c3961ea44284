//! Difference-threshold filter: suppresses insignificant value changes.
//!
//! Forwards a value only when it differs from the last forwarded value by
//! more than the configured threshold, cutting chatter out of noisy signals
//! before it reaches downstream nodes.

use tracing::debug;

use crate::node::{Emit, Node, NodeError, Port, Value};
use crate::params::{ParamError, ThresholdFilterParams};

pub struct ThresholdFilter {
    params: ThresholdFilterParams,
    value_in: Port<f64>,
    last_forwarded: Option<f64>,
}

impl ThresholdFilter {
    pub fn new(params: ThresholdFilterParams) -> Result<Self, ParamError> {
        params.validate()?;
        Ok(Self {
            params,
            value_in: Port::new(),
            last_forwarded: None,
        })
    }
}

impl Node for ThresholdFilter {
    fn set_input(&mut self, slot: &str, value: Value) -> Result<(), NodeError> {
        match slot {
            "value" => match value.as_number() {
                Some(number) => {
                    self.value_in.set(number);
                    Ok(())
                }
                None => Err(NodeError::TypeMismatch {
                    slot: slot.to_string(),
                    expected: "number",
                    got: value.kind(),
                }),
            },
            _ => Err(NodeError::UnknownInput(slot.to_string())),
        }
    }

    fn evaluate(&mut self, _now: f64) -> Vec<Emit> {
        let Some(value) = self.value_in.updated_value() else {
            return Vec::new();
        };
        if !value.is_finite() {
            debug!(value, "dropping non-finite value");
            return Vec::new();
        }

        let passes = match self.last_forwarded {
            None => true,
            Some(previous) => (value - previous).abs() > self.params.threshold,
        };
        if !passes {
            return Vec::new();
        }

        self.last_forwarded = Some(value);
        vec![Emit::new("out", value)]
    }
}
