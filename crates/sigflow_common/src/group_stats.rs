//! Multi-input aggregator: summary statistics over a fixed set of inputs.
//!
//! Unlike the windowed engine this node has no notion of time. Every
//! delivery recomputes minimum, maximum, sum, average and population
//! standard deviation over whichever of its inputs currently hold a value.

use crate::node::{indexed_slot, Emit, Node, NodeError, Port, Value};
use crate::params::{GroupStatsParams, ParamError};

pub struct GroupStats {
    inputs: Vec<Port<f64>>,
}

impl GroupStats {
    pub fn new(params: GroupStatsParams) -> Result<Self, ParamError> {
        params.validate()?;
        Ok(Self {
            inputs: vec![Port::new(); params.inputs],
        })
    }
}

impl Node for GroupStats {
    fn set_input(&mut self, slot: &str, value: Value) -> Result<(), NodeError> {
        let Some(index) = indexed_slot(slot, "in", self.inputs.len()) else {
            return Err(NodeError::UnknownInput(slot.to_string()));
        };
        match value.as_number() {
            Some(number) => {
                self.inputs[index].set(number);
                Ok(())
            }
            None => Err(NodeError::TypeMismatch {
                slot: slot.to_string(),
                expected: "number",
                got: value.kind(),
            }),
        }
    }

    fn evaluate(&mut self, _now: f64) -> Vec<Emit> {
        let mut fresh = false;
        for port in &mut self.inputs {
            fresh |= port.updated_value().is_some();
        }
        if !fresh {
            return Vec::new();
        }

        let values: Vec<f64> = self.inputs.iter().filter_map(|p| p.value()).collect();
        if values.is_empty() {
            return Vec::new();
        }

        let count = values.len() as f64;
        let sum: f64 = values.iter().sum();
        let average = sum / count;
        let minimum = values.iter().copied().fold(f64::INFINITY, f64::min);
        let maximum = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let variance = values
            .iter()
            .map(|v| {
                let deviation = v - average;
                deviation * deviation
            })
            .sum::<f64>()
            / count;

        vec![
            Emit::new("minimum", minimum),
            Emit::new("maximum", maximum),
            Emit::new("sum", sum),
            Emit::new("average", average),
            Emit::new("std_dev", variance.sqrt()),
        ]
    }
}
