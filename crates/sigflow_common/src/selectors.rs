//! N-way routing nodes.
//!
//! `InputSelector` forwards one of several inputs to a single output;
//! `OutputSelector` routes a single input to one of several outputs. Both
//! remember the latest value they saw and can replay it when the selection
//! changes, so a newly selected route starts from a defined value instead
//! of waiting for the next delivery.

use tracing::warn;

use crate::node::{indexed_slot, Emit, Node, NodeError, Port, Value};
use crate::params::{InputSelectorParams, OutputSelectorParams, ParamError};

/// Forwards deliveries on the selected input; `select` is 1-based.
pub struct InputSelector {
    params: InputSelectorParams,
    inputs: Vec<Port<f64>>,
    select_in: Port<i64>,
    /// Zero-based index of the currently selected input.
    selected: usize,
}

impl InputSelector {
    pub fn new(params: InputSelectorParams) -> Result<Self, ParamError> {
        params.validate()?;
        Ok(Self {
            inputs: vec![Port::new(); params.inputs],
            params,
            select_in: Port::new(),
            selected: 0,
        })
    }
}

impl Node for InputSelector {
    fn set_input(&mut self, slot: &str, value: Value) -> Result<(), NodeError> {
        if slot == "select" {
            return match value.as_integer() {
                Some(index) => {
                    self.select_in.set(index);
                    Ok(())
                }
                None => Err(NodeError::TypeMismatch {
                    slot: slot.to_string(),
                    expected: "integer",
                    got: value.kind(),
                }),
            };
        }
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
        let mut emits = Vec::new();

        if let Some(requested) = self.select_in.updated_value() {
            if (1..=self.inputs.len() as i64).contains(&requested) {
                let index = (requested - 1) as usize;
                if index != self.selected {
                    self.selected = index;
                    if self.params.resend_on_select {
                        if let Some(remembered) = self.inputs[index].value() {
                            emits.push(Emit::new("out", remembered));
                        }
                    }
                }
            } else {
                warn!(requested, inputs = self.inputs.len(), "select index out of range");
            }
        }

        // Consume every fresh delivery; only the selected one is forwarded.
        for index in 0..self.inputs.len() {
            if let Some(value) = self.inputs[index].updated_value() {
                if index == self.selected {
                    emits.push(Emit::new("out", value));
                }
            }
        }

        emits
    }
}

/// Routes its input to the selected output; `select` is 1-based.
pub struct OutputSelector {
    params: OutputSelectorParams,
    value_in: Port<f64>,
    select_in: Port<i64>,
    /// Zero-based index of the currently selected output.
    selected: usize,
    remembered: Option<f64>,
}

impl OutputSelector {
    pub fn new(params: OutputSelectorParams) -> Result<Self, ParamError> {
        params.validate()?;
        Ok(Self {
            params,
            value_in: Port::new(),
            select_in: Port::new(),
            selected: 0,
            remembered: None,
        })
    }

    fn output_name(&self) -> String {
        format!("out{}", self.selected + 1)
    }
}

impl Node for OutputSelector {
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
            "select" => match value.as_integer() {
                Some(index) => {
                    self.select_in.set(index);
                    Ok(())
                }
                None => Err(NodeError::TypeMismatch {
                    slot: slot.to_string(),
                    expected: "integer",
                    got: value.kind(),
                }),
            },
            _ => Err(NodeError::UnknownInput(slot.to_string())),
        }
    }

    fn evaluate(&mut self, _now: f64) -> Vec<Emit> {
        let mut emits = Vec::new();

        if let Some(requested) = self.select_in.updated_value() {
            if (1..=self.params.outputs as i64).contains(&requested) {
                let index = (requested - 1) as usize;
                if index != self.selected {
                    self.selected = index;
                    if self.params.resend_on_select {
                        if let Some(remembered) = self.remembered {
                            emits.push(Emit::new(self.output_name(), remembered));
                        }
                    }
                }
            } else {
                warn!(
                    requested,
                    outputs = self.params.outputs,
                    "select index out of range"
                );
            }
        }

        if let Some(value) = self.value_in.updated_value() {
            self.remembered = Some(value);
            emits.push(Emit::new(self.output_name(), value));
        }

        emits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input_selector(inputs: usize, resend: bool) -> InputSelector {
        InputSelector::new(InputSelectorParams {
            inputs,
            resend_on_select: resend,
        })
        .expect("valid params")
    }

    fn output_selector(outputs: usize, resend: bool) -> OutputSelector {
        OutputSelector::new(OutputSelectorParams {
            outputs,
            resend_on_select: resend,
        })
        .expect("valid params")
    }

    #[test]
    fn test_input_selector_forwards_only_selected_input() {
        let mut node = input_selector(3, false);
        node.set_input("in1", Value::Number(1.0)).expect("slot");
        node.set_input("in2", Value::Number(2.0)).expect("slot");
        assert_eq!(node.evaluate(0.0), vec![Emit::new("out", 1.0)]);

        node.set_input("in2", Value::Number(5.0)).expect("slot");
        assert!(node.evaluate(1.0).is_empty());
    }

    #[test]
    fn test_input_selector_switch_without_resend_stays_quiet() {
        let mut node = input_selector(3, false);
        node.set_input("in2", Value::Number(7.0)).expect("slot");
        node.evaluate(0.0);

        node.set_input("select", Value::Integer(2)).expect("slot");
        assert!(node.evaluate(1.0).is_empty());

        node.set_input("in2", Value::Number(8.0)).expect("slot");
        assert_eq!(node.evaluate(2.0), vec![Emit::new("out", 8.0)]);
    }

    #[test]
    fn test_input_selector_replays_remembered_value_on_switch() {
        let mut node = input_selector(3, true);
        node.set_input("in2", Value::Number(7.0)).expect("slot");
        node.evaluate(0.0);

        node.set_input("select", Value::Integer(2)).expect("slot");
        assert_eq!(node.evaluate(1.0), vec![Emit::new("out", 7.0)]);
    }

    #[test]
    fn test_input_selector_rejects_out_of_range_selection() {
        let mut node = input_selector(2, true);
        node.set_input("in1", Value::Number(1.0)).expect("slot");
        node.evaluate(0.0);

        node.set_input("select", Value::Integer(9)).expect("slot");
        assert!(node.evaluate(1.0).is_empty());

        // Selection is unchanged: input 1 still forwards.
        node.set_input("in1", Value::Number(3.0)).expect("slot");
        assert_eq!(node.evaluate(2.0), vec![Emit::new("out", 3.0)]);
    }

    #[test]
    fn test_output_selector_routes_to_selected_output() {
        let mut node = output_selector(3, false);
        node.set_input("value", Value::Number(4.0)).expect("slot");
        assert_eq!(node.evaluate(0.0), vec![Emit::new("out1", 4.0)]);

        node.set_input("select", Value::Integer(3)).expect("slot");
        node.set_input("value", Value::Number(5.0)).expect("slot");
        assert_eq!(node.evaluate(1.0), vec![Emit::new("out3", 5.0)]);
    }

    #[test]
    fn test_output_selector_replays_remembered_value_on_switch() {
        let mut node = output_selector(2, true);
        node.set_input("value", Value::Number(4.0)).expect("slot");
        node.evaluate(0.0);

        node.set_input("select", Value::Integer(2)).expect("slot");
        assert_eq!(node.evaluate(1.0), vec![Emit::new("out2", 4.0)]);
    }

    #[test]
    fn test_output_selector_reselecting_same_output_does_not_replay() {
        let mut node = output_selector(2, true);
        node.set_input("value", Value::Number(4.0)).expect("slot");
        node.evaluate(0.0);

        node.set_input("select", Value::Integer(1)).expect("slot");
        assert!(node.evaluate(1.0).is_empty());
    }
}
