//! Node trait and the typed value/port plumbing shared by all nodes.
//!
//! A node receives values pushed into named input slots by the host, and
//! returns emitted output values from `evaluate`. Ports track two pieces of
//! state the host contract exposes: whether a slot currently has a value at
//! all, and whether it was newly set since the last evaluation.

use serde::{Deserialize, Serialize};

/// A value travelling through the graph.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Bool(bool),
    Integer(i64),
    Number(f64),
}

impl Value {
    /// Human-readable kind name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Bool(_) => "bool",
            Value::Integer(_) => "integer",
            Value::Number(_) => "number",
        }
    }

    /// Numeric view; integers widen to f64.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Integer(i) => Some(*i as f64),
            Value::Bool(_) => None,
        }
    }

    /// Integral view; whole-valued floats are accepted.
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Number(n) if n.fract() == 0.0 && n.is_finite() => Some(*n as i64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

/// Delivery-time errors for a single input slot.
#[derive(Debug, Clone, thiserror::Error)]
pub enum NodeError {
    #[error("unknown input slot `{0}`")]
    UnknownInput(String),
    #[error("input `{slot}` expects a {expected}, got a {got}")]
    TypeMismatch {
        slot: String,
        expected: &'static str,
        got: &'static str,
    },
}

/// An input slot with "has a value" and "was newly set" state.
#[derive(Debug, Clone)]
pub struct Port<T> {
    value: Option<T>,
    updated: bool,
}

impl<T> Default for Port<T> {
    fn default() -> Self {
        Self {
            value: None,
            updated: false,
        }
    }
}

impl<T: Copy> Port<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a delivered value and mark the slot as newly set.
    pub fn set(&mut self, value: T) {
        self.value = Some(value);
        self.updated = true;
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    pub fn value(&self) -> Option<T> {
        self.value
    }

    /// Consume the "newly set" flag, returning the value if it was fresh.
    pub fn updated_value(&mut self) -> Option<T> {
        if self.updated {
            self.updated = false;
            self.value
        } else {
            None
        }
    }
}

/// One emitted output value.
#[derive(Debug, Clone, PartialEq)]
pub struct Emit {
    pub output: String,
    pub value: Value,
}

impl Emit {
    pub fn new(output: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            output: output.into(),
            value: value.into(),
        }
    }
}

/// A reactive signal-processing unit in the dataflow graph.
///
/// The host delivers values with `set_input`, then calls `evaluate` once per
/// accepted input change with the current monotonic time in seconds. Nodes
/// that requested a scheduler callback receive it through `tick`.
pub trait Node: Send {
    /// Deliver a value into a named input slot.
    fn set_input(&mut self, slot: &str, value: Value) -> Result<(), NodeError>;

    /// Run one update cycle; returns the outputs that changed.
    fn evaluate(&mut self, now: f64) -> Vec<Emit>;

    /// Scheduler callback delivery; only meaningful for nodes that schedule.
    fn tick(&mut self, _now: f64) -> Vec<Emit> {
        Vec::new()
    }
}

/// Resolve `"<prefix><k>"` (1-based, `k <= count`) to a zero-based index.
pub(crate) fn indexed_slot(slot: &str, prefix: &str, count: usize) -> Option<usize> {
    let index: usize = slot.strip_prefix(prefix)?.parse().ok()?;
    if (1..=count).contains(&index) {
        Some(index - 1)
    } else {
        None
    }
}
