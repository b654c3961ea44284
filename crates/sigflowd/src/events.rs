//! Line protocol between the daemon and its environment.
//!
//! Inputs arrive as JSON lines on stdin, outputs leave as JSON lines on
//! stdout. One line, one event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sigflow_common::Value;

/// `{"node": "stats", "input": "value", "value": 21.5}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    pub node: String,
    pub input: String,
    pub value: Value,
}

/// `{"timestamp": "...", "node": "stats", "output": "average", "value": 20.8}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputEvent {
    pub timestamp: DateTime<Utc>,
    pub node: String,
    pub output: String,
    pub value: Value,
}

impl OutputEvent {
    pub fn now(node: impl Into<String>, output: impl Into<String>, value: Value) -> Self {
        Self {
            timestamp: Utc::now(),
            node: node.into(),
            output: output.into(),
            value,
        }
    }
}
