//! Graph configuration file handling.
//!
//! A graph file declares named node instances and the wires between their
//! ports, e.g.:
//!
//! ```toml
//! [nodes.smooth]
//! kind = "threshold_filter"
//! threshold = 0.5
//!
//! [nodes.stats]
//! kind = "statistics"
//! considered_span_secs = 300.0
//! resample_period_secs = 10.0
//!
//! [[wires]]
//! from = "smooth.out"
//! to = "stats.value"
//! ```
//!
//! Parameter validation happens at load time; a bad node aborts startup
//! with the node name and the distinct rejection reason.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sigflow_common::{
    GroupStatsParams, InputSelectorParams, OutputSelectorParams, ParamError, StatisticsParams,
    ThresholdFilterParams,
};

/// One `node.port` reference in a wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Endpoint {
    pub node: String,
    pub port: String,
}

impl TryFrom<String> for Endpoint {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.split_once('.') {
            Some((node, port)) if !node.is_empty() && !port.is_empty() => Ok(Self {
                node: node.to_string(),
                port: port.to_string(),
            }),
            _ => Err(format!("endpoint `{raw}` is not of the form `node.port`")),
        }
    }
}

impl From<Endpoint> for String {
    fn from(endpoint: Endpoint) -> Self {
        format!("{}.{}", endpoint.node, endpoint.port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.port)
    }
}

/// A directed connection from one node's output to another node's input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wire {
    pub from: Endpoint,
    pub to: Endpoint,
}

/// Node instance declaration: kind plus that kind's parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeDecl {
    Statistics(StatisticsParams),
    ThresholdFilter(ThresholdFilterParams),
    GroupStats(GroupStatsParams),
    InputSelector(InputSelectorParams),
    OutputSelector(OutputSelectorParams),
}

impl NodeDecl {
    pub fn validate(&self) -> Result<(), ParamError> {
        match self {
            NodeDecl::Statistics(params) => params.validate(),
            NodeDecl::ThresholdFilter(params) => params.validate(),
            NodeDecl::GroupStats(params) => params.validate(),
            NodeDecl::InputSelector(params) => params.validate(),
            NodeDecl::OutputSelector(params) => params.validate(),
        }
    }
}

/// The whole graph file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub nodes: BTreeMap<String, NodeDecl>,
    #[serde(default)]
    pub wires: Vec<Wire>,
}

impl GraphConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read graph file {}", path.display()))?;
        let config: GraphConfig = toml::from_str(&raw)
            .with_context(|| format!("failed to parse graph file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks node parameters and wire endpoints before anything activates.
    pub fn validate(&self) -> Result<()> {
        if self.nodes.is_empty() {
            bail!("graph declares no nodes");
        }
        for (name, decl) in &self.nodes {
            decl.validate()
                .with_context(|| format!("node `{name}` has invalid parameters"))?;
        }
        for wire in &self.wires {
            if !self.nodes.contains_key(&wire.from.node) {
                bail!("wire {} -> {} references unknown node `{}`", wire.from, wire.to, wire.from.node);
            }
            if !self.nodes.contains_key(&wire.to.node) {
                bail!("wire {} -> {} references unknown node `{}`", wire.from, wire.to, wire.to.node);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const SAMPLE: &str = r#"
[nodes.smooth]
kind = "threshold_filter"
threshold = 0.5

[nodes.stats]
kind = "statistics"
considered_span_secs = 300.0
resample_period_secs = 10.0
max_entries = 100

[[wires]]
from = "smooth.out"
to = "stats.value"
"#;

    #[test]
    fn test_parse_sample_graph() {
        let config: GraphConfig = toml::from_str(SAMPLE).expect("parse");
        assert_eq!(config.nodes.len(), 2);
        assert_eq!(config.wires.len(), 1);
        assert_eq!(config.wires[0].from.node, "smooth");
        assert_eq!(config.wires[0].to.port, "value");
        assert!(matches!(config.nodes["stats"], NodeDecl::Statistics(_)));
        config.validate().expect("valid");
    }

    #[test]
    fn test_defaults_fill_missing_parameters() {
        let config: GraphConfig = toml::from_str(
            r#"
[nodes.stats]
kind = "statistics"
"#,
        )
        .expect("parse");
        let NodeDecl::Statistics(params) = &config.nodes["stats"] else {
            panic!("expected statistics node");
        };
        assert_eq!(params.considered_span_secs, 60.0);
        assert_eq!(params.resample_period_secs, 0.0);
        assert_eq!(params.max_entries, 50);
        assert_eq!(params.input_resolution, 1.0);
    }

    #[test]
    fn test_malformed_endpoint_is_rejected() {
        let result: Result<GraphConfig, _> = toml::from_str(
            r#"
[nodes.stats]
kind = "statistics"

[[wires]]
from = "stats"
to = "stats.value"
"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_wire_target_is_rejected() {
        let config: GraphConfig = toml::from_str(
            r#"
[nodes.stats]
kind = "statistics"

[[wires]]
from = "stats.average"
to = "ghost.value"
"#,
        )
        .expect("parse");
        let error = config.validate().expect_err("invalid");
        assert!(error.to_string().contains("ghost"));
    }

    #[test]
    fn test_invalid_parameters_name_the_node() {
        let config: GraphConfig = toml::from_str(
            r#"
[nodes.stats]
kind = "statistics"
considered_span_secs = 1.0
"#,
        )
        .expect("parse");
        let error = config.validate().expect_err("invalid");
        assert!(format!("{error:#}").contains("stats"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().expect("temp file");
        file.write_all(SAMPLE.as_bytes()).expect("write");
        let config = GraphConfig::load(file.path()).expect("load");
        assert_eq!(config.nodes.len(), 2);
    }

    #[test]
    fn test_empty_graph_is_rejected() {
        let config = GraphConfig::default();
        assert!(config.validate().is_err());
    }
}
