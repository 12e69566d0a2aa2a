// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use crate::graph::{NodeInputs, NodeSpec};
use crate::model::StateMap;
use crate::observability::messages::graph::{ConfigLoaded, ValidationProblem};
use crate::observability::messages::StructuredLog;

/// A graph document: engine settings plus node declarations.
///
/// Nodes may be declared in any order; [`build_graph`](super::build_graph)
/// inserts them upstream first.
///
/// # Example
/// ```yaml
/// engine:
///   timeout_seconds: 30
/// nodes:
///   - key: source
///     pipe: customer_source
///     config: { total_records: 8 }
///   - key: metrics
///     pipe: shape_metrics
///     inputs: source
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GraphConfig {
    #[serde(default)]
    pub engine: EngineSection,
    #[serde(default)]
    pub nodes: Vec<NodeDefinition>,
}

/// Engine tunables; see [`EngineOptions`](crate::engine::EngineOptions).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct EngineSection {
    pub timeout_seconds: Option<u64>,
    pub max_trace_chars: Option<usize>,
}

/// One declared node.
#[derive(Debug, Clone, Deserialize)]
pub struct NodeDefinition {
    pub key: String,
    pub pipe: String,
    #[serde(default)]
    pub config: StateMap,
    #[serde(default, alias = "upstream")]
    pub inputs: Option<InputsDefinition>,
    pub output_alias: Option<String>,
    pub dataset_name: Option<String>,
}

/// `inputs: source` or `inputs: { left: a, right: [b, c] }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum InputsDefinition {
    Single(String),
    Named(BTreeMap<String, OneOrMany>),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn keys(&self) -> Vec<String> {
        match self {
            OneOrMany::One(key) => vec![key.clone()],
            OneOrMany::Many(keys) => keys.clone(),
        }
    }
}

impl NodeDefinition {
    /// Every upstream key this node reads from, in declaration order.
    pub fn upstreams(&self) -> Vec<&str> {
        match &self.inputs {
            None => Vec::new(),
            Some(InputsDefinition::Single(key)) => vec![key.as_str()],
            Some(InputsDefinition::Named(ports)) => ports
                .values()
                .flat_map(|value| match value {
                    OneOrMany::One(key) => vec![key.as_str()],
                    OneOrMany::Many(keys) => keys.iter().map(String::as_str).collect(),
                })
                .collect(),
        }
    }

    pub fn to_spec(&self) -> NodeSpec {
        let inputs = match &self.inputs {
            None => NodeInputs::None,
            Some(InputsDefinition::Single(key)) => NodeInputs::Single(key.clone()),
            Some(InputsDefinition::Named(ports)) => NodeInputs::Named(
                ports
                    .iter()
                    .map(|(port, value)| (port.clone(), value.keys()))
                    .collect(),
            ),
        };
        NodeSpec {
            key: self.key.clone(),
            pipe: self.pipe.as_str().into(),
            config: self.config.clone(),
            inputs,
            output_alias: self.output_alias.clone(),
            dataset_name: self.dataset_name.clone(),
        }
    }
}

/// Parse a graph document from YAML text.
pub fn parse_config(text: &str) -> Result<GraphConfig, serde_yaml::Error> {
    serde_yaml::from_str(text)
}

/// Load a graph document from a YAML file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<GraphConfig, Box<dyn std::error::Error>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let cfg = parse_config(&content)?;
    ConfigLoaded {
        source: &path.display().to_string(),
        node_count: cfg.nodes.len(),
    }
    .log();
    Ok(cfg)
}

/// Load a graph document and check its structure.
///
/// Every problem found is logged; the returned error lists all of them.
pub fn load_and_validate_config<P: AsRef<Path>>(
    path: P,
) -> Result<GraphConfig, Box<dyn std::error::Error>> {
    let cfg = load_config(path)?;

    if let Err(validation_errors) = crate::config::validate_graph_config(&cfg) {
        for error in &validation_errors {
            ValidationProblem { error }.log();
        }
        let error_messages: Vec<String> = validation_errors.iter().map(|e| e.to_string()).collect();
        let combined_error = format!(
            "Configuration validation failed:\n{}",
            error_messages.join("\n")
        );
        return Err(combined_error.into());
    }

    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn write_temp(yaml: &str) -> tempfile::NamedTempFile {
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), yaml).unwrap();
        file
    }

    #[test]
    fn parse_full_document() {
        let yaml = r#"
engine:
  timeout_seconds: 30
  max_trace_chars: 100
nodes:
  - key: source
    pipe: customer_source
    config: { total_records: 8 }
  - key: metrics
    pipe: shape_metrics
    inputs: source
    output_alias: metrics_latest
  - key: joined
    pipe: join
    inputs:
      left: source
      right: [metrics]
    dataset_name: null
"#;
        let cfg = parse_config(yaml).unwrap();
        assert_eq!(cfg.engine.timeout_seconds, Some(30));
        assert_eq!(cfg.engine.max_trace_chars, Some(100));
        assert_eq!(cfg.nodes.len(), 3);
        assert_eq!(cfg.nodes[0].config["total_records"], json!(8));
        assert_eq!(
            cfg.nodes[1].inputs,
            Some(InputsDefinition::Single("source".into()))
        );
        assert_eq!(cfg.nodes[1].output_alias.as_deref(), Some("metrics_latest"));
        assert_eq!(cfg.nodes[2].upstreams(), vec!["source", "metrics"]);
        assert_eq!(cfg.nodes[2].dataset_name, None);
    }

    #[test]
    fn named_inputs_become_port_bindings() {
        let cfg = parse_config(
            r#"
nodes:
  - key: joined
    pipe: join
    upstream: { left: a, right: [b, c] }
"#,
        )
        .unwrap();
        let spec = cfg.nodes[0].to_spec();
        match spec.inputs {
            NodeInputs::Named(ports) => {
                assert_eq!(ports["left"], vec!["a"]);
                assert_eq!(ports["right"], vec!["b", "c"]);
            }
            other => panic!("expected named inputs, got {:?}", other),
        }
    }

    #[test]
    fn engine_section_is_optional() {
        let cfg = parse_config("nodes: []").unwrap();
        assert_eq!(cfg.engine, EngineSection::default());
        assert!(cfg.nodes.is_empty());
    }

    #[test]
    fn load_and_validate_valid_config() {
        let file = write_temp(
            r#"
nodes:
  - key: metrics
    pipe: shape_metrics
    inputs: source
  - key: source
    pipe: customer_source
"#,
        );
        let cfg = load_and_validate_config(file.path()).unwrap();
        assert_eq!(cfg.nodes.len(), 2);
    }

    #[test]
    fn load_and_validate_reports_cycles() {
        let file = write_temp(
            r#"
nodes:
  - key: a
    pipe: passthrough
    inputs: b
  - key: b
    pipe: passthrough
    inputs: a
"#,
        );
        let error_msg = load_and_validate_config(file.path()).unwrap_err().to_string();
        assert!(error_msg.contains("Cyclic dependency detected"));
    }

    #[test]
    fn load_and_validate_reports_every_problem() {
        let file = write_temp(
            r#"
nodes:
  - key: a
    pipe: passthrough
    inputs: nonexistent
  - key: a
    pipe: customer_source
"#,
        );
        let error_msg = load_and_validate_config(file.path()).unwrap_err().to_string();
        assert!(error_msg.contains("Duplicate node key: 'a'"));
        assert!(error_msg.contains("reads from 'nonexistent' which does not exist"));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(load_config("/definitely/not/here.yaml").is_err());
    }
}
