// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use crate::errors::GraphError;
use crate::interface::{Interface, ResolvedInterface, ResolvedSchema};
use crate::model::{NodeScope, StateMap};
use crate::pipe::Pipe;

/// How a node names its pipe.
#[derive(Debug, Clone)]
pub enum PipeRef {
    /// Looked up in the environment
    Key(String),
    /// Used as given
    Inline(Arc<Pipe>),
}

impl From<&str> for PipeRef {
    fn from(key: &str) -> Self {
        PipeRef::Key(key.to_string())
    }
}

impl From<String> for PipeRef {
    fn from(key: String) -> Self {
        PipeRef::Key(key)
    }
}

impl From<Pipe> for PipeRef {
    fn from(pipe: Pipe) -> Self {
        PipeRef::Inline(Arc::new(pipe))
    }
}

impl From<Arc<Pipe>> for PipeRef {
    fn from(pipe: Arc<Pipe>) -> Self {
        PipeRef::Inline(pipe)
    }
}

/// Upstream bindings as declared by the caller.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum NodeInputs {
    #[default]
    None,
    /// One upstream, bound to the pipe's only input port
    Single(String),
    /// Port name to upstream node keys
    Named(BTreeMap<String, Vec<String>>),
}

/// Declaration of a node, validated by [`Graph::add_node`](super::Graph::add_node).
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub key: String,
    pub pipe: PipeRef,
    pub config: StateMap,
    pub inputs: NodeInputs,
    pub output_alias: Option<String>,
    pub dataset_name: Option<String>,
}

impl NodeSpec {
    pub fn new(key: impl Into<String>, pipe: impl Into<PipeRef>) -> Self {
        Self {
            key: key.into(),
            pipe: pipe.into(),
            config: StateMap::new(),
            inputs: NodeInputs::None,
            output_alias: None,
            dataset_name: None,
        }
    }

    pub fn config(mut self, config: StateMap) -> Self {
        self.config = config;
        self
    }

    pub fn config_value(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.config.insert(key.into(), value.into());
        self
    }

    /// Read from one upstream through the pipe's only input port.
    pub fn upstream(mut self, key: impl Into<String>) -> Self {
        self.inputs = NodeInputs::Single(key.into());
        self
    }

    /// Bind `upstream` to `port`; repeated calls on one port build a variadic binding.
    /// Replaces a previous [`NodeSpec::upstream`] binding.
    pub fn input(mut self, port: impl Into<String>, upstream: impl Into<String>) -> Self {
        let mut named = match self.inputs {
            NodeInputs::Named(named) => named,
            _ => BTreeMap::new(),
        };
        named.entry(port.into()).or_default().push(upstream.into());
        self.inputs = NodeInputs::Named(named);
        self
    }

    pub fn output_alias(mut self, alias: impl Into<String>) -> Self {
        self.output_alias = Some(alias.into());
        self
    }

    pub fn dataset_name(mut self, name: impl Into<String>) -> Self {
        self.dataset_name = Some(name.into());
        self
    }
}

/// Where a node in the derived graph came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRole {
    Declared,
    Accumulator,
    Dedupe,
}

/// A validated node with its interface resolved.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) key: String,
    pub(crate) pipe: Arc<Pipe>,
    pub(crate) config: StateMap,
    pub(crate) inputs: BTreeMap<String, Vec<String>>,
    pub(crate) resolved: ResolvedInterface,
    pub(crate) output_alias: Option<String>,
    pub(crate) dataset_name: Option<String>,
    pub(crate) produces_dataset: bool,
    pub(crate) role: NodeRole,
    pub(crate) scope: NodeScope,
}

impl Node {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn pipe(&self) -> &Arc<Pipe> {
        &self.pipe
    }

    pub fn pipe_key(&self) -> &str {
        self.pipe.key()
    }

    pub fn interface(&self) -> &Interface {
        self.pipe.interface()
    }

    pub fn config(&self) -> &StateMap {
        &self.config
    }

    /// Bound input ports and their upstream node keys.
    pub fn inputs(&self) -> &BTreeMap<String, Vec<String>> {
        &self.inputs
    }

    /// Distinct upstream node keys.
    pub fn upstreams(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = Vec::new();
        for key in self.inputs.values().flatten() {
            if !keys.contains(&key.as_str()) {
                keys.push(key.as_str());
            }
        }
        keys
    }

    pub fn resolved(&self) -> &ResolvedInterface {
        &self.resolved
    }

    pub fn output_schema(&self) -> &ResolvedSchema {
        &self.resolved.output
    }

    pub fn output_alias(&self) -> Option<&str> {
        self.output_alias.as_deref()
    }

    pub fn dataset_name(&self) -> Option<&str> {
        self.dataset_name.as_deref()
    }

    pub fn produces_dataset(&self) -> bool {
        self.produces_dataset
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }

    /// Key under which the store keeps this node's checkpoint and lineage.
    pub fn scope(&self) -> &NodeScope {
        &self.scope
    }
}

/// Match declared inputs to the pipe's ports.
pub(crate) fn assign_inputs(
    node_key: &str,
    interface: &Interface,
    inputs: &NodeInputs,
) -> Result<BTreeMap<String, Vec<String>>, GraphError> {
    let mut bound: BTreeMap<String, Vec<String>> = BTreeMap::new();

    match inputs {
        NodeInputs::None => {}
        NodeInputs::Single(upstream) => {
            let ports: Vec<_> = interface.upstream_ports().collect();
            let [port] = ports.as_slice() else {
                return Err(GraphError::mismatch(
                    node_key,
                    format!(
                        "a single upstream needs exactly one input port, the pipe declares {}",
                        ports.len()
                    ),
                ));
            };
            bound.insert(port.name.clone(), vec![upstream.clone()]);
        }
        NodeInputs::Named(named) => {
            for (port_name, upstreams) in named {
                let Some(port) = interface.port(port_name) else {
                    return Err(GraphError::mismatch(
                        node_key,
                        format!("unknown input port '{}'", port_name),
                    ));
                };
                if port.annotation.self_ref {
                    return Err(GraphError::mismatch(
                        node_key,
                        format!("port '{}' always reads the node's own output", port_name),
                    ));
                }
                if upstreams.is_empty() {
                    return Err(GraphError::mismatch(
                        node_key,
                        format!("port '{}' lists no upstream nodes", port_name),
                    ));
                }
                if !port.annotation.variadic && upstreams.len() > 1 {
                    return Err(GraphError::mismatch(
                        node_key,
                        format!(
                            "port '{}' accepts one upstream, got {}",
                            port_name,
                            upstreams.len()
                        ),
                    ));
                }
                bound.insert(port_name.clone(), upstreams.clone());
            }
        }
    }

    for port in interface.upstream_ports() {
        if !port.annotation.optional && !bound.contains_key(&port.name) {
            return Err(GraphError::mismatch(
                node_key,
                format!("required port '{}' is not bound", port.name),
            ));
        }
    }

    Ok(bound)
}
