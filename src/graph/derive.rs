// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Dataset expansion and scheduling order.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use super::identity::node_scope;
use super::node::{Node, NodeRole};
use crate::config::consts::{ACCUMULATOR_SUFFIX, DEDUPE_SUFFIX, UNIQUE_ON_KEY};
use crate::environment::Environment;
use crate::errors::GraphError;
use crate::interface::{resolve_interface, ShapeClass};
use crate::model::{GraphId, StateMap};
use crate::pipe::Pipe;

/// The graph the engine schedules: declared nodes plus the accumulator and
/// dedupe nodes inserted for every dataset node.
#[derive(Debug, Clone)]
pub struct DerivedGraph {
    id: GraphId,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl DerivedGraph {
    pub fn id(&self) -> &GraphId {
        &self.id
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn node(&self, key: &str) -> Option<&Node> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    /// Look a node up by output alias, then by key.
    ///
    /// Aliases win so that a dataset's name reaches its deduplicated output
    /// even when the name is the producing node's key.
    pub fn resolve(&self, key_or_alias: &str) -> Option<&Node> {
        self.nodes
            .iter()
            .find(|node| node.output_alias() == Some(key_or_alias))
            .or_else(|| self.node(key_or_alias))
    }

    /// The target and all of its ancestors in topological order, ties broken
    /// by position in the derived graph.
    pub fn ancestors(&self, target: &str) -> Result<Vec<&Node>, GraphError> {
        let Some(&target_index) = self.index.get(target) else {
            return Ok(Vec::new());
        };

        let mut closure: BTreeSet<usize> = BTreeSet::new();
        let mut stack = vec![target_index];
        while let Some(index) = stack.pop() {
            if !closure.insert(index) {
                continue;
            }
            for upstream in self.nodes[index].upstreams() {
                if let Some(&up) = self.index.get(upstream) {
                    stack.push(up);
                }
            }
        }

        let mut in_degree: HashMap<usize, usize> = HashMap::new();
        let mut dependents: HashMap<usize, Vec<usize>> = HashMap::new();
        for &index in &closure {
            let upstreams: Vec<usize> = self.nodes[index]
                .upstreams()
                .into_iter()
                .filter_map(|key| self.index.get(key).copied())
                .collect();
            in_degree.insert(index, upstreams.len());
            for up in upstreams {
                dependents.entry(up).or_default().push(index);
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .map(|(&index, _)| index)
            .collect();
        let mut order = Vec::with_capacity(closure.len());
        while let Some(index) = ready.pop_first() {
            order.push(&self.nodes[index]);
            for &dependent in dependents.get(&index).map(Vec::as_slice).unwrap_or(&[]) {
                if let Some(degree) = in_degree.get_mut(&dependent) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() != closure.len() {
            let ordered: HashSet<&str> = order.iter().map(|node| node.key()).collect();
            let nodes = closure
                .iter()
                .map(|&i| self.nodes[i].key().to_string())
                .filter(|key| !ordered.contains(key.as_str()))
                .collect();
            return Err(GraphError::CyclicDependency { nodes });
        }
        Ok(order)
    }
}

fn unique_on_for(env: &Environment, node: &Node) -> Option<Value> {
    if let Some(configured) = node.config.get(UNIQUE_ON_KEY) {
        return Some(configured.clone());
    }
    let schema = env.schema(node.output_schema().concrete()?)?;
    if schema.unique_on.is_empty() {
        return None;
    }
    Some(Value::from(schema.unique_on.clone()))
}

fn auxiliary_node(
    key: String,
    pipe: Arc<Pipe>,
    upstream: &Node,
    config: StateMap,
    output_alias: Option<String>,
    role: NodeRole,
) -> Result<Node, GraphError> {
    let port = pipe
        .interface()
        .upstream_ports()
        .next()
        .ok_or_else(|| GraphError::mismatch(&key, "auxiliary pipe declares no input port"))?
        .name
        .clone();
    let schemas = BTreeMap::from([(port.clone(), vec![upstream.output_schema().clone()])]);
    let resolved = resolve_interface(&key, pipe.interface(), &schemas)?;
    let inputs = BTreeMap::from([(port, vec![upstream.key.clone()])]);
    let scope = node_scope(&key, pipe.key(), &inputs);
    Ok(Node {
        inputs,
        scope,
        key,
        pipe,
        config,
        resolved,
        output_alias,
        dataset_name: None,
        produces_dataset: false,
        role,
    })
}

/// Expand dataset nodes and rewire dataset-shaped inputs to their dedupe nodes.
pub(crate) fn derive(
    env: &Environment,
    id: GraphId,
    declared: &[Node],
) -> Result<DerivedGraph, GraphError> {
    let dataset_keys: HashSet<&str> = declared
        .iter()
        .filter(|node| node.produces_dataset)
        .map(|node| node.key.as_str())
        .collect();

    let mut nodes: Vec<Node> = Vec::with_capacity(declared.len());
    for node in declared {
        let mut derived = node.clone();
        for (port, upstreams) in derived.inputs.iter_mut() {
            let reads_dataset = node
                .interface()
                .port(port)
                .is_some_and(|p| p.annotation.shape == ShapeClass::DataSet);
            if !reads_dataset {
                continue;
            }
            for upstream in upstreams.iter_mut() {
                if dataset_keys.contains(upstream.as_str()) {
                    *upstream = format!("{}{}", upstream, DEDUPE_SUFFIX);
                }
            }
        }

        if !node.produces_dataset {
            nodes.push(derived);
            continue;
        }

        let runtime = node.pipe.runtime_class();
        let auxiliary = env
            .auxiliary_for(runtime)
            .ok_or_else(|| GraphError::MissingAuxiliaryPipe {
                node_key: node.key.clone(),
                runtime: runtime.to_string(),
            })?;
        let accumulator_key = format!("{}{}", node.key, ACCUMULATOR_SUFFIX);
        let dedupe_key = format!("{}{}", node.key, DEDUPE_SUFFIX);
        let accumulator_pipe =
            env.pipe(&auxiliary.accumulator)
                .ok_or_else(|| GraphError::UnresolvedPipe {
                    node_key: accumulator_key.clone(),
                    pipe_key: auxiliary.accumulator.clone(),
                })?;
        let dedupe_pipe = env
            .pipe(&auxiliary.dedupe)
            .ok_or_else(|| GraphError::UnresolvedPipe {
                node_key: dedupe_key.clone(),
                pipe_key: auxiliary.dedupe.clone(),
            })?;

        let accumulator = auxiliary_node(
            accumulator_key,
            accumulator_pipe,
            node,
            StateMap::new(),
            None,
            NodeRole::Accumulator,
        )?;
        let mut dedupe_config = StateMap::new();
        if let Some(unique_on) = unique_on_for(env, node) {
            dedupe_config.insert(UNIQUE_ON_KEY.to_string(), unique_on);
        }
        let dedupe = auxiliary_node(
            dedupe_key,
            dedupe_pipe,
            &accumulator,
            dedupe_config,
            derived.output_alias.take(),
            NodeRole::Dedupe,
        )?;

        nodes.push(derived);
        nodes.push(accumulator);
        nodes.push(dedupe);
    }

    let mut index = HashMap::with_capacity(nodes.len());
    for (position, node) in nodes.iter().enumerate() {
        if index.insert(node.key.clone(), position).is_some() {
            return Err(GraphError::DuplicateKey {
                node_key: node.key.clone(),
            });
        }
    }

    Ok(DerivedGraph { id, nodes, index })
}
