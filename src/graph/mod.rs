// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Graph model: declared nodes, their resolved interfaces and the derived
//! graph the engine schedules against.
//!
//! Nodes are added one at a time and every upstream must already exist, so a
//! graph built through [`Graph::add_node`] is acyclic by construction. Each
//! call either inserts a fully resolved node or leaves the graph untouched.

mod derive;
mod identity;
mod node;

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

pub use derive::DerivedGraph;
pub use node::{Node, NodeInputs, NodeRole, NodeSpec, PipeRef};

use crate::config::consts::LATEST_SUFFIX;
use crate::environment::Environment;
use crate::errors::GraphError;
use crate::interface::{resolve_interface, ResolvedSchema};
use crate::model::GraphId;
use crate::observability::messages::graph::NodeAdded;
use crate::observability::messages::StructuredLog;

/// A graph of declared nodes bound to one [`Environment`].
#[derive(Debug, Clone)]
pub struct Graph {
    env: Arc<Environment>,
    nodes: Vec<Node>,
    index: HashMap<String, usize>,
}

impl Graph {
    pub fn new(env: Arc<Environment>) -> Self {
        Self {
            env,
            nodes: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn environment(&self) -> &Arc<Environment> {
        &self.env
    }

    /// Validate and insert a node.
    ///
    /// # Errors
    ///
    /// * [`GraphError::DuplicateKey`] when the key is taken
    /// * [`GraphError::UnresolvedPipe`] when the pipe key is not registered
    /// * [`GraphError::InterfaceMismatch`] when inputs don't fit the pipe's ports
    /// * [`GraphError::UnresolvedNode`] when an upstream is not declared yet
    /// * [`GraphError::TypeConflict`] when a generic binds two schemas
    pub fn add_node(&mut self, spec: NodeSpec) -> Result<&Node, GraphError> {
        if self.index.contains_key(&spec.key) {
            return Err(GraphError::DuplicateKey { node_key: spec.key });
        }

        let pipe = match spec.pipe {
            PipeRef::Key(pipe_key) => {
                self.env
                    .pipe(&pipe_key)
                    .ok_or_else(|| GraphError::UnresolvedPipe {
                        node_key: spec.key.clone(),
                        pipe_key,
                    })?
            }
            PipeRef::Inline(pipe) => pipe,
        };

        let inputs = node::assign_inputs(&spec.key, pipe.interface(), &spec.inputs)?;

        let mut upstream_schemas: BTreeMap<String, Vec<ResolvedSchema>> = BTreeMap::new();
        for (port, upstreams) in &inputs {
            for upstream in upstreams {
                let upstream_node = self.node(upstream).ok_or_else(|| GraphError::UnresolvedNode {
                    node_key: spec.key.clone(),
                    upstream: upstream.clone(),
                })?;
                upstream_schemas
                    .entry(port.clone())
                    .or_default()
                    .push(upstream_node.output_schema().clone());
            }
        }

        let resolved = resolve_interface(&spec.key, pipe.interface(), &upstream_schemas)?;
        let produces_dataset = pipe.interface().produces_dataset();
        let dataset_name = match spec.dataset_name {
            Some(name) => Some(name),
            None if produces_dataset => Some(spec.key.clone()),
            None => None,
        };
        let output_alias = spec.output_alias.or_else(|| {
            if produces_dataset {
                dataset_name.clone()
            } else {
                Some(format!("{}{}", spec.key, LATEST_SUFFIX))
            }
        });

        let scope = identity::node_scope(&spec.key, pipe.key(), &inputs);
        let node = Node {
            key: spec.key,
            pipe,
            config: spec.config,
            inputs,
            resolved,
            output_alias,
            dataset_name,
            produces_dataset,
            role: NodeRole::Declared,
            scope,
        };

        NodeAdded {
            node_key: &node.key,
            pipe_key: node.pipe_key(),
            output_schema: node.output_schema().key(),
            produces_dataset,
        }
        .log();

        let position = self.nodes.len();
        self.index.insert(node.key.clone(), position);
        self.nodes.push(node);
        Ok(&self.nodes[position])
    }

    pub fn node(&self, key: &str) -> Option<&Node> {
        self.index.get(key).map(|&i| &self.nodes[i])
    }

    /// Declared nodes in declaration order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Content hash of the declared nodes, configs included. Recorded on
    /// pipe logs; node cursors are keyed by [`Node::scope`] instead.
    pub fn identity(&self) -> GraphId {
        identity::graph_identity(&self.nodes)
    }

    /// Expand dataset nodes into the graph the engine runs.
    pub fn derive(&self) -> Result<DerivedGraph, GraphError> {
        derive::derive(&self.env, self.identity(), &self.nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::stub::{self, noop_pipe, CustomerSource};
    use crate::config::consts::{ACCUMULATOR_PIPE, DEDUPE_PIPE};
    use crate::pipe::Pipe;
    use serde_json::json;

    fn graph() -> Graph {
        Graph::new(Arc::new(stub::test_env(&CustomerSource::default())))
    }

    fn kind(err: &GraphError) -> &'static str {
        match err {
            GraphError::UnresolvedPipe { .. } => "UnresolvedPipe",
            GraphError::DuplicateKey { .. } => "DuplicateKey",
            GraphError::UnresolvedNode { .. } => "UnresolvedNode",
            GraphError::InterfaceMismatch { .. } => "InterfaceMismatch",
            GraphError::TypeConflict { .. } => "TypeConflict",
            GraphError::InvalidAnnotation { .. } => "InvalidAnnotation",
            GraphError::MissingAuxiliaryPipe { .. } => "MissingAuxiliaryPipe",
            GraphError::CyclicDependency { .. } => "CyclicDependency",
        }
    }

    fn concrete(name: &str) -> ResolvedSchema {
        ResolvedSchema::Concrete(name.to_string())
    }

    #[test]
    fn add_node_resolves_generic_output() {
        let mut g = graph();
        g.add_node(NodeSpec::new("source", "customer_source")).unwrap();
        let node = g
            .add_node(NodeSpec::new("copy", "passthrough").upstream("source"))
            .unwrap();
        assert_eq!(node.output_schema(), &concrete("Customer"));
        assert_eq!(node.output_alias(), Some("copy_latest"));
        assert_eq!(node.upstreams(), vec!["source"]);
    }

    #[test]
    fn add_node_rejects_bad_declarations() {
        let mut g = graph();
        g.add_node(NodeSpec::new("source", "customer_source")).unwrap();
        g.add_node(NodeSpec::new("orders", "orders")).unwrap();

        let cases = vec![
            (NodeSpec::new("source", "customer_source"), "DuplicateKey"),
            (NodeSpec::new("x", "no_such_pipe"), "UnresolvedPipe"),
            (NodeSpec::new("x", "passthrough").upstream("ghost"), "UnresolvedNode"),
            (NodeSpec::new("x", "passthrough").upstream("x"), "UnresolvedNode"),
            (NodeSpec::new("x", "join").upstream("source"), "InterfaceMismatch"),
            (
                NodeSpec::new("x", "join")
                    .input("left", "source")
                    .input("right", "orders"),
                "TypeConflict",
            ),
        ];

        for (spec, expected) in cases {
            let key = spec.key.clone();
            let err = g.add_node(spec).unwrap_err();
            assert_eq!(kind(&err), expected, "unexpected error for {}: {}", key, err);
        }
        assert_eq!(g.len(), 2);
        assert!(g.node("x").is_none());
    }

    #[test]
    fn type_conflict_names_both_schemas() {
        let mut g = graph();
        g.add_node(NodeSpec::new("source", "customer_source")).unwrap();
        g.add_node(NodeSpec::new("orders", "orders")).unwrap();
        let err = g
            .add_node(
                NodeSpec::new("x", "join")
                    .input("left", "source")
                    .input("right", "orders"),
            )
            .unwrap_err();
        assert_eq!(
            err,
            GraphError::TypeConflict {
                node_key: "x".into(),
                variable: "T".into(),
                first: "Customer".into(),
                second: "Order".into(),
            }
        );
    }

    #[test]
    fn inline_pipes_are_accepted() {
        let mut g = graph();
        let pipe = noop_pipe("inline_source", &[], Some("DataBlock[Inline]"));
        let node = g.add_node(NodeSpec::new("src", pipe)).unwrap();
        assert_eq!(node.pipe_key(), "inline_source");
        assert_eq!(node.output_schema(), &concrete("Inline"));
    }

    #[test]
    fn identity_tracks_declarations() {
        let mut a = graph();
        let mut b = graph();
        for g in [&mut a, &mut b] {
            g.add_node(NodeSpec::new("source", "customer_source").config_value("total_records", 8))
                .unwrap();
        }
        assert_eq!(a.identity(), b.identity());
        assert_eq!(a.identity().as_str().len(), 64);

        let mut c = graph();
        c.add_node(NodeSpec::new("source", "customer_source").config_value("total_records", 9))
            .unwrap();
        assert_ne!(a.identity(), c.identity());
        // Config is not part of a node's scope.
        assert_eq!(
            a.node("source").unwrap().scope(),
            c.node("source").unwrap().scope()
        );

        c.add_node(NodeSpec::new("metrics", "shape_metrics").upstream("source")).unwrap();
        let derived = c.derive().unwrap();
        assert_eq!(derived.node("source").unwrap().scope(), a.node("source").unwrap().scope());
        assert_ne!(derived.node("metrics").unwrap().scope(), derived.node("source").unwrap().scope());
    }

    #[test]
    fn dataset_nodes_expand_into_accumulator_and_dedupe() {
        let mut g = graph();
        g.add_node(NodeSpec::new("customers", "customer_updates")).unwrap();
        g.add_node(NodeSpec::new("reader", "dataset_reader").upstream("customers"))
            .unwrap();
        g.add_node(NodeSpec::new("raw", "passthrough").upstream("customers"))
            .unwrap();

        let declared = g.node("customers").unwrap();
        assert!(declared.produces_dataset());
        assert_eq!(declared.dataset_name(), Some("customers"));
        assert_eq!(declared.output_alias(), Some("customers"));

        let derived = g.derive().unwrap();
        let keys: Vec<&str> = derived.nodes().iter().map(Node::key).collect();
        assert_eq!(
            keys,
            vec![
                "customers",
                "customers__accumulator",
                "customers__dedupe",
                "reader",
                "raw"
            ]
        );

        let accumulator = derived.node("customers__accumulator").unwrap();
        assert_eq!(accumulator.pipe_key(), ACCUMULATOR_PIPE);
        assert_eq!(accumulator.role(), NodeRole::Accumulator);
        assert_eq!(accumulator.inputs()["input"], vec!["customers".to_string()]);

        let dedupe = derived.node("customers__dedupe").unwrap();
        assert_eq!(dedupe.pipe_key(), DEDUPE_PIPE);
        assert_eq!(dedupe.output_alias(), Some("customers"));
        assert_eq!(dedupe.config()["unique_on"], json!(["id"]));
        assert_eq!(dedupe.output_schema(), &concrete("Customer"));

        assert_eq!(derived.node("customers").unwrap().output_alias(), None);
        assert_eq!(
            derived.node("reader").unwrap().inputs()["input"],
            vec!["customers__dedupe".to_string()]
        );
        assert_eq!(
            derived.node("raw").unwrap().inputs()["input"],
            vec!["customers".to_string()]
        );
        assert_eq!(derived.resolve("customers").unwrap().key(), "customers__dedupe");
        assert_eq!(derived.resolve("reader_latest").unwrap().key(), "reader");
    }

    #[test]
    fn configured_unique_on_wins_and_dataset_name_becomes_alias() {
        let mut g = graph();
        g.add_node(
            NodeSpec::new("customers", "customer_updates")
                .config_value("unique_on", json!(["name"]))
                .dataset_name("crm_customers"),
        )
        .unwrap();
        let derived = g.derive().unwrap();
        let dedupe = derived.node("customers__dedupe").unwrap();
        assert_eq!(dedupe.config()["unique_on"], json!(["name"]));
        assert_eq!(dedupe.output_alias(), Some("crm_customers"));
        assert_eq!(derived.resolve("crm_customers").unwrap().key(), "customers__dedupe");
    }

    #[test]
    fn dataset_without_auxiliary_pipes_fails_to_derive() {
        let mut env = Environment::new();
        env.register_pipe(stub::customer_updates_pipe("customer_updates"));
        let mut g = Graph::new(Arc::new(env));
        g.add_node(NodeSpec::new("customers", "customer_updates")).unwrap();
        assert!(matches!(
            g.derive(),
            Err(GraphError::MissingAuxiliaryPipe { .. })
        ));
    }

    #[test]
    fn derived_key_collisions_are_reported() {
        let mut g = graph();
        g.add_node(NodeSpec::new("customers", "customer_updates")).unwrap();
        g.add_node(NodeSpec::new("customers__dedupe", "customer_source"))
            .unwrap();
        assert!(matches!(
            g.derive(),
            Err(GraphError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn ancestors_are_topologically_ordered_by_position() {
        let mut g = graph();
        g.add_node(NodeSpec::new("b_source", "customer_source")).unwrap();
        g.add_node(NodeSpec::new("a_source", "customer_source")).unwrap();
        g.add_node(
            NodeSpec::new("join", "join")
                .input("left", "a_source")
                .input("right", "b_source"),
        )
        .unwrap();
        g.add_node(NodeSpec::new("unrelated", "orders")).unwrap();
        g.add_node(NodeSpec::new("tail", "passthrough").upstream("join"))
            .unwrap();

        let derived = g.derive().unwrap();
        let order: Vec<&str> = derived
            .ancestors("tail")
            .unwrap()
            .into_iter()
            .map(Node::key)
            .collect();
        assert_eq!(order, vec!["b_source", "a_source", "join", "tail"]);
        assert!(derived.ancestors("missing").unwrap().is_empty());
    }

    #[test]
    fn query_pipes_get_query_auxiliaries() {
        let mut env = stub::test_env(&CustomerSource::default());
        env.register_pipe(Pipe::query(
            "sql_customers",
            stub::interface(&[], Some("DataSet[Customer]")),
            "SELECT * FROM customers",
        ));
        let mut g = Graph::new(Arc::new(env));
        g.add_node(NodeSpec::new("customers", "sql_customers")).unwrap();
        let derived = g.derive().unwrap();
        assert_eq!(
            derived.node("customers__dedupe").unwrap().pipe_key(),
            crate::config::consts::SQL_DEDUPE_PIPE
        );
    }
}
