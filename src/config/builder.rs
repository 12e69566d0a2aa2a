// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::sync::Arc;

use crate::config::{validate_graph_config, DependencyGraph, GraphConfig};
use crate::environment::Environment;
use crate::graph::Graph;

/// Build a [`Graph`] from a document, inserting nodes upstream first so
/// documents may declare them in any order.
///
/// Structural problems are reported together, as by
/// [`load_and_validate_config`](super::load_and_validate_config); binding
/// errors surface as the first [`GraphError`](crate::errors::GraphError).
pub fn build_graph(
    env: Arc<Environment>,
    config: &GraphConfig,
) -> Result<Graph, Box<dyn std::error::Error>> {
    if let Err(errors) = validate_graph_config(config) {
        let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
        return Err(format!("Configuration validation failed:\n{}", messages.join("\n")).into());
    }

    let order = DependencyGraph::from_config(config)
        .topological_order()
        .ok_or("Configuration validation failed: cyclic dependency")?;

    let mut graph = Graph::new(env);
    for key in order {
        if let Some(node) = config.nodes.iter().find(|node| node.key == key) {
            graph.add_node(node.to_spec())?;
        }
    }
    Ok(graph)
}
