// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Structural validation of graph documents.
//!
//! Checks run in three stages and report every problem they find:
//!
//! 1. **Uniqueness**: node keys are unique
//! 2. **References**: every input names a declared node
//! 3. **Cycles**: DFS with a recursion stack, reporting the cycle path
//!
//! Cycle detection needs a well-formed graph, so it only runs when the first
//! two stages pass.
//!
//! # Example
//! ```rust
//! use blockflow::config::{parse_config, validate_graph_config};
//! use blockflow::errors::ValidationError;
//!
//! let config = parse_config(r#"
//! nodes:
//!   - key: metrics
//!     pipe: shape_metrics
//!     inputs: nonexistent
//! "#).unwrap();
//!
//! let errors = validate_graph_config(&config).unwrap_err();
//! assert!(matches!(
//!     &errors[0],
//!     ValidationError::UnresolvedDependency { node_key, .. } if node_key == "metrics"
//! ));
//! ```

use std::collections::{HashMap, HashSet};

use crate::config::GraphConfig;
use crate::errors::ValidationError;

/// Validate a document's node graph, collecting every problem found.
pub fn validate_graph_config(config: &GraphConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if let Err(duplicate_errors) = validate_unique_node_keys(config) {
        errors.extend(duplicate_errors);
    }

    if let Err(unresolved_errors) = validate_input_references(config) {
        errors.extend(unresolved_errors);
    }

    if errors.is_empty() {
        if let Err(cycle_errors) = validate_acyclic_graph(config) {
            errors.extend(cycle_errors);
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_unique_node_keys(config: &GraphConfig) -> Result<(), Vec<ValidationError>> {
    let mut seen = HashSet::new();
    let errors: Vec<ValidationError> = config
        .nodes
        .iter()
        .filter(|node| !seen.insert(node.key.as_str()))
        .map(|node| ValidationError::DuplicateNodeKey {
            node_key: node.key.clone(),
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_input_references(config: &GraphConfig) -> Result<(), Vec<ValidationError>> {
    let keys: HashSet<&str> = config.nodes.iter().map(|n| n.key.as_str()).collect();
    let mut errors = Vec::new();

    for node in &config.nodes {
        for upstream in node.upstreams() {
            if !keys.contains(upstream) {
                errors.push(ValidationError::UnresolvedDependency {
                    node_key: node.key.clone(),
                    missing_dependency: upstream.to_string(),
                });
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Upstream to dependents adjacency, then DFS from every node in
/// declaration order. The first cycle found is reported.
fn validate_acyclic_graph(config: &GraphConfig) -> Result<(), Vec<ValidationError>> {
    let mut graph: HashMap<&str, Vec<&str>> = HashMap::new();
    for node in &config.nodes {
        graph.insert(node.key.as_str(), Vec::new());
    }
    for node in &config.nodes {
        for upstream in node.upstreams() {
            if let Some(dependents) = graph.get_mut(upstream) {
                dependents.push(node.key.as_str());
            }
        }
    }

    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    for node in &config.nodes {
        if !visited.contains(node.key.as_str()) {
            if let Some(cycle) =
                dfs_cycle_detection(&node.key, &graph, &mut visited, &mut rec_stack, &mut path)
            {
                return Err(vec![ValidationError::CyclicDependency { cycle }]);
            }
        }
    }

    Ok(())
}

/// Three-color DFS. A neighbor still on the recursion stack closes a cycle;
/// the returned path runs from that neighbor back to itself.
fn dfs_cycle_detection<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    visited: &mut HashSet<&'a str>,
    rec_stack: &mut HashSet<&'a str>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    visited.insert(node);
    rec_stack.insert(node);
    path.push(node);

    if let Some(neighbors) = graph.get(node) {
        for &neighbor in neighbors {
            if !visited.contains(neighbor) {
                if let Some(cycle) = dfs_cycle_detection(neighbor, graph, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(neighbor) {
                let start = path.iter().position(|&key| key == neighbor).unwrap_or(0);
                let mut cycle: Vec<String> = path[start..].iter().map(|k| k.to_string()).collect();
                cycle.push(neighbor.to_string());
                return Some(cycle);
            }
        }
    }

    rec_stack.remove(node);
    path.pop();
    None
}
