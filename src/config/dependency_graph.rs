// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::{BTreeSet, HashMap};

use super::GraphConfig;

/// Node key to the keys of the nodes that read from it.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    order: Vec<String>,
    dependents: HashMap<String, Vec<String>>,
}

impl DependencyGraph {
    /// Build from a document. Inputs naming undeclared nodes are ignored.
    pub fn from_config(config: &GraphConfig) -> Self {
        let mut graph = Self::default();
        for node in &config.nodes {
            if !graph.dependents.contains_key(&node.key) {
                graph.order.push(node.key.clone());
                graph.dependents.insert(node.key.clone(), Vec::new());
            }
        }
        for node in &config.nodes {
            for upstream in node.upstreams() {
                if let Some(dependents) = graph.dependents.get_mut(upstream) {
                    if !dependents.contains(&node.key) {
                        dependents.push(node.key.clone());
                    }
                }
            }
        }
        graph
    }

    /// Nodes reading from `key`
    pub fn dependents(&self, key: &str) -> Option<&Vec<String>> {
        self.dependents.get(key)
    }

    /// Node keys in declaration order
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.order.iter()
    }

    /// Upstream-first order with ties broken by declaration order, or `None`
    /// when the graph has a cycle.
    pub fn topological_order(&self) -> Option<Vec<String>> {
        let position: HashMap<&str, usize> = self
            .order
            .iter()
            .enumerate()
            .map(|(i, key)| (key.as_str(), i))
            .collect();

        let mut in_degree: HashMap<&str, usize> =
            self.order.iter().map(|key| (key.as_str(), 0)).collect();
        for dependents in self.dependents.values() {
            for dependent in dependents {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree += 1;
                }
            }
        }

        let mut ready: BTreeSet<usize> = in_degree
            .iter()
            .filter(|(_, &degree)| degree == 0)
            .filter_map(|(key, _)| position.get(key).copied())
            .collect();
        let mut sorted = Vec::with_capacity(self.order.len());
        while let Some(next) = ready.pop_first() {
            let key = &self.order[next];
            sorted.push(key.clone());
            for dependent in self.dependents.get(key).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(dependent.as_str()) {
                    *degree -= 1;
                    if *degree == 0 {
                        if let Some(&p) = position.get(dependent.as_str()) {
                            ready.insert(p);
                        }
                    }
                }
            }
        }

        (sorted.len() == self.order.len()).then_some(sorted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    #[test]
    fn orders_upstream_first() {
        let config = parse_config(
            r#"
nodes:
  - key: report
    pipe: join
    inputs: { left: clean, right: raw }
  - key: clean
    pipe: passthrough
    inputs: raw
  - key: raw
    pipe: customer_source
"#,
        )
        .unwrap();
        let graph = DependencyGraph::from_config(&config);
        assert_eq!(
            graph.topological_order().unwrap(),
            vec!["raw", "clean", "report"]
        );
        assert_eq!(graph.dependents("raw").unwrap(), &vec!["report", "clean"]);
        assert_eq!(graph.keys().count(), 3);
    }

    #[test]
    fn cycles_have_no_order() {
        let config = parse_config(
            r#"
nodes:
  - key: a
    pipe: passthrough
    inputs: b
  - key: b
    pipe: passthrough
    inputs: a
"#,
        )
        .unwrap();
        assert!(DependencyGraph::from_config(&config).topological_order().is_none());
    }
}
