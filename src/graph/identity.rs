// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::fmt::Write;

use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};

use super::Node;
use crate::model::{GraphId, NodeScope};

/// Re-emit `value` with object keys sorted at every level.
fn canonical(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonical(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonical).collect()),
        other => other.clone(),
    }
}

/// SHA-256 over the declared nodes, in declaration order.
pub(crate) fn graph_identity(nodes: &[Node]) -> GraphId {
    let mut hasher = Sha256::new();
    for node in nodes {
        let entry = json!({
            "key": node.key,
            "pipe": node.pipe_key(),
            "config": canonical(&Value::Object(node.config.clone())),
            "inputs": node.inputs,
            "alias": node.output_alias,
            "dataset": node.dataset_name,
        });
        hasher.update(canonical(&entry).to_string().as_bytes());
        hasher.update(b"\n");
    }
    GraphId::new(hex_digest(hasher))
}

/// SHA-256 over a node's key, pipe and input bindings. Config is left out.
pub(crate) fn node_scope(key: &str, pipe_key: &str, inputs: &BTreeMap<String, Vec<String>>) -> NodeScope {
    let entry = json!({
        "key": key,
        "pipe": pipe_key,
        "inputs": inputs,
    });
    let mut hasher = Sha256::new();
    hasher.update(canonical(&entry).to_string().as_bytes());
    NodeScope::new(hex_digest(hasher))
}

fn hex_digest(hasher: Sha256) -> String {
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{:02x}", byte);
    }
    hex
}
