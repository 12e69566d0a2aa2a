// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::BTreeMap;
use std::fmt;

use super::{Interface, SchemaRef};
use crate::config::consts::ANY_SCHEMA;
use crate::errors::GraphError;

/// A schema after generic substitution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResolvedSchema {
    Concrete(String),
    Any,
}

impl ResolvedSchema {
    /// Key recorded on blocks: the schema name, or `Any`.
    pub fn key(&self) -> &str {
        match self {
            ResolvedSchema::Concrete(name) => name,
            ResolvedSchema::Any => ANY_SCHEMA,
        }
    }

    pub fn concrete(&self) -> Option<&str> {
        match self {
            ResolvedSchema::Concrete(name) => Some(name),
            ResolvedSchema::Any => None,
        }
    }
}

impl fmt::Display for ResolvedSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// The interface of one node with every generic variable substituted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedInterface {
    /// Generic variable to concrete schema name
    pub bindings: BTreeMap<String, String>,
    /// Resolved schema per input port, including `this`
    pub inputs: BTreeMap<String, ResolvedSchema>,
    pub output: ResolvedSchema,
}

/// Bind the generic variables of `interface` for one node.
///
/// `upstream_schemas` maps each bound, non-self port to the resolved output
/// schemas of its upstream nodes, in binding order. `Any` schemas never bind a
/// variable; two different concrete schemas for one variable are a
/// [`GraphError::TypeConflict`].
pub fn resolve_interface(
    node_key: &str,
    interface: &Interface,
    upstream_schemas: &BTreeMap<String, Vec<ResolvedSchema>>,
) -> Result<ResolvedInterface, GraphError> {
    let mut bindings: BTreeMap<String, String> = BTreeMap::new();

    for port in interface.upstream_ports() {
        let SchemaRef::Generic(variable) = &port.annotation.schema else {
            continue;
        };
        let schemas = upstream_schemas.get(&port.name).map(Vec::as_slice).unwrap_or(&[]);
        for schema in schemas.iter().filter_map(ResolvedSchema::concrete) {
            match bindings.get(variable) {
                Some(first) if first != schema => {
                    return Err(GraphError::TypeConflict {
                        node_key: node_key.to_string(),
                        variable: variable.clone(),
                        first: first.clone(),
                        second: schema.to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    bindings.insert(variable.clone(), schema.to_string());
                }
            }
        }
    }

    let substitute = |schema: &SchemaRef| match schema {
        SchemaRef::Concrete(name) => ResolvedSchema::Concrete(name.clone()),
        SchemaRef::Generic(variable) => bindings
            .get(variable)
            .map_or(ResolvedSchema::Any, |name| ResolvedSchema::Concrete(name.clone())),
        SchemaRef::Any => ResolvedSchema::Any,
    };

    let output = interface
        .output()
        .map_or(ResolvedSchema::Any, |port| substitute(&port.schema));

    let inputs = interface
        .inputs()
        .iter()
        .map(|port| {
            let schema = if port.annotation.self_ref {
                output.clone()
            } else {
                substitute(&port.annotation.schema)
            };
            (port.name.clone(), schema)
        })
        .collect();

    Ok(ResolvedInterface {
        bindings,
        inputs,
        output,
    })
}
