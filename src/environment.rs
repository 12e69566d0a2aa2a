// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Pipe and schema registry shared by the graphs built against it.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::backends::core;
use crate::errors::GraphError;
use crate::model::Records;
use crate::pipe::{Pipe, RuntimeClass};

/// A column of a registered schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    #[serde(default)]
    pub data_type: Option<String>,
}

impl Field {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: None,
        }
    }

    pub fn typed(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: Some(data_type.into()),
        }
    }
}

/// A named record layout, optionally with a unique key used to dedupe datasets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub name: String,
    pub fields: Vec<Field>,
    #[serde(default)]
    pub unique_on: Vec<String>,
}

impl Schema {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            fields,
            unique_on: Vec::new(),
        }
    }

    pub fn unique_on<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_on = columns.into_iter().map(Into::into).collect();
        self
    }

    /// True when every record carries every field of the schema.
    pub fn realized_by(&self, records: &Records) -> bool {
        records.iter().all(|record| {
            self.fields
                .iter()
                .all(|field| record.contains_key(&field.name))
        })
    }
}

/// Keys of the accumulator and dedupe pipes inserted for dataset nodes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuxiliaryPipes {
    pub accumulator: String,
    pub dedupe: String,
}

/// Registry of pipes, schemas and the auxiliary pipe table.
///
/// Built once and shared as `Arc<Environment>` by every graph that uses it.
#[derive(Default)]
pub struct Environment {
    pipes: HashMap<String, Arc<Pipe>>,
    schemas: HashMap<String, Schema>,
    auxiliary: HashMap<RuntimeClass, AuxiliaryPipes>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// An environment with the built-in accumulator and dedupe pipes registered
    /// for both runtime classes.
    pub fn with_core_pipes() -> Result<Self, GraphError> {
        let mut env = Self::new();
        core::register_core_pipes(&mut env)?;
        Ok(env)
    }

    /// Register a pipe, replacing any pipe with the same key.
    pub fn register_pipe(&mut self, pipe: Pipe) -> Option<Arc<Pipe>> {
        self.pipes.insert(pipe.key().to_string(), Arc::new(pipe))
    }

    pub fn pipe(&self, key: &str) -> Option<Arc<Pipe>> {
        self.pipes.get(key).cloned()
    }

    pub fn pipe_keys(&self) -> impl Iterator<Item = &str> {
        self.pipes.keys().map(String::as_str)
    }

    pub fn register_schema(&mut self, schema: Schema) -> Option<Schema> {
        self.schemas.insert(schema.name.clone(), schema)
    }

    pub fn schema(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn register_auxiliary(&mut self, runtime: RuntimeClass, pipes: AuxiliaryPipes) {
        self.auxiliary.insert(runtime, pipes);
    }

    pub fn auxiliary_for(&self, runtime: RuntimeClass) -> Option<&AuxiliaryPipes> {
        self.auxiliary.get(&runtime)
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut pipe_keys: Vec<_> = self.pipes.keys().collect();
        pipe_keys.sort();
        let mut schema_names: Vec<_> = self.schemas.keys().collect();
        schema_names.sort();
        f.debug_struct("Environment")
            .field("pipes", &pipe_keys)
            .field("schemas", &schema_names)
            .field("auxiliary", &self.auxiliary)
            .finish()
    }
}
