// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod builder;
mod dependency_graph;
mod loader;
mod validation;

pub mod consts;

pub use builder::build_graph;
pub use dependency_graph::DependencyGraph;
pub use loader::{
    load_and_validate_config, load_config, parse_config, EngineSection, GraphConfig,
    InputsDefinition, NodeDefinition, OneOrMany,
};
pub use validation::validate_graph_config;
