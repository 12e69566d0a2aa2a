// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed pipe interfaces and generic schema binding.
//!
//! A pipe declares its [`Interface`] once; each node that uses the pipe
//! resolves it against the output schemas of its upstream nodes, producing a
//! [`ResolvedInterface`] with every generic variable bound (or left `Any`).

mod annotation;
mod binding;

pub use annotation::{
    InputPort, Interface, InterfaceBuilder, PortAnnotation, SchemaRef, ShapeClass,
};
pub use binding::{resolve_interface, ResolvedInterface, ResolvedSchema};
