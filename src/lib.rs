// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Incremental pipeline engine: a graph of pipes over immutable data blocks.
//!
//! Every node keeps a durable cursor in a metadata store, so producing a node
//! again only processes blocks it has not consumed yet. Progress is committed
//! per batch and failures are recorded on the node's pipe log.
//!
//! ```no_run
//! use std::sync::Arc;
//! use blockflow::backends::native_fn;
//! use blockflow::interface::Interface;
//! use blockflow::traits::Batch;
//! use blockflow::{Engine, Environment, Graph, NodeSpec, Pipe};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut env = Environment::with_core_pipes()?;
//! env.register_pipe(Pipe::native(
//!     "hello",
//!     Interface::builder().output("DataBlock").build()?,
//!     native_fn(|_inputs, _ctx| Ok(vec![Batch::default()])),
//! ));
//! let mut graph = Graph::new(Arc::new(env));
//! graph.add_node(NodeSpec::new("greeting", "hello"))?;
//!
//! let engine = Engine::in_memory()?;
//! let outcome = engine.produce(&graph, "greeting").await?;
//! println!("{:?}", outcome.output);
//! # Ok(())
//! # }
//! ```

pub mod backends;      // native pipe helpers and the auxiliary pipes
pub mod config;        // YAML graph documents
pub mod engine;        // produce / checkpoint engine
pub mod environment;   // pipe + schema registry
pub mod errors;        // error handling
pub mod graph;         // node declarations and the derived graph
pub mod interface;     // port annotations and generic binding
pub mod model;         // blocks, logs, ids
pub mod observability;
pub mod pipe;
pub mod storage;       // metadata store and block storage
pub mod stream;
pub mod traits;        // pipe execution seams

pub use engine::{Engine, EngineOptions, PipeContext, ProduceOutcome};
pub use environment::{Environment, Schema};
pub use graph::{Graph, NodeSpec};
pub use pipe::Pipe;
