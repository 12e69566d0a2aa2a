// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::fmt;
use std::sync::Arc;

use crate::interface::Interface;
use crate::traits::PipeFunction;

/// Runtime family of a pipe; selects compatible auxiliary pipes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeClass {
    Native,
    Query,
}

impl RuntimeClass {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            RuntimeClass::Native => "native",
            RuntimeClass::Query => "query",
        }
    }
}

impl fmt::Display for RuntimeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a pipe is executed.
#[derive(Clone)]
pub enum PipeImpl {
    Native(Arc<dyn PipeFunction>),
    /// Query text run by the engine's query runtime
    Query(String),
}

/// A named transformation unit with a declared interface.
#[derive(Clone)]
pub struct Pipe {
    key: String,
    interface: Interface,
    implementation: PipeImpl,
}

impl Pipe {
    pub fn native(key: impl Into<String>, interface: Interface, function: Arc<dyn PipeFunction>) -> Self {
        Self {
            key: key.into(),
            interface,
            implementation: PipeImpl::Native(function),
        }
    }

    pub fn query(key: impl Into<String>, interface: Interface, query: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            interface,
            implementation: PipeImpl::Query(query.into()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn interface(&self) -> &Interface {
        &self.interface
    }

    pub fn implementation(&self) -> &PipeImpl {
        &self.implementation
    }

    pub fn runtime_class(&self) -> RuntimeClass {
        match self.implementation {
            PipeImpl::Native(_) => RuntimeClass::Native,
            PipeImpl::Query(_) => RuntimeClass::Query,
        }
    }

    /// Reference recorded on pipe logs: runtime class and pipe key.
    pub fn runtime_ref(&self) -> String {
        format!("{}:{}", self.runtime_class(), self.key)
    }
}

impl fmt::Debug for Pipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipe")
            .field("key", &self.key)
            .field("runtime", &self.runtime_class())
            .field("interface", &self.interface)
            .finish()
    }
}
