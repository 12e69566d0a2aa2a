// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::time::Duration;

use crate::config::consts::DEFAULT_MAX_TRACE_CHARS;
use crate::config::EngineSection;

/// Tunables for an [`Engine`](super::Engine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Time budget for one produce call; `None` means unbounded
    pub timeout: Option<Duration>,
    /// Longest error trace stored on a pipe log
    pub max_trace_chars: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            max_trace_chars: DEFAULT_MAX_TRACE_CHARS,
        }
    }
}

impl EngineOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

impl From<&EngineSection> for EngineOptions {
    fn from(section: &EngineSection) -> Self {
        Self {
            timeout: section.timeout_seconds.map(Duration::from_secs),
            max_trace_chars: section.max_trace_chars.unwrap_or(DEFAULT_MAX_TRACE_CHARS),
        }
    }
}
