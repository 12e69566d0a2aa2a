// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde_json::Value;

use crate::model::StateMap;

/// Execution context handed to a pipe: node identity, configuration and the
/// node's checkpoint state.
///
/// State written here is made durable with the next commit (after the next
/// batch, at the end of the invocation, or when the pipe fails).
#[derive(Debug, Clone)]
pub struct PipeContext {
    node_key: String,
    pipe_key: String,
    config: StateMap,
    state: StateMap,
    dirty: bool,
}

impl PipeContext {
    pub fn new(
        node_key: impl Into<String>,
        pipe_key: impl Into<String>,
        config: StateMap,
        state: StateMap,
    ) -> Self {
        Self {
            node_key: node_key.into(),
            pipe_key: pipe_key.into(),
            config,
            state,
            dirty: false,
        }
    }

    pub fn node_key(&self) -> &str {
        &self.node_key
    }

    pub fn pipe_key(&self) -> &str {
        &self.pipe_key
    }

    pub fn config(&self) -> &StateMap {
        &self.config
    }

    pub fn config_value(&self, key: &str) -> Option<&Value> {
        self.config.get(key)
    }

    pub fn config_u64(&self, key: &str) -> Option<u64> {
        self.config.get(key).and_then(Value::as_u64)
    }

    pub fn config_bool(&self, key: &str) -> Option<bool> {
        self.config.get(key).and_then(Value::as_bool)
    }

    pub fn state(&self) -> &StateMap {
        &self.state
    }

    pub fn state_value(&self, key: &str) -> Option<&Value> {
        self.state.get(key)
    }

    pub fn state_u64(&self, key: &str) -> Option<u64> {
        self.state.get(key).and_then(Value::as_u64)
    }

    /// Set one checkpoint value. Writing an identical value leaves the state clean.
    pub fn set_state(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if self.state.get(&key) != Some(&value) {
            self.state.insert(key, value);
            self.dirty = true;
        }
    }

    /// Replace the whole checkpoint.
    pub fn replace_state(&mut self, state: StateMap) {
        if self.state != state {
            self.state = state;
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag, returning whether state changed since the last call.
    pub(crate) fn take_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx() -> PipeContext {
        PipeContext::new(
            "source",
            "customer_source",
            json!({"total_records": 8}).as_object().unwrap().clone(),
            StateMap::new(),
        )
    }

    #[test]
    fn config_accessors() {
        let ctx = ctx();
        assert_eq!(ctx.config_u64("total_records"), Some(8));
        assert_eq!(ctx.config_bool("fail"), None);
        assert_eq!(ctx.node_key(), "source");
        assert_eq!(ctx.pipe_key(), "customer_source");
    }

    #[test]
    fn state_changes_mark_context_dirty() {
        let mut ctx = ctx();
        assert!(!ctx.is_dirty());
        ctx.set_state("records_extracted", 2);
        assert!(ctx.take_dirty());
        assert!(!ctx.is_dirty());

        ctx.set_state("records_extracted", 2);
        assert!(!ctx.is_dirty());
        assert_eq!(ctx.state_u64("records_extracted"), Some(2));

        ctx.replace_state(StateMap::new());
        assert!(ctx.take_dirty());
        assert!(ctx.state().is_empty());
    }
}
