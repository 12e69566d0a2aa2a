// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::collections::HashMap;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use serde_json::Value;

use super::INPUT_PORT;
use crate::backends::native::Batches;
use crate::config::consts::UNIQUE_ON_KEY;
use crate::engine::PipeContext;
use crate::model::{Record, Records};
use crate::traits::{Batch, BatchCursor, PipeFunction, PipeInputs};

/// Keeps the newest row per unique key of its input block.
#[derive(Debug, Default, Clone, Copy)]
pub struct DedupeKeepNewest;

fn unique_on(ctx: &PipeContext) -> anyhow::Result<Vec<String>> {
    match ctx.config_value(UNIQUE_ON_KEY) {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::String(column)) => Ok(vec![column.clone()]),
        Some(Value::Array(columns)) => columns
            .iter()
            .map(|column| {
                column
                    .as_str()
                    .map(str::to_string)
                    .ok_or_else(|| anyhow!("'{}' entries must be strings", UNIQUE_ON_KEY))
            })
            .collect(),
        Some(other) => Err(anyhow!(
            "'{}' must be a string or a list of strings, got {}",
            UNIQUE_ON_KEY,
            other
        )),
    }
}

fn row_key(record: &Record, unique_on: &[String]) -> String {
    if unique_on.is_empty() {
        return Value::Object(record.clone()).to_string();
    }
    let key: Vec<&Value> = unique_on
        .iter()
        .map(|column| record.get(column).unwrap_or(&Value::Null))
        .collect();
    serde_json::to_string(&key).unwrap_or_default()
}

/// Collapse rows sharing a key onto the position of their first occurrence,
/// keeping the values of the last one. With no key columns whole rows are compared.
pub fn dedupe_keep_newest(records: Records, unique_on: &[String]) -> Records {
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut kept: Records = Vec::with_capacity(records.len());
    for record in records {
        let key = row_key(&record, unique_on);
        match positions.get(&key) {
            Some(&index) => kept[index] = record,
            None => {
                positions.insert(key, kept.len());
                kept.push(record);
            }
        }
    }
    kept
}

#[async_trait]
impl PipeFunction for DedupeKeepNewest {
    async fn open(
        &self,
        inputs: PipeInputs,
        ctx: &mut PipeContext,
    ) -> anyhow::Result<Box<dyn BatchCursor>> {
        let columns = unique_on(ctx).context("invalid dedupe configuration")?;
        let records = inputs
            .records(INPUT_PORT)?
            .ok_or_else(|| anyhow!("dedupe expects a block on port '{}'", INPUT_PORT))?;
        Ok(Box::new(Batches::new([Batch::new(dedupe_keep_newest(
            records, &columns,
        ))])))
    }
}
