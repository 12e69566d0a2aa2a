// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Runs a small graph several times against one in-memory store and prints
//! what each produce call did, then the full lineage.
//!
//! ```text
//! RUST_LOG=blockflow=debug cargo run --example incremental_demo
//! ```

use std::sync::Arc;

use blockflow::backends::native_fn;
use blockflow::environment::Field;
use blockflow::interface::Interface;
use blockflow::model::Record;
use blockflow::observability::init_tracing;
use blockflow::traits::Batch;
use blockflow::{Engine, Environment, Graph, NodeSpec, Pipe, Schema};
use serde_json::{json, Value};

const TOTAL_ORDERS: u64 = 9;
const ORDERS_PER_RUN: u64 = 3;

fn row(value: Value) -> Record {
    value.as_object().cloned().unwrap_or_default()
}

fn order_source() -> anyhow::Result<Pipe> {
    Ok(Pipe::native(
        "order_source",
        Interface::builder().output("DataBlock[Order]").build()?,
        native_fn(|_inputs, ctx| {
            let next = ctx.state_u64("next_order").unwrap_or(0);
            if next >= TOTAL_ORDERS {
                return Ok(Vec::new());
            }
            let end = (next + ORDERS_PER_RUN).min(TOTAL_ORDERS);
            let orders = (next..end)
                .map(|id| row(json!({ "order_id": id, "customer_id": id % 2, "amount": 10 * (id + 1) })))
                .collect();
            ctx.set_state("next_order", end);
            Ok(vec![Batch::new(orders)])
        }),
    ))
}

fn order_totals() -> anyhow::Result<Pipe> {
    Ok(Pipe::native(
        "order_totals",
        Interface::builder()
            .input("orders", "DataBlock[Order]")
            .output("DataBlock[Totals]")
            .build()?,
        native_fn(|inputs, _ctx| {
            let orders = inputs.records("orders")?.unwrap_or_default();
            let amount: u64 = orders
                .iter()
                .filter_map(|order| order.get("amount").and_then(Value::as_u64))
                .sum();
            Ok(vec![Batch::new(vec![row(
                json!({ "orders": orders.len(), "amount": amount }),
            )])])
        }),
    ))
}

fn customer_snapshot() -> anyhow::Result<Pipe> {
    Ok(Pipe::native(
        "customer_snapshot",
        Interface::builder().output("DataSet[Customer]").build()?,
        native_fn(|_inputs, ctx| {
            let run = ctx.state_u64("run").unwrap_or(0) + 1;
            ctx.set_state("run", run);
            Ok(vec![Batch::new(vec![
                row(json!({ "customer_id": 0, "name": "ada", "seen_in_run": run })),
                row(json!({ "customer_id": 1, "name": "grace", "seen_in_run": run })),
            ])])
        }),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing("blockflow=info");

    let mut env = Environment::with_core_pipes()?;
    env.register_schema(Schema::new(
        "Order",
        vec![Field::new("order_id"), Field::new("customer_id"), Field::new("amount")],
    ));
    env.register_schema(
        Schema::new("Customer", vec![Field::new("customer_id"), Field::new("name")])
            .unique_on(["customer_id"]),
    );
    env.register_pipe(order_source()?);
    env.register_pipe(order_totals()?);
    env.register_pipe(customer_snapshot()?);

    let mut graph = Graph::new(Arc::new(env));
    graph.add_node(NodeSpec::new("orders", "order_source"))?;
    graph.add_node(NodeSpec::new("totals", "order_totals").upstream("orders"))?;
    graph.add_node(NodeSpec::new("customers", "customer_snapshot").dataset_name("crm_customers"))?;

    let engine = Engine::in_memory()?;

    for call in 1..=4 {
        let outcome = engine.produce(&graph, "totals").await?;
        match &outcome.output {
            Some(block) => {
                let rows = engine.read_records(block)?;
                println!("call {call}: totals -> {}", Value::Array(rows.into_iter().map(Value::Object).collect()));
            }
            None => println!("call {call}: totals -> nothing new"),
        }
        for run in &outcome.runs {
            println!("    {:<10} {}", run.node_key, run.status);
        }
    }

    for _ in 0..2 {
        engine.produce(&graph, "crm_customers").await?.into_result()?;
    }
    if let Some(block) = engine.latest_output(&graph, "crm_customers")? {
        println!("crm_customers ({} rows, schema {}):", block.record_count, block.realized_schema_key);
        for customer in engine.read_records(&block)? {
            println!("    {}", Value::Object(customer));
        }
    }

    println!("\n{}", engine.lineage_summary()?);
    Ok(())
}
