//! Order-approval demo flow wired to in-process buses.
//!
//! ```text
//! validate -> stock --true--> create -> large --true--> review
//!                  \                        \--false--> approve
//!                   \--false--> backorder
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use bizflow_bus::{CommandBus, QueryBus};
use bizflow_core::error::{BizFlowError, Result};
use bizflow_core::traits::{Command, Query};
use bizflow_flow::{Context, FlowGraph, FlowOptions};

/// Orders above this amount go to manual review.
const REVIEW_THRESHOLD: u64 = 1000;

#[derive(Debug)]
pub struct CreateOrder {
    pub customer: String,
    pub sku: String,
    pub amount: u64,
}

impl Command for CreateOrder {
    fn is_valid(&self) -> bool {
        !self.customer.is_empty() && self.amount > 0
    }
}

#[derive(Debug)]
pub struct ApproveOrder {
    pub order_id: String,
}

impl Command for ApproveOrder {
    fn is_valid(&self) -> bool {
        !self.order_id.is_empty()
    }
}

#[derive(Debug)]
pub struct CheckInventory {
    pub sku: String,
}

impl Query for CheckInventory {}

/// Default variables for a demo run; `--var` overrides these.
pub fn default_variables() -> HashMap<String, Value> {
    HashMap::from([
        ("customer".to_string(), json!("acme")),
        ("sku".to_string(), json!("WIDGET-1")),
        ("amount".to_string(), json!(250)),
    ])
}

/// Buses with handlers for every demo message.
pub fn buses() -> (CommandBus, QueryBus) {
    let commands = CommandBus::new();
    commands
        .register(|cmd: &CreateOrder| -> Result<Value> {
            let order_id = format!("ORD-{}-{}", cmd.customer.to_uppercase(), cmd.amount);
            info!(order_id = %order_id, sku = %cmd.sku, "Order created");
            Ok(json!(order_id))
        })
        .register(|cmd: &ApproveOrder| -> Result<Value> {
            info!(order_id = %cmd.order_id, "Order approved");
            Ok(json!({ "order_id": cmd.order_id, "status": "approved" }))
        });

    let queries = QueryBus::new();
    queries.register(|q: &CheckInventory| -> Result<Value> {
        // Anything tagged DISCONTINUED is out of stock.
        Ok(json!(!q.sku.starts_with("DISCONTINUED")))
    });

    (commands, queries)
}

/// Build the order-approval flow over `commands` and `queries`.
pub fn order_flow(
    commands: CommandBus,
    queries: QueryBus,
    options: FlowOptions,
) -> Result<FlowGraph> {
    let mut flow = FlowGraph::new(
        "order-approval",
        "Order Approval",
        Arc::new(commands),
        Arc::new(queries),
    )
    .with_options(options);

    flow.add_generic("validate", "Validate order", |ctx: &Context| {
        let amount = ctx
            .variable_as::<u64>("amount")?
            .ok_or_else(|| BizFlowError::Handler("amount is required".to_string()))?;
        Ok(json!(amount))
    })?
    .add_query_with("stock", "Check inventory", |ctx: &Context| {
        let sku = ctx.variable_as::<String>("sku").ok().flatten()?;
        Some(Box::new(CheckInventory { sku }) as Box<dyn Query>)
    })?
    .add_command_with("create", "Create order", |ctx: &Context| {
        let customer = ctx.variable_as::<String>("customer").ok().flatten()?;
        let sku = ctx.variable_as::<String>("sku").ok().flatten()?;
        let amount = ctx.result_as::<u64>("validate").ok().flatten()?;
        Some(Box::new(CreateOrder {
            customer,
            sku,
            amount,
        }) as Box<dyn Command>)
    })?
    .add_condition("large", "Large order?", |ctx: &Context| {
        ctx.result_as::<u64>("validate")
            .ok()
            .flatten()
            .is_some_and(|amount| amount > REVIEW_THRESHOLD)
    })?
    .add_generic("review", "Manual review", |ctx: &Context| {
        Ok(json!({ "order_id": ctx.result("create"), "status": "pending_review" }))
    })?
    .add_command_with("approve", "Auto-approve", |ctx: &Context| {
        let order_id = ctx.result_as::<String>("create").ok().flatten()?;
        Some(Box::new(ApproveOrder { order_id }) as Box<dyn Command>)
    })?
    .add_generic("backorder", "Backorder", |ctx: &Context| {
        Ok(json!({ "sku": ctx.variable("sku"), "status": "backordered" }))
    })?
    .connect("validate", "stock")?
    .connect_when_true("stock", "create")?
    .connect_when_false("stock", "backorder")?
    .connect("create", "large")?
    .connect_when_true("large", "review")?
    .connect_when_false("large", "approve")?;

    Ok(flow)
}
