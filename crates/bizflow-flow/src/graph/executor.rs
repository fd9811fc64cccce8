use std::any::Any;
use std::collections::{HashMap, HashSet, VecDeque};
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use bizflow_core::error::{BizFlowError, Result};

use super::context::Context;
use super::edge::Connection;
use super::flow::FlowGraph;
use super::node::Node;
use super::result::FlowResult;

impl FlowGraph {
    /// Execute the flow with a fresh context keyed by the flow id.
    pub fn run(&self) -> FlowResult {
        self.execute(&Context::new(self.id()))
    }

    /// Execute the flow with a fresh context holding `variables`.
    pub fn execute_with_variables(&self, variables: HashMap<String, Value>) -> FlowResult {
        self.execute(&Context::with_variables(self.id(), variables))
    }

    /// Execute the flow against `context`.
    ///
    /// Never fails: validation errors, a missing entry node, the runaway
    /// guard, and node failures all come back as a failed [`FlowResult`].
    /// Results of nodes that ran before a failure stay in `context`.
    pub fn execute(&self, context: &Context) -> FlowResult {
        let start_time = Utc::now();
        let start = Instant::now();
        info!(
            flow_id = %self.id(),
            nodes = self.nodes.len(),
            connections = self.connections.len(),
            "Executing flow"
        );

        let outcome = self.validate().and_then(|()| self.run_nodes(context));
        let end_time = Utc::now();
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(()) => {
                info!(flow_id = %self.id(), elapsed_ms, "Flow succeeded");
                FlowResult::success(self.id(), start_time, end_time, context.results())
            }
            Err(e) => {
                warn!(flow_id = %self.id(), elapsed_ms, error = %e, "Flow failed");
                FlowResult::failure(self.id(), e.to_string(), start_time, end_time)
            }
        }
    }

    /// Check the structure of the flow without running it.
    ///
    /// The flow needs at least one node, and every connection must name
    /// nodes that exist.
    pub fn validate(&self) -> Result<()> {
        debug!(flow_id = %self.id(), "Validating flow");
        if self.nodes.is_empty() {
            return Err(BizFlowError::EmptyFlow);
        }

        let ids: HashSet<&str> = self.nodes.iter().map(|n| n.id()).collect();
        for conn in &self.connections {
            if !ids.contains(conn.from()) {
                return Err(BizFlowError::UnknownSource(conn.from().to_string()));
            }
            if !ids.contains(conn.to()) {
                return Err(BizFlowError::UnknownTarget(conn.to().to_string()));
            }
        }
        Ok(())
    }

    /// Ids of nodes no connection points at, in insertion order.
    pub fn entry_nodes(&self) -> Vec<&str> {
        let targets: HashSet<&str> = self.connections.iter().map(|c| c.to()).collect();
        self.nodes
            .iter()
            .map(|n| n.id())
            .filter(|id| !targets.contains(id))
            .collect()
    }

    /// Drain the work queue from the entry nodes.
    ///
    /// Each node runs at most once; a node reached again after it ran is
    /// skipped. Total dequeues are capped at `execution_factor * nodes`.
    fn run_nodes(&self, context: &Context) -> Result<()> {
        let node_map: HashMap<&str, &Node> = self.nodes.iter().map(|n| (n.id(), n)).collect();

        let mut queue: VecDeque<&str> = self.entry_nodes().into_iter().collect();
        if queue.is_empty() && !self.nodes.is_empty() {
            return Err(BizFlowError::NoEntryNode);
        }
        debug!(flow_id = %self.id(), entries = ?queue, "Traversing flow");

        let limit = self
            .nodes
            .len()
            .saturating_mul(self.options.execution_factor.max(1));
        let mut executions = 0usize;
        let mut executed: HashSet<&str> = HashSet::new();

        while let Some(node_id) = queue.pop_front() {
            executions += 1;
            if executions > limit {
                warn!(flow_id = %self.id(), executions, limit, "Runaway execution, aborting");
                return Err(BizFlowError::CyclicDependency { executions, limit });
            }

            if executed.contains(node_id) {
                continue;
            }

            let node = node_map
                .get(node_id)
                .copied()
                .ok_or_else(|| BizFlowError::NodeNotFound(node_id.to_string()))?;

            let output = self.run_node(node, context)?;
            context.set_result(node_id, output);
            executed.insert(node_id);

            for conn in self.connections.iter().filter(|c| c.from() == node_id) {
                if !guard_passes(conn, context)? {
                    debug!(
                        from = node_id,
                        to = conn.to(),
                        label = ?conn.label(),
                        "Guard not satisfied"
                    );
                    continue;
                }
                if executed.contains(conn.to()) {
                    continue;
                }
                debug!(
                    from = node_id,
                    to = conn.to(),
                    label = ?conn.label(),
                    "Following connection"
                );
                queue.push_back(conn.to());
            }
        }

        debug!(
            flow_id = %self.id(),
            executed = executed.len(),
            executions,
            "All nodes drained"
        );
        Ok(())
    }

    fn run_node(&self, node: &Node, context: &Context) -> Result<Value> {
        debug!(
            node_id = %node.id(),
            node_name = %node.name(),
            node_kind = %node.kind(),
            "Running node"
        );
        let start = Instant::now();

        // Executors are caller code; a panic is reported like any other failure.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| node.execute(context)))
            .unwrap_or_else(|payload| Err(BizFlowError::Handler(panic_message(payload.as_ref()))));

        let elapsed_ms = start.elapsed().as_millis() as u64;
        match outcome {
            Ok(value) => {
                debug!(node_id = %node.id(), elapsed_ms, "Node completed");
                Ok(value)
            }
            Err(e) => {
                error!(node_id = %node.id(), elapsed_ms, error = %e, "Node failed");
                Err(BizFlowError::NodeExecution {
                    node: node.id().to_string(),
                    message: e.to_string(),
                })
            }
        }
    }
}

/// Evaluate a connection guard, reporting a panicking guard as a failure of
/// the source node.
fn guard_passes(conn: &Connection, context: &Context) -> Result<bool> {
    panic::catch_unwind(AssertUnwindSafe(|| conn.can_traverse(context))).map_err(|payload| {
        let message = format!(
            "guard '{}' to {} {}",
            conn.label().unwrap_or("always"),
            conn.to(),
            panic_message(payload.as_ref())
        );
        error!(node_id = %conn.from(), to = conn.to(), error = %message, "Guard failed");
        BizFlowError::NodeExecution {
            node: conn.from().to_string(),
            message,
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use super::*;

    type BoxedExecutor = Box<dyn Fn(&Context) -> Result<Value> + Send + Sync>;

    fn recorder() -> (Arc<Mutex<Vec<String>>>, impl Fn(&str) -> BoxedExecutor) {
        let log = Arc::new(Mutex::new(Vec::new()));
        let handle = Arc::clone(&log);
        let make = move |id: &str| -> BoxedExecutor {
            let log = Arc::clone(&handle);
            let id = id.to_string();
            Box::new(move |_: &Context| {
                log.lock().unwrap().push(id.clone());
                Ok(json!(id))
            })
        };
        (log, make)
    }

    #[test]
    fn test_unconnected_nodes_run_in_insertion_order() {
        let (log, node) = recorder();
        let mut flow = FlowGraph::standalone("f", "Flow");
        flow.add_generic("c", "C", node("c"))
            .unwrap()
            .add_generic("a", "A", node("a"))
            .unwrap()
            .add_generic("b", "B", node("b"))
            .unwrap();

        assert_eq!(flow.entry_nodes(), vec!["c", "a", "b"]);
        let result = flow.run();
        assert!(result.is_success());
        assert_eq!(*log.lock().unwrap(), vec!["c", "a", "b"]);
        assert_eq!(result.results().unwrap().len(), 3);
    }

    #[test]
    fn test_chain_results() {
        let mut flow = FlowGraph::standalone("chain", "Chain");
        flow.add_generic("A", "A", |_| Ok(json!(1)))
            .unwrap()
            .add_generic("B", "B", |_| Ok(json!(2)))
            .unwrap()
            .add_generic("C", "C", |_| Ok(json!(3)))
            .unwrap()
            .connect("A", "B")
            .unwrap()
            .connect("B", "C")
            .unwrap();

        let result = flow.run();
        assert!(result.is_success());
        let expected: HashMap<String, Value> = [("A", 1), ("B", 2), ("C", 3)]
            .into_iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect();
        assert_eq!(result.results(), Some(&expected));
        assert_eq!(result.flow_id(), "chain");
        assert!(result.start_time() <= result.end_time());
    }

    #[test]
    fn test_shared_target_runs_once() {
        let (log, node) = recorder();
        let mut flow = FlowGraph::standalone("f", "Flow");
        flow.add_generic("A", "A", node("A")).unwrap();
        flow.add_generic("B", "B", node("B")).unwrap();
        flow.add_generic("C", "C", node("C")).unwrap();
        flow.connect("A", "C").unwrap();
        flow.connect("B", "C").unwrap();

        let result = flow.run();
        assert!(result.is_success());
        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_ring_has_no_entry_node() {
        let mut flow = FlowGraph::standalone("ring", "Ring");
        flow.add_generic("A", "A", |_| Ok(json!(1))).unwrap();
        flow.add_generic("B", "B", |_| Ok(json!(2))).unwrap();
        flow.connect("A", "B").unwrap();
        flow.connect("B", "A").unwrap();

        let result = flow.run();
        assert!(!result.is_success());
        assert_eq!(result.error_message(), Some("No entry node found"));
        assert!(result.results().is_none());
    }

    #[test]
    fn test_runaway_guard_trips() {
        let mut flow = FlowGraph::standalone("f", "Flow");
        flow.add_generic("A", "A", |_| Ok(json!(1))).unwrap();
        flow.add_generic("B", "B", |_| Ok(json!(2))).unwrap();
        // Four parallel edges enqueue B four times: 5 dequeues against a budget of 4.
        for _ in 0..4 {
            flow.connect("A", "B").unwrap();
        }

        let ctx = Context::new("f");
        let result = flow.execute(&ctx);
        assert!(!result.is_success());
        assert!(result
            .error_message()
            .unwrap()
            .starts_with("Cyclic dependency detected"));
        // B ran before the guard tripped; its result is not rolled back.
        assert!(ctx.has_result("B"));
    }

    #[test]
    fn test_runaway_budget_scales_with_factor() {
        let mut flow = FlowGraph::standalone("f", "Flow").with_options(crate::FlowOptions {
            execution_factor: 3,
            ..Default::default()
        });
        flow.add_generic("A", "A", |_| Ok(json!(1))).unwrap();
        flow.add_generic("B", "B", |_| Ok(json!(2))).unwrap();
        for _ in 0..4 {
            flow.connect("A", "B").unwrap();
        }
        assert!(flow.run().is_success());
    }

    #[test]
    fn test_empty_flow_fails_validation() {
        let flow = FlowGraph::standalone("empty", "Empty");
        let result = flow.run();
        assert!(!result.is_success());
        assert_eq!(result.error_message(), Some("Flow has no nodes defined"));
    }

    #[test]
    fn test_dangling_connection_fails_before_any_node_runs() {
        let (log, node) = recorder();
        let mut flow = FlowGraph::standalone("f", "Flow");
        flow.add_generic("A", "A", node("A")).unwrap();
        flow.connect("A", "ghost").unwrap();

        let result = flow.run();
        assert_eq!(
            result.error_message(),
            Some("Connection target node does not exist: ghost")
        );
        assert!(log.lock().unwrap().is_empty());

        let mut flow = FlowGraph::standalone("f", "Flow");
        flow.add_generic("A", "A", |_| Ok(Value::Null)).unwrap();
        flow.connect("ghost", "A").unwrap();
        assert!(matches!(flow.validate(), Err(BizFlowError::UnknownSource(id)) if id == "ghost"));
    }

    #[test]
    fn test_node_failure_aborts_flow() {
        let (log, node) = recorder();
        let mut flow = FlowGraph::standalone("f", "Flow");
        flow.add_generic("A", "A", node("A")).unwrap();
        flow.add_generic("B", "B", |_| Err(BizFlowError::Handler("card declined".into())))
            .unwrap();
        flow.add_generic("C", "C", node("C")).unwrap();
        flow.connect("A", "B").unwrap();
        flow.connect("B", "C").unwrap();

        let ctx = Context::new("f");
        let result = flow.execute(&ctx);
        assert!(!result.is_success());
        assert_eq!(
            result.error_message(),
            Some("Node execution failed: B, error: Handler failed: card declined")
        );
        assert_eq!(*log.lock().unwrap(), vec!["A"]);
        assert!(ctx.has_result("A"));
        assert!(!ctx.has_result("B"));
    }

    #[test]
    fn test_panicking_node_is_contained() {
        let mut flow = FlowGraph::standalone("f", "Flow");
        flow.add_generic("boom", "Boom", |_| -> Result<Value> { panic!("unexpected state") })
            .unwrap();

        let result = flow.run();
        assert!(!result.is_success());
        let msg = result.error_message().unwrap();
        assert!(msg.contains("boom"));
        assert!(msg.contains("panicked: unexpected state"));
    }

    #[test]
    fn test_panicking_guard_is_contained() {
        let (log, node) = recorder();
        let mut flow = FlowGraph::standalone("f", "Flow");
        flow.add_generic("a", "A", node("a"))
            .unwrap()
            .add_generic("b", "B", node("b"))
            .unwrap()
            .connect_when("a", "b", "boom", |_| -> bool { panic!("guard exploded") })
            .unwrap();

        let ctx = Context::new("f");
        let result = panic::catch_unwind(AssertUnwindSafe(|| flow.execute(&ctx)))
            .expect("execute must not unwind");
        assert!(!result.is_success());
        let msg = result.error_message().unwrap();
        assert!(msg.starts_with("Node execution failed: a, error: guard 'boom' to b"), "{}", msg);
        assert!(msg.contains("panicked: guard exploded"));
        assert_eq!(*log.lock().unwrap(), vec!["a"]);
        assert!(ctx.has_result("a"));
    }

    #[test]
    fn test_huge_execution_factor_saturates() {
        let mut flow = FlowGraph::standalone("f", "Flow").with_options(crate::FlowOptions {
            execution_factor: usize::MAX,
            ..Default::default()
        });
        flow.add_generic("A", "A", |_| Ok(json!(1)))
            .unwrap()
            .add_generic("B", "B", |_| Ok(json!(2)))
            .unwrap()
            .connect("A", "B")
            .unwrap();

        let result = flow.run();
        assert!(result.is_success(), "{:?}", result.error_message());
        assert_eq!(result.result("B"), Some(&json!(2)));
    }

    #[test]
    fn test_zero_execution_factor_is_clamped() {
        let mut flow = FlowGraph::standalone("f", "Flow").with_options(crate::FlowOptions {
            execution_factor: 0,
            ..Default::default()
        });
        assert_eq!(flow.options().execution_factor, 1);
        flow.add_generic("A", "A", |_| Ok(json!(1)))
            .unwrap()
            .add_generic("B", "B", |_| Ok(json!(2)))
            .unwrap()
            .connect("A", "B")
            .unwrap();

        // Budget of one dequeue per node still covers a simple chain.
        assert!(flow.run().is_success());
    }

    #[test]
    fn test_condition_branches() {
        for (approved, expected_branch, skipped_branch) in
            [(true, "approve", "reject"), (false, "reject", "approve")]
        {
            let mut flow = FlowGraph::standalone("f", "Flow");
            flow.add_variable_condition("check", "Approved?", "approved", true)
                .unwrap()
                .add_generic("approve", "Approve", |_| Ok(json!("approved")))
                .unwrap()
                .add_generic("reject", "Reject", |_| Ok(json!("rejected")))
                .unwrap()
                .connect_when_true("check", "approve")
                .unwrap()
                .connect_when_false("check", "reject")
                .unwrap();

            let mut vars = HashMap::new();
            vars.insert("approved".to_string(), json!(approved));
            let result = flow.execute_with_variables(vars);

            assert!(result.is_success());
            assert_eq!(result.result("check"), Some(&json!(approved)));
            assert!(result.result(expected_branch).is_some());
            assert!(result.result(skipped_branch).is_none());
        }
    }

    #[test]
    fn test_connect_when_uses_context() {
        let mut flow = FlowGraph::standalone("f", "Flow");
        flow.add_generic("total", "Total", |ctx| {
            let qty = ctx.variable_as::<u64>("qty")?.unwrap_or(0);
            Ok(json!(qty * 25))
        })
        .unwrap()
        .add_generic("review", "Manual review", |_| Ok(json!("queued")))
        .unwrap()
        .connect_when("total", "review", "total > 100", |ctx| {
            ctx.result_as::<u64>("total").ok().flatten().unwrap_or(0) > 100
        })
        .unwrap();

        let small = Context::new("f");
        small.set_variable("qty", 2);
        assert!(flow.execute(&small).result("review").is_none());

        let big = Context::new("f");
        big.set_variable("qty", 10);
        assert_eq!(flow.execute(&big).result("review"), Some(&json!("queued")));
    }

    #[test]
    fn test_result_condition() {
        let mut flow = FlowGraph::standalone("f", "Flow");
        flow.add_generic("status", "Status", |_| Ok(json!("PAID")))
            .unwrap()
            .add_result_condition("paid", "Paid?", "status", "PAID")
            .unwrap()
            .connect("status", "paid")
            .unwrap();

        let result = flow.run();
        assert_eq!(result.result("paid"), Some(&json!(true)));
    }

    #[test]
    fn test_missing_variable_compares_as_null() {
        let mut flow = FlowGraph::standalone("f", "Flow");
        flow.add_variable_condition("unset", "Unset?", "coupon", Value::Null)
            .unwrap();
        assert_eq!(flow.run().result("unset"), Some(&json!(true)));
    }

    #[test]
    fn test_result_is_detached_snapshot() {
        let mut flow = FlowGraph::standalone("f", "Flow");
        flow.add_generic("A", "A", |_| Ok(json!(1))).unwrap();

        let ctx = Context::new("f");
        let result = flow.execute(&ctx);
        ctx.set_result("A", json!("mutated"));
        ctx.set_result("late", json!(true));

        assert_eq!(result.result("A"), Some(&json!(1)));
        assert!(result.result("late").is_none());
    }

    #[test]
    fn test_graph_is_reusable_across_runs() {
        let mut flow = FlowGraph::standalone("f", "Flow");
        flow.add_generic("echo", "Echo", |ctx| {
            Ok(ctx.variable("input").unwrap_or(Value::Null))
        })
        .unwrap();

        let flow = Arc::new(flow);
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let flow = Arc::clone(&flow);
                std::thread::spawn(move || {
                    let ctx = Context::new("f");
                    ctx.set_variable("input", i);
                    flow.execute(&ctx)
                })
            })
            .collect();
        for (i, h) in handles.into_iter().enumerate() {
            let result = h.join().unwrap();
            assert_eq!(result.result("echo"), Some(&json!(i)));
        }
    }
}
