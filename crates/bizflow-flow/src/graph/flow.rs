use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use bizflow_core::config::BizFlowConfig;
use bizflow_core::error::{BizFlowError, Result};
use bizflow_core::traits::{Command, CommandExecutor, Query, QueryExecutor};

use super::context::Context;
use super::edge::Connection;
use super::node::{Node, NodeKind};
use super::unrouted::Unrouted;

/// Engine and export settings for a flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOptions {
    /// Dequeue budget per node before a run is declared cyclic.
    pub execution_factor: usize,
    /// PlantUML theme.
    pub theme: String,
}

impl Default for FlowOptions {
    fn default() -> Self {
        Self {
            execution_factor: 2,
            theme: "plain".to_string(),
        }
    }
}

impl FlowOptions {
    pub fn from_config(config: &BizFlowConfig) -> Self {
        Self {
            execution_factor: config.engine.execution_factor.max(1),
            theme: config.export.theme.clone(),
        }
    }
}

/// A business flow: nodes, the connections between them, and the
/// collaborators command and query nodes dispatch through.
///
/// Built once, then executed any number of times; each run gets its own
/// [`Context`]. Every builder method validates eagerly and returns a
/// definition error on misuse.
pub struct FlowGraph {
    id: String,
    name: String,
    pub(crate) nodes: Vec<Node>,
    pub(crate) connections: Vec<Connection>,
    commands: Arc<dyn CommandExecutor>,
    queries: Arc<dyn QueryExecutor>,
    pub(crate) options: FlowOptions,
}

impl FlowGraph {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        commands: Arc<dyn CommandExecutor>,
        queries: Arc<dyn QueryExecutor>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            nodes: Vec::new(),
            connections: Vec::new(),
            commands,
            queries,
            options: FlowOptions::default(),
        }
    }

    /// A flow with no command or query collaborators.
    ///
    /// Condition and generic nodes work as usual; command and query nodes
    /// fail at run time with a handler-not-found error.
    pub fn standalone(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new(id, name, Arc::new(Unrouted), Arc::new(Unrouted))
    }

    /// Replace the flow's options. A zero `execution_factor` is raised to 1.
    pub fn with_options(mut self, mut options: FlowOptions) -> Self {
        options.execution_factor = options.execution_factor.max(1);
        self.options = options;
        self
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn options(&self) -> &FlowOptions {
        &self.options
    }

    /// Nodes in insertion order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Connections in insertion order.
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn node(&self, id: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.id() == id)
    }

    // ── Nodes ───────────────────────────────────────────────────

    /// Add a node that dispatches a fixed command.
    pub fn add_command<C: Command>(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        command: C,
    ) -> Result<&mut Self> {
        let commands = Arc::clone(&self.commands);
        self.push_node(id, name, NodeKind::Command, move |_: &Context| {
            commands.send(&command)
        })
    }

    /// Add a node that builds its command from the live context at run time.
    ///
    /// A builder returning `None` fails the node.
    pub fn add_command_with<F>(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        builder: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&Context) -> Option<Box<dyn Command>> + Send + Sync + 'static,
    {
        let commands = Arc::clone(&self.commands);
        self.push_node(id, name, NodeKind::Command, move |ctx: &Context| {
            let command = builder(ctx).ok_or(BizFlowError::EmptyMessage { kind: "command" })?;
            commands.send(&*command)
        })
    }

    /// Add a node that dispatches a fixed query.
    pub fn add_query<Q: Query>(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        query: Q,
    ) -> Result<&mut Self> {
        let queries = Arc::clone(&self.queries);
        self.push_node(id, name, NodeKind::Query, move |_: &Context| queries.send(&query))
    }

    /// Add a node that builds its query from the live context at run time.
    ///
    /// A builder returning `None` fails the node.
    pub fn add_query_with<F>(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        builder: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&Context) -> Option<Box<dyn Query>> + Send + Sync + 'static,
    {
        let queries = Arc::clone(&self.queries);
        self.push_node(id, name, NodeKind::Query, move |ctx: &Context| {
            let query = builder(ctx).ok_or(BizFlowError::EmptyMessage { kind: "query" })?;
            queries.send(&*query)
        })
    }

    /// Add a condition node evaluating `condition`.
    pub fn add_condition<F>(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        condition: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        self.push_node(id, name, NodeKind::Condition, move |ctx: &Context| {
            Ok(Value::Bool(condition(ctx)))
        })
    }

    /// Add a condition node comparing a context variable with `expected`.
    ///
    /// An absent variable compares as `null`.
    pub fn add_variable_condition(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        variable: impl Into<String>,
        expected: impl Into<Value>,
    ) -> Result<&mut Self> {
        let variable = variable.into();
        require_text(&variable, "variable name must not be empty")?;
        let expected = expected.into();
        self.push_node(id, name, NodeKind::Condition, move |ctx: &Context| {
            let actual = ctx.variable(&variable).unwrap_or(Value::Null);
            Ok(Value::Bool(actual == expected))
        })
    }

    /// Add a condition node comparing another node's result with `expected`.
    ///
    /// A source node that has not run compares as `null`.
    pub fn add_result_condition(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        source: impl Into<String>,
        expected: impl Into<Value>,
    ) -> Result<&mut Self> {
        let source = source.into();
        require_text(&source, "source node id must not be empty")?;
        let expected = expected.into();
        self.push_node(id, name, NodeKind::Condition, move |ctx: &Context| {
            let actual = ctx.result(&source).unwrap_or(Value::Null);
            Ok(Value::Bool(actual == expected))
        })
    }

    /// Add a node running arbitrary logic.
    pub fn add_generic<F>(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        executor: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&Context) -> Result<Value> + Send + Sync + 'static,
    {
        self.push_node(id, name, NodeKind::Generic, executor)
    }

    // ── Connections ─────────────────────────────────────────────

    /// Connect two nodes unconditionally.
    ///
    /// Endpoints may be declared later; they are checked when the flow runs.
    pub fn connect(&mut self, from: impl Into<String>, to: impl Into<String>) -> Result<&mut Self> {
        let (from, to) = validate_endpoints(from.into(), to.into())?;
        self.connections.push(Connection::always(from, to));
        Ok(self)
    }

    /// Connect two nodes, firing only when `guard` holds.
    pub fn connect_when<F>(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
        label: impl Into<String>,
        guard: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&Context) -> bool + Send + Sync + 'static,
    {
        let (from, to) = validate_endpoints(from.into(), to.into())?;
        let label = label.into();
        require_text(&label, "condition label must not be empty")?;
        self.connections.push(Connection::when(from, to, label, guard));
        Ok(self)
    }

    /// Connect two nodes, firing when the source produced `true`.
    pub fn connect_when_true(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<&mut Self> {
        let (from, to) = validate_endpoints(from.into(), to.into())?;
        self.connections.push(Connection::when_true(from, to));
        Ok(self)
    }

    /// Connect two nodes, firing unless the source produced `true`.
    pub fn connect_when_false(
        &mut self,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<&mut Self> {
        let (from, to) = validate_endpoints(from.into(), to.into())?;
        self.connections.push(Connection::when_false(from, to));
        Ok(self)
    }

    fn push_node<F>(
        &mut self,
        id: impl Into<String>,
        name: impl Into<String>,
        kind: NodeKind,
        executor: F,
    ) -> Result<&mut Self>
    where
        F: Fn(&Context) -> Result<Value> + Send + Sync + 'static,
    {
        let id = id.into();
        let name = name.into();
        require_text(&id, "node id must not be empty")?;
        require_text(&name, "node name must not be empty")?;
        if self.node(&id).is_some() {
            return Err(BizFlowError::definition(format!("node id already exists: {}", id)));
        }
        self.nodes.push(Node::new(id, name, kind, executor));
        Ok(self)
    }
}

impl fmt::Debug for FlowGraph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FlowGraph")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("nodes", &self.nodes)
            .field("connections", &self.connections)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn require_text(value: &str, message: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(BizFlowError::definition(message));
    }
    Ok(())
}

fn validate_endpoints(from: String, to: String) -> Result<(String, String)> {
    require_text(&from, "source node id must not be empty")?;
    require_text(&to, "target node id must not be empty")?;
    if from == to {
        return Err(BizFlowError::definition(format!(
            "cannot connect node to itself: {}",
            from
        )));
    }
    Ok((from, to))
}
