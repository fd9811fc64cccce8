use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use bizflow_core::error::Result;

use super::context::Context;

/// What a node does. Behavior lives in the node's executor; the kind only
/// drives logging and diagram shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Dispatches a command through the command executor.
    Command,
    /// Dispatches a query through the query executor.
    Query,
    /// Evaluates to a boolean.
    Condition,
    /// Arbitrary caller-supplied logic.
    Generic,
}

impl NodeKind {
    /// PlantUML stereotype for this kind.
    pub fn stereotype(&self) -> &'static str {
        match self {
            Self::Command => "<<command>>",
            Self::Query => "<<query>>",
            Self::Condition => "<<choice>>",
            Self::Generic => "<<generic>>",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Command => "command",
            Self::Query => "query",
            Self::Condition => "condition",
            Self::Generic => "generic",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signature shared by every node executor.
pub type NodeExecutor = dyn Fn(&Context) -> Result<Value> + Send + Sync;

/// A unit of work in a flow graph.
pub struct Node {
    id: String,
    name: String,
    kind: NodeKind,
    executor: Box<NodeExecutor>,
}

impl Node {
    pub fn new<F>(
        id: impl Into<String>,
        name: impl Into<String>,
        kind: NodeKind,
        executor: F,
    ) -> Self
    where
        F: Fn(&Context) -> Result<Value> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            executor: Box::new(executor),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    /// Run the node against a context.
    pub fn execute(&self, context: &Context) -> Result<Value> {
        (self.executor)(context)
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}
