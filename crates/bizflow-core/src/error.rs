use thiserror::Error;

#[derive(Debug, Error)]
pub enum BizFlowError {
    // Definition errors (raised by builder calls)
    #[error("Flow definition error: {0}")]
    Definition(String),

    // Orchestration errors (raised while executing a flow)
    #[error("Flow has no nodes defined")]
    EmptyFlow,

    #[error("Connection source node does not exist: {0}")]
    UnknownSource(String),

    #[error("Connection target node does not exist: {0}")]
    UnknownTarget(String),

    #[error("No entry node found")]
    NoEntryNode,

    #[error("Cyclic dependency detected after {executions} executions (limit {limit})")]
    CyclicDependency { executions: usize, limit: usize },

    #[error("Node not found: {0}")]
    NodeNotFound(String),

    #[error("Node execution failed: {node}, error: {message}")]
    NodeExecution { node: String, message: String },

    #[error("Built {kind} must not be empty")]
    EmptyMessage { kind: &'static str },

    #[error("Type mismatch for {key}: expected {expected}, found {found}")]
    TypeMismatch {
        key: String,
        expected: &'static str,
        found: String,
    },

    // Bus errors
    #[error("No {kind} handler registered for {message}")]
    HandlerNotFound { kind: &'static str, message: String },

    #[error("{kind} validation failed: {message}")]
    InvalidMessage { kind: &'static str, message: String },

    #[error("Handler failed: {0}")]
    Handler(String),

    #[error("Async dispatch failed: {0}")]
    Dispatch(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BizFlowError {
    /// Shorthand for a builder-time definition error.
    pub fn definition(msg: impl Into<String>) -> Self {
        Self::Definition(msg.into())
    }

    /// Whether this error was raised while declaring a flow rather than
    /// while running one.
    pub fn is_definition(&self) -> bool {
        matches!(self, Self::Definition(_))
    }

    /// Stable error code, suitable for logs and API payloads.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Definition(_) => "FLOW_DEFINITION_ERROR",
            Self::EmptyFlow
            | Self::UnknownSource(_)
            | Self::UnknownTarget(_)
            | Self::NoEntryNode
            | Self::CyclicDependency { .. }
            | Self::NodeNotFound(_)
            | Self::NodeExecution { .. }
            | Self::EmptyMessage { .. }
            | Self::TypeMismatch { .. } => "ORCHESTRATION_ERROR",
            Self::HandlerNotFound { .. } => "HANDLER_NOT_FOUND",
            Self::InvalidMessage { .. } => "INVALID_MESSAGE",
            Self::Handler(_) | Self::Dispatch(_) => "HANDLER_ERROR",
            Self::Config(_) | Self::ConfigNotFound(_) => "CONFIG_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, BizFlowError>;
