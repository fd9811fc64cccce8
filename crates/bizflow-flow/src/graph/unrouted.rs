use std::sync::Arc;

use futures::future::{self, BoxFuture};
use serde_json::Value;

use bizflow_core::error::{BizFlowError, Result};
use bizflow_core::traits::{Command, CommandExecutor, Query, QueryExecutor};

/// Collaborator for flows built without buses: every dispatch fails.
pub(crate) struct Unrouted;

impl CommandExecutor for Unrouted {
    fn send(&self, command: &dyn Command) -> Result<Value> {
        Err(not_found("command", command.name()))
    }

    fn send_async(&self, command: Arc<dyn Command>) -> BoxFuture<'static, Result<Value>> {
        Box::pin(future::ready(Err(not_found("command", command.name()))))
    }

    fn handler_count(&self) -> usize {
        0
    }
}

impl QueryExecutor for Unrouted {
    fn send(&self, query: &dyn Query) -> Result<Value> {
        Err(not_found("query", query.name()))
    }

    fn send_async(&self, query: Arc<dyn Query>) -> BoxFuture<'static, Result<Value>> {
        Box::pin(future::ready(Err(not_found("query", query.name()))))
    }

    fn handler_count(&self) -> usize {
        0
    }
}

fn not_found(kind: &'static str, message: &str) -> BizFlowError {
    BizFlowError::HandlerNotFound {
        kind,
        message: message.to_string(),
    }
}
