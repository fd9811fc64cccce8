use std::any::TypeId;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use bizflow_core::error::{BizFlowError, Result};
use bizflow_core::traits::{Query, QueryExecutor, QueryHandler};

use crate::command::short_name;
use crate::registry::HandlerRegistry;

/// In-process query bus. Same routing rules as [`crate::CommandBus`].
#[derive(Clone)]
pub struct QueryBus {
    registry: Arc<HandlerRegistry<dyn Query>>,
}

impl QueryBus {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(HandlerRegistry::new("query")),
        }
    }

    /// Register the handler for query type `Q`.
    pub fn register<Q, H>(&self, handler: H) -> &Self
    where
        Q: Query,
        H: QueryHandler<Q>,
    {
        let message = short_name::<Q>();
        self.registry.insert(
            TypeId::of::<Q>(),
            message,
            Arc::new(move |query: &dyn Query| match query.as_any().downcast_ref::<Q>() {
                Some(query) => handler.handle(query),
                None => Err(BizFlowError::Handler(format!(
                    "handler for {} received {}",
                    message,
                    query.name()
                ))),
            }),
        );
        self
    }

    pub fn has_handler<Q: Query>(&self) -> bool {
        self.registry.contains(TypeId::of::<Q>())
    }

    pub fn registered(&self) -> Vec<&'static str> {
        self.registry.messages()
    }
}

impl Default for QueryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryExecutor for QueryBus {
    fn send(&self, query: &dyn Query) -> Result<Value> {
        self.registry.dispatch(query)
    }

    fn send_async(&self, query: Arc<dyn Query>) -> BoxFuture<'static, Result<Value>> {
        let registry = Arc::clone(&self.registry);
        Box::pin(async move {
            debug!(message = query.name(), "Dispatching query on blocking pool");
            tokio::task::spawn_blocking(move || registry.dispatch(&*query))
                .await
                .map_err(|e| BizFlowError::Dispatch(e.to_string()))?
        })
    }

    fn handler_count(&self) -> usize {
        self.registry.len()
    }
}
