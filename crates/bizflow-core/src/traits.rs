use std::any::Any;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::Result;

/// Access to the concrete type behind a message trait object.
///
/// Blanket-implemented for every `'static` type; message traits use it as a
/// supertrait so buses can route on the concrete type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A message that changes system state.
pub trait Command: AsAny + Send + Sync + 'static {
    /// Validation hook run by the bus before dispatch.
    fn is_valid(&self) -> bool {
        true
    }

    /// Display name used in logs and error messages.
    fn name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// A read-only message.
pub trait Query: AsAny + Send + Sync + 'static {
    /// Validation hook run by the bus before dispatch.
    fn is_valid(&self) -> bool {
        true
    }

    /// Display name used in logs and error messages.
    fn name(&self) -> &'static str {
        short_type_name(std::any::type_name::<Self>())
    }
}

/// Handles one concrete command type.
pub trait CommandHandler<C: Command>: Send + Sync + 'static {
    fn handle(&self, command: &C) -> Result<Value>;
}

impl<C, F> CommandHandler<C> for F
where
    C: Command,
    F: Fn(&C) -> Result<Value> + Send + Sync + 'static,
{
    fn handle(&self, command: &C) -> Result<Value> {
        self(command)
    }
}

/// Handles one concrete query type.
pub trait QueryHandler<Q: Query>: Send + Sync + 'static {
    fn handle(&self, query: &Q) -> Result<Value>;
}

impl<Q, F> QueryHandler<Q> for F
where
    Q: Query,
    F: Fn(&Q) -> Result<Value> + Send + Sync + 'static,
{
    fn handle(&self, query: &Q) -> Result<Value> {
        self(query)
    }
}

/// Routes a command to whatever handles it.
///
/// The flow engine only ever calls `send`; routing is the implementor's
/// concern.
pub trait CommandExecutor: Send + Sync + 'static {
    /// Dispatch a command and wait for its result.
    fn send(&self, command: &dyn Command) -> Result<Value>;

    /// Dispatch a command on a worker and resolve with its result.
    fn send_async(&self, command: Arc<dyn Command>) -> BoxFuture<'static, Result<Value>>;

    /// Number of registered handlers.
    fn handler_count(&self) -> usize;
}

/// Routes a query to whatever handles it.
pub trait QueryExecutor: Send + Sync + 'static {
    /// Dispatch a query and wait for its result.
    fn send(&self, query: &dyn Query) -> Result<Value>;

    /// Dispatch a query on a worker and resolve with its result.
    fn send_async(&self, query: Arc<dyn Query>) -> BoxFuture<'static, Result<Value>>;

    /// Number of registered handlers.
    fn handler_count(&self) -> usize;
}

/// Strip the module path from a type name (`a::b::CreateOrder` -> `CreateOrder`).
pub fn short_type_name(full: &'static str) -> &'static str {
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}
