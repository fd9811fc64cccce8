use std::any::TypeId;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tracing::debug;

use bizflow_core::error::{BizFlowError, Result};
use bizflow_core::traits::{Command, CommandExecutor, CommandHandler};

use crate::registry::HandlerRegistry;

/// In-process command bus.
///
/// Routes each command to the handler registered for its concrete type.
/// Cloning is cheap; clones share the same handler table.
#[derive(Clone)]
pub struct CommandBus {
    registry: Arc<HandlerRegistry<dyn Command>>,
}

impl CommandBus {
    pub fn new() -> Self {
        Self {
            registry: Arc::new(HandlerRegistry::new("command")),
        }
    }

    /// Register the handler for command type `C`.
    pub fn register<C, H>(&self, handler: H) -> &Self
    where
        C: Command,
        H: CommandHandler<C>,
    {
        let message = short_name::<C>();
        self.registry.insert(
            TypeId::of::<C>(),
            message,
            Arc::new(move |command: &dyn Command| match command.as_any().downcast_ref::<C>() {
                Some(command) => handler.handle(command),
                None => Err(BizFlowError::Handler(format!(
                    "handler for {} received {}",
                    message,
                    command.name()
                ))),
            }),
        );
        self
    }

    /// Whether a handler is registered for `C`.
    pub fn has_handler<C: Command>(&self) -> bool {
        self.registry.contains(TypeId::of::<C>())
    }

    /// Names of all command types with a registered handler.
    pub fn registered(&self) -> Vec<&'static str> {
        self.registry.messages()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for CommandBus {
    fn send(&self, command: &dyn Command) -> Result<Value> {
        self.registry.dispatch(command)
    }

    fn send_async(&self, command: Arc<dyn Command>) -> BoxFuture<'static, Result<Value>> {
        let registry = Arc::clone(&self.registry);
        Box::pin(async move {
            debug!(message = command.name(), "Dispatching command on blocking pool");
            tokio::task::spawn_blocking(move || registry.dispatch(&*command))
                .await
                .map_err(|e| BizFlowError::Dispatch(e.to_string()))?
        })
    }

    fn handler_count(&self) -> usize {
        self.registry.len()
    }
}

pub(crate) fn short_name<T: ?Sized>() -> &'static str {
    bizflow_core::traits::short_type_name(std::any::type_name::<T>())
}
