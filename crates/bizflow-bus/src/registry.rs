use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, error, warn};

use bizflow_core::error::{BizFlowError, Result};
use bizflow_core::traits::{Command, Query};

/// Type-erased view of a routable message (`dyn Command` or `dyn Query`).
pub(crate) trait Message: Send + Sync {
    fn message_name(&self) -> &'static str;
    fn message_valid(&self) -> bool;
    fn message_type(&self) -> TypeId;
}

impl Message for dyn Command {
    fn message_name(&self) -> &'static str {
        self.name()
    }

    fn message_valid(&self) -> bool {
        self.is_valid()
    }

    fn message_type(&self) -> TypeId {
        self.as_any().type_id()
    }
}

impl Message for dyn Query {
    fn message_name(&self) -> &'static str {
        self.name()
    }

    fn message_valid(&self) -> bool {
        self.is_valid()
    }

    fn message_type(&self) -> TypeId {
        self.as_any().type_id()
    }
}

pub(crate) type ErasedHandler<M> = dyn Fn(&M) -> Result<Value> + Send + Sync;

struct Registration<M: ?Sized> {
    message: &'static str,
    handler: Arc<ErasedHandler<M>>,
}

/// Handlers keyed by the concrete message type they accept.
pub(crate) struct HandlerRegistry<M: ?Sized> {
    kind: &'static str,
    handlers: RwLock<HashMap<TypeId, Registration<M>>>,
}

impl<M: ?Sized + Message> HandlerRegistry<M> {
    pub(crate) fn new(kind: &'static str) -> Self {
        Self {
            kind,
            handlers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a handler for the message type `type_id`.
    ///
    /// A second registration for the same type replaces the first.
    pub(crate) fn insert(
        &self,
        type_id: TypeId,
        message: &'static str,
        handler: Arc<ErasedHandler<M>>,
    ) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let previous = handlers.insert(type_id, Registration { message, handler });
        if previous.is_some() {
            warn!(kind = self.kind, message, "Replacing previously registered handler");
        } else {
            debug!(kind = self.kind, message, "Registered handler");
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.handlers.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub(crate) fn contains(&self, type_id: TypeId) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(&type_id)
    }

    /// Registered message names, sorted.
    pub(crate) fn messages(&self) -> Vec<&'static str> {
        let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<&'static str> = handlers.values().map(|r| r.message).collect();
        names.sort_unstable();
        names
    }

    /// Validate, route, and run one message.
    pub(crate) fn dispatch(&self, message: &M) -> Result<Value> {
        let name = message.message_name();
        debug!(kind = self.kind, message = name, "Dispatching");

        if !message.message_valid() {
            return Err(BizFlowError::InvalidMessage {
                kind: self.kind,
                message: name.to_string(),
            });
        }

        // Clone the handler out so the lock is not held while it runs.
        let handler = {
            let handlers = self.handlers.read().unwrap_or_else(|e| e.into_inner());
            handlers
                .get(&message.message_type())
                .map(|r| Arc::clone(&r.handler))
        };
        let handler = handler.ok_or_else(|| BizFlowError::HandlerNotFound {
            kind: self.kind,
            message: name.to_string(),
        })?;

        match handler(message) {
            Ok(value) => {
                debug!(kind = self.kind, message = name, "Handled");
                Ok(value)
            }
            Err(e) => {
                error!(kind = self.kind, message = name, error = %e, "Handler failed");
                Err(e)
            }
        }
    }
}
