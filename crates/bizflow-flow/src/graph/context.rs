use std::collections::HashMap;
use std::sync::RwLock;

use serde::de::DeserializeOwned;
use serde_json::Value;

use bizflow_core::error::{BizFlowError, Result};

/// Per-execution store shared by every node of one flow run.
///
/// `variables` holds caller-supplied and node-shared input; `results` holds
/// one entry per executed node, keyed by node id. Both stores sit behind
/// locks so collaborators running on other threads may read and write them
/// while a node is in flight.
#[derive(Debug, Default)]
pub struct Context {
    flow_id: String,
    variables: RwLock<HashMap<String, Value>>,
    results: RwLock<HashMap<String, Value>>,
}

impl Context {
    pub fn new(flow_id: impl Into<String>) -> Self {
        Self {
            flow_id: flow_id.into(),
            ..Self::default()
        }
    }

    /// Create a context pre-populated with input variables.
    pub fn with_variables(flow_id: impl Into<String>, variables: HashMap<String, Value>) -> Self {
        Self {
            flow_id: flow_id.into(),
            variables: RwLock::new(variables),
            results: RwLock::default(),
        }
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    /// Set a variable (overwrites any previous value).
    pub fn set_variable(&self, key: impl Into<String>, value: impl Into<Value>) {
        write(&self.variables).insert(key.into(), value.into());
    }

    /// Get a variable by key.
    pub fn variable(&self, key: &str) -> Option<Value> {
        read(&self.variables).get(key).cloned()
    }

    /// Get a variable deserialized as `T`.
    ///
    /// Returns `Ok(None)` when the key is absent and `TypeMismatch` when the
    /// stored value does not have the shape of `T`.
    pub fn variable_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        typed(key, self.variable(key))
    }

    /// Record the output of a node.
    pub fn set_result(&self, node_id: impl Into<String>, value: Value) {
        write(&self.results).insert(node_id.into(), value);
    }

    /// Get the output of a node, if it has run.
    pub fn result(&self, node_id: &str) -> Option<Value> {
        read(&self.results).get(node_id).cloned()
    }

    /// Get the output of a node deserialized as `T`. Same rules as
    /// [`Context::variable_as`].
    pub fn result_as<T: DeserializeOwned>(&self, node_id: &str) -> Result<Option<T>> {
        typed(node_id, self.result(node_id))
    }

    pub fn has_result(&self, node_id: &str) -> bool {
        read(&self.results).contains_key(node_id)
    }

    /// Copy of all node outputs recorded so far.
    pub fn results(&self) -> HashMap<String, Value> {
        read(&self.results).clone()
    }

    /// Copy of all variables.
    pub fn variables(&self) -> HashMap<String, Value> {
        read(&self.variables).clone()
    }
}

fn read(
    lock: &RwLock<HashMap<String, Value>>,
) -> std::sync::RwLockReadGuard<'_, HashMap<String, Value>> {
    lock.read().unwrap_or_else(|e| e.into_inner())
}

fn write(
    lock: &RwLock<HashMap<String, Value>>,
) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Value>> {
    lock.write().unwrap_or_else(|e| e.into_inner())
}

fn typed<T: DeserializeOwned>(key: &str, value: Option<Value>) -> Result<Option<T>> {
    let Some(value) = value else {
        return Ok(None);
    };
    let found = value_kind(&value);
    serde_json::from_value(value)
        .map(Some)
        .map_err(|_| BizFlowError::TypeMismatch {
            key: key.to_string(),
            expected: std::any::type_name::<T>(),
            found: found.to_string(),
        })
}

/// JSON kind name used in type-mismatch messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
