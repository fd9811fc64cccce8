use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Outcome of one flow execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowResult {
    flow_id: String,
    success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    results: Option<HashMap<String, Value>>,
}

impl FlowResult {
    pub(crate) fn success(
        flow_id: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
        results: HashMap<String, Value>,
    ) -> Self {
        Self {
            flow_id: flow_id.into(),
            success: true,
            error_message: None,
            start_time,
            end_time,
            results: Some(results),
        }
    }

    pub(crate) fn failure(
        flow_id: impl Into<String>,
        error_message: impl Into<String>,
        start_time: DateTime<Utc>,
        end_time: DateTime<Utc>,
    ) -> Self {
        Self {
            flow_id: flow_id.into(),
            success: false,
            error_message: Some(error_message.into()),
            start_time,
            end_time,
            results: None,
        }
    }

    pub fn flow_id(&self) -> &str {
        &self.flow_id
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    /// Node outputs, present only on success.
    pub fn results(&self) -> Option<&HashMap<String, Value>> {
        self.results.as_ref()
    }

    /// Output of a single node, if the run succeeded and the node ran.
    pub fn result(&self, node_id: &str) -> Option<&Value> {
        self.results.as_ref().and_then(|r| r.get(node_id))
    }

    /// Wall-clock duration of the run in milliseconds.
    pub fn execution_time_millis(&self) -> i64 {
        (self.end_time - self.start_time).num_milliseconds()
    }
}
