//! Mocks and fixtures shared by BizFlow tests.
//!
//! `RecordingExecutor` stands in for both buses: it remembers every message
//! it was asked to send and answers from a table of canned responses.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Arc, Mutex};

use futures::future::{self, BoxFuture};
use serde_json::{json, Value};
use tempfile::NamedTempFile;

use bizflow_core::config::BizFlowConfig;
use bizflow_core::error::{BizFlowError, Result};
use bizflow_core::traits::{Command, CommandExecutor, Query, QueryExecutor};

// ── Fixtures ────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub order_id: String,
    pub amount: u64,
}

impl Command for CreateOrder {
    fn is_valid(&self) -> bool {
        !self.order_id.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct ApproveOrder {
    pub order_id: String,
}

impl Command for ApproveOrder {}

#[derive(Debug, Clone)]
pub struct RejectOrder {
    pub order_id: String,
    pub reason: String,
}

impl Command for RejectOrder {}

#[derive(Debug, Clone)]
pub struct CheckStock {
    pub sku: String,
}

impl Query for CheckStock {
    fn is_valid(&self) -> bool {
        !self.sku.is_empty()
    }
}

/// Write `contents` to a temporary `.toml` file and keep it alive.
pub fn temp_config(contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("create temp config");
    file.write_all(contents.as_bytes()).expect("write temp config");
    file
}

/// Parse a TOML snippet into a config, panicking on bad input.
pub fn config_from(toml_str: &str) -> BizFlowConfig {
    BizFlowConfig::parse(toml_str).expect("fixture config should parse")
}

// ── Recording executor ──────────────────────────────────────────

#[derive(Default)]
struct Recorded {
    sent: Vec<String>,
    responses: HashMap<String, Value>,
    failing: HashMap<String, String>,
}

/// Mock command and query executor.
///
/// Messages are answered by name: a configured failure wins, then a canned
/// response, then `{"handled": <name>}`.
#[derive(Clone, Default)]
pub struct RecordingExecutor {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer messages named `name` with `value`.
    pub fn respond(&self, name: &str, value: Value) -> &Self {
        self.lock().responses.insert(name.to_string(), value);
        self
    }

    /// Fail messages named `name` with a handler error.
    pub fn fail(&self, name: &str, message: &str) -> &Self {
        self.lock()
            .failing
            .insert(name.to_string(), message.to_string());
        self
    }

    /// Names of every message sent so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    pub fn sent_count(&self) -> usize {
        self.lock().sent.len()
    }

    fn answer(&self, name: &'static str) -> Result<Value> {
        let mut recorded = self.lock();
        recorded.sent.push(name.to_string());
        if let Some(message) = recorded.failing.get(name) {
            return Err(BizFlowError::Handler(message.clone()));
        }
        Ok(recorded
            .responses
            .get(name)
            .cloned()
            .unwrap_or_else(|| json!({ "handled": name })))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl CommandExecutor for RecordingExecutor {
    fn send(&self, command: &dyn Command) -> Result<Value> {
        self.answer(command.name())
    }

    fn send_async(&self, command: Arc<dyn Command>) -> BoxFuture<'static, Result<Value>> {
        Box::pin(future::ready(self.answer(command.name())))
    }

    fn handler_count(&self) -> usize {
        self.lock().responses.len()
    }
}

impl QueryExecutor for RecordingExecutor {
    fn send(&self, query: &dyn Query) -> Result<Value> {
        self.answer(query.name())
    }

    fn send_async(&self, query: Arc<dyn Query>) -> BoxFuture<'static, Result<Value>> {
        Box::pin(future::ready(self.answer(query.name())))
    }

    fn handler_count(&self) -> usize {
        self.lock().responses.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_and_answers() {
        let exec = RecordingExecutor::new();
        exec.respond("CheckStock", json!(true));

        let stock = QueryExecutor::send(&exec, &CheckStock { sku: "A1".into() }).unwrap();
        assert_eq!(stock, json!(true));

        let created = CommandExecutor::send(
            &exec,
            &CreateOrder {
                order_id: "o-1".into(),
                amount: 10,
            },
        )
        .unwrap();
        assert_eq!(created, json!({ "handled": "CreateOrder" }));
        assert_eq!(exec.sent(), vec!["CheckStock", "CreateOrder"]);
    }

    #[test]
    fn test_failure_wins_over_response() {
        let exec = RecordingExecutor::new();
        exec.respond("ApproveOrder", json!(1))
            .fail("ApproveOrder", "approval service down");
        let err = CommandExecutor::send(
            &exec,
            &ApproveOrder {
                order_id: "o-1".into(),
            },
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Handler failed: approval service down");
        assert_eq!(exec.sent_count(), 1);
    }

    #[test]
    fn test_temp_config_roundtrip() {
        let file = temp_config("[engine]\nexecution_factor = 4\n");
        let config = BizFlowConfig::load(file.path()).unwrap();
        assert_eq!(config.engine.execution_factor, 4);
    }
}
