use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{BizFlowError, Result};

/// Top-level BizFlow configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BizFlowConfig {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub log: LogConfig,
}

/// Execution engine tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Dequeue budget per node before a run is declared cyclic. Default: 2.
    #[serde(default = "default_execution_factor")]
    pub execution_factor: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            execution_factor: default_execution_factor(),
        }
    }
}

/// Diagram export settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// PlantUML theme name. Default: "plain".
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

/// Logging settings for the `bizflow` binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// `tracing_subscriber::EnvFilter` directive. `RUST_LOG` takes precedence.
    #[serde(default = "default_log_filter")]
    pub filter: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: default_log_filter(),
        }
    }
}

fn default_execution_factor() -> usize { 2 }
fn default_theme() -> String { "plain".to_string() }
fn default_log_filter() -> String { "bizflow=info,warn".to_string() }

impl BizFlowConfig {
    /// Load config from a TOML file, with env var expansion.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|_| BizFlowError::ConfigNotFound(path.display().to_string()))?;

        Self::parse(&content)
    }

    /// Load config from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Parse config from a TOML string, with env var expansion.
    pub fn parse(content: &str) -> Result<Self> {
        // Expand ${ENV_VAR} references
        let expanded = expand_env_vars(content);

        let config: Self =
            toml::from_str(&expanded).map_err(|e| BizFlowError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.engine.execution_factor == 0 {
            return Err(BizFlowError::Config(
                "engine.execution_factor must be at least 1".to_string(),
            ));
        }
        if self.export.theme.trim().is_empty() {
            return Err(BizFlowError::Config(
                "export.theme must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Expand `${ENV_VAR}` patterns in a string.
fn expand_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c == '$' && chars.peek() == Some(&'{') {
            chars.next(); // consume '{'
            let mut var_name = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_name.push(c);
            }
            match std::env::var(&var_name) {
                Ok(val) => result.push_str(&val),
                // Keep original if env var not set
                Err(_) => result.push_str(&format!("${{{}}}", var_name)),
            }
        } else {
            result.push(c);
        }
    }
    result
}
