//! Configuration system for replen.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::{ReplenError, ReplenResult};
use crate::execution::{HttpExecutor, HttpExecutorConfig, IntentExecutor, LoggingExecutor};
use crate::scanner::ScannerConfig;

/// Which execution collaborator to install at startup.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ExecutorKind {
    /// No collaborator; due intents stay pending
    None,
    /// Log each intent and report success
    #[default]
    Logging,
    /// POST each intent to an HTTP endpoint
    Http,
}

/// Execution collaborator configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    pub kind: ExecutorKind,
    /// Endpoint for the `http` kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    /// HMAC secret for the `http` kind.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub request_timeout_secs: u64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            kind: ExecutorKind::Logging,
            endpoint: None,
            secret: None,
            request_timeout_secs: 30,
        }
    }
}

impl ExecutorConfig {
    /// Instantiate the configured collaborator, if any.
    pub fn build(&self) -> ReplenResult<Option<Arc<dyn IntentExecutor>>> {
        match self.kind {
            ExecutorKind::None => Ok(None),
            ExecutorKind::Logging => Ok(Some(Arc::new(LoggingExecutor::new()))),
            ExecutorKind::Http => {
                let endpoint = self.endpoint.clone().ok_or_else(|| {
                    ReplenError::Configuration(
                        "executor.endpoint is required for the http executor".to_string(),
                    )
                })?;
                let mut config =
                    HttpExecutorConfig::new(endpoint).with_timeout_secs(self.request_timeout_secs);
                if let Some(secret) = &self.secret {
                    config = config.with_secret(secret.clone());
                }
                Ok(Some(Arc::new(HttpExecutor::new(config)?)))
            }
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    /// `host:port` string for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Main replen configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplenConfig {
    /// Scanner configuration.
    pub scanner: ScannerConfig,
    /// Execution collaborator configuration.
    pub executor: ExecutorConfig,
    /// Server configuration.
    pub server: ServerConfig,
}

impl ReplenConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<Path>) -> ReplenResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| ReplenError::Configuration(e.to_string()))
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| ReplenError::Configuration(e.to_string())),
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| ReplenError::Configuration(e.to_string())),
            _ => Err(ReplenError::Configuration(
                "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
            )),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// Unparseable values are ignored and the default kept.
    pub fn from_env() -> Self {
        Self::default().merge_env(|key| std::env::var(key).ok())
    }

    /// Overlay values from `lookup` onto this configuration.
    fn merge_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        // Scanner
        if let Some(ms) = lookup("REPLEN_TICK_INTERVAL_MS").and_then(|v| v.parse().ok()) {
            self.scanner.tick_interval_ms = ms;
        }
        if let Some(ms) = lookup("REPLEN_EXECUTION_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.scanner.execution_timeout_ms = ms;
        }
        if let Some(n) = lookup("REPLEN_MAX_CONCURRENCY").and_then(|v| v.parse().ok()) {
            self.scanner.max_concurrency = n;
        }
        if let Some(n) = lookup("REPLEN_MAX_ATTEMPTS").and_then(|v| v.parse().ok()) {
            self.scanner.max_attempts = Some(n);
        }
        if let Some(flag) = lookup("REPLEN_RUN_ON_START").and_then(|v| parse_bool(&v)) {
            self.scanner.run_on_start = flag;
        }

        // Executor
        if let Some(kind) = lookup("REPLEN_EXECUTOR").and_then(|v| v.parse().ok()) {
            self.executor.kind = kind;
        }
        if let Some(endpoint) = lookup("REPLEN_EXECUTOR_ENDPOINT") {
            self.executor.endpoint = Some(endpoint);
        }
        if let Some(secret) = lookup("REPLEN_EXECUTOR_SECRET") {
            self.executor.secret = Some(secret);
        }

        // Server
        if let Some(host) = lookup("REPLEN_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("REPLEN_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }

        self
    }

    /// Check the configuration for values the runtime cannot use.
    pub fn validate(&self) -> ReplenResult<()> {
        self.scanner.validate()?;
        if self.executor.kind == ExecutorKind::Http
            && self
                .executor
                .endpoint
                .as_deref()
                .map_or(true, |e| e.trim().is_empty())
        {
            return Err(ReplenError::Configuration(
                "executor.endpoint is required for the http executor".to_string(),
            ));
        }
        Ok(())
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> ReplenConfigBuilder {
        ReplenConfigBuilder::default()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Builder for ReplenConfig.
#[derive(Default)]
pub struct ReplenConfigBuilder {
    config: ReplenConfig,
}

impl ReplenConfigBuilder {
    /// Set scanner configuration.
    pub fn scanner(mut self, config: ScannerConfig) -> Self {
        self.config.scanner = config;
        self
    }

    /// Set executor configuration.
    pub fn executor(mut self, config: ExecutorConfig) -> Self {
        self.config.executor = config;
        self
    }

    /// Use no execution collaborator.
    pub fn without_executor(mut self) -> Self {
        self.config.executor.kind = ExecutorKind::None;
        self
    }

    /// Set server configuration.
    pub fn server(mut self, config: ServerConfig) -> Self {
        self.config.server = config;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> ReplenConfig {
        self.config
    }
}
