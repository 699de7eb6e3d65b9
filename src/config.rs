// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the community guard service.
//!
//! Rate-limit policies are compiled into [`crate::limiter`] and are not
//! configurable here.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Configuration for the community guard service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Automated caller configuration
    #[serde(default)]
    pub cron: CronConfig,

    /// External endpoint registry
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Shared counter store
    #[serde(default)]
    pub store: StoreConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Shared secret for scheduled jobs.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct CronConfig {
    /// Bearer token expected from automated callers. Unset rejects them all.
    #[serde(default)]
    pub secret: Option<String>,
}

impl std::fmt::Debug for CronConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CronConfig")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Endpoints known to the registry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub registered: Vec<String>,
}

/// Connection to the counter store shared by all instances.
#[derive(Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Endpoint (default: ws://127.0.0.1:8000). `rocksdb://` paths need the
    /// `rocksdb` feature.
    #[serde(default = "default_store_url")]
    pub url: String,

    #[serde(default = "default_store_namespace")]
    pub namespace: String,

    #[serde(default = "default_store_database")]
    pub database: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,
}

impl StoreConfig {
    /// Throwaway store inside the current process.
    pub fn embedded_memory() -> Self {
        Self {
            url: "mem://".to_string(),
            ..Self::default()
        }
    }

    /// Whether counters would live in this process's memory.
    pub fn is_process_local(&self) -> bool {
        self.url == "memory" || self.url.starts_with("mem://")
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            namespace: default_store_namespace(),
            database: default_store_database(),
            username: None,
            password: None,
        }
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("url", &self.url)
            .field("namespace", &self.namespace)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_store_url() -> String {
    "ws://127.0.0.1:8000".to_string()
}

fn default_store_namespace() -> String {
    "community".to_string()
}

fn default_store_database() -> String {
    "guard".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cron: CronConfig::default(),
            endpoints: EndpointConfig::default(),
            store: StoreConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through `lookup`, falling back to defaults.
    ///
    /// Recognized keys: `BIND_ADDR`, `CRON_SECRET`, `REGISTERED_ENDPOINTS`
    /// (comma-separated), `COUNTER_STORE_URL`, `COUNTER_STORE_NAMESPACE`,
    /// `COUNTER_STORE_DATABASE`, `COUNTER_STORE_USER`,
    /// `COUNTER_STORE_PASSWORD`, `METRICS_ENABLED`, `METRICS_PATH`. A metrics
    /// path without a leading `/` gets one.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            cron: CronConfig {
                secret: lookup("CRON_SECRET").filter(|s| !s.is_empty()),
            },
            endpoints: EndpointConfig {
                registered: lookup("REGISTERED_ENDPOINTS")
                    .map(|v| parse_list(&v))
                    .unwrap_or_default(),
            },
            store: StoreConfig {
                url: lookup("COUNTER_STORE_URL").unwrap_or(defaults.store.url),
                namespace: lookup("COUNTER_STORE_NAMESPACE").unwrap_or(defaults.store.namespace),
                database: lookup("COUNTER_STORE_DATABASE").unwrap_or(defaults.store.database),
                username: lookup("COUNTER_STORE_USER").filter(|s| !s.is_empty()),
                password: lookup("COUNTER_STORE_PASSWORD").filter(|s| !s.is_empty()),
            },
            metrics: MetricsConfig {
                enabled: lookup("METRICS_ENABLED")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.metrics.enabled),
                path: lookup("METRICS_PATH")
                    .and_then(|v| route_path(&v))
                    .unwrap_or(defaults.metrics.path),
            },
        }
    }

    /// Reject settings the service must not start with.
    ///
    /// Counters kept in process memory are not shared between instances, so
    /// an in-memory counter store is refused.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.is_process_local() {
            return Err(ConfigError::ProcessLocalStore {
                url: self.store.url.clone(),
            });
        }
        Ok(())
    }
}

/// Trimmed path with a leading `/`; `None` when blank.
fn route_path(value: &str) -> Option<String> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else if value.starts_with('/') {
        Some(value.to_string())
    } else {
        Some(format!("/{value}"))
    }
}

fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
