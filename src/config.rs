//! Case configuration: backend selection, pool sizing and retry budgets.
//!
//! Grounded on the teacher's `config::app_config::AppConfig` — a
//! `serde`-backed struct loaded from a file with sensible defaults,
//! persisted back on first use — generalized from "one JSON file per
//! library" to "one descriptor per case backend".

use crate::error::{Result, SkcdError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which engine backs a case, and how to reach it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum BackendDescriptor {
    /// Single-user, single-file SQLite case.
    Embedded { path: PathBuf },
    /// Multi-user PostgreSQL case.
    Networked {
        host: String,
        port: String,
        database: String,
        username: String,
        password: String,
        #[serde(default)]
        ssl_enabled: bool,
        #[serde(default)]
        ssl_verify: bool,
        #[serde(default)]
        ssl_custom_class: Option<String>,
    },
}

impl BackendDescriptor {
    /// §6.2: missing host/port/user/password yields a typed error before
    /// any connection is attempted.
    pub fn validate(&self) -> Result<()> {
        if let BackendDescriptor::Networked {
            host,
            port,
            username,
            password,
            ..
        } = self
        {
            if host.trim().is_empty() {
                return Err(SkcdError::ConnectionMissingHost);
            }
            if port.trim().is_empty() {
                return Err(SkcdError::ConnectionMissingPort);
            }
            if username.trim().is_empty() {
                return Err(SkcdError::ConnectionMissingUser);
            }
            if password.is_empty() {
                return Err(SkcdError::ConnectionMissingPassword);
            }
        }
        Ok(())
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self, BackendDescriptor::Embedded { .. })
    }

    /// Overrides individual `Networked` fields from the process environment
    /// (`SKCD_DB_HOST`, `SKCD_DB_PORT`, `SKCD_DB_NAME`, `SKCD_DB_USER`,
    /// `SKCD_DB_PASSWORD`, `SKCD_DB_SSL_ENABLED`, `SKCD_DB_SSL_VERIFY`,
    /// `SKCD_DB_SSL_CUSTOM_CLASS`), leaving unset variables untouched. A
    /// no-op on `Embedded` descriptors.
    pub fn apply_env_overrides(&mut self) {
        let BackendDescriptor::Networked {
            host,
            port,
            database,
            username,
            password,
            ssl_enabled,
            ssl_verify,
            ssl_custom_class,
        } = self
        else {
            return;
        };
        if let Ok(v) = std::env::var("SKCD_DB_HOST") {
            *host = v;
        }
        if let Ok(v) = std::env::var("SKCD_DB_PORT") {
            *port = v;
        }
        if let Ok(v) = std::env::var("SKCD_DB_NAME") {
            *database = v;
        }
        if let Ok(v) = std::env::var("SKCD_DB_USER") {
            *username = v;
        }
        if let Ok(v) = std::env::var("SKCD_DB_PASSWORD") {
            *password = v;
        }
        if let Ok(v) = std::env::var("SKCD_DB_SSL_ENABLED") {
            *ssl_enabled = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("SKCD_DB_SSL_VERIFY") {
            *ssl_verify = matches!(v.as_str(), "1" | "true" | "yes");
        }
        if let Ok(v) = std::env::var("SKCD_DB_SSL_CUSTOM_CLASS") {
            *ssl_custom_class = Some(v);
        }
    }
}

/// Pool and retry tuning (§4.2). Defaults mirror the spec's stated policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub min_connections: u32,
    pub max_connections: u32,
    pub statement_cache_capacity: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_connections: 5,
            max_connections: 20,
            statement_cache_capacity: 200,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub embedded_max_retries: u32,
    pub embedded_backoff_secs: u64,
    pub networked_max_retries: u32,
    pub networked_backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            embedded_max_retries: 20,
            embedded_backoff_secs: 5,
            networked_max_retries: 3,
            networked_backoff_secs: 5,
        }
    }
}

/// Full case configuration, persisted alongside the case as
/// `case.toml` for networked cases (embedded cases carry only the backend
/// path, supplied by the caller, and do not need a sidecar file).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CaseConfig {
    pub pool: PoolConfig,
    pub retry: RetryConfig,
    /// §4.4: a process-wide escape hatch a client can set to suppress
    /// timeline-event derivation on file insert.
    pub timeline_events_disabled: bool,
}

impl CaseConfig {
    /// Loads from `path` (falling back to defaults if it doesn't exist yet),
    /// then applies any `SKCD_POOL_*` / `SKCD_RETRY_*` / `SKCD_TIMELINE_*`
    /// environment overrides on top — the same layering `BackendDescriptor`
    /// applies for its connection fields.
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let text = std::fs::read_to_string(path)?;
            toml::from_str(&text).map_err(|e| SkcdError::Other(format!("invalid case config: {e}")))?
        } else {
            Self::default()
        };
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("SKCD_POOL_MIN_CONNECTIONS") {
            if let Ok(v) = v.parse() {
                self.pool.min_connections = v;
            }
        }
        if let Ok(v) = std::env::var("SKCD_POOL_MAX_CONNECTIONS") {
            if let Ok(v) = v.parse() {
                self.pool.max_connections = v;
            }
        }
        if let Ok(v) = std::env::var("SKCD_RETRY_NETWORKED_MAX_RETRIES") {
            if let Ok(v) = v.parse() {
                self.retry.networked_max_retries = v;
            }
        }
        if let Ok(v) = std::env::var("SKCD_TIMELINE_EVENTS_DISABLED") {
            self.timeline_events_disabled = matches!(v.as_str(), "1" | "true" | "yes");
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let text = toml::to_string_pretty(self)
            .map_err(|e| SkcdError::Other(format!("failed to serialize case config: {e}")))?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn networked_descriptor_requires_all_connection_fields() {
        let desc = BackendDescriptor::Networked {
            host: String::new(),
            port: "5432".into(),
            database: "case".into(),
            username: "analyst".into(),
            password: "secret".into(),
            ssl_enabled: false,
            ssl_verify: false,
            ssl_custom_class: None,
        };
        assert!(matches!(
            desc.validate(),
            Err(SkcdError::ConnectionMissingHost)
        ));
    }

    #[test]
    fn embedded_descriptor_always_validates() {
        let desc = BackendDescriptor::Embedded {
            path: PathBuf::from("/tmp/case.db"),
        };
        assert!(desc.validate().is_ok());
        assert!(desc.is_embedded());
    }

    #[test]
    fn default_pool_config_matches_spec_policy() {
        let pool = PoolConfig::default();
        assert_eq!(pool.min_connections, 5);
        assert_eq!(pool.max_connections, 20);
        assert_eq!(pool.statement_cache_capacity, 200);
    }

    /// Guards every test in this module that touches process-global env
    /// vars so they don't race each other under the default parallel test
    /// runner.
    static ENV_GUARD: std::sync::Mutex<()> = std::sync::Mutex::new(());

    #[test]
    fn backend_descriptor_env_overrides_apply_to_networked_fields() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("SKCD_DB_HOST", "db.example.test");
        std::env::set_var("SKCD_DB_SSL_ENABLED", "true");
        let mut desc = BackendDescriptor::Networked {
            host: "localhost".into(),
            port: "5432".into(),
            database: "case".into(),
            username: "analyst".into(),
            password: "secret".into(),
            ssl_enabled: false,
            ssl_verify: false,
            ssl_custom_class: None,
        };
        desc.apply_env_overrides();
        std::env::remove_var("SKCD_DB_HOST");
        std::env::remove_var("SKCD_DB_SSL_ENABLED");
        match desc {
            BackendDescriptor::Networked { host, ssl_enabled, port, .. } => {
                assert_eq!(host, "db.example.test");
                assert!(ssl_enabled);
                assert_eq!(port, "5432");
            }
            BackendDescriptor::Embedded { .. } => panic!("expected Networked"),
        }
    }

    #[test]
    fn backend_descriptor_env_overrides_are_noop_on_embedded() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("SKCD_DB_HOST", "db.example.test");
        let mut desc = BackendDescriptor::Embedded { path: PathBuf::from("/tmp/case.db") };
        desc.apply_env_overrides();
        std::env::remove_var("SKCD_DB_HOST");
        assert!(desc.is_embedded());
    }

    #[test]
    fn case_config_env_overrides_apply_on_top_of_defaults() {
        let _guard = ENV_GUARD.lock().unwrap();
        std::env::set_var("SKCD_POOL_MAX_CONNECTIONS", "42");
        std::env::set_var("SKCD_TIMELINE_EVENTS_DISABLED", "1");
        let mut config = CaseConfig::default();
        config.apply_env_overrides();
        std::env::remove_var("SKCD_POOL_MAX_CONNECTIONS");
        std::env::remove_var("SKCD_TIMELINE_EVENTS_DISABLED");
        assert_eq!(config.pool.max_connections, 42);
        assert!(config.timeline_events_disabled);
    }
}
