//! Catalog service configuration.
//!
//! Settings come from built-in defaults, an optional JSON file named by
//! `CATALOGD_CONFIG`, then individual `CATALOGD_*` environment variables.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const ENV_CONFIG_FILE: &str = "CATALOGD_CONFIG";
pub const ENV_INIT_STRATEGY: &str = "CATALOGD_INIT_STRATEGY";
pub const ENV_SERVICE_ID: &str = "CATALOGD_SERVICE_ID";
pub const ENV_LOAD_TIMEOUT_MS: &str = "CATALOGD_LOAD_TIMEOUT_MS";
pub const ENV_HTTP_PORT: &str = "CATALOGD_HTTP_PORT";
pub const ENV_METASTORE_ROOT: &str = "CATALOGD_METASTORE_ROOT";

/// How the catalog hydrates itself from the metastore at startup.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InitStrategy {
    /// Enumerate every database, table name and function at construction.
    #[default]
    Immediate,
    /// Defer enumeration until first access.
    Lazy,
}

impl FromStr for InitStrategy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IMMEDIATE" => Ok(InitStrategy::Immediate),
            "LAZY" => Ok(InitStrategy::Lazy),
            other => Err(AppError::config("invalid_init_strategy".to_string(), format!("Unknown init_strategy '{}', expected IMMEDIATE or LAZY", other))),
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq)]
pub struct CatalogConfig {
    #[serde(default)]
    pub init_strategy: InitStrategy,
    /// Identity surfaced in every snapshot; stable for the life of the process.
    #[serde(default = "CatalogConfig::default_service_id")]
    pub service_id: Uuid,
    /// Bound on a single metastore fetch in milliseconds; 0 disables the bound.
    #[serde(default = "CatalogConfig::default_load_timeout_ms")]
    pub load_timeout_ms: u64,
    #[serde(default = "CatalogConfig::default_http_port")]
    pub http_port: u16,
    /// Root folder of the directory-backed metastore used by the binary.
    #[serde(default = "CatalogConfig::default_metastore_root")]
    pub metastore_root: String,
}

impl CatalogConfig {
    fn default_service_id() -> Uuid { Uuid::new_v4() }
    fn default_load_timeout_ms() -> u64 { 30_000 }
    fn default_http_port() -> u16 { 25_020 }
    fn default_metastore_root() -> String { "metastore".to_string() }

    pub fn lazy() -> Self { Self { init_strategy: InitStrategy::Lazy, ..Self::default() } }

    pub fn with_load_timeout(mut self, timeout: Duration) -> Self {
        self.load_timeout_ms = timeout.as_millis().min(u64::MAX as u128) as u64;
        self
    }

    pub fn load_timeout(&self) -> Option<Duration> {
        if self.load_timeout_ms == 0 { None } else { Some(Duration::from_millis(self.load_timeout_ms)) }
    }

    /// Load from a JSON file; absent keys keep their defaults.
    pub fn load_json(path: &Path) -> AppResult<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| AppError::config("config_unreadable".to_string(), format!("Cannot read config '{}': {}", path.display(), e)))?;
        serde_json::from_slice::<CatalogConfig>(&bytes)
            .map_err(|e| AppError::config("config_invalid".to_string(), format!("Invalid config '{}': {}", path.display(), e)))
    }

    /// Defaults, then `CATALOGD_CONFIG` file, then individual env vars.
    pub fn from_env() -> AppResult<Self> {
        let mut cfg = match std::env::var(ENV_CONFIG_FILE) {
            Ok(p) if !p.trim().is_empty() => Self::load_json(Path::new(p.trim()))?,
            _ => Self::default(),
        };
        cfg.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(cfg)
    }

    /// Apply `CATALOGD_*` overrides from an arbitrary lookup (env in production, a map in tests).
    pub fn apply_overrides<F>(&mut self, lookup: F) -> AppResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_INIT_STRATEGY) { self.init_strategy = v.parse()?; }
        if let Some(v) = lookup(ENV_SERVICE_ID) {
            self.service_id = Uuid::parse_str(v.trim())
                .map_err(|e| AppError::config("invalid_service_id".to_string(), format!("{}='{}': {}", ENV_SERVICE_ID, v, e)))?;
        }
        if let Some(v) = lookup(ENV_LOAD_TIMEOUT_MS) {
            self.load_timeout_ms = v.trim().parse::<u64>()
                .map_err(|e| AppError::config("invalid_load_timeout".to_string(), format!("{}='{}': {}", ENV_LOAD_TIMEOUT_MS, v, e)))?;
        }
        if let Some(v) = lookup(ENV_HTTP_PORT) {
            self.http_port = v.trim().parse::<u16>()
                .map_err(|e| AppError::config("invalid_http_port".to_string(), format!("{}='{}': {}", ENV_HTTP_PORT, v, e)))?;
        }
        if let Some(v) = lookup(ENV_METASTORE_ROOT) { self.metastore_root = v; }
        Ok(())
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            init_strategy: InitStrategy::default(),
            service_id: Self::default_service_id(),
            load_timeout_ms: Self::default_load_timeout_ms(),
            http_port: Self::default_http_port(),
            metastore_root: Self::default_metastore_root(),
        }
    }
}
