// ABOUTME: Environment-driven server configuration for warehouse, LLM, cache, and auth
// ABOUTME: Every value has a development default; production overrides via env vars
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Environment-based configuration.
//!
//! Follows an environment-only approach: a single [`ServerConfig::from_env`]
//! call assembles the full configuration, with development defaults for every
//! value so a local run needs no setup.

use crate::constants::{cache as cache_defaults, warehouse as warehouse_defaults};
use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Read an environment variable or fall back to a default, parsing to `T`
fn env_var_or<T>(name: &str, default: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_owned());
    raw.parse::<T>()
        .map_err(|e| anyhow::anyhow!("Invalid value for {name}: {e}"))
}

/// Warehouse query engine settings
#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    /// Logical database the queries run against
    pub database: String,
    /// Workgroup the executions are attributed to
    pub workgroup: String,
    /// Location query output is written to
    pub output_location: String,
    /// Interval between execution status polls
    pub poll_interval: Duration,
    /// Maximum wall-clock time a query may run before cancellation
    pub query_timeout: Duration,
    /// Partition-pruning lookback window suggested to the SQL generator
    pub lookback_days: u32,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            database: "health_data_lake".into(),
            workgroup: "health-data-tenant-queries".into(),
            output_location: "s3://health-data-lake/athena-results/".into(),
            poll_interval: Duration::from_secs(warehouse_defaults::POLL_INTERVAL_SECS),
            query_timeout: Duration::from_secs(warehouse_defaults::DEFAULT_QUERY_TIMEOUT_SECS),
            lookback_days: warehouse_defaults::DEFAULT_LOOKBACK_DAYS,
        }
    }
}

/// Language-model provider settings
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint base URL
    pub base_url: String,
    /// Model identifier
    pub model: String,
    /// API key; optional for local servers
    pub api_key: Option<String>,
    /// Hard cap on a single completion request
    pub request_timeout: Duration,
    /// Sampling temperature
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".into(),
            model: "llama3".into(),
            api_key: None,
            request_timeout: Duration::from_secs(300),
            temperature: 0.7,
        }
    }
}

/// Result cache settings
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Redis connection URL; absent selects the in-memory backend
    pub redis_url: Option<String>,
    /// TTL applied to cached query results
    pub default_ttl: Duration,
    /// Entry cap for the in-memory backend
    pub max_entries: usize,
    /// Cadence of the in-memory expired-entry sweep
    pub cleanup_interval: Duration,
    /// Whether the in-memory backend runs its background sweep task
    pub enable_background_cleanup: bool,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            redis_url: None,
            default_ttl: Duration::from_secs(cache_defaults::DEFAULT_TTL_SECS),
            max_entries: cache_defaults::DEFAULT_MAX_ENTRIES,
            cleanup_interval: Duration::from_secs(cache_defaults::DEFAULT_CLEANUP_INTERVAL_SECS),
            enable_background_cleanup: true,
        }
    }
}

/// Auth claim settings for the session/credential boundary
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// HS256 signing secret
    pub jwt_secret: String,
    /// Token lifetime in hours
    pub expiry_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: "dev-secret-change-in-production".into(),
            expiry_hours: 24,
        }
    }
}

/// Complete server configuration
#[derive(Debug, Clone, Default)]
pub struct ServerConfig {
    /// Warehouse engine settings
    pub warehouse: WarehouseConfig,
    /// LLM provider settings
    pub llm: LlmConfig,
    /// Result cache settings
    pub cache: CacheSettings,
    /// Auth claim settings
    pub auth: AuthConfig,
}

impl ServerConfig {
    /// Assemble configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when a variable is present but cannot be parsed.
    pub fn from_env() -> Result<Self> {
        let warehouse = WarehouseConfig {
            database: env_var_or("WAREHOUSE_DATABASE", "health_data_lake")?,
            workgroup: env_var_or("WAREHOUSE_WORKGROUP", "health-data-tenant-queries")?,
            output_location: env_var_or(
                "WAREHOUSE_OUTPUT_LOCATION",
                "s3://health-data-lake/athena-results/",
            )?,
            poll_interval: Duration::from_secs(env_var_or(
                "WAREHOUSE_POLL_INTERVAL_SECS",
                "2",
            )?),
            query_timeout: Duration::from_secs(env_var_or(
                "WAREHOUSE_QUERY_TIMEOUT_SECS",
                "300",
            )?),
            lookback_days: env_var_or("WAREHOUSE_LOOKBACK_DAYS", "30")?,
        };

        let llm = LlmConfig {
            base_url: env_var_or("LUMEN_LLM_BASE_URL", "http://localhost:11434/v1")?,
            model: env_var_or("LUMEN_LLM_MODEL", "llama3")?,
            api_key: env::var("LUMEN_LLM_API_KEY").ok().filter(|k| !k.is_empty()),
            request_timeout: Duration::from_secs(env_var_or("LUMEN_LLM_TIMEOUT_SECS", "300")?),
            temperature: env_var_or("LUMEN_LLM_TEMPERATURE", "0.7")?,
        };

        let cache = CacheSettings {
            redis_url: env::var("REDIS_URL").ok().filter(|u| !u.is_empty()),
            default_ttl: Duration::from_secs(env_var_or("QUERY_CACHE_TTL_SECS", "3600")?),
            max_entries: env_var_or("QUERY_CACHE_MAX_ENTRIES", "1000")?,
            cleanup_interval: Duration::from_secs(env_var_or(
                "QUERY_CACHE_CLEANUP_INTERVAL_SECS",
                "300",
            )?),
            enable_background_cleanup: env_var_or("QUERY_CACHE_BACKGROUND_CLEANUP", "true")?,
        };

        let auth = AuthConfig {
            jwt_secret: env::var("JWT_SECRET")
                .unwrap_or_else(|_| "dev-secret-change-in-production".into()),
            expiry_hours: env_var_or("JWT_EXPIRATION_HOURS", "24")
                .context("JWT_EXPIRATION_HOURS must be an integer")?,
        };

        Ok(Self {
            warehouse,
            llm,
            cache,
            auth,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_consistent() {
        let config = ServerConfig::default();
        assert_eq!(config.warehouse.poll_interval, Duration::from_secs(2));
        assert_eq!(config.warehouse.lookback_days, 30);
        assert_eq!(config.cache.default_ttl, Duration::from_secs(3600));
        assert!(config.cache.redis_url.is_none());
    }
}
