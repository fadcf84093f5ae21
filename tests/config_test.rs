// ABOUTME: Integration tests for environment-driven configuration
// ABOUTME: Serialized because they mutate process environment variables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::time::Duration;

use lumen_insights::config::ServerConfig;
use serial_test::serial;

const VARS: &[&str] = &[
    "WAREHOUSE_LOOKBACK_DAYS",
    "WAREHOUSE_POLL_INTERVAL_SECS",
    "QUERY_CACHE_TTL_SECS",
    "REDIS_URL",
    "JWT_SECRET",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_defaults_without_environment() {
    clear_env();
    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.warehouse.lookback_days, 30);
    assert_eq!(config.warehouse.poll_interval, Duration::from_secs(2));
    assert_eq!(config.cache.default_ttl, Duration::from_secs(3600));
    assert!(config.cache.redis_url.is_none());
}

#[test]
#[serial]
fn test_environment_overrides_applied() {
    clear_env();
    std::env::set_var("WAREHOUSE_LOOKBACK_DAYS", "7");
    std::env::set_var("QUERY_CACHE_TTL_SECS", "120");
    std::env::set_var("REDIS_URL", "redis://cache:6379");

    let config = ServerConfig::from_env().unwrap();
    assert_eq!(config.warehouse.lookback_days, 7);
    assert_eq!(config.cache.default_ttl, Duration::from_secs(120));
    assert_eq!(config.cache.redis_url.as_deref(), Some("redis://cache:6379"));

    clear_env();
}

#[test]
#[serial]
fn test_unparseable_value_is_rejected() {
    clear_env();
    std::env::set_var("WAREHOUSE_POLL_INTERVAL_SECS", "soon");
    assert!(ServerConfig::from_env().is_err());
    clear_env();
}

#[test]
#[serial]
fn test_empty_redis_url_means_in_memory() {
    clear_env();
    std::env::set_var("REDIS_URL", "");
    let config = ServerConfig::from_env().unwrap();
    assert!(config.cache.redis_url.is_none());
    clear_env();
}
