// ABOUTME: Redis cache implementation with managed connections and TTL support
// ABOUTME: Provides shared caching for multi-instance deployments
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{namespaced, CacheConfig, CacheKey, QueryCache};
use crate::constants::cache::CACHE_KEY_PREFIX;
use crate::errors::{AppError, AppResult};
use crate::models::{QueryResult, TenantId};
use redis::aio::{ConnectionManager, ConnectionManagerConfig};
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{error, info, warn};

/// Initial connection attempts before giving up
const CONNECT_RETRIES: u32 = 3;
/// Delay before the first reconnect attempt
const INITIAL_RETRY_DELAY_MS: u64 = 500;
/// Ceiling for the reconnect backoff
const MAX_RETRY_DELAY_MS: u64 = 5_000;
/// Connection establishment timeout
const CONNECTION_TIMEOUT_SECS: u64 = 5;
/// Per-command response timeout
const RESPONSE_TIMEOUT_SECS: u64 = 5;

/// Redis cache backed by a `ConnectionManager` for automatic reconnection.
///
/// All keys carry the namespace prefix, so a shared Redis instance can be
/// cleared without touching unrelated data. Entry expiry is delegated to
/// Redis via SETEX.
#[derive(Clone)]
pub struct RedisCache {
    manager: ConnectionManager,
}

impl RedisCache {
    /// Connect to the Redis instance named in the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no Redis URL is configured or the connection
    /// cannot be established after retries.
    pub async fn connect(config: &CacheConfig) -> AppResult<Self> {
        let redis_url = config
            .redis_url
            .as_ref()
            .ok_or_else(|| AppError::config("Redis URL is required for the Redis cache backend"))?;

        info!("Connecting to Redis at {}", redis_url);

        let client = redis::Client::open(redis_url.as_str())
            .map_err(|e| AppError::cache_unavailable(format!("Invalid Redis URL: {e}")))?;

        let manager = Self::connect_with_retry(&client).await?;

        info!("Successfully connected to Redis");

        Ok(Self { manager })
    }

    /// Connect with exponential backoff on failure
    async fn connect_with_retry(client: &redis::Client) -> AppResult<ConnectionManager> {
        let manager_config = ConnectionManagerConfig::new()
            .set_connection_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
            .set_response_timeout(Duration::from_secs(RESPONSE_TIMEOUT_SECS))
            .set_max_delay(MAX_RETRY_DELAY_MS);

        let mut last_error = None;
        let mut delay_ms = INITIAL_RETRY_DELAY_MS;

        for attempt in 0..=CONNECT_RETRIES {
            match ConnectionManager::new_with_config(client.clone(), manager_config.clone()).await {
                Ok(manager) => {
                    if attempt > 0 {
                        info!("Redis connection established after {} retries", attempt);
                    }
                    return Ok(manager);
                }
                Err(e) => {
                    if attempt < CONNECT_RETRIES {
                        warn!(
                            "Redis connection attempt {}/{} failed, retrying in {}ms: {}",
                            attempt + 1,
                            CONNECT_RETRIES + 1,
                            delay_ms,
                            e
                        );
                        tokio::time::sleep(Duration::from_millis(delay_ms)).await;
                        delay_ms = (delay_ms * 2).min(MAX_RETRY_DELAY_MS);
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(AppError::cache_unavailable(format!(
            "Failed to connect to Redis after {} attempts: {}",
            CONNECT_RETRIES + 1,
            last_error.map_or_else(|| "unknown error".to_owned(), |e| e.to_string())
        )))
    }

    /// Delete every key matching a Redis pattern, cursor-safe for large sets
    async fn delete_matching(&self, pattern: &str) -> AppResult<u64> {
        let mut conn = self.manager.clone();
        let mut count = 0u64;
        let mut cursor = 0u64;

        loop {
            let (new_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(100)
                .query_async(&mut conn)
                .await
                .map_err(|e| {
                    error!("Redis SCAN failed: {}", e);
                    AppError::cache_unavailable(format!("Cache error: {e}"))
                })?;

            if !keys.is_empty() {
                let deleted: u64 = conn.del(&keys).await.map_err(|e| {
                    error!("Redis DEL failed: {}", e);
                    AppError::cache_unavailable(format!("Cache error: {e}"))
                })?;
                count += deleted;
            }

            cursor = new_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(count)
    }
}

#[async_trait::async_trait]
impl QueryCache for RedisCache {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<QueryResult>> {
        let redis_key = namespaced(key);
        let mut conn = self.manager.clone();

        let data: Option<Vec<u8>> = conn.get(&redis_key).await.map_err(|e| {
            error!("Redis GET operation failed: {}", e);
            AppError::cache_unavailable(format!("Cache error: {e}"))
        })?;

        match data {
            Some(bytes) => {
                let value: QueryResult = serde_json::from_slice(&bytes).map_err(|e| {
                    AppError::serialization(format!("Cache deserialization failed: {e}"))
                })?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &CacheKey, value: &QueryResult, ttl: Duration) -> AppResult<()> {
        let serialized = serde_json::to_vec(value)
            .map_err(|e| AppError::serialization(format!("Cache serialization failed: {e}")))?;
        let redis_key = namespaced(key);

        let mut conn = self.manager.clone();

        // SETEX stores the value and its expiry in one atomic operation
        conn.set_ex::<_, _, ()>(&redis_key, serialized, ttl.as_secs())
            .await
            .map_err(|e| {
                error!("Redis SET operation failed: {}", e);
                AppError::cache_unavailable(format!("Cache error: {e}"))
            })?;

        Ok(())
    }

    async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        let redis_key = namespaced(key);
        let mut conn = self.manager.clone();

        let _: () = conn.del(&redis_key).await.map_err(|e| {
            error!("Redis DEL operation failed: {}", e);
            AppError::cache_unavailable(format!("Cache error: {e}"))
        })?;

        Ok(())
    }

    async fn invalidate_tenant(&self, tenant_id: &TenantId) -> AppResult<u64> {
        let pattern = format!("{CACHE_KEY_PREFIX}{}", CacheKey::tenant_pattern(tenant_id));
        self.delete_matching(&pattern).await
    }

    async fn health_check(&self) -> AppResult<()> {
        let mut conn = self.manager.clone();

        let response: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                error!("Redis PING failed: {}", e);
                AppError::cache_unavailable(format!("Cache error: {e}"))
            })?;

        if response == "PONG" {
            Ok(())
        } else {
            Err(AppError::cache_unavailable(format!(
                "Unexpected PING response '{response}'"
            )))
        }
    }

    async fn clear_all(&self) -> AppResult<()> {
        // Clear only keys in our namespace (safe for shared Redis instances)
        self.delete_matching(&format!("{CACHE_KEY_PREFIX}*")).await?;
        Ok(())
    }
}
