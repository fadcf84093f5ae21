// ABOUTME: Cache factory for configuration-based backend selection
// ABOUTME: Prefers Redis when a URL is configured, falls back to in-memory
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use super::{memory::InMemoryCache, redis::RedisCache, CacheConfig, CacheKey, QueryCache};
use crate::errors::AppResult;
use crate::models::{QueryResult, TenantId};
use std::time::Duration;
use tracing::{info, warn};

/// Unified cache handle over the configured backend.
///
/// Construction never fails: a Redis backend that cannot be reached at
/// startup degrades to the in-memory backend with a warning, because a
/// missing cache must never take the service down with it.
#[derive(Clone)]
pub struct Cache {
    backend: Backend,
}

#[derive(Clone)]
enum Backend {
    Memory(InMemoryCache),
    Redis(RedisCache),
}

impl Cache {
    /// Create a cache instance for the given configuration
    pub async fn new(config: CacheConfig) -> Self {
        let backend = if config.redis_url.is_some() {
            match RedisCache::connect(&config).await {
                Ok(redis) => {
                    info!("Query cache using Redis backend");
                    Backend::Redis(redis)
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        "Redis cache unavailable, falling back to in-memory backend"
                    );
                    Backend::Memory(InMemoryCache::new(&config))
                }
            }
        } else {
            info!(
                "Query cache using in-memory backend (max entries: {})",
                config.max_entries
            );
            Backend::Memory(InMemoryCache::new(&config))
        };

        Self { backend }
    }

    /// Backend name for diagnostics
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        match &self.backend {
            Backend::Memory(_) => "memory",
            Backend::Redis(_) => "redis",
        }
    }
}

#[async_trait::async_trait]
impl QueryCache for Cache {
    async fn get(&self, key: &CacheKey) -> AppResult<Option<QueryResult>> {
        match &self.backend {
            Backend::Memory(cache) => cache.get(key).await,
            Backend::Redis(cache) => cache.get(key).await,
        }
    }

    async fn set(&self, key: &CacheKey, value: &QueryResult, ttl: Duration) -> AppResult<()> {
        match &self.backend {
            Backend::Memory(cache) => cache.set(key, value, ttl).await,
            Backend::Redis(cache) => cache.set(key, value, ttl).await,
        }
    }

    async fn invalidate(&self, key: &CacheKey) -> AppResult<()> {
        match &self.backend {
            Backend::Memory(cache) => cache.invalidate(key).await,
            Backend::Redis(cache) => cache.invalidate(key).await,
        }
    }

    async fn invalidate_tenant(&self, tenant_id: &TenantId) -> AppResult<u64> {
        match &self.backend {
            Backend::Memory(cache) => cache.invalidate_tenant(tenant_id).await,
            Backend::Redis(cache) => cache.invalidate_tenant(tenant_id).await,
        }
    }

    async fn health_check(&self) -> AppResult<()> {
        match &self.backend {
            Backend::Memory(cache) => cache.health_check().await,
            Backend::Redis(cache) => cache.health_check().await,
        }
    }

    async fn clear_all(&self) -> AppResult<()> {
        match &self.backend {
            Backend::Memory(cache) => cache.clear_all().await,
            Backend::Redis(cache) => cache.clear_all().await,
        }
    }
}
