// ABOUTME: Query result cache abstraction with tenant-scoped keys and TTL expiry
// ABOUTME: Pluggable backend support (in-memory, Redis) selected by the factory
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Query Result Cache
//!
//! Caches [`QueryResult`] values keyed by the exact SQL text and the tenant
//! it ran for. Keys are opaque SHA-256 digests, so two tenants issuing the
//! same SQL can never observe each other's rows.
//!
//! Backends report their own failures; the query executor decides what a
//! failure means (a miss on read, a no-op on write). The cache is an
//! optimization, never a source of truth.

/// Backend selection based on configuration
pub mod factory;
/// In-memory cache implementation
pub mod memory;
/// Redis cache implementation
pub mod redis;

pub use factory::Cache;
pub use memory::InMemoryCache;
pub use redis::RedisCache;

use crate::config::CacheSettings;
use crate::constants::cache::{
    CACHE_KEY_PREFIX, DEFAULT_CLEANUP_INTERVAL_SECS, DEFAULT_MAX_ENTRIES, DEFAULT_TTL_SECS,
};
use crate::errors::AppResult;
use crate::models::{QueryResult, TenantId};
use sha2::{Digest, Sha256};
use std::fmt;
use std::time::Duration;

/// Cache configuration
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries (for the in-memory backend)
    pub max_entries: usize,
    /// Redis connection URL (selects the Redis backend when present)
    pub redis_url: Option<String>,
    /// TTL applied to stored results
    pub default_ttl: Duration,
    /// Cleanup interval for expired entries
    pub cleanup_interval: Duration,
    /// Enable background cleanup task (false in tests to avoid runtime conflicts)
    pub enable_background_cleanup: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: DEFAULT_MAX_ENTRIES,
            redis_url: None,
            default_ttl: Duration::from_secs(DEFAULT_TTL_SECS),
            cleanup_interval: Duration::from_secs(DEFAULT_CLEANUP_INTERVAL_SECS),
            enable_background_cleanup: true,
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            max_entries: settings.max_entries,
            redis_url: settings.redis_url.clone(),
            default_ttl: settings.default_ttl,
            cleanup_interval: settings.cleanup_interval,
            enable_background_cleanup: settings.enable_background_cleanup,
        }
    }
}

/// Tenant-scoped cache key for one query result.
///
/// The digest covers both the SQL and the tenant, and the rendered key also
/// carries the tenant in clear so whole-tenant invalidation can match on a
/// prefix pattern.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Tenant the query ran for
    pub tenant_id: TenantId,
    /// SHA-256 hex digest of `"{sql}:{tenant}"`
    pub digest: String,
}

impl CacheKey {
    /// Derive the key for a query executed on behalf of a tenant.
    ///
    /// The SQL must be the final, tenant-scoped text actually submitted, so
    /// that a sanitizer or filter change naturally misses the old entries.
    #[must_use]
    pub fn for_query(sql: &str, tenant_id: &TenantId) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(sql.as_bytes());
        hasher.update(b":");
        hasher.update(tenant_id.as_str().as_bytes());
        Self {
            tenant_id: tenant_id.clone(),
            digest: hex::encode(hasher.finalize()),
        }
    }

    /// Pattern matching every entry belonging to a tenant
    #[must_use]
    pub fn tenant_pattern(tenant_id: &TenantId) -> String {
        format!("tenant:{tenant_id}:query:*")
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tenant:{}:query:{}", self.tenant_id, self.digest)
    }
}

/// Build the full backend key with the namespace prefix
#[must_use]
pub fn namespaced(key: &CacheKey) -> String {
    format!("{CACHE_KEY_PREFIX}{key}")
}

/// Query result cache backend.
///
/// Object-safe so the executor can hold `Arc<dyn QueryCache>` and tests can
/// substitute failing or counting fakes.
#[async_trait::async_trait]
pub trait QueryCache: Send + Sync {
    /// Retrieve a cached result; `None` on miss or expiry
    ///
    /// # Errors
    ///
    /// Returns an error if the backend is unreachable or the stored value
    /// cannot be deserialized
    async fn get(&self, key: &CacheKey) -> AppResult<Option<QueryResult>>;

    /// Store a result with the given TTL
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or storage fails
    async fn set(&self, key: &CacheKey, value: &QueryResult, ttl: Duration) -> AppResult<()>;

    /// Remove a single entry
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails
    async fn invalidate(&self, key: &CacheKey) -> AppResult<()>;

    /// Remove every entry belonging to a tenant; returns the number removed
    ///
    /// # Errors
    ///
    /// Returns an error if the backend operation fails
    async fn invalidate_tenant(&self, tenant_id: &TenantId) -> AppResult<u64>;

    /// Verify the backend is reachable
    ///
    /// # Errors
    ///
    /// Returns an error if the health check fails
    async fn health_check(&self) -> AppResult<()>;

    /// Clear all entries in this cache's namespace
    ///
    /// # Errors
    ///
    /// Returns an error if the clear operation fails
    async fn clear_all(&self) -> AppResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_is_tenant_scoped() {
        let sql = "SELECT day, steps_total FROM daily_activity";
        let a = CacheKey::for_query(sql, &TenantId::from("tenant-a"));
        let b = CacheKey::for_query(sql, &TenantId::from("tenant-b"));
        assert_ne!(a.digest, b.digest);
    }

    #[test]
    fn test_key_is_deterministic() {
        let tenant = TenantId::from("tenant-a");
        let a = CacheKey::for_query("SELECT 1", &tenant);
        let b = CacheKey::for_query("SELECT 1", &tenant);
        assert_eq!(a, b);
        assert_eq!(a.digest.len(), 64);
    }

    #[test]
    fn test_tenant_pattern_matches_rendered_key() {
        let tenant = TenantId::from("t-42");
        let key = CacheKey::for_query("SELECT 1", &tenant);
        let pattern = CacheKey::tenant_pattern(&tenant);
        assert!(pattern.ends_with('*'));
        assert!(key
            .to_string()
            .starts_with(pattern.trim_end_matches('*')));
    }
}
