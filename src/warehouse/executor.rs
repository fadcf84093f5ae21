// ABOUTME: Tenant-safe query executor enforcing the tenant-equality filter on every statement
// ABOUTME: Handles submit/poll/cancel lifecycle, result pagination, typed coercion, and caching
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Tenant-Safe Query Executor
//!
//! Every statement that reaches the engine is guaranteed to carry an
//! equality filter on the caller's tenant id. The rewrite is a best-effort
//! textual transformation, not a SQL parser: it does not understand
//! subqueries, CTEs, or comments, and can be fooled by tenant-id substrings
//! embedded in unrelated literals. Callers must still generate queries that
//! do not intentionally try to defeat it; parser-based rewriting is the
//! known hardening path.
//!
//! Results are served from the tenant-scoped cache when possible. Cache
//! failures degrade silently: a failed read is a miss, a failed write is a
//! no-op.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::cache::{CacheKey, QueryCache};
use crate::config::WarehouseConfig;
use crate::constants::warehouse::{TENANT_COLUMN, TENANT_PLACEHOLDER};
use crate::errors::{AppError, AppResult};
use crate::models::{CellValue, QueryResult, Row, TenantId};

use super::{QueryState, WarehouseEngine};

/// Executes tenant-scoped queries against the warehouse engine.
pub struct QueryExecutor {
    engine: Arc<dyn WarehouseEngine>,
    cache: Arc<dyn QueryCache>,
    config: WarehouseConfig,
    cache_ttl: Duration,
}

impl QueryExecutor {
    /// Create an executor over the given engine and result cache
    #[must_use]
    pub fn new(
        engine: Arc<dyn WarehouseEngine>,
        cache: Arc<dyn QueryCache>,
        config: WarehouseConfig,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            engine,
            cache,
            config,
            cache_ttl,
        }
    }

    /// Rewrite a statement so it carries an equality filter on the tenant.
    ///
    /// A literal `${tenant_id}` placeholder anywhere in the string is
    /// substituted first. If the statement already pins `tenant_id` to this
    /// exact tenant (single- or double-quoted), it is left untouched. An
    /// existing `WHERE` clause is wrapped as
    /// `tenant_id = '<t>' AND (<original predicate>)`; a statement without
    /// one gets the filter appended.
    #[must_use]
    pub fn ensure_tenant_filter(sql: &str, tenant_id: &TenantId) -> String {
        let tenant = tenant_id.as_str();
        let sql = sql.trim().trim_end_matches(';').trim();
        let sql = sql.replace(TENANT_PLACEHOLDER, tenant);

        let single_quoted = format!("{TENANT_COLUMN} = '{tenant}'");
        let double_quoted = format!("{TENANT_COLUMN} = \"{tenant}\"");
        if sql.contains(&single_quoted) || sql.contains(&double_quoted) {
            return sql;
        }

        match find_keyword(&sql, "WHERE") {
            Some(pos) => {
                let (head, tail) = sql.split_at(pos + "WHERE".len());
                let predicate = tail.trim();
                format!("{head} {single_quoted} AND ({predicate})")
            }
            None => format!("{sql} WHERE {single_quoted}"),
        }
    }

    /// Execute a statement for a tenant with the configured timeout.
    ///
    /// # Errors
    ///
    /// Returns `QueryTimeout` when the poll loop exceeds the timeout,
    /// `QueryFailed` when the engine reports failure or cancellation, and
    /// `EngineTransport` when communication with the engine fails. All carry
    /// the submitted SQL for diagnostics.
    pub async fn execute(&self, sql: &str, tenant_id: &TenantId) -> AppResult<QueryResult> {
        self.execute_with_timeout(sql, tenant_id, self.config.query_timeout)
            .await
    }

    /// Execute a statement with an explicit timeout bound on the poll loop.
    ///
    /// # Errors
    ///
    /// Same failure modes as [`QueryExecutor::execute`].
    pub async fn execute_with_timeout(
        &self,
        sql: &str,
        tenant_id: &TenantId,
        timeout: Duration,
    ) -> AppResult<QueryResult> {
        let scoped_sql = Self::ensure_tenant_filter(sql, tenant_id);
        let cache_key = CacheKey::for_query(&scoped_sql, tenant_id);

        if let Some(hit) = self.cache_lookup(&cache_key).await {
            debug!(tenant = %tenant_id, "Query result served from cache");
            return Ok(QueryResult { cached: true, ..hit });
        }

        let started = Instant::now();
        let execution_id = self
            .engine
            .submit(
                &scoped_sql,
                &self.config.database,
                &self.config.output_location,
                &self.config.workgroup,
            )
            .await
            .map_err(|e| e.with_sql(scoped_sql.clone()).with_tenant_id(tenant_id.as_str()))?;

        debug!(execution_id = %execution_id, tenant = %tenant_id, "Query submitted");

        self.await_completion(&execution_id, &scoped_sql, tenant_id, timeout, started)
            .await?;

        let (columns, rows) = self.collect_rows(&execution_id, &scoped_sql).await?;
        let result = QueryResult {
            columns,
            rows,
            query_id: execution_id,
            execution_time_secs: started.elapsed().as_secs_f64(),
            cached: false,
        };

        info!(
            tenant = %tenant_id,
            rows = result.row_count(),
            elapsed_secs = result.execution_time_secs,
            "Query completed"
        );

        self.cache_store(&cache_key, &result).await;

        Ok(result)
    }

    /// Poll until the engine reports a terminal state, cancelling on timeout
    async fn await_completion(
        &self,
        execution_id: &str,
        sql: &str,
        tenant_id: &TenantId,
        timeout: Duration,
        started: Instant,
    ) -> AppResult<()> {
        loop {
            let status = self
                .engine
                .poll_status(execution_id)
                .await
                .map_err(|e| e.with_sql(sql.to_owned()).with_tenant_id(tenant_id.as_str()))?;

            match status.state {
                QueryState::Succeeded => return Ok(()),
                QueryState::Failed | QueryState::Cancelled => {
                    let reason = status
                        .reason
                        .unwrap_or_else(|| format!("engine reported {:?}", status.state));
                    return Err(
                        AppError::query_failed(sql, reason).with_tenant_id(tenant_id.as_str())
                    );
                }
                QueryState::Queued | QueryState::Running => {}
            }

            if started.elapsed() >= timeout {
                // Best-effort cancellation; the timeout error stands either way
                if let Err(e) = self.engine.cancel(execution_id).await {
                    warn!(execution_id = %execution_id, error = %e, "Failed to cancel timed-out query");
                }
                return Err(AppError::query_timeout(sql, timeout.as_secs())
                    .with_tenant_id(tenant_id.as_str()));
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Fetch and flatten every result page into typed rows.
    ///
    /// The first row of the first page is the header row and is skipped.
    async fn collect_rows(
        &self,
        execution_id: &str,
        sql: &str,
    ) -> AppResult<(Vec<String>, Vec<Row>)> {
        let mut columns: Vec<String> = Vec::new();
        let mut rows: Vec<Row> = Vec::new();
        let mut next_token: Option<String> = None;
        let mut first_page = true;

        loop {
            let page = self
                .engine
                .fetch_results(execution_id, next_token.as_deref())
                .await
                .map_err(|e| e.with_sql(sql.to_owned()))?;

            if first_page {
                columns = page.columns.clone();
            }

            let skip = usize::from(first_page);
            for raw_row in page.rows.into_iter().skip(skip) {
                let row: Row = columns
                    .iter()
                    .zip(raw_row)
                    .map(|(name, cell)| {
                        let raw = cell.unwrap_or_default();
                        (name.clone(), CellValue::parse(&raw))
                    })
                    .collect();
                rows.push(row);
            }

            first_page = false;
            next_token = page.next_token;
            if next_token.is_none() {
                break;
            }
        }

        Ok((columns, rows))
    }

    /// Cache read that degrades to a miss on backend failure
    async fn cache_lookup(&self, key: &CacheKey) -> Option<QueryResult> {
        match self.cache.get(key).await {
            Ok(hit) => hit,
            Err(e) => {
                warn!(error = %e, "Cache lookup failed, treating as miss");
                None
            }
        }
    }

    /// Cache write that degrades to a no-op on backend failure
    async fn cache_store(&self, key: &CacheKey, result: &QueryResult) {
        if let Err(e) = self.cache.set(key, result, self.cache_ttl).await {
            warn!(error = %e, "Cache store failed, result not cached");
        }
    }
}

/// Find a standalone keyword (case-insensitive, word-bounded) in a statement
fn find_keyword(sql: &str, keyword: &str) -> Option<usize> {
    let bytes = sql.as_bytes();
    let needle = keyword.as_bytes();
    if bytes.len() < needle.len() {
        return None;
    }

    (0..=bytes.len() - needle.len()).find(|&i| {
        if !bytes[i..i + needle.len()].eq_ignore_ascii_case(needle) {
            return false;
        }
        let before_ok = i == 0 || !bytes[i - 1].is_ascii_alphanumeric() && bytes[i - 1] != b'_';
        let after = i + needle.len();
        let after_ok =
            after == bytes.len() || !bytes[after].is_ascii_alphanumeric() && bytes[after] != b'_';
        before_ok && after_ok
    })
}
