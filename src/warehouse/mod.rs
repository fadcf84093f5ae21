// ABOUTME: Warehouse query engine interface for asynchronous columnar data lake queries
// ABOUTME: Narrow submit/poll/fetch/cancel contract; implementations live outside the core
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Warehouse Query Engine Interface
//!
//! The warehouse is an external collaborator: queries are submitted, polled
//! to completion, and their paginated results fetched. The core depends only
//! on this trait; production wires in a managed engine client, tests wire in
//! a deterministic mock.

pub mod executor;

pub use executor::QueryExecutor;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppResult;

/// Remote execution state of a submitted query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum QueryState {
    /// Accepted but not yet running
    Queued,
    /// Currently executing
    Running,
    /// Completed successfully
    Succeeded,
    /// Failed on the engine
    Failed,
    /// Cancelled, by the caller or the engine
    Cancelled,
}

impl QueryState {
    /// Whether the state is final
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Status snapshot returned by a poll
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryStatus {
    /// Current execution state
    pub state: QueryState,
    /// Engine-stated reason, populated for failures and cancellations
    pub reason: Option<String>,
}

impl QueryStatus {
    /// Status with no reason attached
    #[must_use]
    pub const fn of(state: QueryState) -> Self {
        Self {
            state,
            reason: None,
        }
    }
}

/// One page of raw results from the engine.
///
/// Cells arrive as optional strings; typing happens in the executor. The
/// first row of the first page is the header row.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResultPage {
    /// Column names from the engine's result metadata
    pub columns: Vec<String>,
    /// Raw row data; `None` cells are treated as empty strings
    pub rows: Vec<Vec<Option<String>>>,
    /// Continuation token for the next page, if any
    pub next_token: Option<String>,
}

/// Asynchronous warehouse query engine.
///
/// Mirrors the submit / poll / fetch / cancel shape of managed query
/// services. All methods are transport-level: a failure here is an
/// [`crate::errors::ErrorCode::EngineTransport`] error, distinct from the
/// query itself failing.
#[async_trait]
pub trait WarehouseEngine: Send + Sync {
    /// Submit a query for execution; returns the engine's execution id
    async fn submit(
        &self,
        sql: &str,
        database: &str,
        output_location: &str,
        workgroup: &str,
    ) -> AppResult<String>;

    /// Poll the execution status of a submitted query
    async fn poll_status(&self, execution_id: &str) -> AppResult<QueryStatus>;

    /// Fetch one page of results; `next_token` continues a previous page
    async fn fetch_results(
        &self,
        execution_id: &str,
        next_token: Option<&str>,
    ) -> AppResult<ResultPage>;

    /// Request cancellation of a running query
    async fn cancel(&self, execution_id: &str) -> AppResult<()>;
}
