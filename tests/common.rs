// ABOUTME: Shared test utilities for integration tests
// ABOUTME: Deterministic LLM and warehouse engine stubs plus logging setup
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![allow(dead_code, clippy::missing_panics_doc, clippy::must_use_candidate)]

//! Shared test utilities for `lumen_insights`
//!
//! Provides scripted stand-ins for the two external collaborators (the
//! language-model provider and the warehouse engine) so pipeline behavior
//! can be tested deterministically.

use std::collections::VecDeque;
use std::sync::{Mutex, Once};

use async_trait::async_trait;
use lumen_insights::errors::{AppError, AppResult};
use lumen_insights::llm::{ChatRequest, ChatResponse, LlmCapabilities, LlmProvider};
use lumen_insights::warehouse::{QueryState, QueryStatus, ResultPage, WarehouseEngine};

static INIT_LOGGER: Once = Once::new();

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Scripted LLM provider: returns queued responses in order and records
/// every request it receives.
pub struct MockLlmProvider {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ChatRequest>>,
    fail: bool,
}

impl MockLlmProvider {
    pub fn with_responses<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            responses: Mutex::new(responses.into_iter().map(Into::into).collect()),
            requests: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    /// Provider whose every call fails with a provider error
    pub fn failing() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    /// Requests received so far, in order
    pub fn recorded_requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().expect("requests lock").clone()
    }

    /// Number of completions performed
    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("requests lock").len()
    }
}

#[async_trait]
impl LlmProvider for MockLlmProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn display_name(&self) -> &'static str {
        "Mock Provider"
    }

    fn capabilities(&self) -> LlmCapabilities {
        LlmCapabilities::text_only()
    }

    fn default_model(&self) -> &str {
        "mock-model"
    }

    async fn complete(&self, request: &ChatRequest) -> AppResult<ChatResponse> {
        self.requests
            .lock()
            .expect("requests lock")
            .push(request.clone());

        if self.fail {
            return Err(AppError::llm("Mock provider configured to fail"));
        }

        let content = self
            .responses
            .lock()
            .expect("responses lock")
            .pop_front()
            .ok_or_else(|| AppError::llm("Mock provider ran out of scripted responses"))?;

        Ok(ChatResponse {
            content,
            model: "mock-model".to_owned(),
            usage: None,
            finish_reason: Some("stop".to_owned()),
        })
    }
}

/// Scripted warehouse engine: replays queued statuses and result pages and
/// captures every submitted statement.
pub struct MockWarehouseEngine {
    submitted: Mutex<Vec<String>>,
    statuses: Mutex<VecDeque<QueryStatus>>,
    pages: Mutex<VecDeque<ResultPage>>,
    cancelled: Mutex<Vec<String>>,
}

impl MockWarehouseEngine {
    pub fn new() -> Self {
        Self {
            submitted: Mutex::new(Vec::new()),
            statuses: Mutex::new(VecDeque::new()),
            pages: Mutex::new(VecDeque::new()),
            cancelled: Mutex::new(Vec::new()),
        }
    }

    /// Engine that immediately succeeds with a single page of results.
    ///
    /// The header row is synthesized from the column names, matching how
    /// the real engine returns it as the first data row.
    pub fn succeeding(columns: &[&str], rows: &[&[&str]]) -> Self {
        let engine = Self::new();
        engine.push_status(QueryStatus::of(QueryState::Succeeded));
        engine.push_page(page(columns, rows, None));
        engine
    }

    /// Engine whose query fails with the given reason
    pub fn failing(reason: &str) -> Self {
        let engine = Self::new();
        engine.push_status(QueryStatus {
            state: QueryState::Failed,
            reason: Some(reason.to_owned()),
        });
        engine
    }

    pub fn push_status(&self, status: QueryStatus) {
        self.statuses.lock().expect("statuses lock").push_back(status);
    }

    pub fn push_page(&self, page: ResultPage) {
        self.pages.lock().expect("pages lock").push_back(page);
    }

    /// Statements submitted so far, in order
    pub fn submitted_sql(&self) -> Vec<String> {
        self.submitted.lock().expect("submitted lock").clone()
    }

    pub fn cancelled_ids(&self) -> Vec<String> {
        self.cancelled.lock().expect("cancelled lock").clone()
    }
}

impl Default for MockWarehouseEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WarehouseEngine for MockWarehouseEngine {
    async fn submit(
        &self,
        sql: &str,
        _database: &str,
        _output_location: &str,
        _workgroup: &str,
    ) -> AppResult<String> {
        let mut submitted = self.submitted.lock().expect("submitted lock");
        submitted.push(sql.to_owned());
        Ok(format!("exec-{}", submitted.len()))
    }

    async fn poll_status(&self, _execution_id: &str) -> AppResult<QueryStatus> {
        Ok(self
            .statuses
            .lock()
            .expect("statuses lock")
            .pop_front()
            // Keep polling engines stuck in Running once the script runs out
            .unwrap_or_else(|| QueryStatus::of(QueryState::Running)))
    }

    async fn fetch_results(
        &self,
        _execution_id: &str,
        _next_token: Option<&str>,
    ) -> AppResult<ResultPage> {
        self.pages
            .lock()
            .expect("pages lock")
            .pop_front()
            .ok_or_else(|| AppError::engine_transport("Mock engine has no result pages queued"))
    }

    async fn cancel(&self, execution_id: &str) -> AppResult<()> {
        self.cancelled
            .lock()
            .expect("cancelled lock")
            .push(execution_id.to_owned());
        Ok(())
    }
}

/// Build a result page with a synthesized header row followed by data rows
pub fn page(columns: &[&str], rows: &[&[&str]], next_token: Option<&str>) -> ResultPage {
    let mut all_rows: Vec<Vec<Option<String>>> =
        vec![columns.iter().map(|c| Some((*c).to_owned())).collect()];
    all_rows.extend(
        rows.iter()
            .map(|row| row.iter().map(|cell| Some((*cell).to_owned())).collect()),
    );
    ResultPage {
        columns: columns.iter().map(|c| (*c).to_owned()).collect(),
        rows: all_rows,
        next_token: next_token.map(str::to_owned),
    }
}

/// Continuation page without a header row
pub fn continuation_page(
    columns: &[&str],
    rows: &[&[&str]],
    next_token: Option<&str>,
) -> ResultPage {
    ResultPage {
        columns: columns.iter().map(|c| (*c).to_owned()).collect(),
        rows: rows
            .iter()
            .map(|row| row.iter().map(|cell| Some((*cell).to_owned())).collect())
            .collect(),
        next_token: next_token.map(str::to_owned),
    }
}
