// ABOUTME: End-to-end pipeline tests over scripted LLM and warehouse stubs
// ABOUTME: Covers intent branches, fallback charts, anomaly answers, and sessions
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{init_test_logging, MockLlmProvider, MockWarehouseEngine};
use lumen_insights::cache::{CacheConfig, InMemoryCache, QueryCache};
use lumen_insights::config::ServerConfig;
use lumen_insights::errors::ErrorCode;
use lumen_insights::models::TenantId;
use lumen_insights::session::{SessionKey, SessionStore};
use lumen_insights::Workflow;

fn workflow(
    llm: Arc<MockLlmProvider>,
    engine: Arc<MockWarehouseEngine>,
    sessions: Arc<SessionStore>,
) -> Workflow {
    let mut config = ServerConfig::default();
    config.warehouse.poll_interval = Duration::from_millis(5);
    let cache: Arc<dyn QueryCache> = Arc::new(InMemoryCache::new(&CacheConfig {
        enable_background_cleanup: false,
        ..CacheConfig::default()
    }));
    Workflow::new(llm, engine, cache, &config, sessions)
}

fn daily_engine() -> Arc<MockWarehouseEngine> {
    Arc::new(MockWarehouseEngine::succeeding(
        &["day", "steps_total"],
        &[
            &["2025-01-01", "9500"],
            &["2025-01-02", "10200"],
            &["2025-01-03", "8700"],
        ],
    ))
}

#[tokio::test]
async fn test_trend_question_runs_one_query_and_composes() {
    init_test_logging();
    let llm = Arc::new(MockLlmProvider::with_responses([
        "trend",
        "SELECT day, steps_total FROM gold_daily_features ORDER BY day",
        "Your steps are trending upward over the period.",
    ]));
    let engine = daily_engine();
    let workflow = workflow(llm, engine.clone(), Arc::new(SessionStore::new()));

    let state = workflow
        .run(
            "show my steps trend for the last 30 days",
            TenantId::from("tenant-a"),
            Vec::new(),
        )
        .await
        .unwrap();

    assert_eq!(engine.submitted_sql().len(), 1);
    assert!(!state.final_answer.is_empty());
    assert!(state.charts.is_empty());
    assert!(state.anomalies.is_empty());
    assert_eq!(
        state.sql_used.as_deref(),
        Some("SELECT day, steps_total FROM gold_daily_features ORDER BY day")
    );
}

#[tokio::test]
async fn test_dashboard_falls_back_when_chart_spec_does_not_parse() {
    init_test_logging();
    let llm = Arc::new(MockLlmProvider::with_responses([
        "dashboard",
        "SELECT day, steps_total FROM gold_daily_features",
        "I could not come up with a chart, apologies.",
        "Here is your dashboard of daily steps.",
    ]));
    let workflow = workflow(llm, daily_engine(), Arc::new(SessionStore::new()));

    let state = workflow
        .run("dashboard my steps", TenantId::from("tenant-a"), Vec::new())
        .await
        .unwrap();

    assert_eq!(state.charts.len(), 1);
    let chart = &state.charts[0];
    assert_eq!(chart.spec_type, "vega-lite");
    assert_eq!(chart.spec["mark"], "line");
    // The fallback spec carries the full result set, not the prompt sample
    assert_eq!(
        chart.spec["data"]["values"].as_array().map(Vec::len),
        Some(3)
    );
}

#[tokio::test]
async fn test_anomaly_explanation_is_appended_to_composed_answer() {
    init_test_logging();
    // Ten flat days and one large spike
    let days: Vec<Vec<&str>> = (1..=11)
        .map(|i| {
            if i == 10 {
                vec!["2025-01-10", "42000"]
            } else {
                vec!["2025-01-01", "9500"]
            }
        })
        .collect();
    let rows: Vec<&[&str]> = days.iter().map(Vec::as_slice).collect();
    let engine = Arc::new(MockWarehouseEngine::succeeding(
        &["day", "steps_total"],
        &rows,
    ));

    let llm = Arc::new(MockLlmProvider::with_responses([
        "anomaly",
        "SELECT day, steps_total FROM gold_daily_features",
        "One day stands out far above your usual step count.",
        "Here is an overview of your recent steps.",
    ]));
    let workflow = workflow(llm, engine, Arc::new(SessionStore::new()));

    let state = workflow
        .run("any unusual days?", TenantId::from("tenant-a"), Vec::new())
        .await
        .unwrap();

    assert_eq!(state.anomalies.len(), 1);
    assert_eq!(state.anomalies[0].value, 42_000.0);
    assert_eq!(
        state.final_answer,
        "Here is an overview of your recent steps.\n\nOne day stands out far above your usual step count."
    );
}

#[tokio::test]
async fn test_summary_uses_summarization_prompt() {
    init_test_logging();
    let llm = Arc::new(MockLlmProvider::with_responses([
        "summary",
        "SELECT day, steps_total FROM gold_daily_features",
        "You averaged about 9,500 steps a day.",
    ]));
    let workflow = workflow(llm.clone(), daily_engine(), Arc::new(SessionStore::new()));

    let state = workflow
        .run("summarize my week", TenantId::from("tenant-a"), Vec::new())
        .await
        .unwrap();

    assert_eq!(state.final_answer, "You averaged about 9,500 steps a day.");
    let requests = llm.recorded_requests();
    assert!(requests
        .iter()
        .any(|r| r.messages.iter().any(|m| m.content.contains("Summarize this data:"))));
}

#[tokio::test]
async fn test_query_failure_carries_attempted_sql() {
    init_test_logging();
    let llm = Arc::new(MockLlmProvider::with_responses([
        "general",
        "SELECT day FROM gold_x",
    ]));
    let engine = Arc::new(MockWarehouseEngine::failing("TABLE_NOT_FOUND: gold_x"));
    let workflow = workflow(llm, engine, Arc::new(SessionStore::new()));

    let err = workflow
        .run("how did I do?", TenantId::from("tenant-a"), Vec::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::QueryFailed);
    assert!(err.message.contains("TABLE_NOT_FOUND"));
    assert!(err.message.contains("SQL used:\nSELECT day FROM gold_x"));
}

#[tokio::test]
async fn test_failures_carry_a_request_id() {
    init_test_logging();
    let llm = Arc::new(MockLlmProvider::with_responses([
        "general",
        "SELECT day FROM gold_x",
    ]));
    let engine = Arc::new(MockWarehouseEngine::failing("TABLE_NOT_FOUND: gold_x"));
    let workflow = workflow(llm, engine, Arc::new(SessionStore::new()));

    let err = workflow
        .run("how did I do?", TenantId::from("tenant-a"), Vec::new())
        .await
        .unwrap_err();

    let request_id = err.context.request_id.as_deref().expect("request id set");
    assert!(uuid::Uuid::parse_str(request_id).is_ok());
}

#[tokio::test]
async fn test_non_executable_generation_is_rejected() {
    init_test_logging();
    let llm = Arc::new(MockLlmProvider::with_responses([
        "general",
        "I cannot answer that.",
    ]));
    let engine = Arc::new(MockWarehouseEngine::new());
    let workflow = workflow(llm, engine.clone(), Arc::new(SessionStore::new()));

    let err = workflow
        .run("gibberish", TenantId::from("tenant-a"), Vec::new())
        .await
        .unwrap_err();

    assert_eq!(err.code, ErrorCode::InvalidInput);
    // Nothing reached the engine
    assert!(engine.submitted_sql().is_empty());
}

#[tokio::test]
async fn test_answer_records_turn_in_session() {
    init_test_logging();
    let llm = Arc::new(MockLlmProvider::with_responses([
        "general",
        "SELECT day FROM gold_daily_features",
        "All looks good.",
    ]));
    let sessions = Arc::new(SessionStore::new());
    let workflow = workflow(llm, daily_engine(), sessions.clone());
    let tenant = TenantId::from("tenant-a");
    let key = SessionKey::new(&tenant, "token-1");

    let outcome = workflow.answer("how am I doing?", &tenant, &key).await.unwrap();
    assert_eq!(outcome.answer, "All looks good.");

    let history = sessions.history(&key);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user, "how am I doing?");
    assert_eq!(history[0].assistant, "All looks good.");
    assert_eq!(
        history[0].sql.as_deref(),
        Some("SELECT day FROM gold_daily_features")
    );
}
