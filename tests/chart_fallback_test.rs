// ABOUTME: Integration tests for chart spec generation and its fallback path
// ABOUTME: Covers parsed specs, data attachment, fallback shape, and failures
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use common::{init_test_logging, MockLlmProvider};
use lumen_insights::agents::ChartBuilder;
use lumen_insights::models::{CellValue, QueryResult};

fn daily_steps(rows: usize) -> QueryResult {
    let rows = (1..=rows)
        .map(|i| {
            let mut row = BTreeMap::new();
            row.insert("day".to_owned(), CellValue::Text(format!("2025-01-{i:02}")));
            row.insert("steps_total".to_owned(), CellValue::Int(i as i64 * 1000));
            row
        })
        .collect::<Vec<_>>();
    QueryResult {
        columns: vec!["day".into(), "steps_total".into()],
        rows,
        query_id: "q-1".into(),
        execution_time_secs: 0.4,
        cached: false,
    }
}

#[tokio::test]
async fn test_parsed_spec_gets_full_data_attached() {
    init_test_logging();
    let llm = Arc::new(MockLlmProvider::with_responses([
        r#"{"spec_type": "vega-lite", "spec": {"mark": "area", "encoding": {"x": {"field": "day"}}}}"#,
    ]));
    let builder = ChartBuilder::new(llm);
    let result = daily_steps(15);

    let chart = builder.build(&result, "steps over time", "auto").await.unwrap();
    assert_eq!(chart.spec_type, "vega-lite");
    assert_eq!(chart.spec["mark"], "area");
    // The spec carries every row even though the prompt only saw a sample
    assert_eq!(
        chart.spec["data"]["values"].as_array().map(Vec::len),
        Some(15)
    );
}

#[tokio::test]
async fn test_unparseable_response_falls_back_to_line_chart() {
    init_test_logging();
    let llm = Arc::new(MockLlmProvider::with_responses([
        "Sorry, I can't produce a chart for that.",
    ]));
    let builder = ChartBuilder::new(llm);
    let result = daily_steps(7);

    let chart = builder.build(&result, "show my steps trend", "auto").await.unwrap();
    assert_eq!(chart.spec_type, "vega-lite");
    assert_eq!(chart.spec["mark"], "line");
    assert_eq!(chart.spec["encoding"]["x"]["field"], "day");
    assert_eq!(chart.spec["encoding"]["x"]["type"], "temporal");
    assert_eq!(chart.spec["encoding"]["y"]["field"], "steps_total");
    assert_eq!(
        chart.spec["data"]["values"].as_array().map(Vec::len),
        Some(7)
    );
}

#[tokio::test]
async fn test_prompt_sample_is_capped() {
    init_test_logging();
    let llm = Arc::new(MockLlmProvider::with_responses([r#"{"mark": "line"}"#]));
    let builder = ChartBuilder::new(llm.clone());
    let result = daily_steps(25);

    builder.build(&result, "trend", "auto").await.unwrap();

    let requests = llm.recorded_requests();
    let prompt = &requests[0].messages[1].content;
    assert!(prompt.contains("Total rows: 25"));
    // Row 11 onward never reaches the prompt
    assert!(prompt.contains("2025-01-10"));
    assert!(!prompt.contains("2025-01-11"));
}

#[tokio::test]
async fn test_provider_failure_propagates() {
    init_test_logging();
    let builder = ChartBuilder::new(Arc::new(MockLlmProvider::failing()));
    assert!(builder
        .build(&daily_steps(3), "trend", "auto")
        .await
        .is_err());
}
