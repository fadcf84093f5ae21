// ABOUTME: Chart spec builder producing declarative vega-lite specifications
// ABOUTME: Model-generated specs with a deterministic fallback on parse failure
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Chart Spec Builder
//!
//! Asks the model for a vega-lite spec over a capped sample of the result
//! table, then normalizes the shape and re-attaches the complete row set.
//! When the model's output does not parse as JSON, a deterministic fallback
//! derives a chart shape from the table's column types instead; the
//! fallback is pure and can never fail.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::constants::columns::DATE_LIKE;
use crate::constants::limits::{CHART_MAX_ROWS, CHART_SAMPLE_ROWS, CHART_TITLE_CHARS};
use crate::errors::AppResult;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::models::{ChartSpec, QueryResult};

const SPEC_TYPE_VEGA_LITE: &str = "vega-lite";

const SYSTEM_PROMPT: &str = "\
You are a chart generator for health data visualizations.
Generate Vega-Lite JSON specifications for data visualizations.

Given query results, create an appropriate chart:
- Time series: Use line or area charts
- Comparisons: Use bar charts
- Distributions: Use histograms or box plots
- Multiple metrics: Use faceted charts or layered charts

Vega-Lite Requirements:
- Use proper data format (array of objects)
- Include proper encoding (x, y, color, etc.)
- Set appropriate scales and axes
- Include titles and labels
- Make charts responsive (width: \"container\")

Return ONLY valid JSON, no markdown, no explanations.";

/// Builds declarative chart specifications from query results.
pub struct ChartBuilder {
    llm: Arc<dyn LlmProvider>,
}

impl ChartBuilder {
    /// Create a builder backed by the given provider
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Build a chart spec for the result table.
    ///
    /// The prompt carries only a capped row sample; the final spec always
    /// embeds the full row set under `data.values`.
    ///
    /// # Errors
    ///
    /// Returns an error when the provider call fails. A response that fails
    /// to parse is not an error; it triggers the deterministic fallback.
    pub async fn build(
        &self,
        result: &QueryResult,
        question: &str,
        chart_type_hint: &str,
    ) -> AppResult<ChartSpec> {
        let capped = &result.rows[..result.rows.len().min(CHART_MAX_ROWS)];
        let sample = &capped[..capped.len().min(CHART_SAMPLE_ROWS)];
        let sample_json = serde_json::to_string(sample).unwrap_or_else(|_| "[]".to_owned());

        let messages = vec![
            ChatMessage::system(SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "User question: {question}\nChart type preference: {chart_type_hint}\n\n\
                 Query results:\nColumns: {:?}\nTotal rows: {}\nSample data: {sample_json}\n\n\
                 Generate a Vega-Lite specification that visualizes this data appropriately.\n\
                 Return ONLY the JSON specification, wrapped in a JSON object with 'spec_type' and 'spec' keys.",
                result.columns,
                result.row_count(),
            )),
        ];

        let response = self.llm.complete(&ChatRequest::new(messages)).await?;

        match parse_spec(&response.content) {
            Some(mut spec) => {
                attach_data(&mut spec.spec, result);
                Ok(spec)
            }
            None => {
                warn!("Chart spec did not parse as JSON, using fallback chart");
                Ok(fallback_chart(result, question))
            }
        }
    }
}

/// Parse and normalize the model's spec output; `None` triggers the fallback
fn parse_spec(raw: &str) -> Option<ChartSpec> {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    }
    if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }

    let parsed: Value = serde_json::from_str(text.trim()).ok()?;

    // Accept either the wrapped form or a bare chart body
    let (spec_type, spec) = match parsed {
        Value::Object(mut obj) if obj.contains_key("spec") => {
            let spec = obj.remove("spec")?;
            let spec_type = obj
                .remove("spec_type")
                .and_then(|v| v.as_str().map(str::to_owned))
                .unwrap_or_else(|| SPEC_TYPE_VEGA_LITE.to_owned());
            (spec_type, spec)
        }
        body @ Value::Object(_) => (SPEC_TYPE_VEGA_LITE.to_owned(), body),
        _ => return None,
    };

    debug!(spec_type = %spec_type, "Parsed chart spec");
    Some(ChartSpec { spec_type, spec })
}

/// Ensure the spec body carries the complete row set under `data.values`
fn attach_data(spec: &mut Value, result: &QueryResult) {
    if let Value::Object(obj) = spec {
        if !obj.contains_key("data") {
            obj.insert(
                "data".to_owned(),
                json!({ "values": result.rows }),
            );
        }
    }
}

/// Deterministic chart shape derived from the table's column types.
///
/// Prefers a temporal line chart when a date-like column pairs with a
/// numeric one, then a bar chart for any numeric column, then a generic
/// two-axis categorical chart over the first two columns.
#[must_use]
pub fn fallback_chart(result: &QueryResult, question: &str) -> ChartSpec {
    let columns = &result.columns;
    let title: String = question.chars().take(CHART_TITLE_CHARS).collect();

    let date_col = DATE_LIKE
        .iter()
        .find(|name| columns.iter().any(|c| c == *name))
        .map(|name| (*name).to_owned());

    let numeric_cols: Vec<&String> = columns
        .iter()
        .filter(|c| {
            c.as_str() != "tenant_id"
                && c.as_str() != "dt"
                && Some(c.as_str()) != date_col.as_deref()
                && result
                    .rows
                    .iter()
                    .any(|row| row.get(*c).is_some_and(crate::models::CellValue::is_numeric))
        })
        .collect();

    let spec = match (&date_col, numeric_cols.first()) {
        (Some(date), Some(metric)) => json!({
            "data": { "values": result.rows },
            "mark": "line",
            "encoding": {
                "x": { "field": date, "type": "temporal" },
                "y": { "field": metric, "type": "quantitative" }
            },
            "title": title,
            "width": "container"
        }),
        (None, Some(metric)) => json!({
            "data": { "values": result.rows },
            "mark": "bar",
            "encoding": {
                "x": { "field": metric, "type": "quantitative" },
                "y": { "field": columns.first().map_or("value", String::as_str), "type": "nominal" }
            },
            "title": title
        }),
        _ => json!({
            "data": { "values": result.rows },
            "mark": "rect",
            "encoding": {
                "x": { "field": columns.first().map_or("value", String::as_str), "type": "nominal" },
                "y": { "field": columns.get(1).map_or("value", String::as_str), "type": "nominal" }
            },
            "title": title
        }),
    };

    ChartSpec {
        spec_type: SPEC_TYPE_VEGA_LITE.to_owned(),
        spec,
    }
}
