// ABOUTME: Statistical anomaly detection over query results using z-scores
// ABOUTME: Pure detection plus model-backed explanation of flagged rows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Anomaly Detector
//!
//! Univariate outlier detection over one metric column of a result table.
//! Detection is pure and deterministic; only the explanation of the flagged
//! rows goes through the model.

use std::sync::Arc;

use tracing::debug;

use crate::constants::columns::{IDENTIFIERS, PREFERRED_METRICS};
use crate::constants::detection::{MIN_SAMPLES, Z_SCORE_THRESHOLD};
use crate::constants::limits::EXPLAIN_MAX_ANOMALIES;
use crate::errors::AppResult;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::models::{Anomaly, AnomalyKind, QueryResult};

/// Sentinel answer when there is nothing to explain
pub const NO_ANOMALIES_MESSAGE: &str = "No significant anomalies detected in the data.";

const EXPLAIN_SYSTEM_PROMPT: &str = "\
You are a data analyst explaining anomalies in health data.
Explain detected anomalies in clear, understandable language.
Focus on what the anomalies mean for the user's health and activity patterns.";

/// Detects and explains statistical outliers in query results.
pub struct AnomalyDetector {
    llm: Arc<dyn LlmProvider>,
}

impl AnomalyDetector {
    /// Create a detector; the provider is only used for explanations
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Flag rows whose metric value lies more than the z-score threshold
    /// from the mean.
    ///
    /// Uses the sample standard deviation (n-1 denominator). Returns empty
    /// when no metric column can be chosen, fewer than the minimum numeric
    /// samples exist, or the variance is zero. Output order matches input
    /// row order.
    #[must_use]
    pub fn detect(result: &QueryResult, metric_column: Option<&str>) -> Vec<Anomaly> {
        if result.rows.is_empty() {
            return Vec::new();
        }

        let Some(metric) = metric_column
            .map(str::to_owned)
            .or_else(|| select_metric_column(&result.columns))
        else {
            return Vec::new();
        };

        let values: Vec<f64> = result
            .rows
            .iter()
            .filter_map(|row| row.get(&metric).and_then(|cell| cell.as_f64()))
            .collect();

        if values.len() < MIN_SAMPLES {
            return Vec::new();
        }

        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let variance = values
            .iter()
            .map(|v| (v - mean).powi(2))
            .sum::<f64>()
            / (values.len() - 1) as f64;
        let stdev = variance.sqrt();

        if stdev == 0.0 {
            return Vec::new();
        }

        let mut anomalies = Vec::new();
        for (row_index, row) in result.rows.iter().enumerate() {
            let Some(value) = row.get(&metric).and_then(|cell| cell.as_f64()) else {
                continue;
            };
            let z_score = ((value - mean) / stdev).abs();
            if z_score > Z_SCORE_THRESHOLD {
                anomalies.push(Anomaly {
                    row_index,
                    row_data: row.clone(),
                    metric: metric.clone(),
                    value,
                    z_score,
                    kind: if value > mean {
                        AnomalyKind::High
                    } else {
                        AnomalyKind::Low
                    },
                });
            }
        }

        debug!(
            metric = %metric,
            samples = values.len(),
            flagged = anomalies.len(),
            "Anomaly detection complete"
        );

        anomalies
    }

    /// Explain flagged anomalies in the context of the question.
    ///
    /// At most the first five anomalies are summarized for the prompt.
    /// Returns a fixed sentinel without invoking the provider when the
    /// list is empty.
    ///
    /// # Errors
    ///
    /// Returns an error when the provider call fails.
    pub async fn explain(&self, anomalies: &[Anomaly], question: &str) -> AppResult<String> {
        if anomalies.is_empty() {
            return Ok(NO_ANOMALIES_MESSAGE.to_owned());
        }

        let mut summary = format!("Found {} anomalies:\n", anomalies.len());
        for (i, anomaly) in anomalies.iter().take(EXPLAIN_MAX_ANOMALIES).enumerate() {
            summary.push_str(&format!(
                "\n{}. {}: {} (Z-score: {:.2}, Type: {})\n   Context: {}\n",
                i + 1,
                anomaly.metric,
                anomaly.value,
                anomaly.z_score,
                anomaly.kind,
                serde_json::to_string(&anomaly.row_data).unwrap_or_default(),
            ));
        }

        let messages = vec![
            ChatMessage::system(EXPLAIN_SYSTEM_PROMPT),
            ChatMessage::user(format!(
                "User question: {question}\n\n{summary}\n\nExplain these anomalies and what they might mean for the user's health data."
            )),
        ];

        let response = self.llm.complete(&ChatRequest::new(messages)).await?;
        Ok(response.content.trim().to_owned())
    }
}

/// Pick the metric column: first preferred name present, else the first
/// column that is not an identifier or partition key
fn select_metric_column(columns: &[String]) -> Option<String> {
    PREFERRED_METRICS
        .iter()
        .find(|name| columns.iter().any(|c| c == *name))
        .map(|name| (*name).to_owned())
        .or_else(|| {
            columns
                .iter()
                .find(|c| !IDENTIFIERS.contains(&c.as_str()))
                .cloned()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;
    use std::collections::BTreeMap;

    fn result_with(metric: &str, values: &[f64]) -> QueryResult {
        let rows = values
            .iter()
            .map(|v| {
                let mut row = BTreeMap::new();
                row.insert(metric.to_owned(), CellValue::Float(*v));
                row
            })
            .collect();
        QueryResult {
            columns: vec![metric.to_owned()],
            rows,
            query_id: "q-1".into(),
            execution_time_secs: 0.1,
            cached: false,
        }
    }

    #[test]
    fn test_single_high_outlier_flagged() {
        // With sample stdev, |z| is bounded by (n-1)/sqrt(n); a handful of
        // identical baseline values is needed before one spike crosses 2.5
        let values = [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 100.0];
        let result = result_with("steps_total", &values);
        let anomalies = AnomalyDetector::detect(&result, None);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].row_index, 10);
        assert_eq!(anomalies[0].kind, AnomalyKind::High);
        assert_eq!(anomalies[0].value, 100.0);
        assert!(anomalies[0].z_score > Z_SCORE_THRESHOLD);
    }

    #[test]
    fn test_low_outlier_flagged() {
        let values = [50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 50.0, 1.0];
        let result = result_with("hr_avg", &values);
        let anomalies = AnomalyDetector::detect(&result, None);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].kind, AnomalyKind::Low);
    }

    #[test]
    fn test_zero_variance_yields_empty() {
        let result = result_with("value", &[5.0, 5.0, 5.0, 5.0, 5.0]);
        assert!(AnomalyDetector::detect(&result, None).is_empty());
    }

    #[test]
    fn test_too_few_samples_yields_empty() {
        let result = result_with("value", &[1.0, 100.0]);
        assert!(AnomalyDetector::detect(&result, None).is_empty());
    }

    #[test]
    fn test_identifier_only_columns_yield_empty() {
        let mut row = BTreeMap::new();
        row.insert("tenant_id".to_owned(), CellValue::Text("t-1".into()));
        row.insert("dt".to_owned(), CellValue::Text("2025-01-01".into()));
        let result = QueryResult {
            columns: vec!["tenant_id".into(), "dt".into()],
            rows: vec![row.clone(), row.clone(), row],
            query_id: "q-1".into(),
            execution_time_secs: 0.1,
            cached: false,
        };
        assert!(AnomalyDetector::detect(&result, None).is_empty());
    }

    #[test]
    fn test_metric_selection_prefers_known_names() {
        let columns = vec!["day".to_owned(), "hr_avg".to_owned(), "custom".to_owned()];
        assert_eq!(select_metric_column(&columns), Some("hr_avg".to_owned()));

        let columns = vec!["day".to_owned(), "custom".to_owned()];
        // "day" is an identifier, so the first non-identifier wins
        assert_eq!(select_metric_column(&columns), Some("custom".to_owned()));
    }

    #[test]
    fn test_non_numeric_cells_skipped() {
        let mut rows = Vec::new();
        for v in ["10", "10", "10", "n/a", "10", "100"] {
            let mut row = BTreeMap::new();
            row.insert("value".to_owned(), CellValue::parse(v));
            rows.push(row);
        }
        let result = QueryResult {
            columns: vec!["value".into()],
            rows,
            query_id: "q-1".into(),
            execution_time_secs: 0.1,
            cached: false,
        };
        let anomalies = AnomalyDetector::detect(&result, None);
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0].row_index, 5);
    }
}
