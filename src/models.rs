// ABOUTME: Core domain types for the analytics workflow
// ABOUTME: Tenant identity, intents, query results, anomalies, chart specs, and workflow state
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! Domain data model shared by all workflow components.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Opaque identifier of a data owner.
///
/// Every query execution and cache key is scoped by it. It is always carried
/// from the authenticated caller and never inferred from user-supplied query
/// text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Create a tenant id from the authenticated caller's claims
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self(id.to_owned())
    }
}

impl From<String> for TenantId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One user/assistant exchange in a conversation.
///
/// Histories are ordered most-recent-last. The SQL issued for the turn is
/// retained so later SQL generation can use prior (question, SQL) pairs as
/// few-shot context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// What the user asked
    pub user: String,
    /// The final answer produced for the turn
    pub assistant: String,
    /// SQL issued while answering, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}

/// Closed set of request intents.
///
/// Produced once per request by the classifier and never mutated afterward.
/// Branching on intent is always an exhaustive `match`, so adding a variant
/// is a compile-time event, not a silent fallthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intent {
    /// Summaries, overviews, general statistics
    Summary,
    /// Trends, patterns, changes over time
    Trend,
    /// Comparisons between periods or metrics
    Comparison,
    /// Dashboard / visualization requests
    Dashboard,
    /// Outliers and unusual patterns
    Anomaly,
    /// Advice, explanations, health coaching
    Coach,
    /// Everything else
    General,
}

impl Intent {
    /// Parse a raw classifier label.
    ///
    /// Input is trimmed and lowercased first; anything outside the closed
    /// enumeration (empty, malformed, hallucinated) resolves to
    /// [`Intent::General`]. This never fails.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "summary" => Self::Summary,
            "trend" => Self::Trend,
            "comparison" => Self::Comparison,
            "dashboard" => Self::Dashboard,
            "anomaly" => Self::Anomaly,
            "coach" => Self::Coach,
            _ => Self::General,
        }
    }

    /// Canonical label used in prompts and serialized output
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Summary => "summary",
            Self::Trend => "trend",
            Self::Comparison => "comparison",
            Self::Dashboard => "dashboard",
            Self::Anomaly => "anomaly",
            Self::Coach => "coach",
            Self::General => "general",
        }
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single result cell, typed by its runtime value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    /// Whole number
    Int(i64),
    /// Number with a fractional part
    Float(f64),
    /// Everything else stays textual
    Text(String),
}

impl CellValue {
    /// Coerce a raw warehouse cell: float if it carries a decimal point and
    /// is numeric, integer if fully numeric, otherwise text. No
    /// locale-specific parsing.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        if raw.contains('.') {
            if let Ok(f) = raw.parse::<f64>() {
                return Self::Float(f);
            }
        } else if let Ok(i) = raw.parse::<i64>() {
            return Self::Int(i);
        }
        Self::Text(raw.to_owned())
    }

    /// Numeric view of the cell, if it has one. Textual cells that parse as
    /// floating point still count, matching how metrics are extracted for
    /// anomaly detection.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            Self::Text(s) => s.trim().parse::<f64>().ok(),
        }
    }

    /// Whether the cell is numerically typed (not merely numeric-looking text)
    #[must_use]
    pub const fn is_numeric(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_))
    }
}

/// One result row, keyed by column name.
pub type Row = BTreeMap<String, CellValue>;

/// Tabular outcome of a warehouse query. Immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    /// Column names in result order
    pub columns: Vec<String>,
    /// Rows keyed by column name
    pub rows: Vec<Row>,
    /// Engine-assigned execution identifier
    pub query_id: String,
    /// Wall-clock execution time in seconds
    pub execution_time_secs: f64,
    /// True when served from the result cache
    pub cached: bool,
}

impl QueryResult {
    /// Number of rows in the result
    #[must_use]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Whether an outlier sits above or below the mean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnomalyKind {
    /// Value above the mean
    High,
    /// Value below the mean
    Low,
}

impl fmt::Display for AnomalyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::High => f.write_str("high"),
            Self::Low => f.write_str("low"),
        }
    }
}

/// A statistically outlying row. Derived per request, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    /// Index of the row in the source result
    pub row_index: usize,
    /// The full source row for context
    pub row_data: Row,
    /// Metric column the statistic was computed over
    pub metric: String,
    /// The outlying value
    pub value: f64,
    /// Absolute z-score of the value
    pub z_score: f64,
    /// High or low relative to the mean
    #[serde(rename = "type")]
    pub kind: AnomalyKind,
}

/// Declarative chart specification handed to a separate rendering layer.
///
/// The spec body always embeds the full row set under `data.values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSpec {
    /// Spec dialect, e.g. `vega-lite`
    pub spec_type: String,
    /// The declarative chart object
    pub spec: serde_json::Value,
}

/// Working record for one request as it advances through the workflow.
///
/// Created once per request, mutated field-by-field by the orchestrator, and
/// discarded after the response is returned. Only the conversation history
/// outlives it, in the session store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowState {
    /// The user's question, verbatim
    pub question: String,
    /// Authenticated tenant scope
    pub tenant_id: TenantId,
    /// Recent conversation turns, most recent last
    pub history: Vec<ConversationTurn>,
    /// Classified intent; set exactly once
    pub intent: Option<Intent>,
    /// Every SQL string issued during the request
    pub sql_queries: Vec<String>,
    /// Most recent query result, if retrieval succeeded
    pub query_result: Option<QueryResult>,
    /// Chart specifications accumulated for the response
    pub charts: Vec<ChartSpec>,
    /// Anomalies accumulated for the response
    pub anomalies: Vec<Anomaly>,
    /// The final natural-language answer
    pub final_answer: String,
    /// Most recently used SQL; kept on failure for diagnostics
    pub sql_used: Option<String>,
}

impl WorkflowState {
    /// Start a fresh state for one request
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        tenant_id: TenantId,
        history: Vec<ConversationTurn>,
    ) -> Self {
        Self {
            question: question.into(),
            tenant_id,
            history,
            intent: None,
            sql_queries: Vec::new(),
            query_result: None,
            charts: Vec::new(),
            anomalies: Vec::new(),
            final_answer: String::new(),
            sql_used: None,
        }
    }
}

/// What the workflow hands back to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOutcome {
    /// Natural-language answer
    pub answer: String,
    /// Chart specifications, if the request produced any
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub charts: Vec<ChartSpec>,
    /// SQL used to answer, for transparency
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql_used: Option<String>,
    /// The underlying result table
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_result: Option<QueryResult>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_parse_known_labels() {
        assert_eq!(Intent::parse("summary"), Intent::Summary);
        assert_eq!(Intent::parse("  trend \n"), Intent::Trend);
        assert_eq!(Intent::parse("SUMMARY"), Intent::Summary);
    }

    #[test]
    fn test_intent_parse_falls_back_to_general() {
        assert_eq!(Intent::parse(""), Intent::General);
        assert_eq!(Intent::parse("not sure"), Intent::General);
        assert_eq!(Intent::parse("dashboards please"), Intent::General);
    }

    #[test]
    fn test_cell_value_coercion() {
        assert_eq!(CellValue::parse("42"), CellValue::Int(42));
        assert_eq!(CellValue::parse("4.5"), CellValue::Float(4.5));
        assert_eq!(CellValue::parse("n/a"), CellValue::Text("n/a".into()));
        // Exponent notation has no decimal point and is not a plain integer
        assert_eq!(CellValue::parse("1e5"), CellValue::Text("1e5".into()));
    }

    #[test]
    fn test_cell_value_numeric_view() {
        assert_eq!(CellValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(CellValue::Text("12.5".into()).as_f64(), Some(12.5));
        assert_eq!(CellValue::Text("abc".into()).as_f64(), None);
    }
}
