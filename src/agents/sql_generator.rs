// ABOUTME: SQL generator producing warehouse statements from natural-language questions
// ABOUTME: Sanitizes free-form model output into a single plausible statement
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # SQL Generator
//!
//! Prompts the model with the queryable schema, the mandatory tenant-filter
//! rule, and partition-pruning guidance, then sanitizes the raw response
//! into one statement. Sanitization is best-effort text surgery over
//! free-form model output, not a SQL parser: diagnostics that detect
//! imbalance are logged but never block execution, because the warehouse
//! engine is the final authority on whether a statement is valid.

use std::sync::{Arc, LazyLock};

use regex::Regex;
use tracing::{debug, info, warn};

use crate::constants::limits::SQL_FEWSHOT_TURNS;
use crate::errors::AppResult;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::models::{ConversationTurn, Intent, TenantId};

/// Keywords a statement may legitimately start with
const LEADING_KEYWORDS: &[&str] = &[
    "SELECT", "WITH", "CREATE", "INSERT", "UPDATE", "DELETE", "ALTER", "DROP",
];

/// Clause keywords that mark a line as SQL continuation, not prose
const CLAUSE_KEYWORDS: &[&str] = &[
    "SELECT", "FROM", "WHERE", "AND", "OR", "GROUP", "ORDER", "HAVING", "WITH", "AS", "CASE",
    "WHEN", "THEN", "ELSE", "END", "JOIN", "INNER", "LEFT", "RIGHT", "ON", "UNION", "INTERSECT",
    "EXCEPT", "LIMIT", "OFFSET",
];

/// Markers that flag the start of explanatory prose
const PROSE_MARKERS: &[&str] = &[
    "NOTE:",
    "NOTE THAT",
    "THIS",
    "THE QUERY",
    "HERE IS",
    "EXPLANATION:",
    "REMEMBER:",
    "TIP:",
];

/// Tool-invocation artifacts the model sometimes echoes, e.g. `@bash (171-201)`
static TOOL_ARTIFACT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"@\w+\s*\([^)]+\)").unwrap_or_else(|e| unreachable!("static pattern: {e}"))
});

/// Generates and sanitizes warehouse SQL for one question.
pub struct SqlGenerator {
    llm: Arc<dyn LlmProvider>,
    lookback_days: u32,
}

impl SqlGenerator {
    /// Create a generator backed by the given provider
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>, lookback_days: u32) -> Self {
        Self { llm, lookback_days }
    }

    /// Generate a sanitized statement for a question.
    ///
    /// Up to two prior (question, SQL) pairs from history are included as
    /// few-shot context. The returned string passed sanitization but may
    /// still be rejected by the engine.
    ///
    /// # Errors
    ///
    /// Returns an error only when the provider call itself fails.
    pub async fn generate(
        &self,
        question: &str,
        intent: Intent,
        tenant_id: &TenantId,
        history: &[ConversationTurn],
    ) -> AppResult<String> {
        let mut messages = vec![ChatMessage::system(self.system_prompt(tenant_id))];

        let few_shot: Vec<String> = history
            .iter()
            .rev()
            .take(SQL_FEWSHOT_TURNS)
            .rev()
            .map(|turn| {
                format!(
                    "User: {}\nSQL: {}",
                    turn.user,
                    turn.sql.as_deref().unwrap_or("N/A")
                )
            })
            .collect();
        if !few_shot.is_empty() {
            messages.push(ChatMessage::user(format!(
                "Previous queries:\n{}",
                few_shot.join("\n")
            )));
        }

        messages.push(ChatMessage::user(format!(
            "Generate SQL for: {question}\nIntent: {intent}"
        )));

        let response = self.llm.complete(&ChatRequest::new(messages)).await?;
        debug!(raw = %response.content, "Raw SQL response");

        let sql = Self::sanitize(&response.content);
        Self::check_statement(&sql);

        info!(chars = sql.len(), tenant = %tenant_id, "Generated SQL");

        Ok(sql)
    }

    /// Whether a statement starts with a keyword the engine can execute
    #[must_use]
    pub fn is_executable(sql: &str) -> bool {
        let upper = sql.trim_start().to_ascii_uppercase();
        LEADING_KEYWORDS.iter().any(|k| upper.starts_with(k))
    }

    /// Sanitize a raw model response into a single plausible statement.
    ///
    /// Steps: strip code fences, drop tool-invocation artifacts, discard
    /// any prefix before the first SQL keyword, cut trailing prose
    /// line-by-line, and strip a trailing terminator.
    #[must_use]
    pub fn sanitize(raw: &str) -> String {
        let mut sql = raw.trim();

        if let Some(rest) = sql.strip_prefix("```sql") {
            sql = rest;
        }
        if let Some(rest) = sql.strip_prefix("```") {
            sql = rest;
        }
        if let Some(rest) = sql.strip_suffix("```") {
            sql = rest;
        }
        let sql = TOOL_ARTIFACT.replace_all(sql.trim(), "");
        let mut sql = sql.trim();

        // Discard explanatory text before the first SQL keyword. The
        // uppercase copy is byte-aligned because ASCII case folding
        // preserves length.
        let upper = sql.to_ascii_uppercase();
        if let Some(pos) = LEADING_KEYWORDS
            .iter()
            .filter_map(|k| upper.find(k))
            .min()
        {
            sql = &sql[pos..];
        }

        let mut kept: Vec<&str> = Vec::new();
        for (i, line) in sql.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                kept.push(line);
                continue;
            }

            // The first line is the statement start by construction
            if i > 0 && is_prose(trimmed) {
                break;
            }

            kept.push(line);
        }

        kept.join("\n")
            .trim()
            .trim_end_matches(';')
            .trim()
            .to_owned()
    }

    /// Non-fatal completeness diagnostics; flags but never repairs
    fn check_statement(sql: &str) {
        let open = sql.matches('(').count();
        let close = sql.matches(')').count();
        if open != close {
            warn!(open, close, "SQL has unbalanced parentheses");
        }

        let collapsed: String = sql
            .to_ascii_uppercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ");
        if collapsed.starts_with("WITH") {
            let with_count = collapsed.matches("WITH").count();
            let as_count = collapsed.matches(" AS (").count();
            let final_select = collapsed.rfind(" SELECT ");
            if final_select.is_none() || as_count < with_count {
                warn!(
                    with_count,
                    as_count,
                    has_final_select = final_select.is_some(),
                    "SQL WITH clause may be incomplete"
                );
            }
        }
    }

    fn system_prompt(&self, tenant_id: &TenantId) -> String {
        let tenant = tenant_id.as_str();
        let lookback = self.lookback_days;
        format!(
            "You are a SQL query generator for health data analytics.
Generate SQL queries for a Presto-dialect warehouse engine.

Available tables:
1. gold_daily_features: Daily aggregated features
   - Columns: day, steps_total, distance_km_total, active_kcal_total, basal_kcal_total,
              flights_total, hr_avg, hr_max, hr_min, tenant_id, dt
   - Partitioned by: tenant_id, dt

2. gold_weekly_features: Weekly aggregated features
   - Columns: week_start, steps_week, distance_km_week, active_kcal_week, basal_kcal_week,
              flights_week, hr_avg_week, hr_max_week, hr_min_week, tenant_id
   - Partitioned by: tenant_id, week_start

3. gold_daily_by_type: Daily aggregations by data type
   - Columns: day, data_type, samples, sum_value, avg_value, min_value, max_value, tenant_id, dt
   - Partitioned by: tenant_id, dt

4. silver_health: Raw data view
   - Columns: tenant_id, day, date_parsed, week_start, data_type, value, timestamp_unix

CRITICAL SECURITY RULES:
- ALWAYS include WHERE tenant_id = '{tenant}' in every query
- Use partition pruning: dt >= DATE_FORMAT(DATE_ADD('day', -{lookback}, CURRENT_DATE), '%Y-%m-%d')
- Never query across tenants
- Use gold tables for aggregations (faster, cheaper)

SQL Requirements:
- Use Presto SQL syntax
- Partition keys (tenant_id, dt/week_start) must be in the WHERE clause
- Parentheses must match, CASE statements must have END
- For date comparisons, use string format: dt >= '2024-01-01'
- For date arithmetic, use: DATE_ADD('day', -7, CURRENT_DATE)

CRITICAL: Return ONLY the COMPLETE SQL query. Do NOT include:
- Explanatory text before or after the query
- Markdown formatting unless necessary

IMPORTANT: The SQL query MUST be complete and executable:
- If using WITH clauses, include ALL CTEs and a final SELECT statement
- All parentheses must be balanced
- The query must end with a valid SELECT statement (not just a CTE definition)

Start your response directly with SELECT, WITH, or another SQL keyword.

Example valid SQL:
SELECT day, steps_total, hr_avg
FROM health_data_lake.gold_daily_features
WHERE tenant_id = '{tenant}'
  AND dt >= DATE_FORMAT(DATE_ADD('day', -30, CURRENT_DATE), '%Y-%m-%d')
ORDER BY day DESC"
        )
    }
}

/// Whether a trimmed line is unambiguously explanatory prose
fn is_prose(line: &str) -> bool {
    let upper = line.to_ascii_uppercase();
    if PROSE_MARKERS.iter().any(|m| upper.starts_with(m)) {
        return true;
    }

    // A complete natural-language sentence: capitalized, more than three
    // words, terminal punctuation, and not led by a SQL clause keyword
    if CLAUSE_KEYWORDS
        .iter()
        .any(|k| upper.starts_with(k) && !upper[k.len()..].starts_with(|c: char| c.is_ascii_alphanumeric()))
    {
        return false;
    }

    let capitalized = line.starts_with(|c: char| c.is_ascii_uppercase());
    let words = line.split_whitespace().count();
    let terminal = line.ends_with('.') || line.ends_with('!') || line.ends_with('?');
    capitalized && words > 3 && terminal
}
