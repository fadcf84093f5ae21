// ABOUTME: Coaching agent composing the final natural-language answer
// ABOUTME: Explains query results with encouraging, actionable health guidance
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::sync::Arc;

use crate::constants::limits::{COACH_SAMPLE_ROWS, HISTORY_ASSISTANT_CHARS, PROMPT_HISTORY_TURNS};
use crate::errors::AppResult;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::models::{ChartSpec, ConversationTurn, QueryResult};

const SYSTEM_PROMPT: &str = "\
You are a health and fitness coach AI assistant.
Your role is to:
1. Explain health data trends and patterns in simple, understandable language
2. Provide actionable insights and recommendations
3. Help users understand what their data means
4. Answer health-related questions based on the data

Guidelines:
- Be encouraging and positive
- Use simple language (avoid medical jargon)
- Provide actionable advice
- Reference specific numbers from the data
- Explain what trends mean for health
- Be careful not to provide medical advice (encourage consulting healthcare providers for medical concerns)

If asked about general health topics, you can provide educational information.";

/// Composes the final answer over the question, data, and recent history.
pub struct CoachAgent {
    llm: Arc<dyn LlmProvider>,
}

impl CoachAgent {
    /// Create a coach backed by the given provider
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Compose an answer explaining the result table.
    ///
    /// # Errors
    ///
    /// Returns an error when the provider call fails.
    pub async fn respond(
        &self,
        question: &str,
        result: Option<&QueryResult>,
        chart: Option<&ChartSpec>,
        history: &[ConversationTurn],
    ) -> AppResult<String> {
        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];

        if !history.is_empty() {
            let recent = history
                .iter()
                .rev()
                .take(PROMPT_HISTORY_TURNS)
                .rev()
                .map(|turn| {
                    let assistant: String = turn
                        .assistant
                        .chars()
                        .take(HISTORY_ASSISTANT_CHARS)
                        .collect();
                    format!("User: {}\nAssistant: {assistant}...", turn.user)
                })
                .collect::<Vec<_>>()
                .join("\n");
            messages.push(ChatMessage::user(format!("Recent conversation:\n{recent}")));
        }

        let chart_note = if chart.is_some() {
            "Chart visualization is available"
        } else {
            "No chart available"
        };

        messages.push(ChatMessage::user(format!(
            "User question: {question}\n\n{}\n\n{chart_note}\n\n\
             Provide a helpful, encouraging response that explains the data and answers the user's question.",
            result.map_or_else(|| "No data available.".to_owned(), data_summary),
        )));

        let response = self.llm.complete(&ChatRequest::new(messages)).await?;
        Ok(response.content.trim().to_owned())
    }
}

/// Short textual summary of a result table for prompt context
fn data_summary(result: &QueryResult) -> String {
    let mut summary = format!(
        "Data columns: {}\nNumber of records: {}\n",
        result.columns.join(", "),
        result.row_count()
    );

    if !result.rows.is_empty() {
        summary.push_str("\nSample data:\n");
        for (i, row) in result.rows.iter().take(COACH_SAMPLE_ROWS).enumerate() {
            let rendered = serde_json::to_string(row).unwrap_or_default();
            summary.push_str(&format!("  {}. {rendered}\n", i + 1));
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CellValue;
    use std::collections::BTreeMap;

    #[test]
    fn test_data_summary_caps_sample_rows() {
        let rows = (0..20)
            .map(|i| {
                let mut row = BTreeMap::new();
                row.insert("steps_total".to_owned(), CellValue::Int(i));
                row
            })
            .collect();
        let result = QueryResult {
            columns: vec!["steps_total".into()],
            rows,
            query_id: "q-1".into(),
            execution_time_secs: 0.3,
            cached: false,
        };

        let summary = data_summary(&result);
        assert!(summary.contains("Number of records: 20"));
        assert!(summary.contains("  5. "));
        assert!(!summary.contains("  6. "));
    }
}
