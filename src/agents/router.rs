// ABOUTME: Intent classifier mapping questions to a closed intent enumeration
// ABOUTME: Unrecognized model output always resolves to the general intent
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

use std::sync::Arc;

use tracing::debug;

use crate::constants::limits::PROMPT_HISTORY_TURNS;
use crate::errors::AppResult;
use crate::llm::{ChatMessage, ChatRequest, LlmProvider};
use crate::models::{ConversationTurn, Intent};

const SYSTEM_PROMPT: &str = "\
You are an intent classifier for a health data analytics system.
Classify the user's question into one of these intents:

- summary: Questions asking for summaries, overviews, or general statistics
- trend: Questions about trends, patterns, or changes over time
- comparison: Questions comparing different time periods or metrics
- dashboard: Questions asking to create or show dashboards/visualizations
- anomaly: Questions about anomalies, outliers, or unusual patterns
- coach: Questions asking for advice, explanations, or health coaching
- general: General questions that don't fit other categories

Respond with ONLY the intent name, nothing else.";

/// Classifies a question into one [`Intent`] per request.
pub struct IntentClassifier {
    llm: Arc<dyn LlmProvider>,
}

impl IntentClassifier {
    /// Create a classifier backed by the given provider
    #[must_use]
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    /// Classify a question, using the user side of the last few history
    /// turns as extra context.
    ///
    /// A label outside the closed enumeration never fails; it resolves to
    /// [`Intent::General`].
    ///
    /// # Errors
    ///
    /// Returns an error only when the provider call itself fails.
    pub async fn classify(
        &self,
        question: &str,
        history: &[ConversationTurn],
    ) -> AppResult<Intent> {
        let mut messages = vec![ChatMessage::system(SYSTEM_PROMPT)];

        if !history.is_empty() {
            let recent = history
                .iter()
                .rev()
                .take(PROMPT_HISTORY_TURNS)
                .rev()
                .map(|turn| format!("User: {}", turn.user))
                .collect::<Vec<_>>()
                .join("\n");
            messages.push(ChatMessage::user(format!("Recent conversation:\n{recent}")));
        }

        messages.push(ChatMessage::user(format!("Question: {question}")));

        let response = self.llm.complete(&ChatRequest::new(messages)).await?;
        let intent = Intent::parse(&response.content);

        debug!(raw = %response.content.trim(), intent = %intent, "Classified intent");

        Ok(intent)
    }
}
