// ABOUTME: Integration tests for the intent classifier
// ABOUTME: Covers label normalization, fallback behavior, and history context
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

mod common;

use std::sync::Arc;

use common::{init_test_logging, MockLlmProvider};
use lumen_insights::agents::IntentClassifier;
use lumen_insights::models::{ConversationTurn, Intent};

fn turn(user: &str) -> ConversationTurn {
    ConversationTurn {
        user: user.to_owned(),
        assistant: "answer".to_owned(),
        sql: None,
    }
}

#[tokio::test]
async fn test_known_label_is_classified() {
    init_test_logging();
    let llm = Arc::new(MockLlmProvider::with_responses(["trend"]));
    let classifier = IntentClassifier::new(llm);

    let intent = classifier
        .classify("show my steps trend for the last 30 days", &[])
        .await
        .unwrap();
    assert_eq!(intent, Intent::Trend);
}

#[tokio::test]
async fn test_label_is_normalized() {
    init_test_logging();
    let llm = Arc::new(MockLlmProvider::with_responses(["  SUMMARY \n"]));
    let classifier = IntentClassifier::new(llm);

    let intent = classifier.classify("give me an overview", &[]).await.unwrap();
    assert_eq!(intent, Intent::Summary);
}

#[tokio::test]
async fn test_unknown_label_falls_back_to_general() {
    init_test_logging();
    for raw in ["", "not sure", "dashboards please", "I think it's a trend"] {
        let llm = Arc::new(MockLlmProvider::with_responses([raw]));
        let classifier = IntentClassifier::new(llm);
        let intent = classifier.classify("hmm", &[]).await.unwrap();
        assert_eq!(intent, Intent::General, "raw label: {raw:?}");
    }
}

#[tokio::test]
async fn test_history_user_turns_included_in_prompt() {
    init_test_logging();
    let llm = Arc::new(MockLlmProvider::with_responses(["comparison"]));
    let classifier = IntentClassifier::new(llm.clone());

    let history = vec![
        turn("how did I sleep"),
        turn("what about my steps"),
        turn("and last week"),
        turn("compare them"),
    ];
    classifier.classify("versus last month?", &history).await.unwrap();

    let requests = llm.recorded_requests();
    assert_eq!(requests.len(), 1);
    let context = &requests[0].messages[1].content;
    // Only the last three user turns appear, in order
    assert!(context.contains("User: what about my steps"));
    assert!(context.contains("User: compare them"));
    assert!(!context.contains("how did I sleep"));
}

#[tokio::test]
async fn test_provider_failure_propagates() {
    init_test_logging();
    let classifier = IntentClassifier::new(Arc::new(MockLlmProvider::failing()));
    assert!(classifier.classify("anything", &[]).await.is_err());
}
