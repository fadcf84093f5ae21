// ABOUTME: Analytics agents powering each workflow step
// ABOUTME: Intent classification, SQL generation, anomaly detection, charts, and coaching
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Analytics Agents
//!
//! One agent per workflow responsibility. Each holds its own
//! `Arc<dyn LlmProvider>` handle so tests can substitute deterministic
//! stubs per agent; there is no process-wide model client.

/// Statistical outlier detection and explanation
pub mod anomaly;
/// Health coaching and data explanation responses
pub mod coach;
/// Declarative chart specification generation
pub mod dashboard;
/// Intent classification
pub mod router;
/// SQL generation and sanitization
pub mod sql_generator;

pub use anomaly::{AnomalyDetector, NO_ANOMALIES_MESSAGE};
pub use coach::CoachAgent;
pub use dashboard::ChartBuilder;
pub use router::IntentClassifier;
pub use sql_generator::SqlGenerator;
