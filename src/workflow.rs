// ABOUTME: Workflow orchestrator sequencing classification, retrieval, and composition
// ABOUTME: Strict forward pipeline with one intent-driven branch point, no retries
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Workflow Orchestrator
//!
//! State machine over [`WorkflowState`]: classify, retrieve, branch on
//! intent, compose. No state is revisited and there is no backtracking; a
//! failure at the retrieve step is fatal for the whole request, with the
//! attempted SQL attached to the error for diagnostics.
//!
//! Branching on intent is an exhaustive `match`, so adding an intent
//! variant is a compile-time event here, never a silent fallthrough.

use std::sync::Arc;

use tracing::{field, info, instrument, warn, Span};
use uuid::Uuid;

use crate::agents::{AnomalyDetector, ChartBuilder, CoachAgent, IntentClassifier, SqlGenerator};
use crate::cache::QueryCache;
use crate::config::ServerConfig;
use crate::errors::{AppError, AppResult};
use crate::llm::LlmProvider;
use crate::models::{ChatOutcome, ConversationTurn, Intent, TenantId, WorkflowState};
use crate::session::{SessionKey, SessionStore};
use crate::warehouse::{QueryExecutor, WarehouseEngine};

/// Placeholder recorded when the SQL generator never produced a statement
const SQL_GENERATION_FAILED: &str = "SQL generation failed";

/// Answer shown for a summary request that returned no rows to summarize
const NO_DATA_TO_SUMMARIZE: &str = "No data available to summarize.";

/// Orchestrates one request through the analytics pipeline.
pub struct Workflow {
    classifier: IntentClassifier,
    generator: SqlGenerator,
    executor: QueryExecutor,
    chart_builder: ChartBuilder,
    anomaly_detector: AnomalyDetector,
    coach: CoachAgent,
    sessions: Arc<SessionStore>,
}

impl Workflow {
    /// Wire the pipeline from its injected collaborators
    #[must_use]
    pub fn new(
        llm: Arc<dyn LlmProvider>,
        engine: Arc<dyn WarehouseEngine>,
        cache: Arc<dyn QueryCache>,
        config: &ServerConfig,
        sessions: Arc<SessionStore>,
    ) -> Self {
        Self {
            classifier: IntentClassifier::new(llm.clone()),
            generator: SqlGenerator::new(llm.clone(), config.warehouse.lookback_days),
            executor: QueryExecutor::new(
                engine,
                cache,
                config.warehouse.clone(),
                config.cache.default_ttl,
            ),
            chart_builder: ChartBuilder::new(llm.clone()),
            anomaly_detector: AnomalyDetector::new(llm.clone()),
            coach: CoachAgent::new(llm),
            sessions,
        }
    }

    /// Answer a question on behalf of an authenticated session.
    ///
    /// Pulls the session's history, runs the pipeline, and appends the
    /// completed turn (including the SQL used) back to the session.
    ///
    /// # Errors
    ///
    /// Propagates any terminal pipeline failure as a single error carrying
    /// a human-readable message with best-effort SQL context.
    pub async fn answer(
        &self,
        question: &str,
        tenant_id: &TenantId,
        session_key: &SessionKey,
    ) -> AppResult<ChatOutcome> {
        let history = self.sessions.history(session_key);
        let state = self.run(question, tenant_id.clone(), history).await?;

        self.sessions.append(
            session_key,
            ConversationTurn {
                user: question.to_owned(),
                assistant: state.final_answer.clone(),
                sql: state.sql_used.clone(),
            },
        );

        Ok(ChatOutcome {
            answer: state.final_answer,
            charts: state.charts,
            sql_used: state.sql_used,
            query_result: state.query_result,
        })
    }

    /// Run one request through the full pipeline.
    ///
    /// Each run is tagged with a fresh request id, carried in the tracing
    /// span and attached to any terminal failure for log correlation.
    ///
    /// # Errors
    ///
    /// Fails terminally when classification, SQL generation, execution, or
    /// composition fails; retrieve-step failures carry the attempted SQL.
    #[instrument(skip_all, fields(tenant = %tenant_id, request_id = field::Empty))]
    pub async fn run(
        &self,
        question: &str,
        tenant_id: TenantId,
        history: Vec<ConversationTurn>,
    ) -> AppResult<WorkflowState> {
        let request_id = Uuid::new_v4().to_string();
        Span::current().record("request_id", request_id.as_str());

        let mut state = WorkflowState::new(question, tenant_id, history);
        match self.run_pipeline(&mut state).await {
            Ok(()) => Ok(state),
            Err(e) => Err(e.with_request_id(request_id)),
        }
    }

    /// Classify, retrieve, and branch for one request
    async fn run_pipeline(&self, state: &mut WorkflowState) -> AppResult<()> {
        let intent = self
            .classifier
            .classify(&state.question, &state.history)
            .await?;
        state.intent = Some(intent);
        info!(intent = %intent, "Request classified");

        self.retrieve(state, intent).await?;
        self.branch(state, intent).await
    }

    /// Generate SQL and execute it; any failure here is terminal
    async fn retrieve(&self, state: &mut WorkflowState, intent: Intent) -> AppResult<()> {
        let sql = match self
            .generator
            .generate(&state.question, intent, &state.tenant_id, &state.history)
            .await
        {
            Ok(sql) => sql,
            Err(e) => {
                state.sql_used = Some(SQL_GENERATION_FAILED.to_owned());
                return Err(augment_retrieve_error(e, SQL_GENERATION_FAILED));
            }
        };

        state.sql_queries.push(sql.clone());
        state.sql_used = Some(sql.clone());

        if !SqlGenerator::is_executable(&sql) {
            let preview: String = sql.chars().take(100).collect();
            warn!("Generated text is not an executable statement");
            return Err(augment_retrieve_error(
                AppError::invalid_input(format!(
                    "Invalid SQL query. Must start with SELECT, WITH, or another executable keyword. Got: {preview}"
                )),
                &sql,
            ));
        }

        match self.executor.execute(&sql, &state.tenant_id).await {
            Ok(result) => {
                state.query_result = Some(result);
                Ok(())
            }
            Err(e) => Err(augment_retrieve_error(e, &sql)),
        }
    }

    /// Intent-driven branch into charts, anomalies, or straight composition
    async fn branch(&self, state: &mut WorkflowState, intent: Intent) -> AppResult<()> {
        match intent {
            Intent::Dashboard => {
                if let Some(result) = &state.query_result {
                    let chart = self
                        .chart_builder
                        .build(result, &state.question, "auto")
                        .await?;
                    state.charts.push(chart);
                }
                self.compose(state).await
            }
            Intent::Anomaly => {
                let mut explanation = None;
                if let Some(result) = &state.query_result {
                    let anomalies = AnomalyDetector::detect(result, None);
                    if !anomalies.is_empty() {
                        explanation = Some(
                            self.anomaly_detector
                                .explain(&anomalies, &state.question)
                                .await?,
                        );
                    }
                    state.anomalies = anomalies;
                }
                self.compose(state).await?;
                // The anomaly explanation augments the composed answer
                // rather than replacing it
                if let Some(explanation) = explanation {
                    state.final_answer.push_str("\n\n");
                    state.final_answer.push_str(&explanation);
                }
                Ok(())
            }
            Intent::Summary => {
                if state.query_result.is_none() {
                    state.final_answer = NO_DATA_TO_SUMMARIZE.to_owned();
                    return Ok(());
                }
                state.final_answer = self
                    .coach
                    .respond(
                        &format!("Summarize this data: {}", state.question),
                        state.query_result.as_ref(),
                        None,
                        &state.history,
                    )
                    .await?;
                Ok(())
            }
            Intent::Trend | Intent::Comparison | Intent::Coach | Intent::General => {
                self.compose(state).await
            }
        }
    }

    /// Compose the final answer over the question, data, and first chart
    async fn compose(&self, state: &mut WorkflowState) -> AppResult<()> {
        state.final_answer = self
            .coach
            .respond(
                &state.question,
                state.query_result.as_ref(),
                state.charts.first(),
                &state.history,
            )
            .await?;
        Ok(())
    }
}

/// Attach the attempted SQL to a retrieve-step failure, preserving its code
fn augment_retrieve_error(e: AppError, sql: &str) -> AppError {
    AppError::new(
        e.code,
        format!("SQL execution failed: {}\n\nSQL used:\n{sql}", e.message),
    )
    .with_sql(sql)
}
