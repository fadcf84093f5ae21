// ABOUTME: Main library entry point for the Lumen Insights analytics platform
// ABOUTME: Natural-language analytics over a multi-tenant health data lake
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

#![deny(unsafe_code)]

//! # Lumen Insights
//!
//! A natural-language analytics assistant over a multi-tenant health data
//! warehouse. A question enters the workflow, gets classified into an
//! intent, is turned into tenant-scoped SQL, executed against the warehouse
//! engine (via a TTL result cache), and the resulting table is explained,
//! charted, or checked for anomalies depending on the intent.
//!
//! ## Features
//!
//! - **Tenant isolation**: every statement that reaches the engine carries
//!   an equality filter on the authenticated caller's tenant
//! - **Pluggable collaborators**: the language-model provider, warehouse
//!   engine, and result cache are all injected traits
//! - **Intent-routed pipeline**: a strict forward state machine with one
//!   branch point and no retries
//! - **Deterministic fallbacks**: unknown intents resolve to `general`,
//!   unparseable chart specs fall back to a derived chart shape
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use lumen_insights::config::ServerConfig;
//! use lumen_insights::errors::AppResult;
//!
//! fn main() -> AppResult<()> {
//!     // Load configuration from the environment
//!     let config = ServerConfig::from_env()?;
//!     println!(
//!         "Lumen Insights configured for database: {}",
//!         config.warehouse.database
//!     );
//!     Ok(())
//! }
//! ```

/// Analytics agents: classification, SQL generation, anomalies, charts, coaching
pub mod agents;

/// `JWT`-based tenant authentication
pub mod auth;

/// Query result cache with pluggable backends
pub mod cache;

/// Environment-based configuration
pub mod config;

/// Shared constants for limits, thresholds, and defaults
pub mod constants;

/// Unified error handling
pub mod errors;

/// Language-model provider abstraction
pub mod llm;

/// Structured logging setup
pub mod logging;

/// Core domain types
pub mod models;

/// Per-session conversation history store
pub mod session;

/// Warehouse engine interface and tenant-safe executor
pub mod warehouse;

/// Workflow orchestrator
pub mod workflow;

pub use errors::{AppError, AppResult};
pub use models::{ChatOutcome, Intent, QueryResult, TenantId, WorkflowState};
pub use workflow::Workflow;
