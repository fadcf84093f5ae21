// ABOUTME: Unified error handling for the analytics workflow core
// ABOUTME: Defines error codes, context attachment, and convenience constructors
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Unified Error Handling System
//!
//! Central error types for the Lumen Insights workflow core. Every failure a
//! caller can observe flows through [`AppError`], which pairs a stable
//! [`ErrorCode`] with a human-readable message and optional context. Query
//! errors always carry the SQL text that was attempted so operators can
//! diagnose warehouse failures without replaying the request.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Standard error codes used throughout the application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Authentication (1000-1999)
    #[serde(rename = "AUTH_INVALID")]
    AuthInvalid = 1001,

    // Validation (3000-3999)
    #[serde(rename = "INVALID_INPUT")]
    InvalidInput = 3000,

    // Warehouse queries (4000-4999)
    #[serde(rename = "QUERY_TIMEOUT")]
    QueryTimeout = 4000,
    #[serde(rename = "QUERY_FAILED")]
    QueryFailed = 4001,
    #[serde(rename = "ENGINE_TRANSPORT")]
    EngineTransport = 4002,

    // External services (5000-5999)
    #[serde(rename = "LLM_PROVIDER_ERROR")]
    LlmProvider = 5000,
    #[serde(rename = "CACHE_UNAVAILABLE")]
    CacheUnavailable = 5001,

    // Configuration (6000-6999)
    #[serde(rename = "CONFIG_ERROR")]
    ConfigError = 6000,
    #[serde(rename = "CONFIG_MISSING")]
    ConfigMissing = 6001,

    // Internal errors (9000-9999)
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError = 9000,
    #[serde(rename = "SERIALIZATION_ERROR")]
    SerializationError = 9003,
}

impl ErrorCode {
    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        match self {
            Self::InvalidInput => 400,
            Self::AuthInvalid => 401,
            Self::QueryTimeout => 504,
            Self::QueryFailed | Self::EngineTransport | Self::LlmProvider => 502,
            Self::CacheUnavailable => 503,
            Self::ConfigError
            | Self::ConfigMissing
            | Self::InternalError
            | Self::SerializationError => 500,
        }
    }

    /// Get a user-friendly description of this error
    #[must_use]
    pub const fn description(&self) -> &'static str {
        match self {
            Self::AuthInvalid => "The provided authentication credentials are invalid",
            Self::InvalidInput => "The provided input is invalid",
            Self::QueryTimeout => "The warehouse query did not complete in time",
            Self::QueryFailed => "The warehouse query failed",
            Self::EngineTransport => "Communication with the warehouse engine failed",
            Self::LlmProvider => "The language model provider returned an error",
            Self::CacheUnavailable => "The result cache is unavailable",
            Self::ConfigError => "Configuration error encountered",
            Self::ConfigMissing => "Required configuration is missing",
            Self::InternalError => "An internal error occurred",
            Self::SerializationError => "Data serialization/deserialization failed",
        }
    }
}

/// Additional context that can be attached to errors
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorContext {
    /// Request ID for tracing
    pub request_id: Option<String>,
    /// Tenant the failing request was scoped to
    pub tenant_id: Option<String>,
    /// SQL statement that was attempted, for diagnostics
    pub sql: Option<String>,
}

/// Unified error type for the application
#[derive(Debug, Error)]
pub struct AppError {
    /// Error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Additional context
    pub context: ErrorContext,
    /// Source error for error chaining
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new error with the given code and message
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            context: ErrorContext::default(),
            source: None,
        }
    }

    /// Add a request ID to the error context
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.context.request_id = Some(request_id.into());
        self
    }

    /// Add a tenant ID to the error context
    #[must_use]
    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.context.tenant_id = Some(tenant_id.into());
        self
    }

    /// Attach the SQL statement that produced this error
    #[must_use]
    pub fn with_sql(mut self, sql: impl Into<String>) -> Self {
        self.context.sql = Some(sql.into());
        self
    }

    /// Add a source error for error chaining
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn http_status(&self) -> u16 {
        self.code.http_status()
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code.description(), self.message)
    }
}

/// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;

/// Convenience functions for creating common errors
impl AppError {
    /// Invalid authentication
    pub fn auth_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::AuthInvalid, message)
    }

    /// Invalid input
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    /// Warehouse query exceeded its timeout; carries the attempted SQL
    pub fn query_timeout(sql: impl Into<String>, timeout_secs: u64) -> Self {
        Self::new(
            ErrorCode::QueryTimeout,
            format!("Query timeout after {timeout_secs} seconds"),
        )
        .with_sql(sql)
    }

    /// Warehouse engine reported the query as failed or cancelled
    pub fn query_failed(sql: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::QueryFailed,
            format!("Query failed: {}", reason.into()),
        )
        .with_sql(sql)
    }

    /// Communication with the warehouse engine itself failed
    pub fn engine_transport(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::EngineTransport, message)
    }

    /// Language model provider failure
    pub fn llm(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::LlmProvider, message)
    }

    /// Cache backend failure. Never surfaced to callers; the cache layer
    /// degrades to a miss instead of propagating this.
    pub fn cache_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::CacheUnavailable, message)
    }

    /// Configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ConfigError, message)
    }

    /// Required configuration value missing
    pub fn config_missing(key: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ConfigMissing,
            format!("Missing configuration: {}", key.into()),
        )
    }

    /// Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializationError, message)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(error: serde_json::Error) -> Self {
        Self::serialization(error.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::new(ErrorCode::InternalError, error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_http_status() {
        assert_eq!(ErrorCode::AuthInvalid.http_status(), 401);
        assert_eq!(ErrorCode::QueryTimeout.http_status(), 504);
        assert_eq!(ErrorCode::QueryFailed.http_status(), 502);
        assert_eq!(ErrorCode::InternalError.http_status(), 500);
    }

    #[test]
    fn test_query_errors_carry_sql() {
        let error = AppError::query_failed("SELECT 1", "SYNTAX_ERROR at line 1");
        assert_eq!(error.code, ErrorCode::QueryFailed);
        assert_eq!(error.context.sql.as_deref(), Some("SELECT 1"));
        assert!(error.message.contains("SYNTAX_ERROR"));

        let error = AppError::query_timeout("SELECT 2", 300);
        assert_eq!(error.context.sql.as_deref(), Some("SELECT 2"));
        assert!(error.message.contains("300 seconds"));
    }

    #[test]
    fn test_context_attachment() {
        let error = AppError::internal("boom")
            .with_request_id("req-123")
            .with_tenant_id("tenant-a");
        assert_eq!(error.context.request_id.as_deref(), Some("req-123"));
        assert_eq!(error.context.tenant_id.as_deref(), Some("tenant-a"));
    }
}
