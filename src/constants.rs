// ABOUTME: Shared constants for workflow limits, detection thresholds, and warehouse defaults
// ABOUTME: Single source of truth for tunable values referenced across modules
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

/// Conversation and prompt size limits
pub mod limits {
    /// Maximum conversation turns kept per session
    pub const HISTORY_MAX_TURNS: usize = 10;
    /// History turns included in classification and coaching prompts
    pub const PROMPT_HISTORY_TURNS: usize = 3;
    /// Prior (question, SQL) pairs included in SQL generation prompts
    pub const SQL_FEWSHOT_TURNS: usize = 2;
    /// Assistant-side truncation length for history context
    pub const HISTORY_ASSISTANT_CHARS: usize = 100;
    /// Rows shown to the model when generating a chart spec
    pub const CHART_SAMPLE_ROWS: usize = 10;
    /// Hard cap on rows considered for chart sampling
    pub const CHART_MAX_ROWS: usize = 100;
    /// Rows shown to the model when composing a coaching answer
    pub const COACH_SAMPLE_ROWS: usize = 5;
    /// Anomalies included in an explanation prompt
    pub const EXPLAIN_MAX_ANOMALIES: usize = 5;
    /// Chart title truncation length
    pub const CHART_TITLE_CHARS: usize = 50;
}

/// Anomaly detection parameters
pub mod detection {
    /// Z-score above which a value is flagged as an outlier
    pub const Z_SCORE_THRESHOLD: f64 = 2.5;
    /// Minimum numeric samples required before statistics are meaningful
    pub const MIN_SAMPLES: usize = 3;
}

/// Warehouse query execution defaults
pub mod warehouse {
    /// Interval between execution status polls
    pub const POLL_INTERVAL_SECS: u64 = 2;
    /// Default query timeout when the caller does not override it
    pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 300;
    /// Default partition-pruning lookback window
    pub const DEFAULT_LOOKBACK_DAYS: u32 = 30;
    /// Literal placeholder substituted with the caller's tenant id
    pub const TENANT_PLACEHOLDER: &str = "${tenant_id}";
    /// Column every warehouse table is partitioned and filtered by
    pub const TENANT_COLUMN: &str = "tenant_id";
}

/// Result cache defaults
pub mod cache {
    /// Default TTL for cached query results (1 hour)
    pub const DEFAULT_TTL_SECS: u64 = 3600;
    /// Default in-memory entry cap
    pub const DEFAULT_MAX_ENTRIES: usize = 1000;
    /// Background cleanup cadence for the in-memory backend
    pub const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 300;
    /// Namespace prefix for cache keys on shared backends
    pub const CACHE_KEY_PREFIX: &str = "lumen:qcache:";
}

/// Column classification used by anomaly detection and chart fallbacks
pub mod columns {
    /// Metric columns preferred for anomaly detection, in priority order
    pub const PREFERRED_METRICS: &[&str] = &[
        "value",
        "steps_total",
        "hr_avg",
        "distance_km_total",
        "active_kcal_total",
    ];
    /// Identifier and partition columns that never act as metrics
    pub const IDENTIFIERS: &[&str] = &["tenant_id", "dt", "day", "week_start"];
    /// Date-like columns preferred for the temporal axis of fallback charts
    pub const DATE_LIKE: &[&str] = &["day", "date", "dt", "week_start", "timestamp"];
}
