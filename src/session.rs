// ABOUTME: Concurrent per-session conversation history store with bounded retention
// ABOUTME: Injected into the workflow; the only state that outlives a request
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Async-IO.org

//! # Session Store
//!
//! Conversation histories keyed by a composite session key. Each entry is a
//! bounded, most-recent-last sequence of turns, always replaced wholesale so
//! concurrent requests on distinct sessions never observe a partially
//! updated history.

use dashmap::DashMap;
use std::fmt;

use crate::constants::limits::HISTORY_MAX_TURNS;
use crate::models::{ConversationTurn, TenantId};

/// Composite key scoping a conversation to one tenant and one credential.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionKey(String);

impl SessionKey {
    /// Build a key from the authenticated tenant and its presented credential
    #[must_use]
    pub fn new(tenant_id: &TenantId, credential: &str) -> Self {
        Self(format!("{tenant_id}:{credential}"))
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Thread-safe store of bounded conversation histories.
pub struct SessionStore {
    sessions: DashMap<SessionKey, Vec<ConversationTurn>>,
    max_turns: usize,
}

impl SessionStore {
    /// Create a store with the default per-session turn limit
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_turns(HISTORY_MAX_TURNS)
    }

    /// Create a store with an explicit per-session turn limit
    #[must_use]
    pub fn with_max_turns(max_turns: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            max_turns,
        }
    }

    /// Snapshot of the session's history, most recent last
    #[must_use]
    pub fn history(&self, key: &SessionKey) -> Vec<ConversationTurn> {
        self.sessions
            .get(key)
            .map(|entry| entry.clone())
            .unwrap_or_default()
    }

    /// Append a completed turn, discarding the oldest beyond the limit
    pub fn append(&self, key: &SessionKey, turn: ConversationTurn) {
        let mut entry = self.sessions.entry(key.clone()).or_default();
        entry.push(turn);
        let len = entry.len();
        if len > self.max_turns {
            entry.drain(..len - self.max_turns);
        }
    }

    /// Drop a session's history entirely
    pub fn clear(&self, key: &SessionKey) {
        self.sessions.remove(key);
    }

    /// Number of live sessions
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
