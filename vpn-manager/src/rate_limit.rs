// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: MIT-0

//! Per-source request counting with a fixed reset window.
//!
//! Every request bumps the counter of its source. With a limit `T` and a
//! grace width `G`:
//!
//! | Counter | Decision |
//! |---------|----------|
//! | `1..T` | [`Decision::Allow`] |
//! | `T..T+G` | [`Decision::WarnDeny`] |
//! | `T+G..` | [`Decision::SilentDeny`] |
//!
//! All counters are dropped together by [`RateLimiter::reset`], which runs
//! on a long period so nobody stays banned forever. Counters are not persisted.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    /// Denied with an explicit message.
    WarnDeny,
    /// Denied without a body; the connection should be closed.
    SilentDeny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

#[derive(Debug)]
pub struct RateLimiter {
    max_requests: u64,
    grace_requests: u64,
    counters: Mutex<HashMap<String, u64>>,
}

impl RateLimiter {
    pub fn new(max_requests: u64, grace_requests: u64) -> Self {
        Self {
            max_requests,
            grace_requests,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Counts one request from `source` and decides whether to serve it.
    pub fn record_and_admit(&self, source: &str) -> Decision {
        let count = {
            let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
            let counter = counters.entry(source.to_string()).or_insert(0);
            *counter = counter.saturating_add(1);
            *counter
        };

        if count < self.max_requests {
            Decision::Allow
        } else if count < self.max_requests.saturating_add(self.grace_requests) {
            Decision::WarnDeny
        } else {
            Decision::SilentDeny
        }
    }

    /// Number of requests seen from `source` since the last reset.
    pub fn count(&self, source: &str) -> u64 {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .copied()
            .unwrap_or(0)
    }

    /// Forgets every source.
    pub fn reset(&self) {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::info!(
            "{} clearing request counters of {} sources",
            crate::constants::LOG_PREFIX,
            counters.len()
        );
        counters.clear();
    }
}
