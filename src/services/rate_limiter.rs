//! Fixed-window request counter keyed by principal and operation family.
//!
//! State is process-local. Each `(operation, principal)` pair owns one
//! counting window; once the window has elapsed the next call opens a fresh
//! one. A background task evicts expired windows so memory stays bounded by
//! the number of principals active within one window.

use dashmap::{DashMap, mapref::entry::Entry};
use std::{
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;

/// Raised when a principal exhausts its quota inside the current window.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("rate limit exceeded for `{operation}`: retry in {minutes_remaining} minute(s)")]
pub struct RateLimitExceeded {
    pub operation: String,
    pub minutes_remaining: u64,
    pub retry_after_secs: u64,
}

#[derive(Debug, Clone, Copy)]
struct RateLimitEntry {
    window_start: Instant,
    /// Longest window seen for this entry, used by the sweep.
    window: Duration,
    count: u32,
    last_attempt: Instant,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct LimitKey {
    operation: String,
    principal: String,
}

#[derive(Clone, Default)]
pub struct RateLimiter {
    entries: Arc<DashMap<LimitKey, RateLimitEntry>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request for `principal` under `operation`.
    ///
    /// Fails without counting when `limit` requests were already made inside
    /// the current window.
    pub fn check_and_increment(
        &self,
        principal: &str,
        limit: u32,
        window: Duration,
        operation: &str,
    ) -> Result<(), RateLimitExceeded> {
        let now = Instant::now();
        let key = LimitKey {
            operation: operation.to_string(),
            principal: principal.to_string(),
        };

        match self.entries.entry(key) {
            Entry::Vacant(vacant) => {
                vacant.insert(RateLimitEntry {
                    window_start: now,
                    window,
                    count: 1,
                    last_attempt: now,
                });
                Ok(())
            }
            Entry::Occupied(mut occupied) => {
                let entry = occupied.get_mut();
                let elapsed = now.duration_since(entry.window_start);

                if elapsed > window {
                    entry.window_start = now;
                    entry.window = window;
                    entry.count = 1;
                    entry.last_attempt = now;
                    return Ok(());
                }

                if entry.count >= limit {
                    let remaining = window.saturating_sub(elapsed);
                    let retry_after_secs = remaining.as_secs_f64().ceil().max(1.0) as u64;
                    tracing::warn!(
                        principal,
                        operation,
                        count = entry.count,
                        limit,
                        "rate limit exceeded"
                    );
                    return Err(RateLimitExceeded {
                        operation: operation.to_string(),
                        minutes_remaining: retry_after_secs.div_ceil(60),
                        retry_after_secs,
                    });
                }

                entry.count += 1;
                entry.last_attempt = now;
                entry.window = entry.window.max(window);
                Ok(())
            }
        }
    }

    /// Current count for a principal, or `None` if no window is tracked.
    pub fn current_count(&self, principal: &str, operation: &str) -> Option<u32> {
        let key = LimitKey {
            operation: operation.to_string(),
            principal: principal.to_string(),
        };
        self.entries.get(&key).map(|entry| entry.count)
    }

    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Evict every entry whose window has expired. Returns the number evicted.
    pub fn cleanup(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.duration_since(entry.window_start) <= entry.window);
        before.saturating_sub(self.entries.len())
    }
}

/// Spawn a background task that periodically evicts expired windows.
pub fn spawn_cleanup_task(limiter: RateLimiter, interval: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let evicted = limiter.cleanup();
            if evicted > 0 {
                tracing::debug!(evicted, "rate limiter sweep evicted expired windows");
            }
        }
    })
}
