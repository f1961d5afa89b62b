//! Process-local operational counters.
//!
//! This is an in-process signal source for the `/metrics` endpoint, not an
//! analytics store; everything here resets on restart.

use serde::Serialize;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Number of response times kept for the rolling mean.
const RESPONSE_WINDOW: usize = 100;

/// Shared counters, safe under concurrent writers.
pub struct MetricsTracker {
    started_at: Instant,
    total_requests: AtomicU64,
    error_count: AtomicU64,
    rate_limited_count: AtomicU64,
    /// Rolling window of the most recent response times, in milliseconds.
    response_times: Mutex<VecDeque<f64>>,
}

impl Default for MetricsTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsTracker {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            total_requests: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            rate_limited_count: AtomicU64::new(0),
            response_times: Mutex::new(VecDeque::with_capacity(RESPONSE_WINDOW)),
        }
    }

    pub fn record_request(&self) {
        self.total_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rate_limited(&self) {
        self.rate_limited_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_response_time(&self, millis: f64) {
        let mut window = self.response_times.lock().unwrap();
        if window.len() == RESPONSE_WINDOW {
            window.pop_front();
        }
        window.push_back(millis);
    }

    /// Read-only view for the metrics endpoint.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let window = self.response_times.lock().unwrap();
        let avg_response_time_ms = if window.is_empty() {
            0.0
        } else {
            window.iter().sum::<f64>() / window.len() as f64
        };

        MetricsSnapshot {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            error_count: self.error_count.load(Ordering::Relaxed),
            rate_limited_count: self.rate_limited_count.load(Ordering::Relaxed),
            avg_response_time_ms,
            uptime_seconds: self.started_at.elapsed().as_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub error_count: u64,
    pub rate_limited_count: u64,
    pub avg_response_time_ms: f64,
    pub uptime_seconds: u64,
}
