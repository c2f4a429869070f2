//! # Glacier Monitoring
//!
//! Metric primitives and the node-wide metric set for a Glacier node.
//!
//! Provides three metric types matching Prometheus conventions:
//! - **Counter**: monotonically increasing value (e.g., timeouts fired)
//! - **Gauge**: value that can go up or down (e.g., current timeout estimate)
//! - **Histogram**: distribution of observations (e.g., response latencies)
//!
//! ## Usage
//!
//! ```rust
//! use glacier_monitoring::GlacierMetrics;
//!
//! let metrics = GlacierMetrics::new();
//!
//! // Record reliability-core events
//! metrics.timeout_requests.inc();
//! metrics.current_timeout_ms.set(1_000);
//! metrics.response_latency_ms.observe(230.0);
//!
//! // Export as Prometheus text format
//! let snapshot = metrics.snapshot();
//! let prom_text = glacier_monitoring::prometheus::encode(&snapshot);
//! ```

pub mod prometheus;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

// ---------------------------------------------------------------------------
// Metric primitives
// ---------------------------------------------------------------------------

/// A monotonically increasing counter.
pub struct Counter {
    value: AtomicU64,
    #[allow(dead_code)]
    name: &'static str,
    #[allow(dead_code)]
    help: &'static str,
}

impl Counter {
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            value: AtomicU64::new(0),
            name,
            help,
        }
    }

    /// Increment the counter by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Add a value to the counter.
    pub fn add(&self, v: u64) {
        self.value.fetch_add(v, Ordering::Relaxed);
    }

    /// Get the current counter value.
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A gauge that can go up or down.
pub struct Gauge {
    value: AtomicI64,
    #[allow(dead_code)]
    name: &'static str,
    #[allow(dead_code)]
    help: &'static str,
}

impl Gauge {
    pub const fn new(name: &'static str, help: &'static str) -> Self {
        Self {
            value: AtomicI64::new(0),
            name,
            help,
        }
    }

    /// Set the gauge to an absolute value.
    pub fn set(&self, v: i64) {
        self.value.store(v, Ordering::Relaxed);
    }

    /// Increment the gauge by 1.
    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the gauge by 1.
    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get the current gauge value.
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// A histogram that collects observations into configurable buckets.
pub struct Histogram {
    buckets: Vec<f64>,
    counts: Vec<AtomicU64>,
    sum: Mutex<f64>,
    count: AtomicU64,
    #[allow(dead_code)]
    name: &'static str,
    #[allow(dead_code)]
    help: &'static str,
}

impl Histogram {
    /// Create a histogram with the given bucket upper bounds.
    pub fn new(name: &'static str, help: &'static str, buckets: Vec<f64>) -> Self {
        let counts = buckets.iter().map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            counts,
            sum: Mutex::new(0.0),
            count: AtomicU64::new(0),
            name,
            help,
        }
    }

    /// Observe a value, adding it to the appropriate bucket(s).
    pub fn observe(&self, v: f64) {
        self.count.fetch_add(1, Ordering::Relaxed);
        {
            let mut sum = self.sum.lock();
            *sum += v;
        }
        for (i, bound) in self.buckets.iter().enumerate() {
            if v <= *bound {
                self.counts[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Get the total number of observations.
    pub fn get_count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Get the sum of all observations.
    pub fn get_sum(&self) -> f64 {
        *self.sum.lock()
    }

    /// Get cumulative bucket counts.
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        self.buckets
            .iter()
            .zip(self.counts.iter())
            .map(|(bound, count)| (*bound, count.load(Ordering::Relaxed)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Default histogram buckets
// ---------------------------------------------------------------------------

/// Default buckets for latency histograms (milliseconds).
pub fn default_latency_buckets() -> Vec<f64> {
    vec![
        5.0, 10.0, 25.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 2500.0, 10000.0,
    ]
}

// ---------------------------------------------------------------------------
// Glacier metrics
// ---------------------------------------------------------------------------

/// Complete metrics collection for a Glacier node.
///
/// Currently covers the reliability core: per-request timeout scheduling
/// and the adaptive estimate it maintains.
pub struct GlacierMetrics {
    /// Requests registered with the timeout scheduler.
    pub timeout_requests: Counter,
    /// Requests whose deadline elapsed without a matching cancellation.
    pub timeouts_fired: Counter,
    /// Requests cancelled before their deadline (a response arrived).
    pub requests_cancelled: Counter,
    /// The adaptive timeout estimate applied to new registrations.
    pub current_timeout_ms: Gauge,
    /// Registrations currently awaiting a response or a deadline.
    pub pending_requests: Gauge,
    /// Round-trip latency of requests that completed before timing out.
    pub response_latency_ms: Histogram,
}

impl GlacierMetrics {
    /// Create a new metrics instance with all counters at zero.
    pub fn new() -> Self {
        Self {
            timeout_requests: Counter::new(
                "glacier_timeout_requests_total",
                "Total number of requests registered with the timeout scheduler",
            ),
            timeouts_fired: Counter::new(
                "glacier_timeouts_fired_total",
                "Total number of requests that timed out without a response",
            ),
            requests_cancelled: Counter::new(
                "glacier_requests_cancelled_total",
                "Total number of requests cancelled before their deadline",
            ),
            current_timeout_ms: Gauge::new(
                "glacier_current_timeout_ms",
                "Current adaptive timeout estimate in milliseconds",
            ),
            pending_requests: Gauge::new(
                "glacier_pending_requests",
                "Number of registrations currently pending a deadline",
            ),
            response_latency_ms: Histogram::new(
                "glacier_response_latency_ms",
                "Observed round-trip latency of completed requests in milliseconds",
                default_latency_buckets(),
            ),
        }
    }

    /// Take a full snapshot of all metrics for export.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            timeout_requests: self.timeout_requests.get(),
            timeouts_fired: self.timeouts_fired.get(),
            requests_cancelled: self.requests_cancelled.get(),
            current_timeout_ms: self.current_timeout_ms.get(),
            pending_requests: self.pending_requests.get(),
            response_latency_count: self.response_latency_ms.get_count(),
            response_latency_sum: self.response_latency_ms.get_sum(),
            response_latency_buckets: self.response_latency_ms.get_buckets(),
        }
    }
}

impl Default for GlacierMetrics {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Snapshot (point-in-time export)
// ---------------------------------------------------------------------------

/// A serialisable point-in-time snapshot of all Glacier metrics.
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub timeout_requests: u64,
    pub timeouts_fired: u64,
    pub requests_cancelled: u64,
    pub current_timeout_ms: i64,
    pub pending_requests: i64,
    pub response_latency_count: u64,
    pub response_latency_sum: f64,
    pub response_latency_buckets: Vec<(f64, u64)>,
}
