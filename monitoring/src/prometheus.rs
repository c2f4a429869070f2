//! Prometheus text format exporter for Glacier metrics.
//!
//! Encodes a [`MetricsSnapshot`] into the [Prometheus exposition format](https://prometheus.io/docs/instrumenting/exposition_formats/)
//! (text/plain; version=0.0.4).
//!
//! ## Usage
//!
//! ```rust
//! use glacier_monitoring::{GlacierMetrics, prometheus};
//!
//! let metrics = GlacierMetrics::new();
//! metrics.timeout_requests.add(42);
//! metrics.current_timeout_ms.set(1_000);
//!
//! let snapshot = metrics.snapshot();
//! let text = prometheus::encode(&snapshot);
//! // Serve `text` on /metrics endpoint
//! ```

use crate::MetricsSnapshot;

/// Encode a metrics snapshot into Prometheus text exposition format.
pub fn encode(snap: &MetricsSnapshot) -> String {
    let mut out = String::with_capacity(2048);

    write_counter(&mut out, "glacier_timeout_requests_total",
        "Total number of requests registered with the timeout scheduler",
        snap.timeout_requests);

    write_counter(&mut out, "glacier_timeouts_fired_total",
        "Total number of requests that timed out without a response",
        snap.timeouts_fired);

    write_counter(&mut out, "glacier_requests_cancelled_total",
        "Total number of requests cancelled before their deadline",
        snap.requests_cancelled);

    write_gauge(&mut out, "glacier_current_timeout_ms",
        "Current adaptive timeout estimate in milliseconds",
        snap.current_timeout_ms);

    write_gauge(&mut out, "glacier_pending_requests",
        "Number of registrations currently pending a deadline",
        snap.pending_requests);

    write_histogram(&mut out, "glacier_response_latency_ms",
        "Observed round-trip latency of completed requests in milliseconds",
        &snap.response_latency_buckets, snap.response_latency_sum, snap.response_latency_count);

    out
}

// ---------------------------------------------------------------------------
// Helper writers
// ---------------------------------------------------------------------------

fn write_counter(out: &mut String, name: &str, help: &str, value: u64) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} counter\n"));
    out.push_str(&format!("{name} {value}\n\n"));
}

fn write_gauge(out: &mut String, name: &str, help: &str, value: i64) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} gauge\n"));
    out.push_str(&format!("{name} {value}\n\n"));
}

fn write_histogram(
    out: &mut String,
    name: &str,
    help: &str,
    buckets: &[(f64, u64)],
    sum: f64,
    count: u64,
) {
    out.push_str(&format!("# HELP {name} {help}\n"));
    out.push_str(&format!("# TYPE {name} histogram\n"));

    for (bound, cumulative_count) in buckets {
        if bound.is_infinite() {
            out.push_str(&format!("{name}_bucket{{le=\"+Inf\"}} {cumulative_count}\n"));
        } else {
            out.push_str(&format!("{name}_bucket{{le=\"{bound}\"}} {cumulative_count}\n"));
        }
    }
    // Always include +Inf bucket
    out.push_str(&format!("{name}_bucket{{le=\"+Inf\"}} {count}\n"));
    out.push_str(&format!("{name}_sum {sum}\n"));
    out.push_str(&format!("{name}_count {count}\n\n"));
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
