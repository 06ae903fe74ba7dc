//! Prometheus metrics for the beatrock backend.
//!
//! This module provides:
//! - Cache metrics (hits per tier, misses, fallbacks, shared-store failures)
//! - Judge metrics (external call outcomes and latency, rate-limit waits)

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;
use std::time::Duration;

/// Global Prometheus handle for rendering metrics.
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metric names as constants for consistency.
pub mod names {
    // Cache metrics
    pub const CACHE_HITS_TOTAL: &str = "beatrock_cache_hits_total";
    pub const CACHE_MISSES_TOTAL: &str = "beatrock_cache_misses_total";
    pub const CACHE_FALLBACKS_TOTAL: &str = "beatrock_cache_fallbacks_total";
    pub const SHARED_FAILURES_TOTAL: &str = "beatrock_shared_store_failures_total";

    // Judge metrics
    pub const JUDGE_CALLS_TOTAL: &str = "beatrock_judge_calls_total";
    pub const JUDGE_CALL_DURATION_SECONDS: &str = "beatrock_judge_call_duration_seconds";
    pub const RATE_LIMIT_WAIT_SECONDS: &str = "beatrock_rate_limit_wait_seconds";
}

/// Initialize the Prometheus metrics recorder.
///
/// Returns `true` if initialization succeeded, `false` if already initialized.
pub fn init_metrics() -> bool {
    if PROMETHEUS_HANDLE.get().is_some() {
        tracing::debug!("Prometheus metrics already initialized");
        return false;
    }

    match PrometheusBuilder::new().install_recorder() {
        Ok(handle) => {
            if PROMETHEUS_HANDLE.set(handle).is_err() {
                tracing::warn!("Failed to store Prometheus handle (already set)");
                return false;
            }

            tracing::info!("Prometheus metrics initialized");
            true
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install Prometheus recorder");
            false
        }
    }
}

/// Render all metrics in Prometheus text format.
///
/// Returns `None` if metrics were not initialized.
pub fn render_metrics() -> Option<String> {
    PROMETHEUS_HANDLE.get().map(|handle| handle.render())
}

// =============================================================================
// Cache Metrics
// =============================================================================

/// Record a cache hit for a data category ("verdict", "session", ...).
pub fn record_cache_hit(category: &'static str, tier: &'static str) {
    counter!(names::CACHE_HITS_TOTAL, "category" => category, "tier" => tier).increment(1);
}

pub fn record_cache_miss(category: &'static str) {
    counter!(names::CACHE_MISSES_TOTAL, "category" => category).increment(1);
}

/// Record a lookup or write that fell back to the local tier.
pub fn record_fallback(category: &'static str) {
    counter!(names::CACHE_FALLBACKS_TOTAL, "category" => category).increment(1);
}

pub fn record_shared_failure(op: &'static str) {
    counter!(names::SHARED_FAILURES_TOTAL, "op" => op).increment(1);
}

// =============================================================================
// Judge Metrics
// =============================================================================

/// Record one attempt against the text-generation service.
pub fn record_external_call(category: &'static str, success: bool, duration: Duration) {
    let outcome = if success { "success" } else { "failure" };
    counter!(names::JUDGE_CALLS_TOTAL, "category" => category, "outcome" => outcome).increment(1);
    histogram!(names::JUDGE_CALL_DURATION_SECONDS, "category" => category)
        .record(duration.as_secs_f64());
}

pub fn record_rate_limit_wait(category: &'static str, waited: Duration) {
    histogram!(names::RATE_LIMIT_WAIT_SECONDS, "category" => category)
        .record(waited.as_secs_f64());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recorded_counters_show_up_in_render() {
        init_metrics();
        record_cache_hit("verdict", "local");
        record_fallback("session");

        let Some(rendered) = render_metrics() else {
            // Another recorder was installed first in this process.
            return;
        };
        assert!(rendered.contains(names::CACHE_HITS_TOTAL));
        assert!(rendered.contains(names::CACHE_FALLBACKS_TOTAL));
    }
}
