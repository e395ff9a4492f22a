//! Prometheus metrics for the chive server.
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus scraping.
//! Metrics carry no artifact ids or subjects, only aggregate counts, but the
//! endpoint should still be network-restricted to the scraper.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

pub static VERSIONS_CREATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "chive_versions_created_total",
        "Total number of versions created",
    )
    .expect("metric creation failed")
});

pub static BYTES_STORED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "chive_bytes_stored_total",
        "Total payload bytes stored for new versions",
    )
    .expect("metric creation failed")
});

pub static ACTIVATIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "chive_activations_total",
        "Total number of activations that rewrote an active area",
    )
    .expect("metric creation failed")
});

pub static ACTIVATIONS_UNCHANGED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "chive_activations_unchanged_total",
        "Activations of the already-active version that left the active area untouched",
    )
    .expect("metric creation failed")
});

pub static LOCK_TIMEOUTS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "chive_lock_timeouts_total",
        "Requests rejected because an artifact lock was not acquired in time",
    )
    .expect("metric creation failed")
});

pub static RECONCILE_REPAIRS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "chive_reconcile_repairs_total",
        "Active areas re-materialized by reconciliation",
    )
    .expect("metric creation failed")
});

pub static ORPHANS_DELETED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "chive_orphan_payloads_deleted_total",
        "Payloads deleted because no version record referenced them",
    )
    .expect("metric creation failed")
});

pub static CREATE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "chive_create_version_duration_seconds",
            "Time taken to store and record a new version",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .expect("metric creation failed")
});

pub static ACTIVATE_DURATION: LazyLock<Histogram> = LazyLock::new(|| {
    Histogram::with_opts(
        HistogramOpts::new(
            "chive_activate_version_duration_seconds",
            "Time taken to activate a version",
        )
        .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
    )
    .expect("metric creation failed")
});

pub static API_ERRORS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new("chive_api_errors_total", "API errors by error code"),
        &["code"],
    )
    .expect("metric creation failed")
});

/// Guard to ensure metrics are only registered once.
static REGISTER_ONCE: Once = Once::new();

/// Register all metrics with the global registry.
///
/// Idempotent, so tests can build many routers.
pub fn register_metrics() {
    REGISTER_ONCE.call_once(|| {
        let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
            Box::new(VERSIONS_CREATED.clone()),
            Box::new(BYTES_STORED.clone()),
            Box::new(ACTIVATIONS.clone()),
            Box::new(ACTIVATIONS_UNCHANGED.clone()),
            Box::new(LOCK_TIMEOUTS.clone()),
            Box::new(RECONCILE_REPAIRS.clone()),
            Box::new(ORPHANS_DELETED.clone()),
            Box::new(CREATE_DURATION.clone()),
            Box::new(ACTIVATE_DURATION.clone()),
            Box::new(API_ERRORS.clone()),
        ];
        for collector in collectors {
            REGISTRY
                .register(collector)
                .expect("metric registration failed");
        }
    });
}

/// GET /metrics - Prometheus metrics endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();

    let mut buffer = Vec::new();
    match encoder.encode(&metric_families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            [("content-type", "text/plain; charset=utf-8")],
            format!("Failed to encode metrics: {e}").into_bytes(),
        ),
    }
}

/// Count an API error by its response code.
pub fn record_error(code: &str) {
    API_ERRORS.with_label_values(&[code]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_registration() {
        register_metrics();
        register_metrics();

        VERSIONS_CREATED.inc();
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&REGISTRY.gather(), &mut buffer)
            .unwrap();
        let text = String::from_utf8(buffer).unwrap();
        assert!(text.contains("chive_versions_created_total"));
    }
}
