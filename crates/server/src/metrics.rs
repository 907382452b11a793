//! Prometheus metrics for observability.
//!
//! HTTP request metrics plus counters for the resolution paths: magnet
//! checks, peer-facing torrent listings, and store failures. Repository size
//! is collected dynamically at scrape time.

use once_cell::sync::Lazy;
use prometheus::{
    self, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts,
    Registry, TextEncoder,
};

/// Global metrics registry.
pub static REGISTRY: Lazy<Registry> = Lazy::new(|| {
    let registry = Registry::new();
    register_metrics(&registry);
    registry
});

// =============================================================================
// HTTP Request Metrics
// =============================================================================

/// HTTP request duration in seconds.
pub static HTTP_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "magnetmux_http_request_duration_seconds",
            "HTTP request duration in seconds",
        )
        .buckets(vec![
            0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
        ]),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests total count.
pub static HTTP_REQUESTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("magnetmux_http_requests_total", "Total HTTP requests"),
        &["method", "path", "status"],
    )
    .unwrap()
});

/// HTTP requests currently in flight.
pub static HTTP_REQUESTS_IN_FLIGHT: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "magnetmux_http_requests_in_flight",
        "Number of HTTP requests currently being processed",
    )
    .unwrap()
});

// =============================================================================
// Resolution Metrics
// =============================================================================

/// Magnet check batches served.
pub static MAGNET_CHECKS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "magnetmux_magnet_checks_total",
        "Total magnet cache-status check batches",
    )
    .unwrap()
});

/// Per-hash magnet check verdicts by final status.
pub static MAGNET_CHECK_VERDICTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "magnetmux_magnet_check_verdicts_total",
            "Per-hash magnet check verdicts",
        ),
        &["status"],
    )
    .unwrap()
});

/// Store failures during checks.
pub static STORE_CHECK_ERRORS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "magnetmux_store_check_errors_total",
            "Store failures during magnet checks",
        ),
        &["store"],
    )
    .unwrap()
});

/// Torrent listings served (the peer-facing endpoint).
pub static TORRENT_LISTS_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "magnetmux_torrent_lists_total",
        "Total torrent listing requests served",
    )
    .unwrap()
});

/// Rejected peer-endpoint requests (bad or missing token).
pub static PEER_AUTH_FAILURES_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    IntCounter::new(
        "magnetmux_peer_auth_failures_total",
        "Peer endpoint requests rejected for bad credentials",
    )
    .unwrap()
});

// =============================================================================
// Repository Metrics (collected dynamically)
// =============================================================================

/// Torrent records in the repository.
pub static REPOSITORY_RECORDS: Lazy<IntGauge> = Lazy::new(|| {
    IntGauge::new(
        "magnetmux_repository_records",
        "Number of torrent records in the repository",
    )
    .unwrap()
});

// =============================================================================
// Registration
// =============================================================================

fn register_metrics(registry: &Registry) {
    registry
        .register(Box::new(HTTP_REQUEST_DURATION.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(HTTP_REQUESTS_IN_FLIGHT.clone()))
        .unwrap();

    registry
        .register(Box::new(MAGNET_CHECKS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(MAGNET_CHECK_VERDICTS.clone()))
        .unwrap();
    registry
        .register(Box::new(STORE_CHECK_ERRORS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(TORRENT_LISTS_TOTAL.clone()))
        .unwrap();
    registry
        .register(Box::new(PEER_AUTH_FAILURES_TOTAL.clone()))
        .unwrap();

    registry
        .register(Box::new(REPOSITORY_RECORDS.clone()))
        .unwrap();
}

/// Encode all metrics as Prometheus text format.
pub fn encode_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer).unwrap();
    String::from_utf8(buffer).unwrap()
}

/// Collect dynamic metrics from current application state.
pub fn collect_dynamic_metrics(state: &crate::state::AppState) {
    if let Ok(count) = state.repository().count() {
        REPOSITORY_RECORDS.set(count as i64);
    }
}

/// Normalize a path for metric labels (replace IDs with placeholders).
pub fn normalize_path(path: &str) -> String {
    let hash_regex = regex_lite::Regex::new(r"[0-9a-fA-F]{40}").unwrap();
    let stream_regex = regex_lite::Regex::new(r"tt\d+").unwrap();

    let result = hash_regex.replace_all(path, "{hash}");
    let result = stream_regex.replace_all(&result, "{sid}");
    result.to_string()
}
