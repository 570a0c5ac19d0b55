//! Prometheus metrics exposition
//!
//! - `kyc_http_requests_total` (counter): labels `route`, `status`
//! - `kyc_http_request_duration_seconds` (histogram): label `route`
//! - `kyc_token_exchanges_total` (counter): label `outcome`
//! - `kyc_verifications_recorded_total` (counter): label `status`

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "kyc_http_request_duration_seconds";

/// Bucket boundaries from 5ms to 60s. The upper end covers the slowest
/// token endpoint round trip the timeout allows.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
        .expect("histogram buckets are non-empty")
}

/// Install the Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed request. `route` is the matched route template, never
/// the raw path.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    metrics::counter!(
        "kyc_http_requests_total",
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!(DURATION_METRIC, "route" => route.to_string()).record(duration_secs);
}

/// Record the outcome of one code exchange (`success`, `pkce_failed`, ...).
pub fn record_token_exchange(outcome: &'static str) {
    metrics::counter!("kyc_token_exchanges_total", "outcome" => outcome).increment(1);
}

/// Record one appended verification record.
pub fn record_verification(status: &'static str) {
    metrics::counter!("kyc_verifications_recorded_total", "status" => status).increment(1);
}
