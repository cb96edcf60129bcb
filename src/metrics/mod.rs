//! Metrics module
//!
//! Prometheus counters for the authentication pipeline. Recording is a no-op
//! when the `metrics` feature is disabled.

use lazy_static::lazy_static;
use prometheus::{register_counter_vec, CounterVec, Encoder, TextEncoder};

lazy_static! {
    pub static ref AUTH_ATTEMPTS: CounterVec = register_counter_vec!(
        "portcullis_auth_attempts_total",
        "Authenticator runs by outcome",
        &["authenticator", "outcome"]  // success, failure, skip, challenge
    ).unwrap();

    pub static ref JWT_VERIFICATIONS: CounterVec = register_counter_vec!(
        "portcullis_jwt_verifications_total",
        "JWT verifications by outcome",
        &["outcome"]
    ).unwrap();

    pub static ref IDENTIFIED_EVENTS: CounterVec = register_counter_vec!(
        "portcullis_identified_events_total",
        "Identity notifications emitted",
        &["authenticator"]
    ).unwrap();
}

/// Record one authenticator run
pub fn record_auth_attempt(authenticator: &str, outcome: &str) {
    if cfg!(feature = "metrics") {
        AUTH_ATTEMPTS
            .with_label_values(&[authenticator, outcome])
            .inc();
    }
}

/// Record a JWT verification (`accepted` or a failure reason)
pub fn record_jwt_verification(outcome: &str) {
    if cfg!(feature = "metrics") {
        JWT_VERIFICATIONS.with_label_values(&[outcome]).inc();
    }
}

/// Record an identity notification
pub fn record_identified(authenticator: &str) {
    if cfg!(feature = "metrics") {
        IDENTIFIED_EVENTS.with_label_values(&[authenticator]).inc();
    }
}

/// Render every registered metric in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(all(test, feature = "metrics"))]
mod tests {
    use super::*;

    #[test]
    fn test_auth_attempt_counted() {
        let before = AUTH_ATTEMPTS
            .with_label_values(&["MetricsTestForm", "success"])
            .get();
        record_auth_attempt("MetricsTestForm", "success");
        let after = AUTH_ATTEMPTS
            .with_label_values(&["MetricsTestForm", "success"])
            .get();
        assert_eq!(after, before + 1.0);
    }

    #[test]
    fn test_render_contains_registered_metrics() {
        record_jwt_verification("accepted");
        record_identified("MetricsTestForm");
        let text = render().unwrap();
        assert!(text.contains("portcullis_jwt_verifications_total"));
        assert!(text.contains("portcullis_identified_events_total"));
    }
}
