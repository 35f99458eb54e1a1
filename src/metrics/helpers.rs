//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use super::{
    BACKEND_DELIVERIES_TOTAL, BACKEND_DELIVERY_LATENCY, CACHED_APPLICATIONS,
    INTEGRATION_ERRORS_TOTAL, NOTIFICATIONS_TOTAL, REGISTRY_LOADS_TOTAL, REGISTRY_LOOKUPS_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording delivery metrics
pub struct DeliveryMetrics;

impl DeliveryMetrics {
    /// Record a notification accepted for fan-out
    pub fn record_notification(event: &str) {
        NOTIFICATIONS_TOTAL.with_label_values(&[event]).inc();
    }

    /// Record one backend delivery attempt
    pub fn record_delivery(backend: &str, event: &str, success: bool, latency_secs: f64) {
        let outcome = if success { "success" } else { "failure" };
        BACKEND_DELIVERIES_TOTAL
            .with_label_values(&[backend, event, outcome])
            .inc();
        BACKEND_DELIVERY_LATENCY
            .with_label_values(&[backend])
            .observe(latency_secs);
    }
}

/// Helper struct for recording backend registry metrics
pub struct RegistryMetrics;

impl RegistryMetrics {
    pub fn record_hit() {
        REGISTRY_LOOKUPS_TOTAL.with_label_values(&["hit"]).inc();
    }

    pub fn record_miss() {
        REGISTRY_LOOKUPS_TOTAL.with_label_values(&["miss"]).inc();
    }

    /// Record a storage load attempt
    pub fn record_load(success: bool) {
        let outcome = if success { "success" } else { "failure" };
        REGISTRY_LOADS_TOTAL.with_label_values(&[outcome]).inc();
    }

    /// Record an integration row that could not be turned into a backend
    pub fn record_integration_error(kind: &str) {
        INTEGRATION_ERRORS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn set_cached_applications(count: usize) {
        CACHED_APPLICATIONS.set(count as i64);
    }
}
