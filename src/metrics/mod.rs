//! Prometheus metrics for the notification dispatcher.
//!
//! - Notifications dispatched per event type
//! - Per-backend delivery outcomes and latency
//! - Backend registry cache behaviour and integration configuration errors

mod helpers;

pub use helpers::{encode_metrics, DeliveryMetrics, RegistryMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter_vec, register_int_gauge, HistogramVec,
    IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "lora_notify";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Notifications accepted for dispatch, by event type
    pub static ref NOTIFICATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_total", METRIC_PREFIX),
        "Total notifications dispatched",
        &["event"]
    ).unwrap();

    /// Delivery attempts per backend, by outcome (success / failure)
    pub static ref BACKEND_DELIVERIES_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_backend_deliveries_total", METRIC_PREFIX),
        "Total delivery attempts per backend",
        &["backend", "event", "outcome"]
    ).unwrap();

    /// Delivery latency per backend
    pub static ref BACKEND_DELIVERY_LATENCY: HistogramVec = register_histogram_vec!(
        format!("{}_backend_delivery_latency_seconds", METRIC_PREFIX),
        "Backend delivery latency in seconds",
        &["backend"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]
    ).unwrap();

    // ============================================================================
    // Registry Metrics
    // ============================================================================

    /// Registry lookups by result (hit / miss)
    pub static ref REGISTRY_LOOKUPS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_registry_lookups_total", METRIC_PREFIX),
        "Backend registry lookups",
        &["result"]
    ).unwrap();

    /// Integration loads from storage, by outcome
    pub static ref REGISTRY_LOADS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_registry_loads_total", METRIC_PREFIX),
        "Integration loads from storage",
        &["outcome"]
    ).unwrap();

    /// Integration rows that failed to build a backend, by stored kind
    pub static ref INTEGRATION_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_integration_errors_total", METRIC_PREFIX),
        "Integration configuration errors",
        &["kind"]
    ).unwrap();

    /// Applications with cached backends
    pub static ref CACHED_APPLICATIONS: IntGauge = register_int_gauge!(
        format!("{}_cached_applications", METRIC_PREFIX),
        "Number of applications with cached backends"
    ).unwrap();

    /// Broker connection status (1 = connected, 0 = disconnected)
    pub static ref BROKER_CONNECTION_STATUS: IntGauge = register_int_gauge!(
        format!("{}_broker_connection_status", METRIC_PREFIX),
        "MQTT broker connection status (1=connected, 0=disconnected)"
    ).unwrap();
}
