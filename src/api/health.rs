//! Health check endpoint.

use axum::{extract::State, Json};
use serde::Serialize;

use crate::notification::{DispatcherStatsSnapshot, RegistryStatsSnapshot};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_seconds: u64,
    pub broker: BrokerHealthResponse,
    pub dispatcher: DispatcherHealthResponse,
    pub integrations: IntegrationsHealthResponse,
}

#[derive(Debug, Serialize)]
pub struct BrokerHealthResponse {
    pub connected: bool,
}

#[derive(Debug, Serialize)]
pub struct DispatcherHealthResponse {
    pub closed: bool,
    pub stats: DispatcherStatsSnapshot,
}

#[derive(Debug, Serialize)]
pub struct IntegrationsHealthResponse {
    pub cached_applications: usize,
    pub stats: RegistryStatsSnapshot,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let connected = state.broker_connected();
    let closed = state.dispatcher.is_closed();

    let status = if closed {
        "shutting_down"
    } else if connected {
        "healthy"
    } else {
        "degraded"
    };

    let registry = state.dispatcher.registry();

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.start_time.elapsed().as_secs(),
        broker: BrokerHealthResponse { connected },
        dispatcher: DispatcherHealthResponse {
            closed,
            stats: state.dispatcher.stats(),
        },
        integrations: IntegrationsHealthResponse {
            cached_applications: registry.cached_applications(),
            stats: registry.stats(),
        },
    })
}
