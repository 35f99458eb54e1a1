use axum::{
    routing::{get, post},
    Router,
};

use crate::server::AppState;

use super::health::health;
use super::metrics::prometheus_metrics;
use super::notifications::{
    reload_all_integrations, reload_application_integrations, send_ack_notification,
    send_data_up, send_error_notification, send_join_notification,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health & Metrics
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                // Device notifications
                .route("/notifications/rx", post(send_data_up))
                .route("/notifications/join", post(send_join_notification))
                .route("/notifications/ack", post(send_ack_notification))
                .route("/notifications/error", post(send_error_notification))
                // Integration cache control
                .route(
                    "/applications/{id}/integrations/reload",
                    post(reload_application_integrations),
                )
                .route("/integrations/reload", post(reload_all_integrations)),
        )
}
