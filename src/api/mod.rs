//! API layer - HTTP endpoint handlers.

mod health;
mod metrics;
mod notifications;
mod routes;

pub use health::health;
pub use metrics::prometheus_metrics;
pub use notifications::{
    reload_all_integrations, reload_application_integrations, send_ack_notification,
    send_data_up, send_error_notification, send_join_notification,
};
pub use routes::api_routes;
