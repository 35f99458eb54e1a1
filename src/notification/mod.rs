//! Device notifications and their fan-out to delivery backends.
//!
//! # Backend Architecture
//!
//! Every notification goes to the MQTT broker and to each integration
//! configured for the device's application:
//!
//! - `MqttBackend`: always-on broker publish, one topic per device and event
//! - `HttpBackend`: per-application webhook, built from stored settings
//!
//! `BackendRegistry` caches the integration backends per application;
//! `NotificationDispatcher` encodes once and delivers to all of them.

mod backend;
pub mod codec;
mod dispatcher;
mod http_backend;
mod integration;
mod mqtt_backend;
mod registry;
mod types;

pub use backend::{deliver, Backend, BackendError};
pub use codec::{CodecError, EncodedNotification};
pub use dispatcher::{
    BackendFailure, DeliveryFailures, DispatchError, DispatcherStatsSnapshot, FailureCause,
    NotificationDispatcher,
};
pub use http_backend::{HttpBackend, HttpEndpoints, HttpIntegrationSettings};
pub use integration::{BackendFactory, IntegrationError, IntegrationKind};
pub use mqtt_backend::MqttBackend;
pub use registry::{
    BackendRegistry, CacheEntry, ConfigurationFailure, RegistryConfig, RegistryStatsSnapshot,
    ResolveError,
};
pub use types::{
    AckNotification, DataRate, DataUpPayload, ErrorNotification, EventType, JoinNotification,
    Notification, RxInfo, TxInfo,
};
