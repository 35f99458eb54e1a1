// Infrastructure (shared components)
pub mod config;
pub mod error;
pub mod metrics;
pub mod mqtt;
pub mod postgres;
pub mod storage;

// Domain
pub mod lorawan;
pub mod notification;

// Application layer
pub mod api;
pub mod server;

// Supporting modules
pub mod telemetry;
