//! MQTT broker collaborator.
//!
//! The dispatcher only needs to publish; connection management lives in
//! [`MqttClient`]. Tests substitute any [`BrokerPublisher`].

mod client;
mod inflight;

use async_trait::async_trait;
use thiserror::Error;

pub use client::{parse_broker_url, MqttClient};
pub use rumqttc::QoS;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("not connected to MQTT broker")]
    NotConnected,

    #[error("MQTT client is disconnected")]
    Disconnected,

    #[error("MQTT connection lost before publish completed: {0}")]
    ConnectionLost(String),

    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    #[error("Invalid broker URL: {0}")]
    InvalidUrl(String),

    #[error("Unsupported QoS level: {0}")]
    InvalidQos(u8),
}

/// Publish side of a broker connection.
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    async fn publish(&self, topic: &str, qos: QoS, payload: Vec<u8>) -> Result<(), PublishError>;

    fn is_connected(&self) -> bool;

    /// Disconnect from the broker. Idempotent.
    async fn disconnect(&self) -> Result<(), PublishError>;
}

/// Map a numeric QoS level (0, 1, 2) to [`QoS`].
pub fn qos_from_level(level: u8) -> Result<QoS, PublishError> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(PublishError::InvalidQos(other)),
    }
}
