//! Broker backend: publishes every notification to its MQTT topic.
//!
//! This backend is always part of the delivery set, independent of the
//! application's integrations.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::MqttConfig;
use crate::mqtt::{qos_from_level, BrokerPublisher, PublishError, QoS};

use super::backend::{Backend, BackendError};
use super::codec::EncodedNotification;

pub struct MqttBackend {
    publisher: Arc<dyn BrokerPublisher>,
    qos: QoS,
    publish_timeout: Duration,
    disconnect_timeout: Duration,
    closed: AtomicBool,
}

impl MqttBackend {
    pub fn new(publisher: Arc<dyn BrokerPublisher>, qos: QoS, publish_timeout: Duration) -> Self {
        Self {
            publisher,
            qos,
            publish_timeout,
            disconnect_timeout: publish_timeout,
            closed: AtomicBool::new(false),
        }
    }

    pub fn from_config(
        publisher: Arc<dyn BrokerPublisher>,
        config: &MqttConfig,
    ) -> Result<Self, PublishError> {
        let qos = qos_from_level(config.qos)?;
        let mut backend = Self::new(publisher, qos, Duration::from_millis(config.publish_timeout_ms));
        backend.disconnect_timeout = Duration::from_millis(config.disconnect_timeout_ms);
        Ok(backend)
    }

    pub fn is_connected(&self) -> bool {
        self.publisher.is_connected()
    }

    async fn publish(&self, notification: &EncodedNotification) -> Result<(), BackendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BackendError::Closed);
        }

        let topic = notification.topic();
        let publish = self
            .publisher
            .publish(&topic, self.qos, notification.body.clone());

        match tokio::time::timeout(self.publish_timeout, publish).await {
            Ok(Ok(())) => {
                tracing::debug!(
                    topic = %topic,
                    qos = ?self.qos,
                    bytes = notification.body.len(),
                    "Published notification to MQTT"
                );
                Ok(())
            }
            Ok(Err(source)) => Err(BackendError::Publish { topic, source }),
            Err(_) => Err(BackendError::Timeout(self.publish_timeout)),
        }
    }
}

#[async_trait]
impl Backend for MqttBackend {
    fn name(&self) -> &str {
        "mqtt"
    }

    async fn send_data_up(&self, notification: &EncodedNotification) -> Result<(), BackendError> {
        self.publish(notification).await
    }

    async fn send_join_notification(
        &self,
        notification: &EncodedNotification,
    ) -> Result<(), BackendError> {
        self.publish(notification).await
    }

    async fn send_ack_notification(
        &self,
        notification: &EncodedNotification,
    ) -> Result<(), BackendError> {
        self.publish(notification).await
    }

    async fn send_error_notification(
        &self,
        notification: &EncodedNotification,
    ) -> Result<(), BackendError> {
        self.publish(notification).await
    }

    async fn close(&self) -> Result<(), BackendError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        match tokio::time::timeout(self.disconnect_timeout, self.publisher.disconnect()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(BackendError::Disconnect(e)),
            Err(_) => Err(BackendError::Timeout(self.disconnect_timeout)),
        }
    }
}
