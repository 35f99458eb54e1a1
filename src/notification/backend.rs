//! Backend trait for notification delivery.
//!
//! A backend is one delivery path (broker, webhook, ...) able to carry each
//! of the four device events. Backends are shared across concurrent sends
//! and must enforce their own timeouts.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::mqtt::PublishError;

use super::codec::EncodedNotification;
use super::types::EventType;

/// Errors that can occur while delivering to one backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Broker rejected or could not accept the publish
    #[error("publish to '{topic}' failed: {source}")]
    Publish {
        topic: String,
        #[source]
        source: PublishError,
    },

    /// HTTP request could not be completed
    #[error("POST {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Endpoint answered outside the 2xx range
    #[error("POST {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// Broker connection could not be shut down cleanly
    #[error("disconnect failed: {0}")]
    Disconnect(#[source] PublishError),

    /// Delivery did not complete in time
    #[error("delivery timed out after {0:?}")]
    Timeout(Duration),

    /// Backend was closed
    #[error("backend is closed")]
    Closed,
}

/// One delivery path for device notifications.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`: a single instance is invoked by
/// many concurrent send calls.
///
/// # Close
///
/// `close` must be idempotent and complete within a bounded time. Sends
/// after close fail with [`BackendError::Closed`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// Short name used in logs, metrics and failure reports.
    fn name(&self) -> &str;

    async fn send_data_up(&self, notification: &EncodedNotification) -> Result<(), BackendError>;

    async fn send_join_notification(
        &self,
        notification: &EncodedNotification,
    ) -> Result<(), BackendError>;

    async fn send_ack_notification(
        &self,
        notification: &EncodedNotification,
    ) -> Result<(), BackendError>;

    async fn send_error_notification(
        &self,
        notification: &EncodedNotification,
    ) -> Result<(), BackendError>;

    async fn close(&self) -> Result<(), BackendError>;
}

/// Route an encoded notification to the backend method matching its event.
pub async fn deliver(
    backend: &dyn Backend,
    notification: &EncodedNotification,
) -> Result<(), BackendError> {
    match notification.event {
        EventType::Rx => backend.send_data_up(notification).await,
        EventType::Join => backend.send_join_notification(notification).await,
        EventType::Ack => backend.send_ack_notification(notification).await,
        EventType::Error => backend.send_error_notification(notification).await,
    }
}
