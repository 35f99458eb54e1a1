//! Topic and payload encoding shared by every backend.
//!
//! Pure functions: the same notification always yields the same topic and
//! the same bytes.

use thiserror::Error;

use crate::lorawan::Eui64;

use super::types::{EventType, Notification};

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A notification encoded once and shared across all backends of one send.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedNotification {
    pub application_id: i64,
    pub dev_eui: Eui64,
    pub event: EventType,
    /// Canonical JSON body
    pub body: Vec<u8>,
}

impl EncodedNotification {
    pub fn topic(&self) -> String {
        topic(self.application_id, self.dev_eui, self.event)
    }
}

/// Broker topic for an application, device and event:
/// `application/{applicationID}/node/{devEUI}/{event}`.
pub fn topic(application_id: i64, dev_eui: Eui64, event: EventType) -> String {
    format!("application/{}/node/{}/{}", application_id, dev_eui, event)
}

/// Serialize a notification to its canonical JSON bytes.
pub fn serialize<N: Notification>(notification: &N) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(notification)?)
}

pub fn encode<N: Notification>(notification: &N) -> Result<EncodedNotification, CodecError> {
    Ok(EncodedNotification {
        application_id: notification.application_id(),
        dev_eui: notification.dev_eui(),
        event: N::EVENT,
        body: serialize(notification)?,
    })
}
