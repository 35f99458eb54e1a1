//! HTTP integration backend.
//!
//! POSTs the encoded notification to a per-event endpoint configured by the
//! application. Events without a configured endpoint are skipped.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Url};
use serde::Deserialize;

use super::backend::{Backend, BackendError};
use super::codec::EncodedNotification;
use super::integration::{IntegrationError, IntegrationKind};
use super::types::EventType;

/// Stored settings of an HTTP integration.
///
/// An empty string means "not configured" for that event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct HttpIntegrationSettings {
    #[serde(rename = "dataUpURL")]
    pub data_up_url: String,
    #[serde(rename = "joinNotificationURL")]
    pub join_notification_url: String,
    #[serde(rename = "ackNotificationURL")]
    pub ack_notification_url: String,
    #[serde(rename = "errorNotificationURL")]
    pub error_notification_url: String,
    pub headers: HashMap<String, String>,
}

impl HttpIntegrationSettings {
    /// Parse raw stored settings. A missing (null) document yields the
    /// defaults: no endpoints, no headers.
    pub fn from_value(settings: &serde_json::Value) -> Result<Self, IntegrationError> {
        if settings.is_null() {
            return Ok(Self::default());
        }
        Self::deserialize(settings).map_err(|source| IntegrationError::InvalidSettings {
            kind: IntegrationKind::Http,
            source,
        })
    }
}

/// Validated endpoint configuration.
#[derive(Debug, Clone, Default)]
pub struct HttpEndpoints {
    data_up: Option<Url>,
    join: Option<Url>,
    ack: Option<Url>,
    error: Option<Url>,
    headers: HeaderMap,
}

impl HttpEndpoints {
    pub fn from_settings(settings: &HttpIntegrationSettings) -> Result<Self, IntegrationError> {
        let mut headers = HeaderMap::with_capacity(settings.headers.len());
        for (name, value) in &settings.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| invalid(format!("invalid header name '{}'", name)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|_| invalid(format!("invalid value for header '{}'", name)))?;
            headers.insert(header_name, header_value);
        }

        Ok(Self {
            data_up: parse_endpoint("dataUpURL", &settings.data_up_url)?,
            join: parse_endpoint("joinNotificationURL", &settings.join_notification_url)?,
            ack: parse_endpoint("ackNotificationURL", &settings.ack_notification_url)?,
            error: parse_endpoint("errorNotificationURL", &settings.error_notification_url)?,
            headers,
        })
    }

    pub fn url_for(&self, event: EventType) -> Option<&Url> {
        match event {
            EventType::Rx => self.data_up.as_ref(),
            EventType::Join => self.join.as_ref(),
            EventType::Ack => self.ack.as_ref(),
            EventType::Error => self.error.as_ref(),
        }
    }

    pub fn has_any_endpoint(&self) -> bool {
        EventType::ALL.iter().any(|event| self.url_for(*event).is_some())
    }
}

fn invalid(reason: String) -> IntegrationError {
    IntegrationError::Validation {
        kind: IntegrationKind::Http,
        reason,
    }
}

fn parse_endpoint(field: &str, raw: &str) -> Result<Option<Url>, IntegrationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }

    let url = Url::parse(raw).map_err(|e| invalid(format!("{}: {}", field, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(Some(url)),
        other => Err(invalid(format!("{}: unsupported scheme '{}'", field, other))),
    }
}

pub struct HttpBackend {
    client: Client,
    endpoints: HttpEndpoints,
    closed: AtomicBool,
}

impl HttpBackend {
    /// `client` is shared with every other HTTP backend; cloning it shares
    /// the connection pool.
    pub fn new(client: Client, endpoints: HttpEndpoints) -> Self {
        Self {
            client,
            endpoints,
            closed: AtomicBool::new(false),
        }
    }

    async fn post(&self, notification: &EncodedNotification) -> Result<(), BackendError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(BackendError::Closed);
        }

        let Some(url) = self.endpoints.url_for(notification.event) else {
            tracing::trace!(
                application_id = notification.application_id,
                event = %notification.event,
                "No HTTP endpoint configured for event"
            );
            return Ok(());
        };

        let response = self
            .client
            .post(url.clone())
            .headers(self.endpoints.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(notification.body.clone())
            .send()
            .await
            .map_err(|source| BackendError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackendError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        tracing::debug!(
            url = %url,
            status = status.as_u16(),
            event = %notification.event,
            "Delivered notification over HTTP"
        );
        Ok(())
    }
}

#[async_trait]
impl Backend for HttpBackend {
    fn name(&self) -> &str {
        "http"
    }

    async fn send_data_up(&self, notification: &EncodedNotification) -> Result<(), BackendError> {
        self.post(notification).await
    }

    async fn send_join_notification(
        &self,
        notification: &EncodedNotification,
    ) -> Result<(), BackendError> {
        self.post(notification).await
    }

    async fn send_ack_notification(
        &self,
        notification: &EncodedNotification,
    ) -> Result<(), BackendError> {
        self.post(notification).await
    }

    async fn send_error_notification(
        &self,
        notification: &EncodedNotification,
    ) -> Result<(), BackendError> {
        self.post(notification).await
    }

    async fn close(&self) -> Result<(), BackendError> {
        self.closed.store(true, Ordering::Release);
        Ok(())
    }
}
