//! Integration kinds and the backend factory.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::config::IntegrationsConfig;
use crate::storage::Integration;

use super::backend::Backend;
use super::http_backend::{HttpBackend, HttpEndpoints, HttpIntegrationSettings};

/// Errors turning a stored integration into a backend.
#[derive(Debug, Error)]
pub enum IntegrationError {
    #[error("unknown integration kind '{0}'")]
    UnknownKind(String),

    #[error("invalid {kind} integration settings: {source}")]
    InvalidSettings {
        kind: IntegrationKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid {kind} integration settings: {reason}")]
    Validation {
        kind: IntegrationKind,
        reason: String,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// Supported integration kinds, by their stored name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntegrationKind {
    Http,
}

impl IntegrationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntegrationKind::Http => "HTTP",
        }
    }
}

impl fmt::Display for IntegrationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntegrationKind {
    type Err = IntegrationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HTTP" => Ok(IntegrationKind::Http),
            other => Err(IntegrationError::UnknownKind(other.to_string())),
        }
    }
}

/// Builds backends from stored integrations.
///
/// Owns the HTTP client shared by every HTTP backend it builds.
#[derive(Clone)]
pub struct BackendFactory {
    http_client: reqwest::Client,
}

impl BackendFactory {
    pub fn new(config: &IntegrationsConfig) -> Result<Self, IntegrationError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()?;

        tracing::info!(
            http_timeout_seconds = config.http_timeout_seconds,
            "Integration backend factory ready"
        );

        Ok(Self { http_client })
    }

    pub fn with_client(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Build the backend for one integration row.
    pub fn build(&self, integration: &Integration) -> Result<Arc<dyn Backend>, IntegrationError> {
        let kind: IntegrationKind = integration.kind.parse()?;

        tracing::debug!(
            application_id = integration.application_id,
            kind = %kind,
            "Creating integration backend"
        );

        match kind {
            IntegrationKind::Http => {
                let settings = HttpIntegrationSettings::from_value(&integration.settings)?;
                let endpoints = HttpEndpoints::from_settings(&settings)?;
                Ok(Arc::new(HttpBackend::new(self.http_client.clone(), endpoints)))
            }
        }
    }
}
