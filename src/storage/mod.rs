//! Integration storage.
//!
//! The dispatcher only reads integrations; creating and editing them
//! belongs to the application CRUD service, which should invalidate the
//! registry after a write.

mod memory;
mod postgres;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use memory::MemoryIntegrationStore;
pub use postgres::PostgresIntegrationStore;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

/// A persisted integration row.
///
/// `kind` is kept as the raw stored string; it is only interpreted when a
/// backend is built, so an unknown kind fails that row alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Integration {
    pub application_id: i64,
    pub kind: String,
    pub settings: serde_json::Value,
}

impl Integration {
    pub fn new(application_id: i64, kind: impl Into<String>, settings: serde_json::Value) -> Self {
        Self {
            application_id,
            kind: kind.into(),
            settings,
        }
    }
}

/// Read access to integration configuration.
#[async_trait]
pub trait IntegrationStore: Send + Sync {
    /// All integrations of an application, in a stable order.
    async fn integrations_for_application(
        &self,
        application_id: i64,
    ) -> Result<Vec<Integration>, StorageError>;
}
