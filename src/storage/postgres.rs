//! PostgreSQL-backed integration store.
//!
//! Reads the `integration` table:
//!
//! ```sql
//! CREATE TABLE integration (
//!     id             BIGSERIAL PRIMARY KEY,
//!     created_at     TIMESTAMPTZ NOT NULL,
//!     updated_at     TIMESTAMPTZ NOT NULL,
//!     application_id BIGINT NOT NULL REFERENCES application ON DELETE CASCADE,
//!     kind           VARCHAR(20) NOT NULL,
//!     settings       JSONB
//! );
//! ```

use async_trait::async_trait;
use sqlx::PgPool;

use super::{Integration, IntegrationStore, StorageError};

pub struct PostgresIntegrationStore {
    pool: PgPool,
}

impl PostgresIntegrationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IntegrationStore for PostgresIntegrationStore {
    async fn integrations_for_application(
        &self,
        application_id: i64,
    ) -> Result<Vec<Integration>, StorageError> {
        let rows: Vec<(i64, String, Option<serde_json::Value>)> = sqlx::query_as(
            r#"
            SELECT application_id, kind, settings
            FROM integration
            WHERE application_id = $1
            ORDER BY id
            "#,
        )
        .bind(application_id)
        .fetch_all(&self.pool)
        .await?;

        tracing::debug!(
            application_id = application_id,
            count = rows.len(),
            "Loaded integrations from PostgreSQL"
        );

        Ok(rows
            .into_iter()
            .map(|(application_id, kind, settings)| Integration {
                application_id,
                kind,
                settings: settings.unwrap_or(serde_json::Value::Null),
            })
            .collect())
    }
}
