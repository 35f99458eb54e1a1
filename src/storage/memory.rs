use async_trait::async_trait;
use dashmap::DashMap;

use super::{Integration, IntegrationStore, StorageError};

/// In-memory integration store.
///
/// Keeps at most one integration per (application, kind); inserting the same
/// pair again replaces the settings.
#[derive(Default)]
pub struct MemoryIntegrationStore {
    integrations: DashMap<i64, Vec<Integration>>,
}

impl MemoryIntegrationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the integration for its (application, kind) pair.
    pub fn upsert(&self, integration: Integration) {
        let mut rows = self
            .integrations
            .entry(integration.application_id)
            .or_default();

        match rows.iter_mut().find(|row| row.kind == integration.kind) {
            Some(existing) => *existing = integration,
            None => rows.push(integration),
        }
    }

    /// Remove an application's integration of the given kind.
    pub fn remove(&self, application_id: i64, kind: &str) -> bool {
        match self.integrations.get_mut(&application_id) {
            Some(mut rows) => {
                let before = rows.len();
                rows.retain(|row| row.kind != kind);
                rows.len() != before
            }
            None => false,
        }
    }
}

#[async_trait]
impl IntegrationStore for MemoryIntegrationStore {
    async fn integrations_for_application(
        &self,
        application_id: i64,
    ) -> Result<Vec<Integration>, StorageError> {
        Ok(self
            .integrations
            .get(&application_id)
            .map(|rows| rows.clone())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_empty_application() {
        let store = MemoryIntegrationStore::new();
        let rows = store.integrations_for_application(1).await.unwrap();
        assert!(rows.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces_same_kind() {
        let store = MemoryIntegrationStore::new();
        store.upsert(Integration::new(1, "HTTP", json!({"dataUpURL": "http://a/rx"})));
        store.upsert(Integration::new(1, "HTTP", json!({"dataUpURL": "http://b/rx"})));
        store.upsert(Integration::new(1, "OTHER", json!({})));
        store.upsert(Integration::new(2, "HTTP", json!({})));

        let rows = store.integrations_for_application(1).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].settings["dataUpURL"], json!("http://b/rx"));
        assert_eq!(rows[1].kind, "OTHER");
    }

    #[tokio::test]
    async fn test_remove() {
        let store = MemoryIntegrationStore::new();
        store.upsert(Integration::new(1, "HTTP", json!({})));

        assert!(store.remove(1, "HTTP"));
        assert!(!store.remove(1, "HTTP"));
        assert!(!store.remove(5, "HTTP"));
        assert!(store.integrations_for_application(1).await.unwrap().is_empty());
    }
}
