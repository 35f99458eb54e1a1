//! Per-application backend cache.
//!
//! Backends are built lazily from the integration store on the first send for
//! an application and then reused. Concurrent first sends for the same
//! application share one load. Entries expire after the configured TTL and
//! can be dropped explicitly with [`BackendRegistry::invalidate`].
//!
//! Storage failures are never cached; the next send retries. Integrations
//! that fail to build are cached alongside the working backends so every
//! send keeps reporting them until the entry is reloaded.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::config::IntegrationsConfig;
use crate::metrics::RegistryMetrics;
use crate::storage::{IntegrationStore, StorageError};

use super::backend::{Backend, BackendError};
use super::integration::{BackendFactory, IntegrationError};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("integration lookup failed: {0}")]
    Storage(#[from] StorageError),

    #[error("backend registry is closed")]
    Closed,
}

#[derive(Debug, Clone, Default)]
pub struct RegistryConfig {
    /// `None` keeps entries until invalidated.
    pub cache_ttl: Option<Duration>,
}

impl From<&IntegrationsConfig> for RegistryConfig {
    fn from(config: &IntegrationsConfig) -> Self {
        let cache_ttl = match config.cache_ttl_seconds {
            0 => None,
            seconds => Some(Duration::from_secs(seconds)),
        };
        Self { cache_ttl }
    }
}

/// A stored integration that could not be turned into a backend.
#[derive(Debug)]
pub struct ConfigurationFailure {
    pub kind: String,
    pub error: IntegrationError,
}

impl fmt::Display for ConfigurationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} integration: {}", self.kind, self.error)
    }
}

/// The resolved backends of one application.
pub struct CacheEntry {
    pub backends: Vec<Arc<dyn Backend>>,
    pub failures: Vec<ConfigurationFailure>,
    loaded_at: Instant,
}

impl CacheEntry {
    fn is_expired(&self, ttl: Option<Duration>) -> bool {
        ttl.is_some_and(|ttl| self.loaded_at.elapsed() >= ttl)
    }

    async fn close(&self) -> Vec<(String, BackendError)> {
        let results = join_all(self.backends.iter().map(|backend| backend.close())).await;

        self.backends
            .iter()
            .zip(results)
            .filter_map(|(backend, result)| result.err().map(|e| (backend.name().to_string(), e)))
            .collect()
    }
}

type Slot = Arc<OnceCell<Arc<CacheEntry>>>;

#[derive(Debug, Default)]
pub struct RegistryStats {
    pub hits: AtomicU64,
    pub loads: AtomicU64,
    pub load_failures: AtomicU64,
    pub integration_errors: AtomicU64,
}

impl RegistryStats {
    pub fn snapshot(&self) -> RegistryStatsSnapshot {
        RegistryStatsSnapshot {
            hits: self.hits.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            load_failures: self.load_failures.load(Ordering::Relaxed),
            integration_errors: self.integration_errors.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistryStatsSnapshot {
    pub hits: u64,
    pub loads: u64,
    pub load_failures: u64,
    pub integration_errors: u64,
}

pub struct BackendRegistry {
    store: Arc<dyn IntegrationStore>,
    factory: BackendFactory,
    config: RegistryConfig,
    entries: DashMap<i64, Slot>,
    closed: AtomicBool,
    stats: RegistryStats,
}

impl BackendRegistry {
    pub fn new(
        store: Arc<dyn IntegrationStore>,
        factory: BackendFactory,
        config: RegistryConfig,
    ) -> Self {
        Self {
            store,
            factory,
            config,
            entries: DashMap::new(),
            closed: AtomicBool::new(false),
            stats: RegistryStats::default(),
        }
    }

    pub fn stats(&self) -> RegistryStatsSnapshot {
        self.stats.snapshot()
    }

    /// Number of applications with a cache slot.
    pub fn cached_applications(&self) -> usize {
        self.entries.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Resolve the backends for an application, loading them on first use.
    #[tracing::instrument(name = "registry.resolve", skip(self))]
    pub async fn resolve(&self, application_id: i64) -> Result<Arc<CacheEntry>, ResolveError> {
        if self.is_closed() {
            return Err(ResolveError::Closed);
        }

        let slot = self.slot(application_id);
        if let Some(entry) = slot.get() {
            if !entry.is_expired(self.config.cache_ttl) {
                self.stats.hits.fetch_add(1, Ordering::Relaxed);
                RegistryMetrics::record_hit();
                return Ok(entry.clone());
            }

            tracing::debug!(application_id, "Cached backends expired");
            self.retire(application_id, &slot);
            return self.load_into(application_id, self.slot(application_id)).await;
        }

        self.load_into(application_id, slot).await
    }

    /// Drop the cached backends of one application. The next send reloads.
    pub fn invalidate(&self, application_id: i64) -> bool {
        let removed = self.entries.remove(&application_id).is_some();
        if removed {
            tracing::info!(application_id, "Invalidated cached backends");
            RegistryMetrics::set_cached_applications(self.entries.len());
        }
        removed
    }

    pub fn invalidate_all(&self) {
        let count = self.entries.len();
        self.entries.clear();
        RegistryMetrics::set_cached_applications(0);
        tracing::info!(count, "Invalidated all cached backends");
    }

    /// Close every cached backend and reject further resolves.
    ///
    /// Returns the backends whose close failed. Calling again is a no-op.
    pub async fn close(&self) -> Vec<(String, BackendError)> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Vec::new();
        }

        let slots: Vec<Slot> = self.entries.iter().map(|e| e.value().clone()).collect();
        self.entries.clear();
        RegistryMetrics::set_cached_applications(0);

        let closes = slots
            .iter()
            .filter_map(|slot| slot.get().cloned())
            .map(|entry| async move { entry.close().await });

        let failures: Vec<_> = join_all(closes).await.into_iter().flatten().collect();

        tracing::info!(
            applications = slots.len(),
            failures = failures.len(),
            "Backend registry closed"
        );
        failures
    }

    fn slot(&self, application_id: i64) -> Slot {
        self.entries.entry(application_id).or_default().clone()
    }

    fn retire(&self, application_id: i64, slot: &Slot) {
        self.entries
            .remove_if(&application_id, |_, current| Arc::ptr_eq(current, slot));
    }

    async fn load_into(&self, application_id: i64, slot: Slot) -> Result<Arc<CacheEntry>, ResolveError> {
        let result = slot.get_or_try_init(|| self.load(application_id)).await;

        let entry = match result {
            Ok(entry) => entry.clone(),
            Err(e) => {
                if !slot.initialized() {
                    self.retire(application_id, &slot);
                }
                return Err(e);
            }
        };

        // A close that raced with this load may have missed the entry.
        if self.is_closed() {
            self.retire(application_id, &slot);
            entry.close().await;
            return Err(ResolveError::Closed);
        }

        RegistryMetrics::set_cached_applications(self.entries.len());
        Ok(entry)
    }

    async fn load(&self, application_id: i64) -> Result<Arc<CacheEntry>, ResolveError> {
        RegistryMetrics::record_miss();
        self.stats.loads.fetch_add(1, Ordering::Relaxed);

        let integrations = match self.store.integrations_for_application(application_id).await {
            Ok(integrations) => integrations,
            Err(e) => {
                self.stats.load_failures.fetch_add(1, Ordering::Relaxed);
                RegistryMetrics::record_load(false);
                tracing::warn!(application_id, error = %e, "Failed to load integrations");
                return Err(e.into());
            }
        };
        RegistryMetrics::record_load(true);

        let mut backends = Vec::with_capacity(integrations.len());
        let mut failures = Vec::new();

        for integration in &integrations {
            match self.factory.build(integration) {
                Ok(backend) => backends.push(backend),
                Err(error) => {
                    self.stats.integration_errors.fetch_add(1, Ordering::Relaxed);
                    RegistryMetrics::record_integration_error(&integration.kind);
                    tracing::warn!(
                        application_id,
                        kind = %integration.kind,
                        error = %error,
                        "Integration could not be configured"
                    );
                    failures.push(ConfigurationFailure {
                        kind: integration.kind.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            application_id,
            backends = backends.len(),
            failures = failures.len(),
            "Loaded application backends"
        );

        Ok(Arc::new(CacheEntry {
            backends,
            failures,
            loaded_at: Instant::now(),
        }))
    }
}
