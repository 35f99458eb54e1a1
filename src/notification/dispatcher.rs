use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;

use crate::metrics::DeliveryMetrics;
use crate::storage::StorageError;

use super::backend::{deliver, Backend, BackendError};
use super::codec::{self, CodecError, EncodedNotification};
use super::registry::{BackendRegistry, ResolveError};
use super::types::{
    AckNotification, DataUpPayload, ErrorNotification, JoinNotification, Notification,
};

/// Why one backend did not deliver.
#[derive(Debug, Error)]
pub enum FailureCause {
    #[error("{0}")]
    Transport(#[source] BackendError),

    /// The integration could not be built from its stored settings
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Integrations could not be looked up, so none were attempted
    #[error("{0}")]
    Storage(#[source] StorageError),
}

#[derive(Debug)]
pub struct BackendFailure {
    pub backend: String,
    pub cause: FailureCause,
}

impl fmt::Display for BackendFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.backend, self.cause)
    }
}

/// Every failure of one send, in delivery order.
#[derive(Debug)]
pub struct DeliveryFailures(Vec<BackendFailure>);

impl DeliveryFailures {
    pub fn failures(&self) -> &[BackendFailure] {
        &self.0
    }

    pub fn backends(&self) -> Vec<&str> {
        self.0.iter().map(|f| f.backend.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for DeliveryFailures {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "delivery failed for {} backend(s)", self.0.len())?;
        for (i, failure) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}", sep, failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for DeliveryFailures {}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("dispatcher is closed")]
    Closed,

    #[error("failed to encode notification: {0}")]
    Encode(#[from] CodecError),

    #[error(transparent)]
    Delivery(#[from] DeliveryFailures),
}

/// Statistics for the notification dispatcher
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Notifications accepted for fan-out
    pub total_sent: AtomicU64,
    /// Sends where every backend delivered
    pub total_delivered: AtomicU64,
    /// Sends that reported at least one failure
    pub total_failed: AtomicU64,
    pub broker_failures: AtomicU64,
    pub integration_deliveries: AtomicU64,
    pub integration_failures: AtomicU64,
    pub storage_failures: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_sent: self.total_sent.load(Ordering::Relaxed),
            total_delivered: self.total_delivered.load(Ordering::Relaxed),
            total_failed: self.total_failed.load(Ordering::Relaxed),
            broker_failures: self.broker_failures.load(Ordering::Relaxed),
            integration_deliveries: self.integration_deliveries.load(Ordering::Relaxed),
            integration_failures: self.integration_failures.load(Ordering::Relaxed),
            storage_failures: self.storage_failures.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total_sent: u64,
    pub total_delivered: u64,
    pub total_failed: u64,
    pub broker_failures: u64,
    pub integration_deliveries: u64,
    pub integration_failures: u64,
    pub storage_failures: u64,
}

/// Fans each device notification out to the broker and to every
/// integration configured for the device's application.
///
/// Every backend in the delivery set is attempted, concurrently, even when
/// others fail. A send succeeds only if all of them delivered; otherwise
/// the returned [`DeliveryFailures`] names each failed backend.
pub struct NotificationDispatcher {
    broker: Arc<dyn Backend>,
    registry: BackendRegistry,
    closed: AtomicBool,
    stats: DispatcherStats,
}

impl NotificationDispatcher {
    pub fn new(broker: Arc<dyn Backend>, registry: BackendRegistry) -> Self {
        Self {
            broker,
            registry,
            closed: AtomicBool::new(false),
            stats: DispatcherStats::default(),
        }
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    #[tracing::instrument(
        name = "dispatcher.send_data_up",
        skip(self, payload),
        fields(application_id = payload.application_id, dev_eui = %payload.dev_eui)
    )]
    pub async fn send_data_up(&self, payload: &DataUpPayload) -> Result<(), DispatchError> {
        self.dispatch(payload).await
    }

    #[tracing::instrument(
        name = "dispatcher.send_join_notification",
        skip(self, payload),
        fields(application_id = payload.application_id, dev_eui = %payload.dev_eui)
    )]
    pub async fn send_join_notification(
        &self,
        payload: &JoinNotification,
    ) -> Result<(), DispatchError> {
        self.dispatch(payload).await
    }

    #[tracing::instrument(
        name = "dispatcher.send_ack_notification",
        skip(self, payload),
        fields(application_id = payload.application_id, dev_eui = %payload.dev_eui)
    )]
    pub async fn send_ack_notification(
        &self,
        payload: &AckNotification,
    ) -> Result<(), DispatchError> {
        self.dispatch(payload).await
    }

    #[tracing::instrument(
        name = "dispatcher.send_error_notification",
        skip(self, payload),
        fields(application_id = payload.application_id, dev_eui = %payload.dev_eui)
    )]
    pub async fn send_error_notification(
        &self,
        payload: &ErrorNotification,
    ) -> Result<(), DispatchError> {
        self.dispatch(payload).await
    }

    /// Stop accepting sends and release every backend exactly once.
    ///
    /// Later calls return `Ok(())` without doing anything.
    pub async fn close(&self) -> Result<(), DispatchError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        let mut failures: Vec<BackendFailure> = self
            .registry
            .close()
            .await
            .into_iter()
            .map(|(backend, error)| BackendFailure {
                backend,
                cause: FailureCause::Transport(error),
            })
            .collect();

        if let Err(error) = self.broker.close().await {
            failures.push(BackendFailure {
                backend: self.broker.name().to_string(),
                cause: FailureCause::Transport(error),
            });
        }

        if failures.is_empty() {
            tracing::info!("Notification dispatcher closed");
            Ok(())
        } else {
            tracing::warn!(failures = failures.len(), "Notification dispatcher closed with errors");
            Err(DeliveryFailures(failures).into())
        }
    }

    async fn dispatch<N: Notification>(&self, notification: &N) -> Result<(), DispatchError> {
        if self.is_closed() {
            return Err(DispatchError::Closed);
        }

        let encoded = codec::encode(notification)?;
        let event = encoded.event.as_str();
        self.stats.total_sent.fetch_add(1, Ordering::Relaxed);
        DeliveryMetrics::record_notification(event);

        let mut failures = Vec::new();
        let mut targets: Vec<Arc<dyn Backend>> = vec![self.broker.clone()];

        match self.registry.resolve(encoded.application_id).await {
            Ok(entry) => {
                targets.extend(entry.backends.iter().cloned());
                failures.extend(entry.failures.iter().map(|failure| BackendFailure {
                    backend: failure.kind.clone(),
                    cause: FailureCause::Configuration(failure.error.to_string()),
                }));
            }
            Err(ResolveError::Storage(error)) => {
                self.stats.storage_failures.fetch_add(1, Ordering::Relaxed);
                failures.push(BackendFailure {
                    backend: "storage".to_string(),
                    cause: FailureCause::Storage(error),
                });
            }
            Err(ResolveError::Closed) => return Err(DispatchError::Closed),
        }

        let outcomes = join_all(
            targets
                .iter()
                .map(|backend| self.deliver_timed(backend.as_ref(), &encoded)),
        )
        .await;

        for (index, (backend, outcome)) in targets.iter().zip(outcomes).enumerate() {
            let is_broker = index == 0;
            if !is_broker {
                self.stats.integration_deliveries.fetch_add(1, Ordering::Relaxed);
            }

            if let Err(error) = outcome {
                if is_broker {
                    self.stats.broker_failures.fetch_add(1, Ordering::Relaxed);
                } else {
                    self.stats.integration_failures.fetch_add(1, Ordering::Relaxed);
                }
                failures.push(BackendFailure {
                    backend: backend.name().to_string(),
                    cause: FailureCause::Transport(error),
                });
            }
        }

        if failures.is_empty() {
            self.stats.total_delivered.fetch_add(1, Ordering::Relaxed);
            tracing::debug!(backends = targets.len(), event, "Notification delivered");
            return Ok(());
        }

        self.stats.total_failed.fetch_add(1, Ordering::Relaxed);
        let failures = DeliveryFailures(failures);
        tracing::warn!(
            backends = targets.len(),
            failed = failures.len(),
            event,
            error = %failures,
            "Notification delivery incomplete"
        );
        Err(failures.into())
    }

    async fn deliver_timed(
        &self,
        backend: &dyn Backend,
        encoded: &EncodedNotification,
    ) -> Result<(), BackendError> {
        let start = Instant::now();
        let result = deliver(backend, encoded).await;

        DeliveryMetrics::record_delivery(
            backend.name(),
            encoded.event.as_str(),
            result.is_ok(),
            start.elapsed().as_secs_f64(),
        );

        if let Err(ref error) = result {
            tracing::warn!(backend = backend.name(), error = %error, "Backend delivery failed");
        }
        result
    }
}
