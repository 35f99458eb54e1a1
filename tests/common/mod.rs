//! Shared fixtures for integration tests.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use lora_app_notify::lorawan::{DevAddr, Eui64};
use lora_app_notify::mqtt::{BrokerPublisher, PublishError, QoS};
use lora_app_notify::notification::{
    AckNotification, BackendFactory, BackendRegistry, DataUpPayload, ErrorNotification,
    JoinNotification, MqttBackend, NotificationDispatcher, RegistryConfig,
};
use lora_app_notify::storage::{Integration, IntegrationStore, StorageError};

pub const DEV_EUI: Eui64 = Eui64([1, 1, 1, 1, 1, 1, 1, 1]);

/// In-process broker that records every publish.
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<PublishedMessage>>,
    failing: AtomicBool,
    disconnects: AtomicUsize,
}

#[derive(Debug, Clone)]
pub struct PublishedMessage {
    pub topic: String,
    pub qos: QoS,
    pub payload: Vec<u8>,
}

impl PublishedMessage {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap()
    }
}

impl RecordingPublisher {
    pub fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.lock().unwrap().clone()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerPublisher for RecordingPublisher {
    async fn publish(&self, topic: &str, qos: QoS, payload: Vec<u8>) -> Result<(), PublishError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(PublishError::NotConnected);
        }
        self.messages.lock().unwrap().push(PublishedMessage {
            topic: topic.to_string(),
            qos,
            payload,
        });
        Ok(())
    }

    fn is_connected(&self) -> bool {
        !self.failing.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<(), PublishError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Integration store that counts lookups and can be switched to fail.
pub struct CountingStore {
    rows: Mutex<Vec<Integration>>,
    queries: AtomicUsize,
    failing: AtomicBool,
}

impl CountingStore {
    pub fn new(rows: Vec<Integration>) -> Self {
        Self {
            rows: Mutex::new(rows),
            queries: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        }
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn replace(&self, rows: Vec<Integration>) {
        *self.rows.lock().unwrap() = rows;
    }
}

#[async_trait]
impl IntegrationStore for CountingStore {
    async fn integrations_for_application(
        &self,
        application_id: i64,
    ) -> Result<Vec<Integration>, StorageError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("connection refused".to_string()));
        }
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|row| row.application_id == application_id)
            .cloned()
            .collect())
    }
}

pub struct TestEnvironment {
    pub publisher: Arc<RecordingPublisher>,
    pub dispatcher: Arc<NotificationDispatcher>,
}

pub fn create_test_environment(store: Arc<dyn IntegrationStore>) -> TestEnvironment {
    let publisher = Arc::new(RecordingPublisher::default());
    let broker = Arc::new(MqttBackend::new(
        publisher.clone(),
        QoS::AtMostOnce,
        Duration::from_secs(1),
    ));
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    let registry = BackendRegistry::new(
        store,
        BackendFactory::with_client(client),
        RegistryConfig::default(),
    );

    TestEnvironment {
        publisher,
        dispatcher: Arc::new(NotificationDispatcher::new(broker, registry)),
    }
}

/// An HTTP integration with all four endpoints under `base`.
pub fn http_integration(application_id: i64, base: &str) -> Integration {
    Integration::new(
        application_id,
        "HTTP",
        serde_json::json!({
            "dataUpURL": format!("{}/rx", base),
            "joinNotificationURL": format!("{}/join", base),
            "ackNotificationURL": format!("{}/ack", base),
            "errorNotificationURL": format!("{}/error", base),
        }),
    )
}

pub fn data_up(application_id: i64) -> DataUpPayload {
    DataUpPayload {
        application_id,
        application_name: "test-app".to_string(),
        node_name: "test-node".to_string(),
        dev_eui: DEV_EUI,
        f_cnt: 10,
        f_port: 3,
        data: vec![1, 2, 3, 4],
        ..Default::default()
    }
}

pub fn join(application_id: i64) -> JoinNotification {
    JoinNotification {
        application_id,
        application_name: "test-app".to_string(),
        node_name: "test-node".to_string(),
        dev_eui: DEV_EUI,
        dev_addr: DevAddr([0x01, 0x02, 0x03, 0x04]),
    }
}

pub fn ack(application_id: i64) -> AckNotification {
    AckNotification {
        application_id,
        application_name: "test-app".to_string(),
        node_name: "test-node".to_string(),
        dev_eui: DEV_EUI,
        acknowledged: true,
        f_cnt: 11,
    }
}

pub fn error(application_id: i64) -> ErrorNotification {
    ErrorNotification {
        application_id,
        application_name: "test-app".to_string(),
        node_name: "test-node".to_string(),
        dev_eui: DEV_EUI,
        error_type: "DATA_UP_FCNT".to_string(),
        error: "frame-counter did not increment".to_string(),
        f_cnt: 0,
    }
}
