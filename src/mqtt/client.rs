use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::MqttConfig;

use super::inflight::PublishTracker;
use super::{BrokerPublisher, PublishError};

/// Capacity of the request channel between client and event loop
const REQUEST_CAPACITY: usize = 100;

/// Pause between reconnect attempts after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// rumqttc rejects keep-alive intervals below five seconds
const MIN_KEEP_ALIVE_SECONDS: u64 = 5;

/// Long-lived MQTT connection used by the broker backend.
///
/// The rumqttc event loop runs on a background task for the lifetime of the
/// client and reconnects on connection errors until [`disconnect`] is called.
/// A publish resolves once the event loop has written it (QoS 0) or the
/// broker has acknowledged it (QoS 1 and 2).
///
/// [`disconnect`]: BrokerPublisher::disconnect
pub struct MqttClient {
    client: AsyncClient,
    connected: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    tracker: Arc<PublishTracker>,
    event_loop: Mutex<Option<JoinHandle<()>>>,
    disconnect_timeout: Duration,
}

impl MqttClient {
    /// Connect with the configured credentials and start the event loop.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn connect(config: &MqttConfig) -> Result<Self, PublishError> {
        let (host, port) = parse_broker_url(&config.server)?;

        let mut options = MqttOptions::new(&config.client_id, host, port);
        options.set_keep_alive(Duration::from_secs(
            config.keep_alive_seconds.max(MIN_KEEP_ALIVE_SECONDS),
        ));
        options.set_clean_session(true);
        if !config.username.is_empty() {
            options.set_credentials(&config.username, &config.password);
        }

        let (client, event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let connected = Arc::new(AtomicBool::new(false));
        let stopping = Arc::new(AtomicBool::new(false));
        let tracker = Arc::new(PublishTracker::default());

        let handle = tokio::spawn(run_event_loop(
            event_loop,
            connected.clone(),
            stopping.clone(),
            tracker.clone(),
        ));

        info!(
            server = %config.server,
            client_id = %config.client_id,
            "MQTT client started"
        );

        Ok(Self {
            client,
            connected,
            stopping,
            tracker,
            event_loop: Mutex::new(Some(handle)),
            disconnect_timeout: Duration::from_millis(config.disconnect_timeout_ms),
        })
    }

    fn take_event_loop(&self) -> Option<JoinHandle<()>> {
        match self.event_loop.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        }
    }
}

#[async_trait]
impl BrokerPublisher for MqttClient {
    async fn publish(&self, topic: &str, qos: QoS, payload: Vec<u8>) -> Result<(), PublishError> {
        if self.stopping.load(Ordering::Acquire) {
            return Err(PublishError::Disconnected);
        }
        if !self.connected.load(Ordering::Acquire) {
            return Err(PublishError::NotConnected);
        }

        // try_publish keeps enqueue and waiter registration atomic; a caller
        // timeout can only drop the receiver.
        let completion = self.tracker.track(qos, || {
            self.client
                .try_publish(topic, qos, false, payload)
                .map_err(PublishError::from)
        })?;

        match completion.await {
            Ok(result) => result,
            Err(_) => Err(PublishError::Disconnected),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    async fn disconnect(&self) -> Result<(), PublishError> {
        if self.stopping.swap(true, Ordering::AcqRel) {
            return Ok(());
        }

        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "MQTT disconnect request not delivered");
        }

        if let Some(handle) = self.take_event_loop() {
            let abort = handle.abort_handle();
            if tokio::time::timeout(self.disconnect_timeout, handle)
                .await
                .is_err()
            {
                warn!(
                    timeout_ms = self.disconnect_timeout.as_millis() as u64,
                    "MQTT event loop did not stop in time, aborting"
                );
                abort.abort();
            }
        }

        self.tracker.fail_all(|| PublishError::Disconnected);
        self.connected.store(false, Ordering::Release);
        info!("MQTT client disconnected");
        Ok(())
    }
}

async fn run_event_loop(
    mut event_loop: EventLoop,
    connected: Arc<AtomicBool>,
    stopping: Arc<AtomicBool>,
    tracker: Arc<PublishTracker>,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                if !ack.session_present {
                    tracker.session_reset();
                }
                connected.store(true, Ordering::Release);
                info!("connected to MQTT broker");
            }
            Ok(Event::Outgoing(Outgoing::Publish(pkid))) => tracker.on_outgoing_publish(pkid),
            Ok(Event::Incoming(Packet::PubAck(ack))) => tracker.on_puback(ack.pkid),
            Ok(Event::Incoming(Packet::PubComp(comp))) => tracker.on_pubcomp(comp.pkid),
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                connected.store(false, Ordering::Release);
                debug!("MQTT disconnect sent, stopping event loop");
                break;
            }
            Ok(_) => {}
            Err(e) => {
                connected.store(false, Ordering::Release);
                let pending = tracker.pending();
                let reason = e.to_string();
                tracker.fail_all(|| PublishError::ConnectionLost(reason.clone()));
                if stopping.load(Ordering::Acquire) {
                    break;
                }
                warn!(error = %e, failed_publishes = pending, "MQTT connection error, reconnecting");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }

    tracker.fail_all(|| PublishError::Disconnected);
}

/// Split `tcp://host:port` (or `mqtt://`, or bare `host[:port]`) into host
/// and port. The port defaults to 1883.
pub fn parse_broker_url(url: &str) -> Result<(&str, u16), PublishError> {
    let address = url
        .trim_start_matches("mqtt://")
        .trim_start_matches("tcp://");

    let parts: Vec<&str> = address.split(':').collect();
    match parts.as_slice() {
        [host] if !host.is_empty() => Ok((*host, 1883)),
        [host, port] if !host.is_empty() => {
            let port = port
                .parse::<u16>()
                .map_err(|_| PublishError::InvalidUrl(format!("invalid port in '{}'", url)))?;
            Ok((*host, port))
        }
        _ => Err(PublishError::InvalidUrl(url.to_string())),
    }
}
