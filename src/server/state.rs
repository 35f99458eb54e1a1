use std::sync::Arc;
use std::time::Instant;

use crate::mqtt::BrokerPublisher;
use crate::notification::NotificationDispatcher;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<NotificationDispatcher>,
    pub publisher: Arc<dyn BrokerPublisher>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(dispatcher: Arc<NotificationDispatcher>, publisher: Arc<dyn BrokerPublisher>) -> Self {
        Self {
            dispatcher,
            publisher,
            start_time: Instant::now(),
        }
    }

    pub fn broker_connected(&self) -> bool {
        self.publisher.is_connected()
    }
}
