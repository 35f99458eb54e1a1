//! Completion tracking for publishes handed to the rumqttc event loop.
//!
//! rumqttc consumes queued requests in order and reports each one as
//! `Outgoing::Publish(pkid)` when it is written. Waiters are kept in the same
//! order. QoS 0 completes on write, QoS 1 on PUBACK and QoS 2 on PUBCOMP,
//! the last two matched by packet id.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};

use rumqttc::QoS;
use tokio::sync::oneshot;

use super::PublishError;

pub(crate) type Completion = oneshot::Receiver<Result<(), PublishError>>;

struct Waiter {
    qos: QoS,
    tx: Option<oneshot::Sender<Result<(), PublishError>>>,
}

impl Waiter {
    fn complete(&mut self, result: Result<(), PublishError>) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(result);
        }
    }
}

#[derive(Default)]
struct State {
    /// Requests queued on the client channel, not yet written.
    queued: VecDeque<Waiter>,
    /// Written QoS 1/2 publishes awaiting their acknowledgement.
    inflight: HashMap<u16, Waiter>,
    /// Packet ids failed by a connection error; rumqttc may retransmit them.
    abandoned: HashSet<u16>,
}

#[derive(Default)]
pub(crate) struct PublishTracker {
    state: Mutex<State>,
}

impl PublishTracker {
    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Queue a request through `enqueue` and register its waiter under the
    /// same lock, so waiter order always matches request order.
    pub fn track<F>(&self, qos: QoS, enqueue: F) -> Result<Completion, PublishError>
    where
        F: FnOnce() -> Result<(), PublishError>,
    {
        let mut state = self.lock();
        enqueue()?;

        let (tx, rx) = oneshot::channel();
        state.queued.push_back(Waiter { qos, tx: Some(tx) });
        Ok(rx)
    }

    pub fn on_outgoing_publish(&self, pkid: u16) {
        let mut state = self.lock();
        if pkid != 0 && state.abandoned.remove(&pkid) {
            return;
        }

        let Some(mut waiter) = state.queued.pop_front() else {
            return;
        };
        match waiter.qos {
            QoS::AtMostOnce => waiter.complete(Ok(())),
            QoS::AtLeastOnce | QoS::ExactlyOnce => {
                if waiter.tx.is_some() {
                    state.inflight.insert(pkid, waiter);
                }
            }
        }
    }

    pub fn on_puback(&self, pkid: u16) {
        self.acknowledge(pkid, QoS::AtLeastOnce);
    }

    pub fn on_pubcomp(&self, pkid: u16) {
        self.acknowledge(pkid, QoS::ExactlyOnce);
    }

    fn acknowledge(&self, pkid: u16, qos: QoS) {
        let mut state = self.lock();
        state.abandoned.remove(&pkid);

        if state.inflight.get(&pkid).is_some_and(|w| w.qos == qos) {
            if let Some(mut waiter) = state.inflight.remove(&pkid) {
                waiter.complete(Ok(()));
            }
        }
    }

    /// Fail every waiting publish.
    ///
    /// Queued slots stay in place so later write events still line up with
    /// their requests.
    pub fn fail_all<F>(&self, error: F)
    where
        F: Fn() -> PublishError,
    {
        let mut state = self.lock();
        for waiter in state.queued.iter_mut() {
            waiter.complete(Err(error()));
        }

        let inflight: Vec<(u16, Waiter)> = state.inflight.drain().collect();
        for (pkid, mut waiter) in inflight {
            waiter.complete(Err(error()));
            state.abandoned.insert(pkid);
        }
    }

    /// The broker started a fresh session; nothing will be retransmitted.
    pub fn session_reset(&self) {
        self.lock().abandoned.clear();
    }

    /// Publishes still waiting for completion.
    pub fn pending(&self) -> usize {
        let state = self.lock();
        state.queued.iter().filter(|w| w.tx.is_some()).count() + state.inflight.len()
    }
}
