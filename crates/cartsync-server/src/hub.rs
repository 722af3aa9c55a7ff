//! The hub: sole owner of the live connection set and the writer store.

use axum::body::Bytes;
use cartsync_core::{CartVersion, EnvelopeError};
use cartsync_store::CartStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};

/// Process-unique id of a registered connection.
pub type ConnectionId = u64;

/// Pending events the hub accepts before senders start waiting.
const EVENT_BACKLOG: usize = 64;

enum HubEvent {
    Register {
        id: ConnectionId,
        queue: mpsc::Sender<Bytes>,
    },
    Unregister(ConnectionId),
    Broadcast(Bytes),
    Count(oneshot::Sender<usize>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    #[error("hub is not running")]
    Closed,
}

/// Cloneable handle used by connections to talk to the hub.
///
/// The hub stops once every handle is dropped.
#[derive(Clone)]
pub struct HubHandle {
    events: mpsc::Sender<HubEvent>,
    next_id: Arc<AtomicU64>,
    queue_capacity: usize,
}

impl HubHandle {
    /// Register a new connection and return its outbound queue.
    ///
    /// The queue yields `None` once the hub has dropped the connection.
    pub async fn register(&self) -> Result<(ConnectionId, mpsc::Receiver<Bytes>), HubError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (queue, rx) = mpsc::channel(self.queue_capacity);
        self.send(HubEvent::Register { id, queue }).await?;
        Ok((id, rx))
    }

    /// Ask the hub to drop a connection. Unknown ids are ignored.
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), HubError> {
        self.send(HubEvent::Unregister(id)).await
    }

    /// Submit a frame for fan-out (and persistence, if it is a cart update).
    pub async fn broadcast(&self, frame: Bytes) -> Result<(), HubError> {
        self.send(HubEvent::Broadcast(frame)).await
    }

    /// Number of live connections, as seen by the hub after every event
    /// submitted before this call.
    pub async fn connection_count(&self) -> Result<usize, HubError> {
        let (tx, rx) = oneshot::channel();
        self.send(HubEvent::Count(tx)).await?;
        rx.await.map_err(|_| HubError::Closed)
    }

    async fn send(&self, event: HubEvent) -> Result<(), HubError> {
        self.events.send(event).await.map_err(|_| HubError::Closed)
    }
}

pub struct Hub<S> {
    clients: HashMap<ConnectionId, mpsc::Sender<Bytes>>,
    events: mpsc::Receiver<HubEvent>,
    store: S,
}

impl<S: CartStore> Hub<S> {
    /// Create a hub writing to `store`; every connection gets an outbound
    /// queue holding at most `queue_capacity` frames.
    pub fn new(store: S, queue_capacity: usize) -> (Self, HubHandle) {
        let (tx, rx) = mpsc::channel(EVENT_BACKLOG);
        let hub = Self {
            clients: HashMap::new(),
            events: rx,
            store,
        };
        let handle = HubHandle {
            events: tx,
            next_id: Arc::new(AtomicU64::new(1)),
            queue_capacity: queue_capacity.max(1),
        };
        (hub, handle)
    }

    /// Process events one at a time until every handle is gone, then return
    /// the store.
    pub async fn run(mut self) -> S {
        tracing::debug!("Hub running");
        while let Some(event) = self.events.recv().await {
            match event {
                HubEvent::Register { id, queue } => {
                    self.clients.insert(id, queue);
                    tracing::debug!("Connection {} registered ({} live)", id, self.clients.len());
                }
                HubEvent::Unregister(id) => {
                    // Removing the entry drops the only sender, closing the queue.
                    if self.clients.remove(&id).is_some() {
                        tracing::debug!("Connection {} unregistered ({} live)", id, self.clients.len());
                    }
                }
                HubEvent::Broadcast(frame) => {
                    self.fan_out(&frame);
                    self.persist(&frame);
                }
                HubEvent::Count(reply) => {
                    let _ = reply.send(self.clients.len());
                }
            }
        }
        tracing::debug!("Hub stopped with {} live connections", self.clients.len());
        self.store
    }

    fn fan_out(&mut self, frame: &Bytes) {
        self.clients
            .retain(|id, queue| match queue.try_send(frame.clone()) {
                Ok(()) => true,
                Err(TrySendError::Full(_)) => {
                    tracing::warn!("Connection {} is not keeping up, dropping it", id);
                    false
                }
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("Connection {} already gone", id);
                    false
                }
            });
    }

    fn persist(&mut self, frame: &[u8]) {
        let update = match CartVersion::decode(frame) {
            Ok(update) => update,
            Err(EnvelopeError::UnexpectedTag(tag)) => {
                tracing::trace!("Not persisting message tagged {:?}", tag);
                return;
            }
            Err(e) => {
                tracing::debug!("Not persisting message: {}", e);
                return;
            }
        };

        match self.store.record(&update) {
            Ok(()) => tracing::info!("Synced cart version {:?}", update.version),
            Err(e) => tracing::error!("Failed to persist cart version {:?}: {}", update.version, e),
        }
    }
}
