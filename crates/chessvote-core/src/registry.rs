//! Registry of live viewer channels.
//!
//! Each [`Subscriber`] pairs a [`SubscriberId`] with the sending half of a
//! bounded channel. The connection task owns the receiving half and
//! writes whatever arrives to its socket. Delivery never waits: when that
//! task goes away, or stops draining and lets the queue fill up, the next
//! delivery attempt fails and the broadcast engine prunes the entry.

use std::collections::BTreeMap;

use chessvote_types::{SessionEvent, SubscriberId};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{RwLock, mpsc};
use tracing::debug;

/// Events a subscriber may have queued before it counts as stalled.
pub const SUBSCRIBER_QUEUE_CAPACITY: usize = 64;

/// An event could not be handed to a subscriber.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The connection task dropped its receiver.
    #[error("subscriber {id} channel closed")]
    Closed {
        /// The subscriber that could not be reached.
        id: SubscriberId,
    },

    /// The connection task stopped draining its queue.
    #[error("subscriber {id} has {capacity} undelivered events")]
    Stalled {
        /// The subscriber that could not be reached.
        id: SubscriberId,
        /// The queue bound it hit.
        capacity: usize,
    },
}

impl DeliveryError {
    /// The subscriber the failure belongs to.
    pub const fn id(&self) -> SubscriberId {
        match self {
            Self::Closed { id } | Self::Stalled { id, .. } => *id,
        }
    }
}

/// One live connection: an id plus an outbound delivery capability.
#[derive(Debug, Clone)]
pub struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<SessionEvent>,
}

impl Subscriber {
    /// Create a subscriber with a fresh id and a queue of
    /// [`SUBSCRIBER_QUEUE_CAPACITY`] events, and return it together with
    /// the receiver its connection task should drain.
    pub fn channel() -> (Self, mpsc::Receiver<SessionEvent>) {
        Self::with_capacity(SUBSCRIBER_QUEUE_CAPACITY)
    }

    /// Like [`channel`](Self::channel) with an explicit queue bound.
    /// A bound of zero is raised to one.
    pub fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                id: SubscriberId::new(),
                tx,
            },
            rx,
        )
    }

    /// This subscriber's id.
    pub const fn id(&self) -> SubscriberId {
        self.id
    }

    /// Hand one event to the connection task.
    ///
    /// Never blocks. Fails when the receiving side has been dropped or
    /// its queue is full.
    pub fn deliver(&self, event: &SessionEvent) -> Result<(), DeliveryError> {
        self.tx.try_send(event.clone()).map_err(|e| match e {
            TrySendError::Closed(_) => DeliveryError::Closed { id: self.id },
            TrySendError::Full(_) => DeliveryError::Stalled {
                id: self.id,
                capacity: self.tx.max_capacity(),
            },
        })
    }
}

/// Set of currently connected subscribers.
///
/// Shared via [`Arc`](std::sync::Arc) between the connection handlers and
/// the broadcast dispatcher.
#[derive(Debug, Default)]
pub struct SubscriberRegistry {
    subscribers: RwLock<BTreeMap<SubscriberId, Subscriber>>,
}

impl SubscriberRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a subscriber. Registering an id that is already present
    /// replaces its channel. Returns the new subscriber count.
    pub async fn register(&self, subscriber: Subscriber) -> usize {
        let mut guard = self.subscribers.write().await;
        let id = subscriber.id();
        guard.insert(id, subscriber);
        let count = guard.len();
        debug!(%id, count, "Subscriber registered");
        count
    }

    /// Remove a subscriber. Removing an absent id is a no-op.
    ///
    /// Returns `true` if an entry was removed.
    pub async fn unregister(&self, id: SubscriberId) -> bool {
        let mut guard = self.subscribers.write().await;
        let removed = guard.remove(&id).is_some();
        if removed {
            debug!(%id, count = guard.len(), "Subscriber unregistered");
        }
        removed
    }

    /// Point-in-time copy of every registered subscriber.
    ///
    /// The copy is detached from the registry, so it can be iterated while
    /// other tasks register or unregister.
    pub async fn snapshot(&self) -> Vec<Subscriber> {
        self.subscribers.read().await.values().cloned().collect()
    }

    /// Number of registered subscribers.
    pub async fn len(&self) -> usize {
        self.subscribers.read().await.len()
    }

    /// Whether no subscriber is registered.
    pub async fn is_empty(&self) -> bool {
        self.subscribers.read().await.is_empty()
    }

    /// Whether the given id is registered.
    pub async fn contains(&self, id: SubscriberId) -> bool {
        self.subscribers.read().await.contains_key(&id)
    }
}
