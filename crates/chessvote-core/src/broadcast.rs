//! Ordered fan-out of session events to every connected viewer.
//!
//! Producers hold an [`EventPublisher`] and enqueue events on an unbounded
//! channel, so publishing never waits on delivery and is safe to do while
//! the session lock is held. A single dispatcher task drains the channel
//! in order. For each event it takes a registry snapshot and delivers to
//! every subscriber in it; subscribers whose channel has closed or whose
//! queue is full are unregistered and the rest still receive the event.

use std::sync::Arc;

use chessvote_types::{SessionEvent, SubscriberId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::registry::SubscriberRegistry;

/// Sending side of the session's event stream.
#[derive(Debug, Clone)]
pub struct EventPublisher {
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventPublisher {
    /// Create a publisher and the receiver that drains it.
    ///
    /// [`BroadcastEngine::spawn`] wires the receiver to a dispatcher; tests
    /// can read it directly.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue an event for delivery.
    ///
    /// Returns `false` if the dispatcher has shut down; the event is then
    /// dropped, which is logged rather than surfaced.
    pub fn publish(&self, event: SessionEvent) -> bool {
        match self.tx.send(event) {
            Ok(()) => true,
            Err(mpsc::error::SendError(event)) => {
                warn!(?event, "Broadcast dispatcher is gone, event dropped");
                false
            }
        }
    }
}

/// Outcome of delivering one event to a registry snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FanOutReport {
    /// Subscribers that accepted the event.
    pub delivered: usize,
    /// Subscribers whose delivery failed and were unregistered.
    pub pruned: Vec<SubscriberId>,
}

/// Deliver one event to every subscriber currently registered.
///
/// A failed delivery (closed channel or full queue) unregisters that
/// subscriber and does not affect anyone else.
pub async fn fan_out(registry: &SubscriberRegistry, event: &SessionEvent) -> FanOutReport {
    let mut report = FanOutReport::default();

    for subscriber in registry.snapshot().await {
        match subscriber.deliver(event) {
            Ok(()) => report.delivered = report.delivered.saturating_add(1),
            Err(e) => {
                debug!(error = %e, "Delivery failed, dropping subscriber");
                report.pruned.push(subscriber.id());
            }
        }
    }

    for id in &report.pruned {
        registry.unregister(*id).await;
    }

    if !report.pruned.is_empty() {
        warn!(
            pruned = report.pruned.len(),
            delivered = report.delivered,
            "Pruned unreachable subscribers"
        );
    }

    report
}

/// The single consumer of the session event stream.
#[derive(Debug)]
pub struct BroadcastEngine;

impl BroadcastEngine {
    /// Spawn the dispatcher task.
    ///
    /// Returns the publisher producers should use and the dispatcher's
    /// handle. The dispatcher exits after every publisher clone is dropped
    /// and the queue is drained, yielding the number of events it
    /// dispatched.
    pub fn spawn(registry: Arc<SubscriberRegistry>) -> (EventPublisher, JoinHandle<u64>) {
        let (publisher, rx) = EventPublisher::channel();
        let handle = tokio::spawn(dispatch(rx, registry));
        (publisher, handle)
    }
}

async fn dispatch(
    mut rx: mpsc::UnboundedReceiver<SessionEvent>,
    registry: Arc<SubscriberRegistry>,
) -> u64 {
    let mut dispatched: u64 = 0;

    while let Some(event) = rx.recv().await {
        let report = fan_out(&registry, &event).await;
        dispatched = dispatched.saturating_add(1);
        trace!(?event, delivered = report.delivered, "Event dispatched");
    }

    info!(dispatched, "Broadcast dispatcher stopped");
    dispatched
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chessvote_types::Move;

    use super::*;
    use crate::registry::Subscriber;

    async fn registry_with(n: usize) -> (Arc<SubscriberRegistry>, Vec<mpsc::Receiver<SessionEvent>>) {
        let registry = Arc::new(SubscriberRegistry::new());
        let mut receivers = Vec::with_capacity(n);
        for _ in 0..n {
            let (sub, rx) = Subscriber::channel();
            registry.register(sub).await;
            receivers.push(rx);
        }
        (registry, receivers)
    }

    #[tokio::test]
    async fn every_subscriber_gets_every_event_in_order() {
        let (registry, mut receivers) = registry_with(4).await;
        let (publisher, handle) = BroadcastEngine::spawn(Arc::clone(&registry));

        let events = vec![
            SessionEvent::voting(3),
            SessionEvent::voting(2),
            SessionEvent::idle(),
            SessionEvent::ResolvedMove(Move::new("e2", "e4")),
        ];
        for event in &events {
            assert!(publisher.publish(event.clone()));
        }

        for rx in &mut receivers {
            for expected in &events {
                assert_eq!(rx.recv().await.as_ref(), Some(expected));
            }
        }

        drop(publisher);
        assert_eq!(handle.await.unwrap(), 4);
    }

    #[tokio::test]
    async fn single_publish_reaches_each_subscriber_once() {
        let (registry, mut receivers) = registry_with(3).await;
        let report = fan_out(&registry, &SessionEvent::voting(9)).await;

        assert_eq!(report.delivered, 3);
        assert!(report.pruned.is_empty());
        for rx in &mut receivers {
            assert_eq!(rx.try_recv().unwrap(), SessionEvent::voting(9));
            assert!(rx.try_recv().is_err());
        }
    }

    #[tokio::test]
    async fn failed_subscriber_is_pruned_and_others_still_receive() {
        let (registry, mut receivers) = registry_with(3).await;
        drop(receivers.remove(1));

        let report = fan_out(&registry, &SessionEvent::idle()).await;

        assert_eq!(report.delivered, 2);
        assert_eq!(report.pruned.len(), 1);
        assert_eq!(registry.len().await, 2);
        for rx in &mut receivers {
            assert_eq!(rx.try_recv().unwrap(), SessionEvent::idle());
        }
    }

    #[tokio::test]
    async fn dispatcher_prunes_closed_channels() {
        let (registry, mut receivers) = registry_with(2).await;
        drop(receivers.pop());
        let (publisher, handle) = BroadcastEngine::spawn(Arc::clone(&registry));

        publisher.publish(SessionEvent::voting(1));
        drop(publisher);
        handle.await.unwrap();

        assert_eq!(registry.len().await, 1);
        let survivor = receivers.first_mut().unwrap();
        assert_eq!(survivor.recv().await, Some(SessionEvent::voting(1)));
    }

    #[tokio::test]
    async fn stalled_subscriber_is_pruned_and_others_keep_up() {
        let (registry, mut receivers) = registry_with(2).await;
        let (stalled, _stalled_rx) = Subscriber::with_capacity(2);
        let stalled_id = stalled.id();
        registry.register(stalled).await;

        for remaining in [3, 2] {
            let report = fan_out(&registry, &SessionEvent::voting(remaining)).await;
            assert_eq!(report.delivered, 3);
        }

        // The stalled viewer never read; its queue is full now.
        let report = fan_out(&registry, &SessionEvent::voting(1)).await;
        assert_eq!(report.delivered, 2);
        assert_eq!(report.pruned, vec![stalled_id]);
        assert!(!registry.contains(stalled_id).await);

        for rx in &mut receivers {
            for remaining in [3, 2, 1] {
                assert_eq!(rx.try_recv().unwrap(), SessionEvent::voting(remaining));
            }
        }
    }

    #[tokio::test]
    async fn late_subscribers_get_no_replay() {
        let (registry, _receivers) = registry_with(1).await;
        fan_out(&registry, &SessionEvent::voting(5)).await;

        let (late, mut late_rx) = Subscriber::channel();
        registry.register(late).await;
        fan_out(&registry, &SessionEvent::voting(4)).await;

        assert_eq!(late_rx.try_recv().unwrap(), SessionEvent::voting(4));
        assert!(late_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn publish_after_shutdown_reports_failure() {
        let (publisher, rx) = EventPublisher::channel();
        drop(rx);
        assert!(!publisher.publish(SessionEvent::idle()));
    }
}
