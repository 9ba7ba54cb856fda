//! Shared application state for the voting API server.
//!
//! [`AppState`] ties together the voting session, the viewer registry, and
//! the rules engine. Constructing it spawns the broadcast dispatcher, so
//! it must be created inside a Tokio runtime.

use std::sync::Arc;
use std::time::Duration;

use chessvote_core::config::ChessvoteConfig;
use chessvote_core::rules::MoveApplier;
use chessvote_core::{BroadcastEngine, Subscriber, SubscriberRegistry, VotingSession};
use chessvote_types::{SessionEvent, SubscriberId};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::info;

/// Request-independent settings the handlers need.
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Round length when `POST /start-voting` names none.
    pub default_duration_secs: u32,
    /// Keepalive ping interval for viewer sockets.
    pub ping_interval: Duration,
    /// Longest a single frame write may take before the viewer is dropped.
    pub send_timeout: Duration,
    /// Events queued per viewer before it is pruned as stalled.
    pub queue_capacity: usize,
    /// CORS allow-list; `*` allows any origin.
    pub allowed_origins: Vec<String>,
}

impl From<&ChessvoteConfig> for ApiSettings {
    fn from(config: &ChessvoteConfig) -> Self {
        Self {
            default_duration_secs: config.voting.default_duration_secs,
            ping_interval: config.websocket.ping_interval(),
            send_timeout: config.websocket.send_timeout(),
            queue_capacity: config.websocket.queue_capacity,
            allowed_origins: config.server.allowed_origins.clone(),
        }
    }
}

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    /// The authoritative voting session.
    pub session: Arc<VotingSession>,
    /// Connected viewer channels.
    pub registry: Arc<SubscriberRegistry>,
    /// Engine that applies moves to the board.
    pub rules: Arc<dyn MoveApplier>,
    /// Handler settings.
    pub settings: ApiSettings,
}

impl AppState {
    /// Build the state and spawn the broadcast dispatcher.
    ///
    /// Returns the dispatcher's handle alongside the state; it finishes
    /// once the session (the only publisher) is dropped.
    pub fn new(config: &ChessvoteConfig, rules: Arc<dyn MoveApplier>) -> (Self, JoinHandle<u64>) {
        let registry = Arc::new(SubscriberRegistry::new());
        let (publisher, dispatcher) = BroadcastEngine::spawn(Arc::clone(&registry));
        let session = Arc::new(VotingSession::new(
            publisher,
            config.voting.tick_interval(),
        ));

        let state = Self {
            session,
            registry,
            rules,
            settings: ApiSettings::from(config),
        };
        (state, dispatcher)
    }

    /// Register a new viewer and return its id and event receiver.
    ///
    /// The receiver holds at most `settings.queue_capacity` undelivered
    /// events; a viewer that falls that far behind is pruned.
    pub async fn connect(&self) -> (SubscriberId, mpsc::Receiver<SessionEvent>) {
        let (subscriber, rx) = Subscriber::with_capacity(self.settings.queue_capacity);
        let id = subscriber.id();
        let total = self.registry.register(subscriber).await;
        info!(%id, total, "Client connected");
        (id, rx)
    }

    /// Remove a viewer. Safe to call for an id already pruned.
    pub async fn disconnect(&self, id: SubscriberId) {
        if self.registry.unregister(id).await {
            let total = self.registry.len().await;
            info!(%id, total, "Client disconnected");
        }
    }

    /// Number of connected viewers.
    pub async fn subscriber_count(&self) -> usize {
        self.registry.len().await
    }
}
