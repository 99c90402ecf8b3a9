//! Typed live events and the subscriber registry
//!
//! Events are serialized once per broadcast and delivered to every
//! registered subscriber. A subscriber whose channel is gone is removed
//! during the broadcast; the per-connection sender task closes the
//! underlying transport when its channel is dropped. No buffering beyond
//! the channel, no retries, no cross-subscriber ordering guarantees.

use std::collections::HashMap;

use axum::extract::ws::Message;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Server-to-client event envelope
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsEvent {
    WorkerStatus {
        status: WorkerStatus,
        message: String,
    },
    NewMatch {
        #[serde(rename = "match")]
        match_: MatchEvent,
    },
    NewLog {
        log: LogEvent,
    },
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkerStatus {
    Running,
    Completed,
}

#[derive(Debug, Clone, Serialize)]
pub struct MatchEvent {
    pub item: String,
    pub url: String,
    pub site: String,
    pub torrent_text: String,
    pub created: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub description: String,
    pub success: bool,
    pub timestamp: String,
}

impl WsEvent {
    pub fn worker_status(status: WorkerStatus, message: impl Into<String>) -> Self {
        Self::WorkerStatus {
            status,
            message: message.into(),
        }
    }

    pub fn new_match(match_: MatchEvent) -> Self {
        Self::NewMatch { match_ }
    }

    pub fn new_log(log: LogEvent) -> Self {
        Self::NewLog { log }
    }
}

/// Thread-safe set of live event subscribers
#[derive(Default)]
pub struct SubscriberRegistry {
    subscribers: Mutex<HashMap<Uuid, mpsc::UnboundedSender<Message>>>,
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscriber. The caller forwards messages from the
    /// returned receiver to its transport and closes the transport when
    /// the channel ends.
    pub fn add(&self) -> (Uuid, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        self.subscribers.lock().insert(id, tx);
        (id, rx)
    }

    pub fn remove(&self, id: Uuid) {
        self.subscribers.lock().remove(&id);
    }

    pub fn count(&self) -> usize {
        self.subscribers.lock().len()
    }

    /// Serialize the event once and deliver it to every subscriber.
    /// Subscribers with failed channels are dropped here.
    pub fn broadcast(&self, event: &WsEvent) {
        let payload = match serde_json::to_string(event) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(error = %e, "Failed to serialize event");
                return;
            }
        };

        let mut subscribers = self.subscribers.lock();
        subscribers.retain(|id, tx| {
            let ok = tx.send(Message::Text(payload.clone().into())).is_ok();
            if !ok {
                tracing::debug!(subscriber = %id, "Dropping dead subscriber");
            }
            ok
        });
    }

    /// Send a close frame to every subscriber and clear the set
    pub fn close_all(&self) {
        let mut subscribers = self.subscribers.lock();
        let count = subscribers.len();
        for tx in subscribers.values() {
            let _ = tx.send(Message::Close(None));
        }
        subscribers.clear();
        if count > 0 {
            tracing::info!(count, "Closed all live subscribers");
        }
    }
}
