//! EventTap - best-effort broadcast of delivered events
//!
//! Each subscriber owns an unbounded queue, so a slow or idle subscriber
//! never blocks the dispatcher and never causes other subscribers to miss
//! events. Subscribers whose receiver was dropped are pruned on publish.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::debug;

use contracts::Event;

/// Multi-subscriber tap on the delivery path
#[derive(Clone, Default)]
pub struct EventTap {
    subscribers: Arc<Mutex<Vec<mpsc::UnboundedSender<Event>>>>,
}

impl EventTap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new subscriber
    ///
    /// Only events published after this call are received.
    pub fn subscribe(&self) -> TapSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.push(tx);
        debug!(subscribers = subscribers.len(), "EventTap::subscribe");
        TapSubscription { rx }
    }

    /// Publish a delivered event to every live subscriber
    pub fn publish(&self, event: &Event) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    /// Number of live subscribers (as of the last publish)
    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Receiving end of a tap subscription
pub struct TapSubscription {
    rx: mpsc::UnboundedReceiver<Event>,
}

impl TapSubscription {
    /// Wait for the next delivered event; `None` once the tap is gone
    pub async fn recv(&mut self) -> Option<Event> {
        self.rx.recv().await
    }

    /// Next event if one is already queued
    pub fn try_recv(&mut self) -> Option<Event> {
        self.rx.try_recv().ok()
    }

    /// Take every event queued so far
    pub fn drain(&mut self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}
