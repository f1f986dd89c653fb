//! Tracker - the producer-facing facade
//!
//! Applies the event's dedup policy and hands surviving events to the
//! dispatcher.

use std::sync::Arc;

use contracts::{Event, EventCallback, EventLogCondition, SharedStorage};

use crate::dedup::DedupEvaluator;
use crate::dispatcher::DispatcherHandle;
use crate::error::DispatcherError;
use crate::handle::SinkHandle;
use crate::tap::TapSubscription;

/// Event entry point with dedup applied
#[derive(Clone)]
pub struct Tracker {
    dispatcher: DispatcherHandle,
    dedup: Arc<DedupEvaluator>,
}

impl Tracker {
    pub fn new(dispatcher: DispatcherHandle, storage: SharedStorage) -> Self {
        Self {
            dispatcher,
            dedup: Arc::new(DedupEvaluator::new(storage)),
        }
    }

    /// Log `event` under `condition`; returns whether it was admitted
    pub fn log(&self, event: Event, condition: EventLogCondition) -> bool {
        if !self.dedup.should_forward(event.name(), condition) {
            return false;
        }
        self.dispatcher.add_event(event);
        true
    }

    /// Log with [`EventLogCondition::Always`]
    pub fn track(&self, event: Event) {
        self.dispatcher.add_event(event);
    }

    pub fn set_property(&self, name: impl Into<String>, value: Option<String>) {
        self.dispatcher.set_property(name, value);
    }

    pub async fn setup_sinks(&self, sinks: Vec<SinkHandle>) -> Result<usize, DispatcherError> {
        self.dispatcher.setup_sinks(sinks).await
    }

    pub fn subscribe(&self) -> TapSubscription {
        self.dispatcher.subscribe()
    }

    /// Callback that tracks every event it is given, no dedup
    pub fn callback(&self) -> EventCallback {
        self.dispatcher.callback()
    }

    pub fn dispatcher(&self) -> &DispatcherHandle {
        &self.dispatcher
    }
}
