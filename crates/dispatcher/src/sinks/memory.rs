//! MemorySink - records deliveries in memory
//!
//! Used by tests and by `replay` to inspect exactly what a sink received.

use std::sync::{Arc, Mutex, PoisonError};

use contracts::{ContractError, Event, EventSink, InstallContext, SharedStorage};
use tracing::debug;

use crate::handle::Delivery;

/// Shared view of everything a [`MemorySink`] received
#[derive(Debug, Clone, Default)]
pub struct MemoryRecord {
    deliveries: Arc<Mutex<Vec<Delivery>>>,
}

impl MemoryRecord {
    fn push(&self, delivery: Delivery) {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(delivery);
    }

    /// All deliveries in arrival order
    pub fn deliveries(&self) -> Vec<Delivery> {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Tracked events in arrival order
    pub fn events(&self) -> Vec<Event> {
        self.deliveries()
            .into_iter()
            .filter_map(|d| match d {
                Delivery::Track(event) => Some(event),
                Delivery::Property { .. } => None,
            })
            .collect()
    }

    /// Names of tracked events in arrival order
    pub fn event_names(&self) -> Vec<String> {
        self.events()
            .iter()
            .map(|e| e.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.deliveries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Sink that keeps every delivery in a shared [`MemoryRecord`]
pub struct MemorySink {
    name: String,
    record: MemoryRecord,
}

impl MemorySink {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            record: MemoryRecord::default(),
        }
    }

    /// Handle for reading deliveries after the sink moved into its worker
    pub fn record(&self) -> MemoryRecord {
        self.record.clone()
    }
}

impl EventSink for MemorySink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(
        &mut self,
        _context: &InstallContext,
        _storage: &SharedStorage,
    ) -> Result<(), ContractError> {
        Ok(())
    }

    async fn track(&mut self, event: &Event) -> Result<(), ContractError> {
        self.record.push(Delivery::Track(event.clone()));
        Ok(())
    }

    async fn set_property(
        &mut self,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), ContractError> {
        self.record.push(Delivery::Property {
            name: name.to_string(),
            value: value.map(str::to_string),
        });
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), ContractError> {
        Ok(())
    }

    async fn close(&mut self) -> Result<(), ContractError> {
        debug!(sink = %self.name, deliveries = self.record.len(), "MemorySink closed");
        Ok(())
    }
}
