//! EventSink trait - Dispatcher output interface
//!
//! Defines the abstract interface for Sinks.

use crate::{ContractError, Event, InstallContext, SharedStorage};

/// Event output trait
///
/// All sink implementations must implement this trait. Trimming is a sink
/// policy: the dispatcher hands every event and property through
/// `trim_event` / `trim_property` before `track` / `set_property`.
#[trait_variant::make(EventSink: Send)]
pub trait LocalEventSink {
    /// Sink name (used for logging/metrics)
    fn name(&self) -> &str;

    /// Prepare the sink before any event is delivered
    ///
    /// # Errors
    /// Returns start error; the sink is then not registered
    async fn start(
        &mut self,
        context: &InstallContext,
        storage: &SharedStorage,
    ) -> Result<(), ContractError>;

    /// Record one event
    ///
    /// # Errors
    /// Returns write error (should include context)
    async fn track(&mut self, event: &Event) -> Result<(), ContractError>;

    /// Set or clear (`None`) a user property
    async fn set_property(&mut self, name: &str, value: Option<&str>)
        -> Result<(), ContractError>;

    /// Flush buffer (if any)
    async fn flush(&mut self) -> Result<(), ContractError>;

    /// Close sink
    async fn close(&mut self) -> Result<(), ContractError>;

    /// Apply the sink's length/charset policy to an event
    fn trim_event(&self, event: &Event) -> Event {
        event.clone()
    }

    /// Apply the sink's length/charset policy to a user property
    fn trim_property(&self, name: &str, value: Option<&str>) -> (String, Option<String>) {
        (name.to_string(), value.map(str::to_string))
    }
}
