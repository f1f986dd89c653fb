//! LogSink - logs events and property changes via tracing

use contracts::{ContractError, Event, EventSink, InstallContext, SharedStorage};
use tracing::{info, instrument};

/// Sink that writes every delivery as a structured log line
pub struct LogSink {
    name: String,
    tracked: u64,
}

impl LogSink {
    /// Create a new LogSink with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tracked: 0,
        }
    }
}

impl EventSink for LogSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(name = "log_sink_start", skip_all, fields(sink = %self.name))]
    async fn start(
        &mut self,
        context: &InstallContext,
        storage: &SharedStorage,
    ) -> Result<(), ContractError> {
        info!(
            sink = %self.name,
            app_id = %context.app_id,
            app_version = %context.app_version,
            launch_count = context.launch_count,
            storage_prefix = storage.prefix(),
            "LogSink started"
        );
        Ok(())
    }

    #[instrument(
        name = "log_sink_track",
        skip(self, event),
        fields(sink = %self.name, event = event.name())
    )]
    async fn track(&mut self, event: &Event) -> Result<(), ContractError> {
        self.tracked += 1;
        info!(
            sink = %self.name,
            event = event.name(),
            params = %event,
            time_delta = ?event.time_delta(),
            "Event tracked"
        );
        Ok(())
    }

    async fn set_property(
        &mut self,
        name: &str,
        value: Option<&str>,
    ) -> Result<(), ContractError> {
        info!(sink = %self.name, property = name, value = ?value, "User property set");
        Ok(())
    }

    #[instrument(name = "log_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        // Nothing to flush for log sink
        Ok(())
    }

    #[instrument(name = "log_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        info!(sink = %self.name, tracked = self.tracked, "LogSink closed");
        Ok(())
    }
}
