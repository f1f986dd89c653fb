//! SinkHandle - manages a sink with isolated queue and worker task
//!
//! Every sink runs behind its own worker. The dispatcher only enqueues into
//! the worker's queue, so slow sink I/O never holds up buffer mutation, and
//! a failing sink never prevents delivery to the others. Queues are
//! unbounded: events are never dropped for backpressure.

use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, instrument};

use contracts::{Event, EventSink, InstallContext, SharedStorage};

use crate::error::DispatcherError;
use crate::metrics::SinkMetrics;

/// One unit of work for a sink
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
    /// Record an event
    Track(Event),
    /// Set (`Some`) or clear (`None`) a user property
    Property { name: String, value: Option<String> },
}

/// Handle to a running sink worker
pub struct SinkHandle {
    /// Sink name
    name: String,
    /// Channel to send deliveries to worker
    tx: mpsc::UnboundedSender<Delivery>,
    /// Shared metrics
    metrics: Arc<SinkMetrics>,
    /// Worker task handle
    worker_handle: JoinHandle<()>,
}

impl SinkHandle {
    /// Start the sink, then spawn its worker
    ///
    /// # Errors
    /// Returns [`DispatcherError::SinkCreation`] if the sink's `start` fails
    #[instrument(name = "sink_handle_start", skip_all, fields(sink = %sink.name()))]
    pub async fn start<S: EventSink + Send + 'static>(
        mut sink: S,
        context: &InstallContext,
        storage: &SharedStorage,
    ) -> Result<Self, DispatcherError> {
        sink.start(context, storage)
            .await
            .map_err(|e| DispatcherError::sink_creation(sink.name(), e.to_string()))?;
        Ok(Self::spawn(sink))
    }

    /// Spawn the worker task for an already started sink
    pub fn spawn<S: EventSink + Send + 'static>(sink: S) -> Self {
        let name = sink.name().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let metrics = Arc::new(SinkMetrics::new());

        let worker_metrics = Arc::clone(&metrics);
        let worker_name = name.clone();

        let worker_handle = tokio::spawn(async move {
            sink_worker(sink, rx, worker_metrics, worker_name).await;
        });

        Self {
            name,
            tx,
            metrics,
            worker_handle,
        }
    }

    /// Get sink name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get current metrics
    pub fn metrics(&self) -> &Arc<SinkMetrics> {
        &self.metrics
    }

    /// Queue a delivery for the sink (non-blocking)
    ///
    /// Returns false only if the worker is gone (it panicked); the delivery
    /// is then counted as lost.
    pub fn send(&self, delivery: Delivery) -> bool {
        self.metrics.inc_queue_len();
        match self.tx.send(delivery) {
            Ok(()) => true,
            Err(_) => {
                self.metrics.dec_queue_len();
                self.metrics.inc_lost_count();
                observability::record_event_dispatched(&self.name, false);
                error!(sink = %self.name, "Sink worker closed unexpectedly");
                false
            }
        }
    }

    /// Shutdown the sink worker gracefully
    ///
    /// Pending deliveries are drained before the sink is flushed and closed.
    #[instrument(name = "sink_handle_shutdown", skip(self), fields(sink = %self.name))]
    pub async fn shutdown(self) {
        // Drop sender to signal worker to stop
        drop(self.tx);
        // Wait for worker to finish
        if let Err(e) = self.worker_handle.await {
            error!(sink = %self.name, error = ?e, "Worker task panicked");
        }
        debug!(sink = %self.name, "SinkHandle shutdown complete");
    }
}

/// Worker task that consumes deliveries and hands them to the sink
#[instrument(
    name = "sink_worker_loop",
    skip(sink, rx, metrics),
    fields(sink = %name)
)]
async fn sink_worker<S: EventSink>(
    mut sink: S,
    mut rx: mpsc::UnboundedReceiver<Delivery>,
    metrics: Arc<SinkMetrics>,
    name: String,
) {
    debug!(sink = %name, "Sink worker started");

    while let Some(delivery) = rx.recv().await {
        let result = match &delivery {
            Delivery::Track(event) => {
                let trimmed = sink.trim_event(event);
                sink.track(&trimmed).await
            }
            Delivery::Property { name: key, value } => {
                let (key, value) = sink.trim_property(key, value.as_deref());
                sink.set_property(&key, value.as_deref()).await
            }
        };

        match result {
            Ok(()) => {
                metrics.inc_delivered_count();
                observability::record_event_dispatched(&name, true);
            }
            Err(e) => {
                metrics.inc_failure_count();
                observability::record_event_dispatched(&name, false);
                error!(
                    sink = %name,
                    delivery = ?delivery,
                    error = %e,
                    "Delivery failed"
                );
                // Continue processing - don't crash on single failure
            }
        }
        metrics.dec_queue_len();
    }

    // Cleanup
    if let Err(e) = sink.flush().await {
        error!(sink = %name, error = %e, "Flush failed on shutdown");
    }
    if let Err(e) = sink.close().await {
        error!(sink = %name, error = %e, "Close failed on shutdown");
    }

    debug!(sink = %name, "Sink worker stopped");
}
