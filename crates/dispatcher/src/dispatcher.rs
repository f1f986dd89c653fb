//! Dispatcher - buffers deliveries until sinks are ready, then fans out
//!
//! All state lives in a single task fed by one unbounded command channel:
//! the order in which commands enter the channel is the order in which they
//! are buffered, flushed and forwarded. Callers never block and never see a
//! delivery failure.

use contracts::{
    Event, EventCallback, InstallContext, SharedStorage, SinkConfig, SinkType, TIME_DELTA_PARAM,
};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::error::DispatcherError;
use crate::fifo::FifoBuffer;
use crate::handle::{Delivery, SinkHandle};
use crate::metrics::MetricsSnapshot;
use crate::sinks::{LogSink, MemorySink, UdpSink};
use crate::tap::{EventTap, TapSubscription};

/// An event waiting for sinks, stamped on admission
#[derive(Debug, Clone)]
pub struct QueuedEvent {
    event: Event,
    enqueued_at: Instant,
}

impl QueuedEvent {
    fn new(event: Event, enqueued_at: Instant) -> Self {
        Self { event, enqueued_at }
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn enqueued_at(&self) -> Instant {
        self.enqueued_at
    }

    /// Consume into the event to forward, annotated with its time in the buffer
    fn into_flushed(self) -> (Event, f64) {
        let waited = self.enqueued_at.elapsed().as_secs_f64();
        (self.event.with_param(TIME_DELTA_PARAM, waited), waited)
    }
}

#[derive(Debug)]
enum Pending {
    Event(QueuedEvent),
    Property { name: String, value: Option<String> },
}

enum Command {
    Track {
        event: Event,
        admitted_at: Instant,
    },
    Property {
        name: String,
        value: Option<String>,
    },
    SetupSinks {
        sinks: Vec<SinkHandle>,
        ack: oneshot::Sender<usize>,
    },
    Metrics(oneshot::Sender<Vec<(String, MetricsSnapshot)>>),
    BufferedLen(oneshot::Sender<usize>),
    Shutdown(oneshot::Sender<()>),
}

/// Cheap, cloneable entry point into a running dispatcher
#[derive(Clone)]
pub struct DispatcherHandle {
    tx: mpsc::UnboundedSender<Command>,
    tap: EventTap,
}

impl DispatcherHandle {
    /// Submit an event
    ///
    /// Buffered until sinks are set up, forwarded immediately afterwards.
    pub fn add_event(&self, event: Event) {
        let command = Command::Track {
            event,
            admitted_at: Instant::now(),
        };
        if let Err(mpsc::error::SendError(Command::Track { event, .. })) = self.tx.send(command) {
            warn!(event = event.name(), "Dispatcher stopped, event dropped");
        }
    }

    /// Set (`Some`) or clear (`None`) a user property on every sink
    pub fn set_property(&self, name: impl Into<String>, value: Option<String>) {
        let name = name.into();
        if self.tx.send(Command::Property { name, value }).is_err() {
            warn!("Dispatcher stopped, property update dropped");
        }
    }

    /// Register ready sinks and flush everything buffered so far
    ///
    /// Resolves once the buffer has been handed to the sinks' queues and
    /// returns the number of buffered events that were flushed. Calling it
    /// again adds more sinks; they only see deliveries from then on.
    ///
    /// # Errors
    /// Returns [`DispatcherError::Stopped`] if the dispatcher is gone
    pub async fn setup_sinks(&self, sinks: Vec<SinkHandle>) -> Result<usize, DispatcherError> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(Command::SetupSinks { sinks, ack })
            .map_err(|_| DispatcherError::Stopped)?;
        done.await.map_err(|_| DispatcherError::Stopped)
    }

    /// Per-sink metrics snapshots
    pub async fn metrics(&self) -> Result<Vec<(String, MetricsSnapshot)>, DispatcherError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::Metrics(reply))
            .map_err(|_| DispatcherError::Stopped)?;
        rx.await.map_err(|_| DispatcherError::Stopped)
    }

    /// Number of deliveries still waiting for sinks
    pub async fn buffered_len(&self) -> Result<usize, DispatcherError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Command::BufferedLen(reply))
            .map_err(|_| DispatcherError::Stopped)?;
        rx.await.map_err(|_| DispatcherError::Stopped)
    }

    /// Observe every event as it is forwarded to sinks
    pub fn subscribe(&self) -> TapSubscription {
        self.tap.subscribe()
    }

    /// Callback form of [`add_event`](Self::add_event) for producers
    pub fn callback(&self) -> EventCallback {
        let handle = self.clone();
        Arc::new(move |event| handle.add_event(event))
    }
}

/// Owner of the dispatcher task
pub struct Dispatcher {
    handle: DispatcherHandle,
    task: JoinHandle<()>,
}

impl Dispatcher {
    /// Spawn an empty dispatcher; everything is buffered until sinks arrive
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let tap = EventTap::new();

        let state = DispatcherState {
            buffer: FifoBuffer::new(),
            sinks: Vec::new(),
            tap: tap.clone(),
            forwarded: 0,
        };
        let task = tokio::spawn(state.run(rx));

        Self {
            handle: DispatcherHandle { tx, tap },
            task,
        }
    }

    pub fn handle(&self) -> DispatcherHandle {
        self.handle.clone()
    }

    /// Stop accepting work, drain every sink and wait for the task
    ///
    /// Deliveries still buffered (no sinks were ever set up) are dropped
    /// with a warning.
    #[instrument(name = "dispatcher_shutdown", skip(self))]
    pub async fn shutdown(self) {
        let (ack, done) = oneshot::channel();
        if self.handle.tx.send(Command::Shutdown(ack)).is_ok() {
            let _ = done.await;
        }
        if let Err(e) = self.task.await {
            error!(error = ?e, "Dispatcher task panicked");
        }
    }
}

struct DispatcherState {
    buffer: FifoBuffer<Pending>,
    sinks: Vec<SinkHandle>,
    tap: EventTap,
    forwarded: u64,
}

impl DispatcherState {
    #[instrument(name = "dispatcher_run", skip_all)]
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<Command>) {
        info!("Dispatcher started, buffering until sinks are ready");

        while let Some(command) = rx.recv().await {
            match command {
                Command::Track { event, admitted_at } => self.admit_event(event, admitted_at),
                Command::Property { name, value } => self.admit_property(name, value),
                Command::SetupSinks { sinks, ack } => {
                    let flushed = self.setup_sinks(sinks);
                    let _ = ack.send(flushed);
                }
                Command::Metrics(reply) => {
                    let _ = reply.send(self.metrics());
                }
                Command::BufferedLen(reply) => {
                    let _ = reply.send(self.buffer.len());
                }
                Command::Shutdown(ack) => {
                    self.shutdown().await;
                    let _ = ack.send(());
                    return;
                }
            }
        }

        self.shutdown().await;
    }

    fn is_ready(&self) -> bool {
        !self.sinks.is_empty()
    }

    fn admit_event(&mut self, event: Event, admitted_at: Instant) {
        if self.is_ready() {
            self.forward_event(event);
            return;
        }

        debug!(event = event.name(), "Buffering event, sinks not ready");
        self.buffer
            .enqueue(Pending::Event(QueuedEvent::new(event, admitted_at)));
        observability::record_event_buffered();
        observability::record_buffer_depth(self.buffer.len());
    }

    fn admit_property(&mut self, name: String, value: Option<String>) {
        if self.is_ready() {
            self.forward(Delivery::Property { name, value });
            return;
        }

        self.buffer.enqueue(Pending::Property { name, value });
        observability::record_buffer_depth(self.buffer.len());
    }

    #[instrument(name = "dispatcher_setup_sinks", skip_all, fields(new_sinks = sinks.len()))]
    fn setup_sinks(&mut self, sinks: Vec<SinkHandle>) -> usize {
        if sinks.is_empty() {
            warn!(
                buffered = self.buffer.len(),
                "setup_sinks called with no sinks, still buffering"
            );
            return 0;
        }

        for sink in &sinks {
            info!(sink = sink.name(), "Sink registered");
        }
        self.sinks.extend(sinks);
        self.flush()
    }

    fn flush(&mut self) -> usize {
        let mut flushed = 0;
        let mut max_wait = 0.0_f64;

        while let Some(pending) = self.buffer.dequeue() {
            match pending {
                Pending::Event(queued) => {
                    let (event, waited) = queued.into_flushed();
                    observability::record_queue_latency_ms(waited * 1000.0);
                    max_wait = max_wait.max(waited);
                    self.forward_event(event);
                    flushed += 1;
                }
                Pending::Property { name, value } => {
                    self.forward(Delivery::Property { name, value });
                }
            }
        }

        observability::record_events_flushed(flushed);
        observability::record_buffer_depth(0);
        if flushed > 0 {
            info!(flushed, max_wait_secs = max_wait, "Buffered events flushed");
        }
        flushed
    }

    fn forward_event(&mut self, event: Event) {
        self.forward(Delivery::Track(event.clone()));
        self.tap.publish(&event);
        self.forwarded += 1;
    }

    fn forward(&self, delivery: Delivery) {
        if let Some((last, rest)) = self.sinks.split_last() {
            for sink in rest {
                sink.send(delivery.clone());
            }
            last.send(delivery);
        }
    }

    fn metrics(&self) -> Vec<(String, MetricsSnapshot)> {
        self.sinks
            .iter()
            .map(|h| (h.name().to_string(), h.metrics().snapshot()))
            .collect()
    }

    async fn shutdown(&mut self) {
        if !self.buffer.is_empty() {
            warn!(
                undelivered = self.buffer.len(),
                "Dispatcher stopping before sinks were set up, dropping buffered deliveries"
            );
        }

        info!(
            forwarded = self.forwarded,
            sinks = self.sinks.len(),
            "Dispatcher shutting down"
        );
        for handle in self.sinks.drain(..) {
            handle.shutdown().await;
        }
        info!("Dispatcher shutdown complete");
    }
}

/// Create and start a SinkHandle from configuration
#[instrument(
    name = "dispatcher_create_sink_handle",
    skip(config, context, storage),
    fields(sink = %config.name, sink_type = ?config.sink_type)
)]
pub async fn create_sink_handle(
    config: &SinkConfig,
    context: &InstallContext,
    storage: &SharedStorage,
) -> Result<SinkHandle, DispatcherError> {
    match config.sink_type {
        SinkType::Log => SinkHandle::start(LogSink::new(&config.name), context, storage).await,
        SinkType::Udp => {
            let sink = UdpSink::from_params(&config.name, &config.params)
                .map_err(|e| DispatcherError::sink_creation(&config.name, e.to_string()))?;
            SinkHandle::start(sink, context, storage).await
        }
        SinkType::Memory => {
            SinkHandle::start(MemorySink::new(&config.name), context, storage).await
        }
    }
}

/// Start every configured sink, in order
///
/// # Errors
/// Fails on the first sink that cannot start; sinks started before it are
/// shut down again.
#[instrument(
    name = "dispatcher_create_sink_handles",
    skip_all,
    fields(sink_count = configs.len())
)]
pub async fn create_sink_handles(
    configs: &[SinkConfig],
    context: &InstallContext,
    storage: &SharedStorage,
) -> Result<Vec<SinkHandle>, DispatcherError> {
    let mut handles = Vec::with_capacity(configs.len());
    for config in configs {
        match create_sink_handle(config, context, storage).await {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                for handle in handles {
                    handle.shutdown().await;
                }
                return Err(e);
            }
        }
    }
    Ok(handles)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sinks::MemoryRecord;
    use crate::store::MemoryStore;
    use contracts::{ContractError, EventSink};
    use std::collections::HashMap;
    use tokio::time::{sleep, Duration};

    fn memory_sink(name: &str) -> (SinkHandle, MemoryRecord) {
        let sink = MemorySink::new(name);
        let record = sink.record();
        (SinkHandle::spawn(sink), record)
    }

    struct FailingSink;

    impl EventSink for FailingSink {
        fn name(&self) -> &str {
            "failing"
        }

        async fn start(
            &mut self,
            _context: &InstallContext,
            _storage: &SharedStorage,
        ) -> Result<(), ContractError> {
            Ok(())
        }

        async fn track(&mut self, _event: &Event) -> Result<(), ContractError> {
            Err(ContractError::sink_write("failing", "always fails"))
        }

        async fn set_property(
            &mut self,
            _name: &str,
            _value: Option<&str>,
        ) -> Result<(), ContractError> {
            Err(ContractError::sink_write("failing", "always fails"))
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_buffered_events_flush_in_order_to_every_sink() {
        let dispatcher = Dispatcher::spawn();
        let handle = dispatcher.handle();

        for i in 0..100 {
            handle.add_event(Event::new(format!("e{i}")));
        }
        assert_eq!(handle.buffered_len().await.unwrap(), 100);

        let (first, first_record) = memory_sink("first");
        let (second, second_record) = memory_sink("second");
        let flushed = handle.setup_sinks(vec![first, second]).await.unwrap();
        assert_eq!(flushed, 100);
        assert_eq!(handle.buffered_len().await.unwrap(), 0);

        dispatcher.shutdown().await;

        let expected: Vec<String> = (0..100).map(|i| format!("e{i}")).collect();
        assert_eq!(first_record.event_names(), expected);
        assert_eq!(second_record.event_names(), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flushed_events_carry_time_delta() {
        let dispatcher = Dispatcher::spawn();
        let handle = dispatcher.handle();

        handle.add_event(Event::new("early"));
        sleep(Duration::from_millis(300)).await;
        handle.add_event(Event::new("late"));
        sleep(Duration::from_millis(200)).await;

        let (sink, record) = memory_sink("mem");
        handle.setup_sinks(vec![sink]).await.unwrap();
        handle.add_event(Event::new("live"));
        dispatcher.shutdown().await;

        let events = record.events();
        assert_eq!(events.len(), 3);

        let early = events[0].time_delta().unwrap();
        let late = events[1].time_delta().unwrap();
        assert!((early - 0.5).abs() < 0.05, "early timeDelta was {early}");
        assert!((late - 0.2).abs() < 0.05, "late timeDelta was {late}");

        // Forwarded straight through once ready
        assert_eq!(events[2].name(), "live");
        assert!(events[2].time_delta().is_none());
    }

    #[tokio::test]
    async fn test_events_added_during_setup_follow_the_flush() {
        let dispatcher = Dispatcher::spawn();
        let handle = dispatcher.handle();

        handle.add_event(Event::new("a"));
        handle.add_event(Event::new("b"));

        let (sink, record) = memory_sink("mem");
        let producer = handle.clone();
        let (flushed, ()) = tokio::join!(handle.setup_sinks(vec![sink]), async move {
            producer.add_event(Event::new("c"));
        });
        assert_eq!(flushed.unwrap(), 2);

        dispatcher.shutdown().await;
        assert_eq!(record.event_names(), vec!["a", "b", "c"]);
        assert!(record.events()[2].time_delta().is_none());
    }

    #[tokio::test]
    async fn test_properties_keep_their_place_in_line() {
        let dispatcher = Dispatcher::spawn();
        let handle = dispatcher.handle();

        handle.add_event(Event::new("a"));
        handle.set_property("plan", Some("pro".to_string()));
        handle.add_event(Event::new("b"));
        handle.set_property("plan", None);

        let (sink, record) = memory_sink("mem");
        assert_eq!(handle.setup_sinks(vec![sink]).await.unwrap(), 2);
        dispatcher.shutdown().await;

        let deliveries = record.deliveries();
        assert_eq!(deliveries.len(), 4);
        assert!(matches!(&deliveries[0], Delivery::Track(e) if e.name() == "a"));
        assert_eq!(
            deliveries[1],
            Delivery::Property {
                name: "plan".into(),
                value: Some("pro".into())
            }
        );
        assert!(matches!(&deliveries[2], Delivery::Track(e) if e.name() == "b"));
        assert_eq!(
            deliveries[3],
            Delivery::Property {
                name: "plan".into(),
                value: None
            }
        );
    }

    #[tokio::test]
    async fn test_failing_sink_does_not_affect_others() {
        let dispatcher = Dispatcher::spawn();
        let handle = dispatcher.handle();

        handle.add_event(Event::new("before"));
        let (healthy, record) = memory_sink("healthy");
        handle
            .setup_sinks(vec![SinkHandle::spawn(FailingSink), healthy])
            .await
            .unwrap();
        handle.add_event(Event::new("after"));

        // Let both workers drain
        sleep(Duration::from_millis(50)).await;
        let metrics: HashMap<String, MetricsSnapshot> =
            handle.metrics().await.unwrap().into_iter().collect();
        assert_eq!(metrics["failing"].failure_count, 2);
        assert_eq!(metrics["healthy"].delivered_count, 2);

        dispatcher.shutdown().await;
        assert_eq!(record.event_names(), vec!["before", "after"]);
    }

    #[tokio::test]
    async fn test_empty_setup_keeps_buffering() {
        let dispatcher = Dispatcher::spawn();
        let handle = dispatcher.handle();

        handle.add_event(Event::new("waiting"));
        assert_eq!(handle.setup_sinks(Vec::new()).await.unwrap(), 0);
        assert_eq!(handle.buffered_len().await.unwrap(), 1);

        let (sink, record) = memory_sink("mem");
        assert_eq!(handle.setup_sinks(vec![sink]).await.unwrap(), 1);
        dispatcher.shutdown().await;
        assert_eq!(record.event_names(), vec!["waiting"]);
    }

    #[tokio::test]
    async fn test_late_sink_only_sees_later_events() {
        let dispatcher = Dispatcher::spawn();
        let handle = dispatcher.handle();

        let (early, early_record) = memory_sink("early");
        handle.setup_sinks(vec![early]).await.unwrap();
        handle.add_event(Event::new("one"));

        let (late, late_record) = memory_sink("late");
        assert_eq!(handle.setup_sinks(vec![late]).await.unwrap(), 0);
        handle.add_event(Event::new("two"));

        dispatcher.shutdown().await;
        assert_eq!(early_record.event_names(), vec!["one", "two"]);
        assert_eq!(late_record.event_names(), vec!["two"]);
    }

    #[tokio::test]
    async fn test_tap_observes_forwarded_events() {
        let dispatcher = Dispatcher::spawn();
        let handle = dispatcher.handle();
        let mut tap = handle.subscribe();

        let callback = handle.callback();
        callback(Event::new("buffered"));
        assert!(tap.try_recv().is_none());

        let (sink, _record) = memory_sink("mem");
        handle.setup_sinks(vec![sink]).await.unwrap();
        callback(Event::new("live"));

        let first = tap.recv().await.unwrap();
        assert_eq!(first.name(), "buffered");
        assert!(first.time_delta().is_some());
        assert_eq!(tap.recv().await.unwrap().name(), "live");

        dispatcher.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_tapped_events_are_already_queued_to_sinks() {
        const EVENTS: u64 = 200;

        let dispatcher = Dispatcher::spawn();
        let handle = dispatcher.handle();
        let mut tap = handle.subscribe();

        let (sink, _record) = memory_sink("mem");
        let metrics = Arc::clone(sink.metrics());
        handle.setup_sinks(vec![sink]).await.unwrap();

        let producer = handle.clone();
        let producing = tokio::spawn(async move {
            for i in 0..EVENTS {
                producer.add_event(Event::new("tick").with_param("i", i as i64));
            }
        });

        for seen in 1..=EVENTS {
            tap.recv().await.unwrap();
            let handed_over = metrics.queue_len() as u64
                + metrics.delivered_count()
                + metrics.failure_count();
            assert!(
                handed_over >= seen,
                "tap saw {seen} events but sink only got {handed_over}"
            );
        }

        producing.await.unwrap();
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_calls_after_shutdown_report_stopped() {
        let dispatcher = Dispatcher::spawn();
        let handle = dispatcher.handle();
        dispatcher.shutdown().await;

        // Never panics, never blocks
        handle.add_event(Event::new("late"));
        assert!(matches!(
            handle.buffered_len().await,
            Err(DispatcherError::Stopped)
        ));
        assert!(matches!(
            handle.setup_sinks(Vec::new()).await,
            Err(DispatcherError::Stopped)
        ));
    }

    #[tokio::test]
    async fn test_create_sink_handles_from_config() {
        let storage = SharedStorage::new("t", Arc::new(MemoryStore::new()));
        let configs = vec![
            SinkConfig {
                name: "console".to_string(),
                sink_type: SinkType::Log,
                params: HashMap::new(),
            },
            SinkConfig {
                name: "recorder".to_string(),
                sink_type: SinkType::Memory,
                params: HashMap::new(),
            },
        ];

        let handles = create_sink_handles(&configs, &InstallContext::default(), &storage)
            .await
            .unwrap();
        let names: Vec<&str> = handles.iter().map(SinkHandle::name).collect();
        assert_eq!(names, vec!["console", "recorder"]);

        for handle in handles {
            handle.shutdown().await;
        }
    }

    #[tokio::test]
    async fn test_udp_sink_without_addr_fails_creation() {
        let storage = SharedStorage::new("t", Arc::new(MemoryStore::new()));
        let config = SinkConfig {
            name: "collector".to_string(),
            sink_type: SinkType::Udp,
            params: HashMap::new(),
        };

        let result = create_sink_handle(&config, &InstallContext::default(), &storage).await;
        assert!(matches!(
            result,
            Err(DispatcherError::SinkCreation { ref name, .. }) if name == "collector"
        ));
    }
}
