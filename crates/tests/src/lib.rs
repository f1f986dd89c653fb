//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试（事件与配置的序列化形态）
//! - 端到端测试：去重 → 缓冲 → sink 扇出 → 旁路订阅
//! - 看门狗事件经由调度器投递

#[cfg(test)]
mod contract_tests {
    use contracts::{Event, EventLogCondition, PipelineConfig, TIME_DELTA_PARAM};

    #[test]
    fn test_event_wire_shape() {
        let event = Event::new("purchase")
            .with_param("amount", 12)
            .with_param("currency", "EUR");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["name"], "purchase");
        assert_eq!(json["params"]["amount"], 12);
        assert_eq!(json["params"]["currency"], "EUR");
        assert!(event.param(TIME_DELTA_PARAM).is_none());
    }

    #[test]
    fn test_default_config_is_usable() {
        let config = PipelineConfig::default();
        assert!(config.storage.path.is_none());
        assert!(config.sinks.is_empty());
        assert_ne!(config.watchdog.stuck_event, config.watchdog.corrected_event);
        assert_eq!(EventLogCondition::default(), EventLogCondition::Always);
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::sync::Arc;
    use std::time::Duration;

    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{
        ContractError, Event, EventLogCondition, EventSink, InstallContext, KeyValueStore,
        ParamValue, SharedStorage, StorageConfig,
    };
    use dispatcher::{
        create_sink_handles, open_storage, Dispatcher, MemoryRecord, MemorySink, MemoryStore,
        SinkHandle, Tracker,
    };
    use watchdog::{ScreenContext, WatchdogState, WatchdogTracker, DURATION_PARAM, SCREEN_PARAM};

    fn install_context() -> InstallContext {
        InstallContext {
            app_id: "e2e".to_string(),
            app_version: "1.0.0".to_string(),
            launch_count: 1,
        }
    }

    fn memory_storage() -> SharedStorage {
        SharedStorage::new("e2e", Arc::new(MemoryStore::new()))
    }

    /// Sink that takes `delay` per event
    struct SlowSink {
        delay: Duration,
        record: MemoryRecord,
        inner: MemorySink,
    }

    impl SlowSink {
        fn new(delay: Duration) -> Self {
            let inner = MemorySink::new("slow");
            Self {
                delay,
                record: inner.record(),
                inner,
            }
        }
    }

    impl EventSink for SlowSink {
        fn name(&self) -> &str {
            "slow"
        }

        async fn start(
            &mut self,
            _context: &InstallContext,
            _storage: &SharedStorage,
        ) -> Result<(), ContractError> {
            Ok(())
        }

        async fn track(&mut self, event: &Event) -> Result<(), ContractError> {
            tokio::time::sleep(self.delay).await;
            self.inner.track(event).await
        }

        async fn set_property(
            &mut self,
            name: &str,
            value: Option<&str>,
        ) -> Result<(), ContractError> {
            self.inner.set_property(name, value).await
        }

        async fn flush(&mut self) -> Result<(), ContractError> {
            Ok(())
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_concurrent_producers_keep_per_producer_order() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: i64 = 50;

        let dispatcher = Dispatcher::spawn();
        let tracker = Tracker::new(dispatcher.handle(), memory_storage());
        let mut tap = tracker.subscribe();

        let mut producers = Vec::new();
        for producer in 0..PRODUCERS {
            let tracker = tracker.clone();
            producers.push(tokio::spawn(async move {
                for seq in 0..PER_PRODUCER {
                    let event = Event::new(format!("p{producer}")).with_param("seq", seq);
                    tracker.track(event);
                    if seq % 10 == 0 {
                        tokio::task::yield_now().await;
                    }
                }
            }));
        }

        // Set up sinks while producers are still running
        let sink = MemorySink::new("mem");
        let record = sink.record();
        tracker
            .setup_sinks(vec![SinkHandle::spawn(sink)])
            .await
            .unwrap();

        for producer in producers {
            producer.await.unwrap();
        }
        dispatcher.shutdown().await;

        let delivered = record.events();
        assert_eq!(delivered.len(), PRODUCERS * PER_PRODUCER as usize);

        for producer in 0..PRODUCERS {
            let name = format!("p{producer}");
            let seqs: Vec<f64> = delivered
                .iter()
                .filter(|e| e.name() == name)
                .filter_map(|e| e.param("seq").and_then(ParamValue::as_f64))
                .collect();
            let expected: Vec<f64> = (0..PER_PRODUCER).map(|s| s as f64).collect();
            assert_eq!(seqs, expected, "order broken for {name}");
        }

        let tapped: Vec<String> = tap.drain().iter().map(|e| e.name().to_string()).collect();
        assert_eq!(tapped, record.event_names());
    }

    #[tokio::test(start_paused = true)]
    async fn test_buffered_events_carry_queue_latency() {
        let dispatcher = Dispatcher::spawn();
        let tracker = Tracker::new(dispatcher.handle(), memory_storage());

        tracker.track(Event::new("early"));
        tracker.set_property("plan", Some("pro".to_string()));
        tokio::time::sleep(Duration::from_millis(1500)).await;

        let sink = MemorySink::new("mem");
        let record = sink.record();
        let flushed = tracker
            .setup_sinks(vec![SinkHandle::spawn(sink)])
            .await
            .unwrap();
        tracker.track(Event::new("live"));
        dispatcher.shutdown().await;

        assert_eq!(flushed, 1);
        let events = record.events();
        assert_eq!(events.len(), 2);

        let delta = events[0].time_delta().unwrap();
        assert!((delta - 1.5).abs() < 0.05, "timeDelta = {delta}");
        assert!(events[1].time_delta().is_none());
        assert_eq!(record.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_sink_does_not_hold_back_others() {
        let dispatcher = Dispatcher::spawn();
        let tracker = Tracker::new(dispatcher.handle(), memory_storage());

        let slow = SlowSink::new(Duration::from_millis(50));
        let slow_record = slow.record.clone();
        let fast = MemorySink::new("fast");
        let fast_record = fast.record();

        tracker
            .setup_sinks(vec![SinkHandle::spawn(slow), SinkHandle::spawn(fast)])
            .await
            .unwrap();
        for i in 0..10 {
            tracker.track(Event::new("tick").with_param("i", i));
        }

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(fast_record.len(), 10);
        assert!(slow_record.len() < 10);

        dispatcher.shutdown().await;
        assert_eq!(slow_record.len(), 10);
    }

    #[tokio::test]
    async fn test_lifetime_dedup_survives_restart_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let storage_config = StorageConfig {
            prefix: "e2e".to_string(),
            path: Some(dir.path().join("store.json")),
        };

        let mut delivered = Vec::new();
        for _ in 0..2 {
            let storage = open_storage(&storage_config).unwrap();
            let dispatcher = Dispatcher::spawn();
            let tracker = Tracker::new(dispatcher.handle(), storage);

            tracker.log(Event::new("signup"), EventLogCondition::OncePerLifetime);
            tracker.log(Event::new("session_start"), EventLogCondition::OncePerSession);
            tracker.log(Event::new("session_start"), EventLogCondition::OncePerSession);

            let sink = MemorySink::new("mem");
            let record = sink.record();
            tracker
                .setup_sinks(vec![SinkHandle::spawn(sink)])
                .await
                .unwrap();
            dispatcher.shutdown().await;
            delivered.push(record.event_names());
        }

        assert_eq!(delivered[0], vec!["signup", "session_start"]);
        assert_eq!(delivered[1], vec!["session_start"]);
    }

    #[tokio::test]
    async fn test_lifetime_dedup_shared_between_pipelines() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

        let first = Dispatcher::spawn();
        let second = Dispatcher::spawn();
        let a = Tracker::new(first.handle(), SharedStorage::new("app", Arc::clone(&store)));
        let b = Tracker::new(second.handle(), SharedStorage::new("app", Arc::clone(&store)));

        let admitted_a = a.log(Event::new("onboarded"), EventLogCondition::OncePerLifetime);
        let admitted_b = b.log(Event::new("onboarded"), EventLogCondition::OncePerLifetime);

        assert!(admitted_a);
        assert!(!admitted_b);
        assert_eq!(a.dispatcher().buffered_len().await.unwrap(), 1);
        assert_eq!(b.dispatcher().buffered_len().await.unwrap(), 0);

        first.shutdown().await;
        second.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_screen_reported_through_pipeline() {
        let config = ConfigLoader::load_from_str(
            r#"
[watchdog]
correction_window_ms = 10000

[[sinks]]
name = "recorder"
sink_type = "memory"

[[sinks]]
name = "console"
sink_type = "log"
"#,
            ConfigFormat::Toml,
        )
        .unwrap();

        let storage = open_storage(&config.storage).unwrap();
        let dispatcher = Dispatcher::spawn();
        let tracker = Tracker::new(dispatcher.handle(), storage.clone());
        let mut tap = tracker.subscribe();
        let watchdog = WatchdogTracker::new(config.watchdog.clone(), tracker.callback());

        let handle = watchdog.arm(ScreenContext::new("checkout"), Duration::from_secs(2));
        tokio::time::sleep(Duration::from_millis(2500)).await;
        watchdog.context_shown();
        assert_eq!(handle.join().await.unwrap(), WatchdogState::Resolved);

        // Sinks come up only after both watchdog events were buffered
        let sinks = create_sink_handles(&config.sinks, &install_context(), &storage)
            .await
            .unwrap();
        assert_eq!(sinks.len(), 2);
        let flushed = tracker.setup_sinks(sinks).await.unwrap();
        dispatcher.shutdown().await;

        assert_eq!(flushed, 2);
        let events = tap.drain();
        let names: Vec<&str> = events.iter().map(Event::name).collect();
        assert_eq!(names, vec!["ui_stuck", "ui_stuck_corrected"]);

        let stuck = &events[0];
        assert_eq!(
            stuck.param(SCREEN_PARAM).and_then(ParamValue::as_str),
            Some("checkout")
        );
        assert_eq!(stuck.param(DURATION_PARAM).and_then(ParamValue::as_f64), Some(2.0));
        let stuck_delta = stuck.time_delta().unwrap();
        assert!((stuck_delta - 0.5).abs() < 0.05, "timeDelta = {stuck_delta}");

        let corrected = &events[1];
        let duration = corrected
            .param(DURATION_PARAM)
            .and_then(ParamValue::as_f64)
            .unwrap();
        assert!((duration - 2.5).abs() < 0.05, "duration = {duration}");
        assert!(corrected.time_delta().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_bounds_sink_startup() {
        let result = deadline::race(Duration::from_millis(100), |_cancel| async move {
            tokio::time::sleep(Duration::from_secs(5)).await;
            let context = install_context();
            let storage = memory_storage();
            create_sink_handles(&[], &context, &storage)
                .await
                .map(|sinks| sinks.len())
        })
        .await;

        assert!(matches!(result, Err(deadline::RaceError::Timeout(_))));
    }
}
