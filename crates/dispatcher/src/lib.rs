//! # Dispatcher
//!
//! 事件分发模块。
//!
//! 负责：
//! - 在 sink 就绪前缓冲事件（FIFO，带 `timeDelta`）
//! - 按 `EventLogCondition` 去重
//! - Fan-out 到多个 sinks，隔离慢 sink / 失败 sink
//! - 向订阅者广播已分发的事件

pub mod dedup;
pub mod dispatcher;
pub mod error;
pub mod fifo;
pub mod handle;
pub mod metrics;
pub mod sinks;
pub mod store;
pub mod tap;
pub mod tracker;

pub use contracts::{Event, EventSink};
pub use dedup::{DedupEvaluator, ONLY_ONCE_KEY_PREFIX};
pub use dispatcher::{
    create_sink_handle, create_sink_handles, Dispatcher, DispatcherHandle, QueuedEvent,
};
pub use error::DispatcherError;
pub use fifo::FifoBuffer;
pub use handle::{Delivery, SinkHandle};
pub use metrics::{MetricsSnapshot, SinkMetrics};
pub use sinks::{LogSink, MemoryRecord, MemorySink, UdpSink, UdpSinkConfig};
pub use store::{open_storage, JsonFileStore, MemoryStore};
pub use tap::{EventTap, TapSubscription};
pub use tracker::Tracker;
