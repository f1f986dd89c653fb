//! # Contracts
//!
//! Frozen interface contracts shared by every pipeline crate: the event data
//! model, the sink and key-value store traits, configuration types and the
//! unified error type. Business crates depend on this crate only, never on
//! each other in reverse.
//!
//! ## Time Model
//! - Queuing latency is measured with the monotonic tokio clock
//! - `timeDelta` is reported in seconds (f64)

mod condition;
mod config;
mod context;
mod error;
mod event;
mod sink;
mod storage;

pub use condition::EventLogCondition;
pub use config::*;
pub use context::InstallContext;
pub use error::*;
pub use event::{Event, EventCallback, EventParams, ParamValue, TIME_DELTA_PARAM};
pub use sink::*;
pub use storage::{KeyValueStore, SharedStorage};
