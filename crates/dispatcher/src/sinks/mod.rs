//! Sink implementations
//!
//! Contains LogSink, UdpSink, and MemorySink.

mod log;
mod memory;
mod udp;

pub use self::log::LogSink;
pub use self::memory::{MemoryRecord, MemorySink};
pub use self::udp::{UdpSink, UdpSinkConfig};
