//! # Watchdog
//!
//! Stuck-UI 检测。
//!
//! 某个界面上下文显示后，若在预期时间 D 内没有新的上下文出现，则发出
//! "stuck" 诊断事件；之后若在纠正窗口 W 内界面恢复，则发出 "corrected"
//! 事件。两个计时阶段都基于 `deadline::race_with_cancel`。

pub mod context;
pub mod error;
pub mod state;
pub mod tracker;

pub use context::ScreenContext;
pub use error::WatchdogError;
pub use state::WatchdogState;
pub use tracker::{WatchdogHandle, WatchdogTracker, DURATION_PARAM, SCREEN_PARAM};
