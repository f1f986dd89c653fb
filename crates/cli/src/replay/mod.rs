//! Session replay through the full pipeline.

mod runner;
mod script;
mod stats;

pub use runner::{replay, ReplayOptions};
pub use script::{load_script, ScriptEntry};
pub use stats::ReplayStats;
