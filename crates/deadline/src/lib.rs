//! # Deadline
//!
//! Cooperative cancellation and work-vs-deadline racing.
//!
//! - [`CancelToken`]: cloneable, one-way cancellation flag
//! - [`race`] / [`race_with_cancel`]: run work against a deadline, cancel the loser
//!
//! Cancellation is cooperative: work may poll [`CancelToken::is_cancelled`]
//! or await [`CancelToken::cancelled`], and in any case its future is dropped
//! at the next await point once the race is lost.

mod cancel;
mod error;
mod race;

pub use cancel::{CancelGuard, CancelToken};
pub use error::RaceError;
pub use race::{race, race_with_cancel};
