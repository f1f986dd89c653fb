//! Work-vs-deadline race
//!
//! The work runs on its own task so that the deadline can be arbitrated on
//! completion order, not on scheduling order. Whichever side signals first
//! wins; the loser is cancelled and awaited before the race returns, so no
//! task outlives the call.

use std::any::Any;
use std::future::Future;
use std::time::Duration;

use tokio::task::JoinError;
use tracing::{debug, warn};

use crate::{CancelToken, RaceError};

/// Run `work` against `deadline`
///
/// `work` receives a [`CancelToken`] that is cancelled as soon as the race
/// is lost. A zero deadline times out immediately without starting the work.
///
/// # Errors
/// - [`RaceError::Timeout`] if the deadline fired first
/// - [`RaceError::WorkPanicked`] if the work task panicked
pub async fn race<T, F, Fut>(deadline: Duration, work: F) -> Result<T, RaceError>
where
    F: FnOnce(CancelToken) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    race_with_cancel(&CancelToken::new(), deadline, work).await
}

/// Like [`race`], but also cancelled through the caller's `parent` token
///
/// Dropping the returned future before it resolves cancels the work as well.
///
/// # Errors
/// Same as [`race`], plus [`RaceError::Cancelled`] when `parent` is
/// cancelled before the work completes.
pub async fn race_with_cancel<T, F, Fut>(
    parent: &CancelToken,
    deadline: Duration,
    work: F,
) -> Result<T, RaceError>
where
    F: FnOnce(CancelToken) -> Fut,
    Fut: Future<Output = T> + Send + 'static,
    T: Send + 'static,
{
    if deadline.is_zero() {
        debug!("Zero deadline, timing out without starting work");
        return Err(RaceError::Timeout(deadline));
    }
    if parent.is_cancelled() {
        return Err(RaceError::Cancelled);
    }

    let token = CancelToken::new();
    let fut = work(token.clone());
    let task_token = token.clone();
    let mut task = tokio::spawn(async move {
        tokio::select! {
            biased;
            _ = task_token.cancelled() => None,
            out = fut => Some(out),
        }
    });

    // Cancels the work if the caller drops this future mid-race.
    let guard = token.drop_guard();

    let lost = tokio::select! {
        biased;
        joined = &mut task => {
            let _ = guard.disarm();
            return settle(joined);
        }
        _ = tokio::time::sleep(deadline) => RaceError::Timeout(deadline),
        _ = parent.cancelled() => RaceError::Cancelled,
    };

    debug!(reason = %lost, "Work lost the race, cancelling");
    drop(guard);

    // Wait for the work task to reach a terminal state; its output is discarded.
    if let Err(e) = task.await {
        if e.is_panic() {
            warn!(error = %e, "Work task panicked after losing the race");
        }
    }

    Err(lost)
}

fn settle<T>(joined: Result<Option<T>, JoinError>) -> Result<T, RaceError> {
    match joined {
        Ok(Some(out)) => Ok(out),
        // Only reachable if the token was cancelled from outside the race.
        Ok(None) => Err(RaceError::Cancelled),
        Err(e) if e.is_panic() => Err(RaceError::WorkPanicked(panic_message(e.into_panic()))),
        Err(_) => Err(RaceError::Cancelled),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
