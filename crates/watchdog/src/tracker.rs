//! WatchdogTracker - arms watchdogs and delivers "context shown" signals
//!
//! Each armed watchdog runs on its own task:
//!
//! 1. **Armed**: race the delay `D` against "a new context was shown",
//!    "superseded by a newer arm" and explicit cancel. Losing the race to
//!    the timer means the screen is stuck: emit the stuck event.
//! 2. **Correcting**: race the correction window `W` against "a new context
//!    was shown". A shown signal in time emits the corrected event; running
//!    out of time ends silently.
//!
//! Superseding only applies while Armed. Once fired, the correction window
//! runs independently of newer arms.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use contracts::{EventCallback, WatchdogConfig};
use deadline::{race_with_cancel, CancelToken, RaceError};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::context::ScreenContext;
use crate::error::WatchdogError;
use crate::state::WatchdogState;

/// Param naming the stuck screen
pub const SCREEN_PARAM: &str = "screen";

/// Param holding how long the screen was stuck, in seconds
pub const DURATION_PARAM: &str = "duration";

/// Creates watchdogs for one logical UI and routes "shown" signals to them
pub struct WatchdogTracker {
    config: WatchdogConfig,
    emit: EventCallback,
    shown: watch::Sender<u64>,
    current: Mutex<Option<CancelToken>>,
    next_id: AtomicU64,
}

impl WatchdogTracker {
    /// Create a tracker that emits through `emit`
    pub fn new(config: WatchdogConfig, emit: EventCallback) -> Self {
        let (shown, _) = watch::channel(0);
        Self {
            config,
            emit,
            shown,
            current: Mutex::new(None),
            next_id: AtomicU64::new(1),
        }
    }

    /// Arm a watchdog for `context`, expecting the next context within `delay`
    ///
    /// A previously armed watchdog that has not fired yet is cancelled. One
    /// that already fired keeps its correction window.
    #[instrument(name = "watchdog_arm", skip(self, context), fields(screen = %context.screen))]
    pub fn arm(&self, context: ScreenContext, delay: Duration) -> WatchdogHandle {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let supersede = CancelToken::new();
        let cancel = CancelToken::new();
        let (state_tx, state_rx) = watch::channel(WatchdogState::Armed);
        observability::record_watchdog_transition(WatchdogState::Armed.as_str());

        let previous = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(supersede.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }

        let instance = Instance {
            id,
            context,
            delay,
            window: self.config.correction_window(),
            stuck_event: self.config.stuck_event.clone(),
            corrected_event: self.config.corrected_event.clone(),
            emit: self.emit.clone(),
            state: state_tx,
        };
        // Subscribed here, not in the task, so a shown signal sent right
        // after `arm` returns is observed.
        let shown = self.shown.subscribe();
        let task = tokio::spawn(instance.run(shown, supersede, cancel.clone()));

        debug!(id, delay_ms = delay.as_millis() as u64, "Watchdog armed");
        WatchdogHandle {
            id,
            cancel,
            state: state_rx,
            task,
        }
    }

    /// A new UI context became visible
    ///
    /// Cancels the armed watchdog and resolves every watchdog in its
    /// correction window.
    pub fn context_shown(&self) {
        self.shown.send_modify(|generation| *generation += 1);
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}

/// Owner's handle on one armed watchdog
///
/// Dropping the handle does not stop the watchdog; call
/// [`cancel`](Self::cancel) to dispose of it.
pub struct WatchdogHandle {
    id: u64,
    cancel: CancelToken,
    state: watch::Receiver<WatchdogState>,
    task: JoinHandle<Result<WatchdogState, WatchdogError>>,
}

impl WatchdogHandle {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> WatchdogState {
        *self.state.borrow()
    }

    /// Stop the watchdog in whatever phase it is; no further events
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the watchdog to reach a terminal state
    ///
    /// # Errors
    /// Returns [`WatchdogError::TaskFailed`] if the instance task died
    pub async fn join(self) -> Result<WatchdogState, WatchdogError> {
        self.task
            .await
            .map_err(|e| WatchdogError::TaskFailed(e.to_string()))?
    }
}

enum Phase {
    /// A shown (or supersede) signal arrived in time
    Signalled,
    Elapsed,
    Cancelled,
}

struct Instance {
    id: u64,
    context: ScreenContext,
    delay: Duration,
    window: Duration,
    stuck_event: String,
    corrected_event: String,
    emit: EventCallback,
    state: watch::Sender<WatchdogState>,
}

impl Instance {
    #[instrument(
        name = "watchdog_instance",
        skip_all,
        fields(id = self.id, screen = %self.context.screen)
    )]
    async fn run(
        self,
        shown: watch::Receiver<u64>,
        supersede: CancelToken,
        cancel: CancelToken,
    ) -> Result<WatchdogState, WatchdogError> {
        let correcting_shown = shown.clone();

        let armed = race_with_cancel(&cancel, self.delay, move |_| async move {
            tokio::select! {
                _ = wait_for_shown(shown) => {}
                _ = supersede.cancelled() => {}
            }
        })
        .await;
        match phase(armed)? {
            Phase::Signalled | Phase::Cancelled => {
                return Ok(self.transition(WatchdogState::Cancelled));
            }
            Phase::Elapsed => {}
        }

        self.transition(WatchdogState::Fired);
        let fired_at = Instant::now();
        let delay_secs = self.delay.as_secs_f64();
        warn!(delay_secs, "UI context stuck");
        (self.emit)(self.context.to_event(&self.stuck_event, delay_secs));
        self.transition(WatchdogState::Correcting);

        let correcting = race_with_cancel(&cancel, self.window, move |_| {
            wait_for_shown(correcting_shown)
        })
        .await;
        match phase(correcting)? {
            Phase::Signalled => {
                let duration = delay_secs + fired_at.elapsed().as_secs_f64();
                info!(duration_secs = duration, "Stuck UI context recovered");
                (self.emit)(self.context.to_event(&self.corrected_event, duration));
                Ok(self.transition(WatchdogState::Resolved))
            }
            Phase::Elapsed => Ok(self.transition(WatchdogState::Expired)),
            Phase::Cancelled => Ok(self.transition(WatchdogState::Cancelled)),
        }
    }

    fn transition(&self, next: WatchdogState) -> WatchdogState {
        let previous = self.state.send_replace(next);
        debug!(from = %previous, to = %next, "Watchdog transition");
        observability::record_watchdog_transition(next.as_str());
        next
    }
}

fn phase(result: Result<(), RaceError>) -> Result<Phase, WatchdogError> {
    match result {
        Ok(()) => Ok(Phase::Signalled),
        Err(RaceError::Timeout(_)) => Ok(Phase::Elapsed),
        Err(RaceError::Cancelled) => Ok(Phase::Cancelled),
        Err(e) => Err(e.into()),
    }
}

/// Resolve on the next shown signal; never if the tracker is gone
async fn wait_for_shown(mut shown: watch::Receiver<u64>) {
    if shown.changed().await.is_err() {
        std::future::pending::<()>().await;
    }
}
