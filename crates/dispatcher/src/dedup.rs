//! DedupEvaluator - applies `EventLogCondition` before dispatch
//!
//! once-per-lifetime flags live in the shared key-value store under
//! `"onlyOnce_<eventName>"`; once-per-session names live in memory and are
//! scoped to this evaluator. Store failures fail open: the event is
//! forwarded rather than suppressed forever.
//!
//! A lifetime flag never goes back to unset, so names known to be set are
//! remembered locally and only the first check per name reaches the store.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use contracts::{EventLogCondition, SharedStorage};

/// Key prefix for once-per-lifetime flags
pub const ONLY_ONCE_KEY_PREFIX: &str = "onlyOnce_";

/// Dedup policy gate
#[derive(Debug)]
pub struct DedupEvaluator {
    storage: SharedStorage,
    session_seen: Mutex<HashSet<String>>,
    /// Lifetime flags already observed as set; also serializes check-and-set
    lifetime_seen: Mutex<HashSet<String>>,
}

impl DedupEvaluator {
    pub fn new(storage: SharedStorage) -> Self {
        Self {
            storage,
            session_seen: Mutex::new(HashSet::new()),
            lifetime_seen: Mutex::new(HashSet::new()),
        }
    }

    /// Decide whether `event_name` may be forwarded under `condition`
    ///
    /// A `true` answer for a gated policy also records the event as seen.
    pub fn should_forward(&self, event_name: &str, condition: EventLogCondition) -> bool {
        let forward = match condition {
            EventLogCondition::Always => true,
            EventLogCondition::OncePerSession => self.admit_session(event_name),
            EventLogCondition::OncePerLifetime => self.admit_lifetime(event_name),
        };

        if !forward {
            debug!(
                event = event_name,
                policy = condition.as_str(),
                "Event suppressed by dedup policy"
            );
            observability::record_dedup_suppressed(condition.as_str());
        }
        forward
    }

    fn admit_session(&self, event_name: &str) -> bool {
        self.session_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(event_name.to_string())
    }

    fn admit_lifetime(&self, event_name: &str) -> bool {
        let mut seen = self
            .lifetime_seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if seen.contains(event_name) {
            return false;
        }

        let key = format!("{ONLY_ONCE_KEY_PREFIX}{event_name}");
        match self.storage.set_flag_once(&key) {
            Ok(first) => {
                seen.insert(event_name.to_string());
                first
            }
            Err(e) => {
                warn!(
                    event = event_name,
                    error = %e,
                    "Dedup store unavailable, forwarding event"
                );
                true
            }
        }
    }
}
