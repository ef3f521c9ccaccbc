//! Daily API call budget tracking.

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use time::Date;
use tracing::{error, info, warn};

use crate::store::Store;

/// Store key the quota state lives under.
const QUOTA_KEY: &str = "quota";

/// Persisted quota state: `{date: "YYYY-MM-DD", count: n}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuotaState {
    /// ISO day the counter applies to.
    pub date: String,
    /// Calls spent on that day.
    pub count: u32,
}

/// Enforces the daily external-API call budget.
///
/// The counter persists across restarts through the injected [`Store`];
/// exceeding the real provider's hard limit is the failure this guards
/// against, so the configured limit must stay well under that cap.
pub struct QuotaTracker {
    store: Arc<dyn Store>,
    daily_limit: u32,
    state: Mutex<QuotaState>,
}

impl QuotaTracker {
    /// Load quota state from the store. Unreadable or corrupt state degrades
    /// to zero usage (fail open) with a warning.
    pub fn new(store: Arc<dyn Store>, daily_limit: u32, today: Date) -> Self {
        let state = match store.get(QUOTA_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<QuotaState>(&raw) {
                Ok(state) => state,
                Err(e) => {
                    warn!(error = %e, "quota state corrupt, resetting to zero usage");
                    QuotaState { date: today.to_string(), count: 0 }
                }
            },
            Ok(None) => QuotaState { date: today.to_string(), count: 0 },
            Err(e) => {
                warn!(error = %e, "quota state unreadable, resetting to zero usage");
                QuotaState { date: today.to_string(), count: 0 }
            }
        };

        info!(date = %state.date, used = state.count, limit = daily_limit, "quota loaded");

        Self {
            store,
            daily_limit,
            state: Mutex::new(state),
        }
    }

    /// Whether another call fits in today's budget.
    ///
    /// A date rollover resets the counter before the check.
    pub fn can_call(&self, today: Date) -> bool {
        let mut state = self.state.lock().expect("quota mutex poisoned");
        Self::roll_over(&mut state, today);
        state.count < self.daily_limit
    }

    /// Record a completed call with the cost the provider reported.
    ///
    /// Persist failures are logged loudly but never abort the caller; the
    /// in-memory counter stays authoritative for this process.
    pub fn record_call(&self, cost: u32, today: Date) {
        let snapshot = {
            let mut state = self.state.lock().expect("quota mutex poisoned");
            Self::roll_over(&mut state, today);
            state.count = state.count.saturating_add(cost);
            state.clone()
        };

        match serde_json::to_string(&snapshot) {
            Ok(raw) => {
                if let Err(e) = self.store.put(QUOTA_KEY, &raw) {
                    error!(error = %e, "failed to persist quota state");
                }
            }
            Err(e) => error!(error = %e, "failed to serialize quota state"),
        }
    }

    /// Calls spent today.
    pub fn calls_used(&self, today: Date) -> u32 {
        let mut state = self.state.lock().expect("quota mutex poisoned");
        Self::roll_over(&mut state, today);
        state.count
    }

    /// Configured daily limit.
    pub fn daily_limit(&self) -> u32 {
        self.daily_limit
    }

    fn roll_over(state: &mut QuotaState, today: Date) {
        let today = today.to_string();
        if state.date != today {
            info!(from = %state.date, to = %today, "quota day rollover");
            state.date = today;
            state.count = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use time::macros::date;

    fn tracker_with(limit: u32) -> (Arc<MemoryStore>, QuotaTracker) {
        let store = Arc::new(MemoryStore::new());
        let tracker = QuotaTracker::new(store.clone(), limit, date!(2026 - 08 - 06));
        (store, tracker)
    }

    #[test]
    fn denies_after_limit_reached() {
        let today = date!(2026 - 08 - 06);
        let (_store, tracker) = tracker_with(3);

        for _ in 0..3 {
            assert!(tracker.can_call(today));
            tracker.record_call(1, today);
        }

        assert!(!tracker.can_call(today));
        assert_eq!(tracker.calls_used(today), 3);
    }

    #[test]
    fn day_rollover_resets_counter() {
        let today = date!(2026 - 08 - 06);
        let tomorrow = date!(2026 - 08 - 07);
        let (_store, tracker) = tracker_with(2);

        tracker.record_call(2, today);
        assert!(!tracker.can_call(today));

        assert!(tracker.can_call(tomorrow));
        assert_eq!(tracker.calls_used(tomorrow), 0);
    }

    #[test]
    fn cost_is_not_assumed_to_be_one() {
        let today = date!(2026 - 08 - 06);
        let (_store, tracker) = tracker_with(10);

        tracker.record_call(4, today);
        assert_eq!(tracker.calls_used(today), 4);
    }

    #[test]
    fn state_persists_through_store() {
        let today = date!(2026 - 08 - 06);
        let (store, tracker) = tracker_with(10);
        tracker.record_call(5, today);
        drop(tracker);

        let revived = QuotaTracker::new(store, 10, today);
        assert_eq!(revived.calls_used(today), 5);
    }

    #[test]
    fn corrupt_state_fails_open() {
        let store = Arc::new(MemoryStore::new());
        store.put(QUOTA_KEY, "not json at all").unwrap();

        let today = date!(2026 - 08 - 06);
        let tracker = QuotaTracker::new(store, 5, today);
        assert!(tracker.can_call(today));
        assert_eq!(tracker.calls_used(today), 0);
    }
}
