//! Audit-event history and the idempotency gate.
//!
//! Commands record an event (kind + timestamp) every time they complete an
//! operation on an entity. The [`IdempotencyGate`] consults that history to
//! decide whether running the operation again would be pointless: if the
//! most recent matching event is newer than the entity's last data change,
//! there is nothing to do and the target is skipped. A `force` flag
//! bypasses the gate entirely.

use crate::error::Result;
use crate::model::Target;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

/// Recorded events for an entity, consulted by the idempotency gate.
pub trait EventHistory: Send + Sync {
    /// Timestamp of the most recent event of the given kind for this target,
    /// or `None` if the operation has never been recorded.
    fn most_recent_event(&self, target: &Target, kind: &str) -> Result<Option<DateTime<Utc>>>;

    /// Timestamp of the target's last relevant data change.
    fn last_data_change(&self, target: &Target) -> Result<DateTime<Utc>>;
}

/// Skip-if-already-done check for one operation kind.
pub struct IdempotencyGate<'a> {
    history: &'a dyn EventHistory,
    operation: String,
}

impl<'a> IdempotencyGate<'a> {
    pub fn new(history: &'a dyn EventHistory, operation: impl Into<String>) -> Self {
        Self {
            history,
            operation: operation.into(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Whether the operation should run for this target. `force` always
    /// wins; otherwise the target runs unless the most recent matching
    /// event postdates its last data change.
    pub fn should_run(&self, target: &Target, force: bool) -> Result<bool> {
        if force {
            return Ok(true);
        }
        match self.history.most_recent_event(target, &self.operation)? {
            Some(event) => Ok(event < self.history.last_data_change(target)?),
            None => Ok(true),
        }
    }
}

/// In-memory history for tests.
#[derive(Default)]
pub struct InMemoryHistory {
    events: Mutex<HashMap<(u64, String), DateTime<Utc>>>,
    changes: Mutex<HashMap<u64, DateTime<Utc>>>,
}

impl InMemoryHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_event(&self, target: &Target, kind: impl Into<String>, at: DateTime<Utc>) {
        self.events
            .lock()
            .unwrap()
            .insert((target.id, kind.into()), at);
    }

    pub fn record_data_change(&self, target: &Target, at: DateTime<Utc>) {
        self.changes.lock().unwrap().insert(target.id, at);
    }
}

impl EventHistory for InMemoryHistory {
    fn most_recent_event(&self, target: &Target, kind: &str) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .events
            .lock()
            .unwrap()
            .get(&(target.id, kind.to_string()))
            .copied())
    }

    fn last_data_change(&self, target: &Target) -> Result<DateTime<Utc>> {
        Ok(self
            .changes
            .lock()
            .unwrap()
            .get(&target.id)
            .copied()
            .unwrap_or(DateTime::<Utc>::MIN_UTC))
    }
}
