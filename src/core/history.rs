//! Transition log.
//!
//! An append-only record of fired transitions, kept by the engine as an
//! inspectable audit trail of how the lock screen reached its current
//! state.

use super::state::StateType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Record of a single fired transition.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// The state transferred out of.
    pub from: StateType,
    /// The state transferred into.
    pub to: StateType,
    /// The comment of the rule that fired.
    pub reason: String,
    /// When the transition completed.
    pub timestamp: DateTime<Utc>,
}

/// Ordered log of fired transitions.
///
/// `record` returns a new log rather than mutating in place, so a snapshot
/// of the log taken before a transition stays valid afterwards.
///
/// # Example
///
/// ```rust
/// use chrono::Utc;
/// use lockstate::core::{StateType, TransitionLog, TransitionRecord};
///
/// let log = TransitionLog::new();
/// let log = log.record(TransitionRecord {
///     from: StateType::SlideShow,
///     to: StateType::KeypadRising,
///     reason: "activation with an expired passcode".into(),
///     timestamp: Utc::now(),
/// });
///
/// assert_eq!(log.path(), vec![StateType::SlideShow, StateType::KeypadRising]);
/// ```
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransitionLog {
    records: Vec<TransitionRecord>,
}

impl TransitionLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    /// Record a transition, returning a new log.
    pub fn record(&self, record: TransitionRecord) -> Self {
        let mut records = self.records.clone();
        records.push(record);
        Self { records }
    }

    /// The path of states traversed: the first record's origin, then the
    /// destination of each record.
    pub fn path(&self) -> Vec<StateType> {
        let mut path = Vec::new();
        if let Some(first) = self.records.first() {
            path.push(first.from);
        }
        for record in &self.records {
            path.push(record.to);
        }
        path
    }

    /// Wall-clock span from the first to the last recorded transition, or
    /// `None` for an empty log.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.first()?, self.records.last()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    /// All records in order.
    pub fn records(&self) -> &[TransitionRecord] {
        &self.records
    }
}
