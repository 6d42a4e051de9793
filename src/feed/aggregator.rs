use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

use super::episode::EpisodeRecord;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregatorError {
    /// The aggregator has been drained; the feed is already being assembled.
    #[error("Aggregator closed: episode arrived after the feed was assembled")]
    Closed,
}

/// Sort key for an episode: negated publish time in epoch seconds, so that
/// ascending key order is newest-first.
pub fn sort_key(published: DateTime<Utc>) -> i64 {
    published.timestamp().saturating_neg()
}

/// Collects resolved episodes from concurrent tasks in reverse-chronological
/// order.
///
/// Entries are keyed by `(sort_key, arrival)`; the arrival counter keeps two
/// episodes published in the same second as distinct entries instead of
/// letting the later insert replace the earlier one. Every insert is a single
/// critical section. [`drain`](Self::drain) closes the aggregator, and any
/// later insert is refused.
#[derive(Debug, Default)]
pub struct OrderedAggregator {
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    entries: BTreeMap<(i64, u64), EpisodeRecord>,
    arrivals: u64,
    closed: bool,
}

impl OrderedAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `record` under `key` (see [`sort_key`]).
    ///
    /// # Errors
    ///
    /// [`AggregatorError::Closed`] once [`drain`](Self::drain) has run.
    pub fn insert(&self, key: i64, record: EpisodeRecord) -> Result<(), AggregatorError> {
        let mut state = self.lock();
        if state.closed {
            return Err(AggregatorError::Closed);
        }
        let arrival = state.arrivals;
        state.arrivals += 1;
        state.entries.insert((key, arrival), record);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Closes the aggregator and returns every episode, newest first.
    pub fn drain(&self) -> Vec<EpisodeRecord> {
        let mut state = self.lock();
        state.closed = true;
        std::mem::take(&mut state.entries).into_values().collect()
    }

    // Poisoning is ignored: no critical section leaves the map half-updated.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
