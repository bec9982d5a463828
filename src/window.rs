//! Trailing time window of trade records

use crate::data::{TradeRecord, WINDOW_DURATION};
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

/// Holds the trades whose timestamp lies within the trailing window.
///
/// Records stay in arrival order. Late trades can carry older timestamps
/// than their predecessors, so eviction checks every record instead of
/// popping from the front.
///
/// Eviction is lazy: it only runs on insert, so a snapshot taken between
/// inserts may hold records up to one insert-interval past expiry.
#[derive(Debug, Clone)]
pub struct WindowStore {
    records: VecDeque<TradeRecord>,
    duration: Duration,
    max_age_ms: i64,
}

impl WindowStore {
    pub fn new(duration: Duration) -> Self {
        Self {
            records: VecDeque::new(),
            duration,
            max_age_ms: i64::try_from(duration.as_millis()).unwrap_or(i64::MAX),
        }
    }

    /// Insert using the current wall-clock time as the eviction reference
    pub fn insert(&mut self, record: TradeRecord) {
        self.insert_at(record, Utc::now());
    }

    /// Evict everything older than the window as of `now`, then append
    pub fn insert_at(&mut self, record: TradeRecord, now: DateTime<Utc>) {
        let evicted = self.evict_expired(now);
        if evicted > 0 {
            tracing::debug!("Evicted {} expired trades, {} remain", evicted, self.records.len());
        }

        self.records.push_back(record);
    }

    fn evict_expired(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        let max_age_ms = self.max_age_ms;

        self.records
            .retain(|r| (now - r.timestamp).num_milliseconds() <= max_age_ms);

        before - self.records.len()
    }

    /// Read-only copy of the window in arrival order
    pub fn snapshot(&self) -> Arc<[TradeRecord]> {
        self.records.iter().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TradeRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

impl Default for WindowStore {
    fn default() -> Self {
        Self::new(WINDOW_DURATION)
    }
}
