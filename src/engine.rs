//! Aggregation engine: window store and extrema tracker behind one owner
//!
//! The engine has a single writer (the feed task). Readers never touch its
//! state directly; they pull the latest [`EngineSnapshot`] or wait on the
//! change channel returned by [`AggregationEngine::subscribe`].

use crate::{
    data::{HighLowStats, TradeRecord, WINDOW_DURATION},
    error::{ErrorContext, ErrorReporter, SdkError},
    extrema::ExtremaTracker,
    normalizer::{BitmexNormalizer, EventNormalizer, FeedMessage},
    window::WindowStore,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Immutable view of the engine handed to consumers
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    /// Window contents in arrival order
    pub window: Arc<[TradeRecord]>,
    pub stats: HighLowStats,
    /// Bumped on every published change
    pub sequence: u64,
    pub updated_at: DateTime<Utc>,
}

impl EngineSnapshot {
    fn empty() -> Self {
        Self {
            window: Arc::from(Vec::new()),
            stats: HighLowStats::default(),
            sequence: 0,
            updated_at: Utc::now(),
        }
    }
}

/// What happened to a single feed message
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Entries that reached the window
    pub accepted: usize,
    /// Malformed entries skipped within a readable batch
    pub rejected: usize,
    /// Not a trade insert
    pub ignored: bool,
    /// The payload itself could not be read; no entry was looked at
    pub invalid: bool,
}

/// Lifetime counters, for diagnostics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestStats {
    pub accepted_trades: u64,
    pub rejected_entries: u64,
    pub ignored_messages: u64,
    pub invalid_payloads: u64,
}

pub struct AggregationEngine {
    window: WindowStore,
    extrema: ExtremaTracker,
    normalizer: Arc<dyn EventNormalizer>,
    stats: IngestStats,
    sequence: u64,
    publisher: watch::Sender<Arc<EngineSnapshot>>,
}

impl AggregationEngine {
    pub fn new(window_duration: Duration) -> Self {
        Self::with_normalizer(window_duration, Arc::new(BitmexNormalizer::new()))
    }

    pub fn with_normalizer(window_duration: Duration, normalizer: Arc<dyn EventNormalizer>) -> Self {
        let (publisher, _) = watch::channel(Arc::new(EngineSnapshot::empty()));

        Self {
            window: WindowStore::new(window_duration),
            extrema: ExtremaTracker::new(),
            normalizer,
            stats: IngestStats::default(),
            sequence: 0,
            publisher,
        }
    }

    /// Ingest one raw feed message using wall-clock time for eviction
    pub fn ingest_message(&mut self, text: &str) -> IngestReport {
        self.ingest_message_at(text, Utc::now())
    }

    /// Ingest one raw feed message, evicting relative to `now`.
    ///
    /// Malformed entries are skipped and the rest of the batch still lands.
    /// Publishes one snapshot per message, and only if something was accepted.
    pub fn ingest_message_at(&mut self, text: &str, now: DateTime<Utc>) -> IngestReport {
        let mut report = IngestReport::default();

        let entries = match self.normalizer.normalize_message(text) {
            Ok(FeedMessage::Ignored) => {
                tracing::debug!("Ignoring non-trade message");
                self.stats.ignored_messages += 1;
                report.ignored = true;
                return report;
            }
            Ok(FeedMessage::Trades(entries)) => entries,
            Err(e) => {
                self.stats.invalid_payloads += 1;
                report.invalid = true;
                ErrorReporter::report_error(
                    &SdkError::from(e),
                    Some(&ErrorContext::new("normalize_message").with_detail("bytes", text.len())),
                );
                return report;
            }
        };

        for (index, entry) in entries.into_iter().enumerate() {
            match entry {
                Ok(record) => {
                    self.apply(record, now);
                    report.accepted += 1;
                }
                Err(e) => {
                    report.rejected += 1;
                    ErrorReporter::report_error(
                        &SdkError::from(e),
                        Some(&ErrorContext::new("normalize_entry").with_detail("index", index)),
                    );
                }
            }
        }

        self.stats.accepted_trades += report.accepted as u64;
        self.stats.rejected_entries += report.rejected as u64;

        if report.accepted > 0 {
            self.publish(now);
        }

        tracing::debug!(
            "Ingested batch: {} accepted, {} rejected, window holds {}",
            report.accepted,
            report.rejected,
            self.window.len()
        );
        report
    }

    /// Ingest an already normalized record
    pub fn ingest_record(&mut self, record: TradeRecord) {
        self.ingest_record_at(record, Utc::now());
    }

    pub fn ingest_record_at(&mut self, record: TradeRecord, now: DateTime<Utc>) {
        self.apply(record, now);
        self.stats.accepted_trades += 1;
        self.publish(now);
    }

    // Window first, then extrema
    fn apply(&mut self, record: TradeRecord, now: DateTime<Utc>) {
        self.window.insert_at(record, now);
        self.extrema.update(&record);
    }

    fn publish(&mut self, now: DateTime<Utc>) {
        self.sequence += 1;
        let snapshot = EngineSnapshot {
            window: self.window.snapshot(),
            stats: self.extrema.current(),
            sequence: self.sequence,
            updated_at: now,
        };
        self.publisher.send_replace(Arc::new(snapshot));
    }

    /// Latest published snapshot
    pub fn snapshot(&self) -> Arc<EngineSnapshot> {
        self.publisher.borrow().clone()
    }

    /// Change notification channel; always holds the latest snapshot
    pub fn subscribe(&self) -> watch::Receiver<Arc<EngineSnapshot>> {
        self.publisher.subscribe()
    }

    pub fn high_low(&self) -> HighLowStats {
        self.extrema.current()
    }

    pub fn window_len(&self) -> usize {
        self.window.len()
    }

    pub fn window_duration(&self) -> Duration {
        self.window.duration()
    }

    pub fn stats(&self) -> IngestStats {
        self.stats
    }
}

impl Default for AggregationEngine {
    fn default() -> Self {
        Self::new(WINDOW_DURATION)
    }
}
