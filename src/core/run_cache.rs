//! In-memory, time-bounded cache of completed runs.
//!
//! Three stores share one TTL:
//! - latest pointer: `(topology, case-folded subject) -> run id`
//! - records: `run id -> RunRecord`
//! - a bounded recent-runs index
//!
//! Expiry is lazy: a stale entry is evicted by the read that finds it.
//! Saves are not transactional across the three stores, and concurrent
//! saves for the same key resolve as last-writer-wins.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::domain::{Event, HistoryIndex, RunRecord, RunSummary, Topology};

use super::clock::Clock;
use super::error::PipelineError;
use super::event_sink::{encode_frame, FrameConsumer};

/// Default lifetime of every cache entry (15 minutes)
pub const DEFAULT_TTL_SECONDS: i64 = 15 * 60;

/// Default bound on the recent-runs index
pub const DEFAULT_MAX_RECENT_RUNS: usize = 50;

const INDEX_KEY: &str = "run:index";

/// A value plus its absolute expiry instant
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    /// Expired at or after `expires_at`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Keyed store with lazy expiry
#[derive(Debug)]
pub struct TtlStore<T> {
    entries: Mutex<HashMap<String, CacheEntry<T>>>,
}

impl<T> Default for TtlStore<T> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<T: Clone> TtlStore<T> {
    pub fn get(&self, key: &str, now: DateTime<Utc>) -> Option<T> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.is_expired(now) => {
                debug!(key, "evicting expired cache entry");
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    pub fn insert(&self, key: String, value: T, expires_at: DateTime<Utc>) {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key, CacheEntry { value, expires_at });
    }

    /// Entries currently held, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-wide cache of recorded runs
pub struct RunCache {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    max_recent: usize,
    latest: TtlStore<String>,
    records: TtlStore<Arc<RunRecord>>,
    index: TtlStore<HistoryIndex>,
}

impl RunCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration, max_recent: usize) -> Self {
        Self {
            clock,
            ttl,
            max_recent,
            latest: TtlStore::default(),
            records: TtlStore::default(),
            index: TtlStore::default(),
        }
    }

    /// Cache with the default 15 minute TTL and 50-entry index
    pub fn with_defaults(clock: Arc<dyn Clock>) -> Self {
        Self::new(
            clock,
            Duration::seconds(DEFAULT_TTL_SECONDS),
            DEFAULT_MAX_RECENT_RUNS,
        )
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Latest run for a subject and topology, if still alive
    pub fn get_latest(&self, subject: &str, topology: Topology) -> Option<Arc<RunRecord>> {
        let now = self.clock.now();
        let id = self.latest.get(&latest_key(subject, topology), now)?;
        self.records.get(&record_key(&id), now)
    }

    pub fn get_by_id(&self, id: &str) -> Option<Arc<RunRecord>> {
        self.records.get(&record_key(id), self.clock.now())
    }

    /// Store a finished run and point the latest entry for its key at it
    pub fn save(&self, subject: &str, topology: Topology, events: Vec<Event>) -> Arc<RunRecord> {
        let now = self.clock.now();
        let expires_at = now + self.ttl;

        let record = Arc::new(RunRecord {
            id: RunRecord::generate_id(subject, topology, now),
            subject: subject.to_string(),
            topology,
            created_at: now,
            events,
        });

        self.records
            .insert(record_key(&record.id), Arc::clone(&record), expires_at);
        self.latest
            .insert(latest_key(subject, topology), record.id.clone(), expires_at);

        let current = self
            .index
            .get(INDEX_KEY, now)
            .unwrap_or_else(|| HistoryIndex::empty(now));
        let mut runs: Vec<RunSummary> = Vec::with_capacity(current.runs.len() + 1);
        runs.push(record.summary());
        runs.extend(current.runs);
        runs.truncate(self.max_recent);
        self.index.insert(
            INDEX_KEY.to_string(),
            HistoryIndex {
                created_at: current.created_at,
                runs,
            },
            expires_at,
        );

        debug!(run_id = %record.id, events = record.events.len(), "run cached");
        record
    }

    /// Recent runs, newest first
    pub fn recent_runs(&self) -> HistoryIndex {
        let now = self.clock.now();
        self.index
            .get(INDEX_KEY, now)
            .unwrap_or_else(|| HistoryIndex::empty(now))
    }

    /// Push a recorded run through the live encoding path, then close the stream.
    ///
    /// Never touches an agent; returns the number of frames sent.
    pub fn replay(
        record: &RunRecord,
        consumer: &dyn FrameConsumer,
    ) -> Result<usize, PipelineError> {
        for event in &record.events {
            consumer.accept(&encode_frame(event))?;
        }
        consumer.finish()?;
        Ok(record.events.len())
    }
}

fn latest_key(subject: &str, topology: Topology) -> String {
    format!("run:latest:{}:{}", topology, subject.trim().to_lowercase())
}

fn record_key(id: &str) -> String {
    format!("run:record:{}", id)
}
