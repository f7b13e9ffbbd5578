//! Join State Store
//!
//! Windowed state store for buffering records on one side of a stream-stream join.
//! The join operator only talks to the [`WindowedStateStore`] trait, so the
//! in-memory backend here can be swapped for a persistent one.
//!
//! ## Time-Indexed Lookups
//!
//! Records are stored in a two-level structure:
//! - Outer: `FxHashMap<JoinKey, TimeIndex>` for O(1) key lookup
//! - Inner: `BTreeMap<EventTime, VecDeque<Entries>>` for O(log n) time range queries

use std::collections::{BTreeMap, VecDeque};

use rustc_hash::FxHashMap;

use crate::velostream::sql::execution::types::{FieldValue, StreamRecord};

/// Entry in the join buffer
#[derive(Debug, Clone, PartialEq)]
pub struct WindowEntry {
    /// The buffered record
    pub record: StreamRecord,
    /// Event time of the record (milliseconds since epoch)
    pub event_time: i64,
    /// Whether the record has joined with at least one record of the other side
    pub matched: bool,
}

impl WindowEntry {
    pub fn new(record: StreamRecord, event_time: i64) -> Self {
        Self {
            record,
            event_time,
            matched: false,
        }
    }
}

/// Key-addressed, time-indexed buffer of one join side
pub trait WindowedStateStore: Send {
    /// Buffer a record under `key` at `event_time`
    fn put(&mut self, key: FieldValue, event_time: i64, record: StreamRecord);

    /// Entries of `key` at exactly `event_time`, in arrival order
    fn get(&self, key: &FieldValue, event_time: i64) -> Vec<&WindowEntry>;

    /// Entries of `key` with event time in `[from, to]`, oldest first
    fn range_mut(&mut self, key: &FieldValue, from: i64, to: i64) -> Vec<&mut WindowEntry>;

    /// Remove every entry of `key` at `event_time`; returns how many were removed
    fn delete(&mut self, key: &FieldValue, event_time: i64) -> usize;

    /// Remove every entry with event time before `cutoff`, handing each to `on_evict`
    fn evict_before(
        &mut self,
        cutoff: i64,
        on_evict: &mut dyn FnMut(FieldValue, WindowEntry),
    ) -> usize;

    /// Number of buffered entries
    fn record_count(&self) -> usize;

    fn key_count(&self) -> usize;
}

/// Statistics for monitoring join state store performance
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WindowStoreStats {
    /// Total records stored (lifetime)
    pub records_stored: u64,
    /// Total records evicted (lifetime)
    pub records_evicted: u64,
    /// Total range lookups
    pub lookups: u64,
    /// Total entries returned across all lookups
    pub matches_found: u64,
    /// Peak number of records observed
    pub peak_size: usize,
}

/// Record cap of a store
///
/// Crossing the threshold is reported in the log; records are never dropped
/// to stay under the cap.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStoreConfig {
    /// Maximum number of records (`None` = unlimited)
    pub max_records: Option<usize>,
    /// Warning threshold as a fraction of `max_records`
    pub warning_threshold_pct: f64,
}

impl Default for WindowStoreConfig {
    fn default() -> Self {
        Self {
            max_records: None,
            warning_threshold_pct: 0.8,
        }
    }
}

impl WindowStoreConfig {
    pub fn with_max_records(max_records: usize) -> Self {
        Self {
            max_records: Some(max_records),
            ..Self::default()
        }
    }

    fn warning_threshold(&self) -> Option<usize> {
        self.max_records
            .map(|max| ((max as f64) * self.warning_threshold_pct).ceil() as usize)
    }
}

/// Time-indexed entries of one join key
type TimeIndex = BTreeMap<i64, VecDeque<WindowEntry>>;

/// In-memory [`WindowedStateStore`]
#[derive(Debug, Default)]
pub struct InMemoryWindowStore {
    /// Records indexed by join key, then by event time
    records: FxHashMap<FieldValue, TimeIndex>,

    /// Smallest event time present, if any
    earliest: Option<i64>,

    /// Running count of total records
    record_count: usize,

    /// Name used in log messages
    name: String,

    config: WindowStoreConfig,

    stats: WindowStoreStats,

    /// Set while the store is above its warning threshold
    capacity_warning_logged: bool,
}

impl InMemoryWindowStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_config(name, WindowStoreConfig::default())
    }

    pub fn with_config(name: impl Into<String>, config: WindowStoreConfig) -> Self {
        Self {
            name: name.into(),
            config,
            ..Self::default()
        }
    }

    pub fn stats(&self) -> &WindowStoreStats {
        &self.stats
    }

    pub fn config(&self) -> &WindowStoreConfig {
        &self.config
    }

    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }

    /// Check if the store is at or above its warning threshold
    #[must_use]
    pub fn is_near_capacity(&self) -> bool {
        self.config
            .warning_threshold()
            .is_some_and(|threshold| self.record_count >= threshold)
    }

    fn check_capacity(&mut self) {
        match (self.config.max_records, self.config.warning_threshold()) {
            (Some(max), Some(threshold)) if self.record_count >= threshold => {
                if !self.capacity_warning_logged {
                    log::warn!(
                        "Join state store '{}': approaching capacity limit ({}/{} records, {}%)",
                        self.name,
                        self.record_count,
                        max,
                        (self.record_count * 100) / max.max(1)
                    );
                    self.capacity_warning_logged = true;
                }
            }
            _ => self.capacity_warning_logged = false,
        }
    }

    fn recompute_earliest(&mut self) {
        self.earliest = self
            .records
            .values()
            .filter_map(|time_index| time_index.first_key_value().map(|(t, _)| *t))
            .min();
    }
}

impl WindowedStateStore for InMemoryWindowStore {
    fn put(&mut self, key: FieldValue, event_time: i64, record: StreamRecord) {
        self.records
            .entry(key)
            .or_default()
            .entry(event_time)
            .or_default()
            .push_back(WindowEntry::new(record, event_time));

        self.record_count += 1;
        self.earliest = Some(self.earliest.map_or(event_time, |e| e.min(event_time)));
        self.stats.records_stored += 1;
        self.stats.peak_size = self.stats.peak_size.max(self.record_count);
        self.check_capacity();
    }

    fn get(&self, key: &FieldValue, event_time: i64) -> Vec<&WindowEntry> {
        self.records
            .get(key)
            .and_then(|time_index| time_index.get(&event_time))
            .map(|entries| entries.iter().collect())
            .unwrap_or_default()
    }

    fn range_mut(&mut self, key: &FieldValue, from: i64, to: i64) -> Vec<&mut WindowEntry> {
        if from > to {
            return Vec::new();
        }
        let matches: Vec<&mut WindowEntry> = self
            .records
            .get_mut(key)
            .map(|time_index| {
                time_index
                    .range_mut(from..=to)
                    .flat_map(|(_, entries)| entries.iter_mut())
                    .collect()
            })
            .unwrap_or_default();

        self.stats.lookups += 1;
        self.stats.matches_found += matches.len() as u64;
        matches
    }

    fn delete(&mut self, key: &FieldValue, event_time: i64) -> usize {
        let Some(time_index) = self.records.get_mut(key) else {
            return 0;
        };
        let removed = time_index.remove(&event_time).map_or(0, |e| e.len());
        if time_index.is_empty() {
            self.records.remove(key);
        }
        if removed > 0 {
            self.record_count -= removed;
            self.recompute_earliest();
            self.check_capacity();
        }
        removed
    }

    fn evict_before(
        &mut self,
        cutoff: i64,
        on_evict: &mut dyn FnMut(FieldValue, WindowEntry),
    ) -> usize {
        match self.earliest {
            Some(earliest) if earliest < cutoff => {}
            _ => return 0,
        }

        let mut evicted = 0;
        self.records.retain(|key, time_index| {
            let retained = time_index.split_off(&cutoff);
            let expired = std::mem::replace(time_index, retained);
            for (_, entries) in expired {
                for entry in entries {
                    evicted += 1;
                    on_evict(key.clone(), entry);
                }
            }
            !time_index.is_empty()
        });

        self.record_count -= evicted;
        self.stats.records_evicted += evicted as u64;
        self.recompute_earliest();
        self.check_capacity();
        evicted
    }

    fn record_count(&self) -> usize {
        self.record_count
    }

    fn key_count(&self) -> usize {
        self.records.len()
    }
}
