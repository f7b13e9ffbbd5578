//! Windowed stream-stream join operator
//!
//! Coordinates join processing across two windowed state stores:
//! 1. Drop records with a NULL key or arriving later than the allowed lateness
//! 2. Probe the opposite side's buffer within the join window
//! 3. Buffer the record on its own side
//! 4. Advance stream time and close entries whose window and grace have passed,
//!    emitting null-padded rows for unmatched entries of preserved sides
//!
//! Stream time is the largest event time observed on either side.

use crate::velostream::sql::execution::join::state_store::{WindowEntry, WindowedStateStore};
use crate::velostream::sql::execution::join::windows::{JoinSide, JoinType, JoinWindows};
use crate::velostream::sql::execution::types::{FieldValue, StreamRecord};

/// Statistics for monitoring join operator behavior
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct JoinStats {
    /// Records processed from left side
    pub left_records_processed: u64,
    /// Records processed from right side
    pub right_records_processed: u64,
    /// Records dropped for arriving too late
    pub late_records_dropped: u64,
    /// Records dropped for having a NULL join key
    pub null_key_records_dropped: u64,
    /// Joined rows emitted
    pub matches_emitted: u64,
    /// Null-padded rows emitted for unmatched records
    pub unmatched_emitted: u64,
    /// Entries closed and removed from the buffers
    pub entries_evicted: u64,
}

/// Stream-stream join over two windowed state stores
#[derive(Debug)]
pub struct WindowedJoinOperator<S: WindowedStateStore> {
    join_type: JoinType,
    windows: JoinWindows,
    left_store: S,
    right_store: S,
    left_width: usize,
    right_width: usize,
    /// Largest event time observed on either side
    stream_time: Option<i64>,
    stats: JoinStats,
}

impl<S: WindowedStateStore> WindowedJoinOperator<S> {
    /// `left_width`/`right_width` are the column counts used for null padding
    pub fn new(
        join_type: JoinType,
        windows: JoinWindows,
        left_store: S,
        right_store: S,
        left_width: usize,
        right_width: usize,
    ) -> Self {
        Self {
            join_type,
            windows,
            left_store,
            right_store,
            left_width,
            right_width,
            stream_time: None,
            stats: JoinStats::default(),
        }
    }

    /// Process a record from the specified side.
    ///
    /// The record's key and timestamp are the join key and event time. Returns
    /// the joined rows followed by any null-padded rows produced by closing
    /// expired entries.
    pub fn process(&mut self, side: JoinSide, record: StreamRecord) -> Vec<StreamRecord> {
        match side {
            JoinSide::Left => self.stats.left_records_processed += 1,
            JoinSide::Right => self.stats.right_records_processed += 1,
        }

        // A NULL key never equals another key; such records neither probe nor buffer
        if record.key.is_null() {
            self.stats.null_key_records_dropped += 1;
            log::debug!("Dropping {:?} record with NULL join key", side);
            return Vec::new();
        }

        let event_time = record.timestamp;
        if self.is_late(event_time) {
            self.stats.late_records_dropped += 1;
            log::debug!(
                "Dropping late {:?} record at {} (stream time {:?}, max lateness {}ms)",
                side,
                event_time,
                self.stream_time,
                self.windows.max_lateness_ms
            );
            return Vec::new();
        }

        let (from, to) = self.windows.probe_range(side, event_time);
        let other = match side {
            JoinSide::Left => &mut self.right_store,
            JoinSide::Right => &mut self.left_store,
        };

        let mut output = Vec::new();
        for entry in other.range_mut(&record.key, from, to) {
            entry.matched = true;
            output.push(match side {
                JoinSide::Left => join_rows(&record, &entry.record),
                JoinSide::Right => join_rows(&entry.record, &record),
            });
        }
        self.stats.matches_emitted += output.len() as u64;

        let matched = !output.is_empty();
        let key = record.key.clone();
        let own = match side {
            JoinSide::Left => &mut self.left_store,
            JoinSide::Right => &mut self.right_store,
        };
        own.put(key.clone(), event_time, record);
        if matched {
            for entry in own.range_mut(&key, event_time, event_time) {
                entry.matched = true;
            }
        }

        self.stream_time = Some(self.stream_time.map_or(event_time, |st| st.max(event_time)));
        output.extend(self.close_expired());
        output
    }

    /// Close every buffered entry, emitting null-padded rows for unmatched
    /// entries of preserved sides. Used when the query stops.
    pub fn flush(&mut self) -> Vec<StreamRecord> {
        self.close_before(i64::MAX, i64::MAX)
    }

    /// Number of entries buffered on both sides
    pub fn retained_state_size(&self) -> usize {
        self.left_store.record_count() + self.right_store.record_count()
    }

    pub fn stream_time(&self) -> Option<i64> {
        self.stream_time
    }

    pub fn stats(&self) -> &JoinStats {
        &self.stats
    }

    pub fn windows(&self) -> &JoinWindows {
        &self.windows
    }

    pub fn join_type(&self) -> JoinType {
        self.join_type
    }

    pub fn left_store(&self) -> &S {
        &self.left_store
    }

    pub fn right_store(&self) -> &S {
        &self.right_store
    }

    fn is_late(&self, event_time: i64) -> bool {
        self.stream_time
            .is_some_and(|st| event_time < st.saturating_sub(self.windows.max_lateness_ms))
    }

    fn close_expired(&mut self) -> Vec<StreamRecord> {
        let Some(stream_time) = self.stream_time else {
            return Vec::new();
        };
        // An entry at t closes once t + reach + grace < stream time, i.e. t < cutoff
        let left_cutoff = self.windows.retention_cutoff(JoinSide::Left, stream_time);
        let right_cutoff = self.windows.retention_cutoff(JoinSide::Right, stream_time);
        self.close_before(left_cutoff, right_cutoff)
    }

    fn close_before(&mut self, left_cutoff: i64, right_cutoff: i64) -> Vec<StreamRecord> {
        let mut unmatched: Vec<(JoinSide, WindowEntry)> = Vec::new();
        let preserve_left = self.join_type.preserves(JoinSide::Left);
        let preserve_right = self.join_type.preserves(JoinSide::Right);

        let evicted_left = self.left_store.evict_before(left_cutoff, &mut |_, entry| {
            if preserve_left && !entry.matched {
                unmatched.push((JoinSide::Left, entry));
            }
        });
        let evicted_right = self.right_store.evict_before(right_cutoff, &mut |_, entry| {
            if preserve_right && !entry.matched {
                unmatched.push((JoinSide::Right, entry));
            }
        });
        self.stats.entries_evicted += (evicted_left + evicted_right) as u64;

        unmatched.sort_by_key(|(_, entry)| entry.event_time);
        let padded: Vec<StreamRecord> = unmatched
            .into_iter()
            .map(|(side, entry)| match side {
                JoinSide::Left => pad_right(entry.record, self.right_width),
                JoinSide::Right => pad_left(entry.record, self.left_width),
            })
            .collect();
        self.stats.unmatched_emitted += padded.len() as u64;
        padded
    }
}

/// Joined row: left columns followed by right columns, at the later timestamp
fn join_rows(left: &StreamRecord, right: &StreamRecord) -> StreamRecord {
    let mut columns = Vec::with_capacity(left.columns.len() + right.columns.len());
    columns.extend(left.columns.iter().cloned());
    columns.extend(right.columns.iter().cloned());

    StreamRecord {
        key: left.key.clone(),
        columns,
        timestamp: left.timestamp.max(right.timestamp),
        partition: left.partition,
        offset: left.offset,
    }
}

fn pad_right(mut left: StreamRecord, right_width: usize) -> StreamRecord {
    left.columns
        .extend(std::iter::repeat_n(FieldValue::Null, right_width));
    left
}

fn pad_left(right: StreamRecord, left_width: usize) -> StreamRecord {
    let mut columns = Vec::with_capacity(left_width + right.columns.len());
    columns.extend(std::iter::repeat_n(FieldValue::Null, left_width));
    columns.extend(right.columns);
    StreamRecord { columns, ..right }
}
