//! Stream-stream JOIN operator
//!
//! Binds a [`WindowedJoinOperator`] over in-memory stores to a plan step and
//! reports its activity under the step's logger.

use crate::velostream::config::JoinDefaults;
use crate::velostream::sql::error::SqlResult;
use crate::velostream::sql::execution::join::{
    InMemoryWindowStore, JoinSide, JoinStats, JoinWindows, WindowStoreConfig, WindowedJoinOperator,
};
use crate::velostream::sql::execution::types::StreamRecord;
use crate::velostream::sql::plan::StreamStreamJoin;
use std::time::Duration;

/// Join windows for a plan step, completed with the engine defaults.
///
/// Fails with [`JoinWindowError::GraceShorterThanLateness`] when the grace
/// period, explicit or default, is shorter than the configured maximum lateness.
///
/// [`JoinWindowError::GraceShorterThanLateness`]: crate::velostream::sql::error::JoinWindowError::GraceShorterThanLateness
pub fn join_windows_for(node: &StreamStreamJoin, defaults: &JoinDefaults) -> SqlResult<JoinWindows> {
    let grace = match node.window.grace {
        Some(grace) => grace,
        None => Duration::from_millis(defaults.grace_ms.max(0) as u64),
    };
    let max_lateness = Duration::from_millis(defaults.max_lateness_ms.max(0) as u64);
    Ok(JoinWindows::from_durations(
        node.window.before,
        node.window.after,
        grace,
        max_lateness,
    )?)
}

#[derive(Debug)]
pub struct JoinOperator {
    inner: WindowedJoinOperator<InMemoryWindowStore>,
    logger: String,
    reported_late: u64,
}

impl JoinOperator {
    pub fn new(
        node: &StreamStreamJoin,
        defaults: &JoinDefaults,
        logger: impl Into<String>,
    ) -> SqlResult<Self> {
        let logger = logger.into();
        let windows = join_windows_for(node, defaults)?;
        let store_config = WindowStoreConfig {
            max_records: defaults.max_records_per_store,
            warning_threshold_pct: defaults.warning_threshold_pct,
        };
        let left_store =
            InMemoryWindowStore::with_config(format!("{}.left", logger), store_config.clone());
        let right_store =
            InMemoryWindowStore::with_config(format!("{}.right", logger), store_config);

        log::info!(
            target: logger.as_str(),
            "{:?} join WITHIN ({}ms, {}ms) GRACE {}ms, max lateness {}ms",
            node.join_type,
            windows.before_ms,
            windows.after_ms,
            windows.grace_ms,
            windows.max_lateness_ms
        );

        Ok(Self {
            inner: WindowedJoinOperator::new(
                node.join_type,
                windows,
                left_store,
                right_store,
                node.left.schema().len(),
                node.right.schema().len(),
            ),
            logger,
            reported_late: 0,
        })
    }

    pub fn process(&mut self, side: JoinSide, record: StreamRecord) -> Vec<StreamRecord> {
        let output = self.inner.process(side, record);
        let late = self.inner.stats().late_records_dropped;
        if late > self.reported_late {
            log::debug!(
                target: self.logger.as_str(),
                "Dropped late {:?} record (stream time {:?}, {} late so far)",
                side,
                self.inner.stream_time(),
                late
            );
            self.reported_late = late;
        }
        output
    }

    pub fn flush(&mut self) -> Vec<StreamRecord> {
        let output = self.inner.flush();
        log::debug!(
            target: self.logger.as_str(),
            "Flushed join state, {} rows emitted",
            output.len()
        );
        output
    }

    pub fn retained_state_size(&self) -> usize {
        self.inner.retained_state_size()
    }

    pub fn stats(&self) -> &JoinStats {
        self.inner.stats()
    }

    pub fn windows(&self) -> &JoinWindows {
        self.inner.windows()
    }
}
