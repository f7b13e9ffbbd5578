//! Join window configuration.

use crate::velostream::sql::error::JoinWindowError;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Which side of the join a record belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JoinSide {
    Left,
    Right,
}

impl JoinSide {
    /// Get the opposite side
    pub fn opposite(&self) -> Self {
        match self {
            JoinSide::Left => JoinSide::Right,
            JoinSide::Right => JoinSide::Left,
        }
    }
}

/// Type of stream-stream join
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JoinType {
    /// Only matching records from both sides
    #[default]
    Inner,
    /// All left records; unmatched ones padded with NULLs once their window closes
    Left,
    /// All records from both sides
    Outer,
}

impl JoinType {
    /// Whether unmatched records of `side` produce a null-padded row
    pub fn preserves(&self, side: JoinSide) -> bool {
        match self {
            JoinType::Inner => false,
            JoinType::Left => side == JoinSide::Left,
            JoinType::Outer => true,
        }
    }
}

/// Time bounds of a windowed stream-stream join, in milliseconds.
///
/// A left record at `T` matches right records with event time in
/// `[T - before, T + after]`; both bounds are inclusive. A buffered left
/// record stays joinable until stream time passes `T + after + grace`, a right
/// record until it passes `T + before + grace`. Records older than stream time
/// minus `max_lateness` are dropped on arrival.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JoinWindows {
    pub before_ms: i64,
    pub after_ms: i64,
    pub grace_ms: i64,
    pub max_lateness_ms: i64,
}

impl JoinWindows {
    /// Validated windows from millisecond values
    pub fn new(
        before_ms: i64,
        after_ms: i64,
        grace_ms: i64,
        max_lateness_ms: i64,
    ) -> Result<Self, JoinWindowError> {
        let windows = Self {
            before_ms,
            after_ms,
            grace_ms,
            max_lateness_ms,
        };
        windows.validate()?;
        Ok(windows)
    }

    /// Symmetric window of `size` on both sides
    pub fn of(size: Duration) -> Result<Self, JoinWindowError> {
        Self::from_durations(size, size, Duration::ZERO, Duration::ZERO)
    }

    pub fn from_durations(
        before: Duration,
        after: Duration,
        grace: Duration,
        max_lateness: Duration,
    ) -> Result<Self, JoinWindowError> {
        Self::new(
            to_millis(before, "before")?,
            to_millis(after, "after")?,
            to_millis(grace, "grace")?,
            to_millis(max_lateness, "max_lateness")?,
        )
    }

    pub fn with_grace(self, grace_ms: i64) -> Result<Self, JoinWindowError> {
        Self::new(self.before_ms, self.after_ms, grace_ms, self.max_lateness_ms)
    }

    pub fn with_max_lateness(self, max_lateness_ms: i64) -> Result<Self, JoinWindowError> {
        Self::new(self.before_ms, self.after_ms, self.grace_ms, max_lateness_ms)
    }

    pub fn validate(&self) -> Result<(), JoinWindowError> {
        if self.before_ms < 0 {
            return Err(JoinWindowError::NegativeBound {
                bound: "before",
                value_ms: self.before_ms,
            });
        }
        if self.after_ms < 0 {
            return Err(JoinWindowError::NegativeBound {
                bound: "after",
                value_ms: self.after_ms,
            });
        }
        if self.grace_ms < 0 {
            return Err(JoinWindowError::NegativeGrace {
                grace_ms: self.grace_ms,
            });
        }
        if self.max_lateness_ms < 0 {
            return Err(JoinWindowError::NegativeBound {
                bound: "max_lateness",
                value_ms: self.max_lateness_ms,
            });
        }
        if self.grace_ms < self.max_lateness_ms {
            return Err(JoinWindowError::GraceShorterThanLateness {
                grace_ms: self.grace_ms,
                max_lateness_ms: self.max_lateness_ms,
            });
        }
        Ok(())
    }

    /// Event-time range of the other side that a record at `event_time` on `side` joins with
    pub fn probe_range(&self, side: JoinSide, event_time: i64) -> (i64, i64) {
        match side {
            JoinSide::Left => (
                event_time.saturating_sub(self.before_ms),
                event_time.saturating_add(self.after_ms),
            ),
            JoinSide::Right => (
                event_time.saturating_sub(self.after_ms),
                event_time.saturating_add(self.before_ms),
            ),
        }
    }

    /// Oldest event time still retained on `side` at `stream_time`.
    ///
    /// An entry at `t` is closed once `t + reach + grace < stream_time`.
    pub fn retention_cutoff(&self, side: JoinSide, stream_time: i64) -> i64 {
        let reach = match side {
            JoinSide::Left => self.after_ms,
            JoinSide::Right => self.before_ms,
        };
        stream_time
            .saturating_sub(reach)
            .saturating_sub(self.grace_ms)
    }
}

fn to_millis(duration: Duration, what: &'static str) -> Result<i64, JoinWindowError> {
    i64::try_from(duration.as_millis()).map_err(|_| JoinWindowError::DurationOverflow { what })
}
