//! Execution period of an order.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::OrderError;

/// Start and finish timestamps of the repair work on an order.
///
/// Immutable: `start` and `finish` return a new period. A finish timestamp
/// always has a start timestamp at or before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredPeriod")]
pub struct ExecutionPeriod {
    started_at: Option<DateTime<Utc>>,
    finished_at: Option<DateTime<Utc>>,
}

/// Unchecked wire form, validated by [`ExecutionPeriod::restore`].
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPeriod {
    #[serde(default)]
    started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    finished_at: Option<DateTime<Utc>>,
}

impl TryFrom<StoredPeriod> for ExecutionPeriod {
    type Error = OrderError;

    fn try_from(stored: StoredPeriod) -> Result<Self, Self::Error> {
        Self::restore(stored.started_at, stored.finished_at)
    }
}

impl ExecutionPeriod {
    /// Creates an empty period.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a period from stored timestamps, checking its invariants.
    pub fn restore(
        started_at: Option<DateTime<Utc>>,
        finished_at: Option<DateTime<Utc>>,
    ) -> Result<Self, OrderError> {
        match (started_at, finished_at) {
            (None, Some(_)) => Err(OrderError::ExecutionNotStarted),
            (Some(started_at), Some(finished_at)) if finished_at < started_at => {
                Err(OrderError::FinishBeforeStart {
                    started_at,
                    finished_at,
                })
            }
            _ => Ok(Self {
                started_at,
                finished_at,
            }),
        }
    }

    /// Returns a period started at `now`.
    ///
    /// Restarting a running period moves its start; a finished period cannot
    /// be restarted.
    pub fn start(&self, now: DateTime<Utc>) -> Result<Self, OrderError> {
        if self.is_finished() {
            return Err(OrderError::ExecutionAlreadyFinished);
        }
        Ok(Self {
            started_at: Some(now),
            finished_at: None,
        })
    }

    /// Returns a period finished at `now`.
    pub fn finish(&self, now: DateTime<Utc>) -> Result<Self, OrderError> {
        let started_at = self.started_at.ok_or(OrderError::ExecutionNotStarted)?;
        if self.is_finished() {
            return Err(OrderError::ExecutionAlreadyFinished);
        }
        if now < started_at {
            return Err(OrderError::FinishBeforeStart {
                started_at,
                finished_at: now,
            });
        }
        Ok(Self {
            started_at: Some(started_at),
            finished_at: Some(now),
        })
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    pub fn is_started(&self) -> bool {
        self.started_at.is_some()
    }

    pub fn is_finished(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Elapsed time between start and finish, if both are set.
    pub fn duration(&self) -> Option<TimeDelta> {
        Some(self.finished_at? - self.started_at?)
    }

    /// Duration rounded up to whole days; any partial day counts as one.
    pub fn duration_days(&self) -> Option<i64> {
        const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

        let millis = self.duration()?.num_milliseconds();
        Some((millis + MILLIS_PER_DAY - 1).div_euclid(MILLIS_PER_DAY))
    }
}
