use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Minimum time a task must stay open before it can be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeLock {
    pub hours: u32,
    pub minutes: u32,
    pub seconds: u32,
    pub started_at: DateTime<Utc>,
}

/// Time left on a lock, whole seconds rounded down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Remaining {
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl Remaining {
    fn from_secs(total: u64) -> Self {
        Self {
            hours: total / 3600,
            minutes: (total % 3600) / 60,
            seconds: total % 60,
        }
    }
}

impl TimeLock {
    /// A lock of zero length is rejected.
    pub fn new(
        hours: u32,
        minutes: u32,
        seconds: u32,
        started_at: DateTime<Utc>,
    ) -> Result<Self, ValidationError> {
        if hours == 0 && minutes == 0 && seconds == 0 {
            return Err(ValidationError::MissingTimeLock);
        }
        Ok(Self {
            hours,
            minutes,
            seconds,
            started_at,
        })
    }

    pub fn duration(&self) -> Duration {
        Duration::seconds(
            i64::from(self.hours) * 3600 + i64::from(self.minutes) * 60 + i64::from(self.seconds),
        )
    }

    /// `None` once the lock has elapsed at `now`.
    pub fn remaining(&self, now: DateTime<Utc>) -> Option<Remaining> {
        let elapsed = now.signed_duration_since(self.started_at);
        let left = self.duration() - elapsed;
        if left <= Duration::zero() {
            return None;
        }
        let secs = u64::try_from(left.num_seconds()).unwrap_or(0);
        Some(Remaining::from_secs(secs))
    }

    pub fn check(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        match self.remaining(now) {
            None => Ok(()),
            Some(r) => Err(ValidationError::WaitRemaining {
                hours: r.hours,
                minutes: r.minutes,
                seconds: r.seconds,
            }),
        }
    }
}
