//! Session coordination: the timer, its reward side effects, and the
//! runtime that ticks it.

mod coordinator;
mod runtime;
mod worker;

pub use coordinator::SessionCoordinator;
pub use runtime::Session;
pub use worker::{JobReport, RewardContext, RewardJob, RewardQueue, RewardWorker};

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;

/// Record of completed focus sessions.
pub trait FocusLog: Send + Sync {
    fn record_focus(&self, user: Uuid, minutes: u32, completed_at: DateTime<Utc>) -> Result<()>;

    /// Focus minutes completed at or after `since`.
    fn focus_minutes_since(&self, user: Uuid, since: DateTime<Utc>) -> Result<u64>;
}
