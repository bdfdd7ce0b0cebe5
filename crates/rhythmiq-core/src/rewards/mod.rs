//! XP rewards.
//!
//! XP lives in an external ledger; this module only asks the ledger for
//! increments and mirrors the last balance it successfully fetched into an
//! [`XpDisplay`] for whoever renders it.

mod display;

pub use display::XpDisplay;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::Result;

/// XP needed to climb one level.
pub const XP_PER_LEVEL: u64 = 100;

/// Level for a lifetime XP total: `floor(xp / 100) + 1`.
pub fn level_for_xp(xp: u64) -> u32 {
    u32::try_from(xp / XP_PER_LEVEL)
        .unwrap_or(u32::MAX - 1)
        .saturating_add(1)
}

/// A user's ledger entry as last reported by the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct XpBalance {
    pub xp: u64,
    pub level: u32,
}

impl XpBalance {
    pub fn from_xp(xp: u64) -> Self {
        Self {
            xp,
            level: level_for_xp(xp),
        }
    }

    pub fn progress(&self) -> XpProgress {
        XpProgress::from_balance(self)
    }
}

/// Position within the current level, as the XP bar shows it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct XpProgress {
    pub level: u32,
    pub xp_into_level: u64,
    pub xp_per_level: u64,
    pub percent: f64,
}

impl XpProgress {
    pub fn from_balance(balance: &XpBalance) -> Self {
        let floor = u64::from(balance.level.saturating_sub(1)) * XP_PER_LEVEL;
        let into = balance.xp.saturating_sub(floor).min(XP_PER_LEVEL);
        Self {
            level: balance.level,
            xp_into_level: into,
            xp_per_level: XP_PER_LEVEL,
            percent: into as f64 / XP_PER_LEVEL as f64 * 100.0,
        }
    }
}

/// XP amounts granted for each reward trigger.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardSettings {
    #[serde(default = "default_focus_session_xp")]
    pub focus_session_xp: u64,
    #[serde(default = "default_milestone_xp")]
    pub milestone_xp: u64,
    #[serde(default = "default_task_xp")]
    pub task_xp: u64,
}

fn default_focus_session_xp() -> u64 {
    50
}
fn default_milestone_xp() -> u64 {
    5
}
fn default_task_xp() -> u64 {
    5
}

impl Default for RewardSettings {
    fn default() -> Self {
        Self {
            focus_session_xp: default_focus_session_xp(),
            milestone_xp: default_milestone_xp(),
            task_xp: default_task_xp(),
        }
    }
}

/// The external XP ledger.
///
/// XP is monotonically increasing; `increment` is the only mutation.
pub trait Ledger: Send + Sync {
    /// Add `amount` to the user's XP and return the new balance.
    fn increment(&self, user: Uuid, amount: u64) -> Result<XpBalance>;

    /// Current balance without changing it.
    fn balance(&self, user: Uuid) -> Result<XpBalance>;
}

/// Turns reward triggers into ledger increments.
///
/// Grants are at-most-once: a failed increment is logged and dropped, never
/// retried.
#[derive(Clone)]
pub struct RewardDispatcher {
    ledger: Arc<dyn Ledger>,
    display: XpDisplay,
}

impl RewardDispatcher {
    pub fn new(ledger: Arc<dyn Ledger>, display: XpDisplay) -> Self {
        Self { ledger, display }
    }

    pub fn display(&self) -> &XpDisplay {
        &self.display
    }

    pub fn ledger(&self) -> &Arc<dyn Ledger> {
        &self.ledger
    }

    /// Grant `amount` XP. Returns the amount actually granted: `amount` on
    /// success, 0 when the ledger call fails or `amount` is 0.
    ///
    /// On success the display is updated with the ledger's returned balance;
    /// on failure it is left untouched.
    pub fn grant_xp(&self, user: Uuid, amount: u64) -> u64 {
        if amount == 0 {
            return 0;
        }
        match self.ledger.increment(user, amount) {
            Ok(balance) => {
                info!(%user, amount, xp = balance.xp, level = balance.level, "XP granted");
                self.display.publish(balance);
                amount
            }
            Err(e) => {
                warn!(%user, amount, error = %e, "XP grant dropped");
                0
            }
        }
    }

    /// Re-read the balance from the ledger and publish it.
    pub fn refresh(&self, user: Uuid) -> Result<XpBalance> {
        let balance = self.ledger.balance(user)?;
        self.display.publish(balance);
        Ok(balance)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::error::CoreError;

    /// In-memory ledger with a failure switch.
    #[derive(Default)]
    pub struct FakeLedger {
        pub xp: Mutex<HashMap<Uuid, u64>>,
        pub fail: AtomicBool,
        pub calls: AtomicUsize,
    }

    impl FakeLedger {
        pub fn with_xp(user: Uuid, xp: u64) -> Self {
            let ledger = Self::default();
            ledger.xp.lock().unwrap().insert(user, xp);
            ledger
        }

        pub fn xp_of(&self, user: Uuid) -> u64 {
            self.xp.lock().unwrap().get(&user).copied().unwrap_or(0)
        }
    }

    impl Ledger for FakeLedger {
        fn increment(&self, user: Uuid, amount: u64) -> Result<XpBalance> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(CoreError::Network("ledger unreachable".into()));
            }
            let mut xp = self.xp.lock().unwrap();
            let entry = xp.entry(user).or_insert(0);
            *entry += amount;
            Ok(XpBalance::from_xp(*entry))
        }

        fn balance(&self, user: Uuid) -> Result<XpBalance> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(CoreError::Network("ledger unreachable".into()));
            }
            Ok(XpBalance::from_xp(self.xp_of(user)))
        }
    }
}
