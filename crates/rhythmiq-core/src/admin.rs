//! Admin dashboard: usage totals, every user and every feedback message.
//!
//! Only holders of [`ADMIN_ROLE`] may read it. The first admin of a fresh
//! database grants the role to themselves; after that only admins grant it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{CoreError, Result, ValidationError};
use crate::feed::{ChangeFeed, ChangeFilter, RowChange, Subscription, Table};

pub const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSummary {
    pub user_id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub xp: u64,
    pub level: u32,
}

/// A feedback message with its author's name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub username: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageStats {
    pub total_users: u64,
    pub total_xp: u64,
    /// Mean level, rounded to one decimal. 0 without users.
    pub avg_level: f64,
}

impl UsageStats {
    pub fn from_users(users: &[UserSummary]) -> Self {
        let total_xp = users.iter().map(|u| u.xp).sum();
        let avg_level = if users.is_empty() {
            0.0
        } else {
            let levels: u64 = users.iter().map(|u| u64::from(u.level)).sum();
            (levels as f64 / users.len() as f64 * 10.0).round() / 10.0
        };
        Self {
            total_users: users.len() as u64,
            total_xp,
            avg_level,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dashboard {
    pub stats: UsageStats,
    pub users: Vec<UserSummary>,
    pub feedback: Vec<FeedbackEntry>,
}

pub trait AdminStore: Send + Sync {
    fn has_role(&self, user: Uuid, role: &str) -> Result<bool>;

    /// `false` if the user already held the role.
    fn grant_role(&self, user: Uuid, role: &str, now: DateTime<Utc>) -> Result<bool>;

    fn count_role(&self, role: &str) -> Result<u64>;

    /// Every user with their XP, newest first.
    fn user_summaries(&self) -> Result<Vec<UserSummary>>;

    /// Every feedback message, newest first.
    fn list_feedback(&self) -> Result<Vec<FeedbackEntry>>;
}

pub struct AdminConsole {
    store: Arc<dyn AdminStore>,
}

impl AdminConsole {
    pub fn new(store: Arc<dyn AdminStore>) -> Self {
        Self { store }
    }

    pub fn is_admin(&self, user: Uuid) -> Result<bool> {
        self.store.has_role(user, ADMIN_ROLE)
    }

    pub fn dashboard(&self, caller: Option<Uuid>) -> Result<Dashboard> {
        self.require_admin(caller)?;
        let users = self.store.user_summaries()?;
        Ok(Dashboard {
            stats: UsageStats::from_users(&users),
            users,
            feedback: self.store.list_feedback()?,
        })
    }

    /// Make `target` an admin. Returns `false` if they already were.
    pub fn grant_admin(&self, caller: Option<Uuid>, target: Uuid, now: DateTime<Utc>) -> Result<bool> {
        let caller = caller.ok_or(CoreError::NotAuthenticated)?;
        let bootstrap = caller == target && self.store.count_role(ADMIN_ROLE)? == 0;
        if !bootstrap {
            self.require_admin(Some(caller))?;
        }
        let granted = self.store.grant_role(target, ADMIN_ROLE, now)?;
        if granted {
            info!(%caller, %target, bootstrap, "Admin role granted");
        }
        Ok(granted)
    }

    /// Call `on_change` for every feedback mutation until the guard drops.
    pub fn watch_feedback(
        feed: &dyn ChangeFeed,
        on_change: impl Fn(&RowChange) + Send + Sync + 'static,
    ) -> Subscription {
        feed.subscribe(Table::Feedback, ChangeFilter::All, Box::new(on_change))
    }

    fn require_admin(&self, caller: Option<Uuid>) -> Result<Uuid> {
        let caller = caller.ok_or(CoreError::NotAuthenticated)?;
        if !self.is_admin(caller)? {
            return Err(ValidationError::RoleRequired(ADMIN_ROLE).into());
        }
        Ok(caller)
    }
}
