//! Daily challenges: redeemable goals worth bonus XP.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::achievements::{AchievementEvaluator, RequirementType};
use crate::error::{Result, ValidationError};
use crate::rewards::RewardDispatcher;
use crate::session::FocusLog;
use crate::tasks::TaskStore;

/// Challenges shown at once.
pub const CHALLENGE_LIMIT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "target", rename_all = "snake_case")]
pub enum ChallengeGoal {
    /// Completed tasks, all time.
    TasksCompleted(u64),
    /// Focus minutes completed today (UTC).
    FocusMinutes(u64),
    /// Tracks across the user's playlists.
    PlaylistTracks(u64),
}

impl ChallengeGoal {
    pub fn target(&self) -> u64 {
        match *self {
            ChallengeGoal::TasksCompleted(n)
            | ChallengeGoal::FocusMinutes(n)
            | ChallengeGoal::PlaylistTracks(n) => n,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: String,
    pub title: String,
    pub description: String,
    pub xp_reward: u64,
    pub goal: ChallengeGoal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeStatus {
    #[serde(flatten)]
    pub challenge: Challenge,
    pub progress: u64,
    pub completed: bool,
}

pub trait ChallengeStore: Send + Sync {
    fn list_challenges(&self, limit: usize) -> Result<Vec<Challenge>>;

    fn completed_challenges(&self, user: Uuid) -> Result<HashSet<String>>;

    /// Record a redemption. `false` if it was already recorded.
    fn record_completion(&self, user: Uuid, challenge_id: &str) -> Result<bool>;

    fn count_completions(&self, user: Uuid) -> Result<u64>;

    fn playlist_track_count(&self, user: Uuid) -> Result<u64>;
}

pub struct ChallengeBoard {
    store: Arc<dyn ChallengeStore>,
    tasks: Arc<dyn TaskStore>,
    focus_log: Arc<dyn FocusLog>,
    dispatcher: RewardDispatcher,
    evaluator: AchievementEvaluator,
}

impl ChallengeBoard {
    pub fn new(
        store: Arc<dyn ChallengeStore>,
        tasks: Arc<dyn TaskStore>,
        focus_log: Arc<dyn FocusLog>,
        dispatcher: RewardDispatcher,
        evaluator: AchievementEvaluator,
    ) -> Self {
        Self {
            store,
            tasks,
            focus_log,
            dispatcher,
            evaluator,
        }
    }

    /// Current value of the metric a goal measures.
    pub fn progress(&self, user: Uuid, goal: &ChallengeGoal, now: DateTime<Utc>) -> Result<u64> {
        match goal {
            ChallengeGoal::TasksCompleted(_) => self.tasks.count_completed_tasks(user),
            ChallengeGoal::FocusMinutes(_) => {
                self.focus_log.focus_minutes_since(user, start_of_day(now))
            }
            ChallengeGoal::PlaylistTracks(_) => self.store.playlist_track_count(user),
        }
    }

    pub fn list(&self, user: Uuid, now: DateTime<Utc>) -> Result<Vec<ChallengeStatus>> {
        let done = self.store.completed_challenges(user)?;
        self.store
            .list_challenges(CHALLENGE_LIMIT)?
            .into_iter()
            .map(|challenge| {
                let progress = self.progress(user, &challenge.goal, now)?;
                Ok(ChallengeStatus {
                    completed: done.contains(&challenge.id),
                    progress,
                    challenge,
                })
            })
            .collect()
    }

    /// Redeem a challenge whose goal is met. Returns the XP granted, which
    /// is 0 if the ledger was unreachable (the redemption still counts).
    pub fn redeem(&self, user: Uuid, challenge_id: &str, now: DateTime<Utc>) -> Result<u64> {
        let challenge = self
            .store
            .list_challenges(usize::MAX)?
            .into_iter()
            .find(|c| c.id == challenge_id)
            .ok_or_else(|| ValidationError::NotFound {
                kind: "Challenge",
                id: challenge_id.to_string(),
            })?;

        if self.store.completed_challenges(user)?.contains(&challenge.id) {
            return Err(ValidationError::AlreadyRedeemed(challenge.title).into());
        }
        if self.progress(user, &challenge.goal, now)? < challenge.goal.target() {
            return Err(ValidationError::ChallengeIncomplete(challenge.title).into());
        }
        if !self.store.record_completion(user, &challenge.id)? {
            return Err(ValidationError::AlreadyRedeemed(challenge.title).into());
        }
        info!(%user, challenge = %challenge.id, "Challenge redeemed");

        let granted = self.dispatcher.grant_xp(user, challenge.xp_reward);
        match self.store.count_completions(user) {
            Ok(count) => {
                if let Err(e) = self.evaluator.check_and_unlock(
                    user,
                    RequirementType::ChallengesCompleted,
                    count,
                ) {
                    warn!(%user, error = %e, "Achievement check failed");
                }
            }
            Err(e) => warn!(%user, error = %e, "Could not count challenge completions"),
        }
        Ok(granted)
    }
}

fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .unwrap_or(now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn start_of_day_truncates_to_midnight_utc() {
        let now = Utc.with_ymd_and_hms(2026, 3, 14, 15, 9, 26).unwrap();
        assert_eq!(
            start_of_day(now),
            Utc.with_ymd_and_hms(2026, 3, 14, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn goal_serializes_with_kind_and_target() {
        let json = serde_json::to_value(ChallengeGoal::FocusMinutes(25)).unwrap();
        assert_eq!(json["kind"], "focus_minutes");
        assert_eq!(json["target"], 25);
    }
}
