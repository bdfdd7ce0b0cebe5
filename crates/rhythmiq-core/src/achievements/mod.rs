//! Achievement unlocking.
//!
//! The client computes a metric (tasks completed, current level, ...) and
//! asks the store which achievements of that kind the value satisfies.
//! Uniqueness of `(user, achievement)` is enforced by the store, not here.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{Result, ValidationError};

/// Metric an achievement is gated on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequirementType {
    LevelReached,
    TasksCompleted,
    LikedTracks,
    PlaylistsCreated,
    ChallengesCompleted,
    FeedbackSubmitted,
}

impl RequirementType {
    pub const ALL: [RequirementType; 6] = [
        RequirementType::LevelReached,
        RequirementType::TasksCompleted,
        RequirementType::LikedTracks,
        RequirementType::PlaylistsCreated,
        RequirementType::ChallengesCompleted,
        RequirementType::FeedbackSubmitted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequirementType::LevelReached => "level_reached",
            RequirementType::TasksCompleted => "tasks_completed",
            RequirementType::LikedTracks => "liked_tracks",
            RequirementType::PlaylistsCreated => "playlists_created",
            RequirementType::ChallengesCompleted => "challenges_completed",
            RequirementType::FeedbackSubmitted => "feedback_submitted",
        }
    }
}

impl fmt::Display for RequirementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequirementType {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        RequirementType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidValue {
                field: "requirement_type".into(),
                message: format!("unknown requirement type '{s}'"),
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementRequirement {
    pub requirement_type: RequirementType,
    pub requirement_value: u64,
}

impl AchievementRequirement {
    pub fn is_satisfied_by(&self, metric: u64) -> bool {
        metric >= self.requirement_value
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
    pub requirement: AchievementRequirement,
}

/// Result of a single unlock attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnlockOutcome {
    Unlocked,
    AlreadyUnlocked,
}

/// An achievement with the user's unlock status, for badge listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Badge {
    #[serde(flatten)]
    pub achievement: Achievement,
    pub unlocked: bool,
}

/// The external achievement store.
pub trait AchievementStore: Send + Sync {
    /// Every achievement, ordered by requirement value ascending.
    fn list_all(&self) -> Result<Vec<Achievement>>;

    /// Ids of achievements of `requirement_type` with value `<= value`.
    fn list_candidates(&self, requirement_type: RequirementType, value: u64)
        -> Result<Vec<String>>;

    fn list_unlocked(&self, user: Uuid) -> Result<HashSet<String>>;

    /// Record an unlock. Must be idempotent.
    fn unlock(&self, user: Uuid, achievement_id: &str) -> Result<UnlockOutcome>;
}

#[derive(Clone)]
pub struct AchievementEvaluator {
    store: Arc<dyn AchievementStore>,
}

impl AchievementEvaluator {
    pub fn new(store: Arc<dyn AchievementStore>) -> Self {
        Self { store }
    }

    /// Unlock every achievement of `requirement_type` that `value` satisfies
    /// and the user does not have yet. Returns the ids newly unlocked.
    ///
    /// Individual unlock failures are logged and skipped; the remaining
    /// candidates are still attempted.
    pub fn check_and_unlock(
        &self,
        user: Uuid,
        requirement_type: RequirementType,
        value: u64,
    ) -> Result<Vec<String>> {
        let candidates = self.store.list_candidates(requirement_type, value)?;
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        let unlocked = self.store.list_unlocked(user)?;

        let mut newly = Vec::new();
        for id in candidates.iter().filter(|id| !unlocked.contains(*id)) {
            match self.store.unlock(user, id) {
                Ok(UnlockOutcome::Unlocked) => {
                    info!(%user, achievement = %id, "Achievement unlocked");
                    newly.push(id.clone());
                }
                Ok(UnlockOutcome::AlreadyUnlocked) => {
                    debug!(%user, achievement = %id, "Achievement already unlocked");
                }
                Err(e) => {
                    warn!(%user, achievement = %id, error = %e, "Achievement unlock failed");
                }
            }
        }
        Ok(newly)
    }

    /// All achievements with the user's unlock status.
    pub fn badges(&self, user: Uuid) -> Result<Vec<Badge>> {
        let unlocked = self.store.list_unlocked(user)?;
        Ok(self
            .store
            .list_all()?
            .into_iter()
            .map(|achievement| Badge {
                unlocked: unlocked.contains(&achievement.id),
                achievement,
            })
            .collect())
    }
}


#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    fn store() -> FakeAchievements {
        FakeAchievements {
            catalog: vec![
                achievement("first_task", RequirementType::TasksCompleted, 1),
                achievement("ten_tasks", RequirementType::TasksCompleted, 10),
                achievement("level_2", RequirementType::LevelReached, 2),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn unlocks_only_satisfied_requirements_of_the_type() {
        let store = Arc::new(store());
        let evaluator = AchievementEvaluator::new(store.clone());
        let user = Uuid::new_v4();

        let newly = evaluator
            .check_and_unlock(user, RequirementType::TasksCompleted, 3)
            .unwrap();
        assert_eq!(newly, vec!["first_task".to_string()]);
    }

    #[test]
    fn already_unlocked_are_not_reinserted() {
        let store = Arc::new(store());
        let evaluator = AchievementEvaluator::new(store.clone());
        let user = Uuid::new_v4();

        evaluator
            .check_and_unlock(user, RequirementType::TasksCompleted, 1)
            .unwrap();
        let newly = evaluator
            .check_and_unlock(user, RequirementType::TasksCompleted, 12)
            .unwrap();
        assert_eq!(newly, vec!["ten_tasks".to_string()]);
        assert_eq!(store.inserts.lock().unwrap().len(), 2);
    }

    #[test]
    fn failed_unlock_does_not_block_others() {
        let mut fake = store();
        fake.failing.insert("first_task".into());
        let store = Arc::new(fake);
        let evaluator = AchievementEvaluator::new(store.clone());

        let newly = evaluator
            .check_and_unlock(Uuid::new_v4(), RequirementType::TasksCompleted, 10)
            .unwrap();
        assert_eq!(newly, vec!["ten_tasks".to_string()]);
    }

    #[test]
    fn badges_report_unlock_status_in_value_order() {
        let store = Arc::new(store());
        let evaluator = AchievementEvaluator::new(store.clone());
        let user = Uuid::new_v4();
        evaluator
            .check_and_unlock(user, RequirementType::LevelReached, 2)
            .unwrap();

        let badges = evaluator.badges(user).unwrap();
        let summary: Vec<(&str, bool)> = badges
            .iter()
            .map(|b| (b.achievement.id.as_str(), b.unlocked))
            .collect();
        assert_eq!(
            summary,
            vec![("first_task", false), ("level_2", true), ("ten_tasks", false)]
        );
    }

    #[test]
    fn requirement_type_parses_wire_names() {
        for t in RequirementType::ALL {
            assert_eq!(t.as_str().parse::<RequirementType>().unwrap(), t);
        }
        assert!("streak_days".parse::<RequirementType>().is_err());
    }
}
