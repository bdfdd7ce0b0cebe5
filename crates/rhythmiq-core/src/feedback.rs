//! User feedback submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::achievements::{AchievementEvaluator, RequirementType};
use crate::error::{Result, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

pub trait FeedbackStore: Send + Sync {
    fn insert_feedback(&self, user: Uuid, feedback: &Feedback) -> Result<()>;

    fn count_feedback(&self, user: Uuid) -> Result<u64>;
}

/// Store the message and check `feedback_submitted` achievements.
pub fn submit(
    store: &dyn FeedbackStore,
    evaluator: &AchievementEvaluator,
    user: Uuid,
    message: &str,
    now: DateTime<Utc>,
) -> Result<Feedback> {
    let message = message.trim();
    if message.is_empty() {
        return Err(ValidationError::EmptyText("Feedback").into());
    }
    let feedback = Feedback {
        id: Uuid::new_v4(),
        message: message.to_string(),
        created_at: now,
    };
    store.insert_feedback(user, &feedback)?;
    info!(%user, "Feedback submitted");

    match store.count_feedback(user) {
        Ok(count) => {
            if let Err(e) =
                evaluator.check_and_unlock(user, RequirementType::FeedbackSubmitted, count)
            {
                warn!(%user, error = %e, "Achievement check failed");
            }
        }
        Err(e) => warn!(%user, error = %e, "Could not count feedback"),
    }
    Ok(feedback)
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::achievements::testing::{achievement, FakeAchievements};
    use crate::achievements::AchievementStore;
    use crate::error::CoreError;

    #[derive(Default)]
    struct FakeFeedback(Mutex<Vec<Feedback>>);

    impl FeedbackStore for FakeFeedback {
        fn insert_feedback(&self, _user: Uuid, feedback: &Feedback) -> Result<()> {
            self.0.lock().unwrap().push(feedback.clone());
            Ok(())
        }

        fn count_feedback(&self, _user: Uuid) -> Result<u64> {
            Ok(self.0.lock().unwrap().len() as u64)
        }
    }

    #[test]
    fn blank_feedback_is_rejected() {
        let store = FakeFeedback::default();
        let evaluator = AchievementEvaluator::new(Arc::new(FakeAchievements::default()));
        let err = submit(&store, &evaluator, Uuid::new_v4(), "   ", Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::EmptyText("Feedback"))
        ));
        assert!(store.0.lock().unwrap().is_empty());
    }

    #[test]
    fn first_feedback_unlocks_achievement() {
        let store = FakeFeedback::default();
        let achievements = Arc::new(FakeAchievements {
            catalog: vec![achievement("voice-heard", RequirementType::FeedbackSubmitted, 1)],
            ..Default::default()
        });
        let evaluator = AchievementEvaluator::new(achievements.clone());
        let user = Uuid::new_v4();

        let fb = submit(&store, &evaluator, user, " Love the lofi mix ", Utc::now()).unwrap();
        assert_eq!(fb.message, "Love the lofi mix");
        assert!(achievements.list_unlocked(user).unwrap().contains("voice-heard"));
    }
}
