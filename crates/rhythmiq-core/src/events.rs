use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::timer::{Phase, TimerStatus};

/// Every state change in the system produces an Event.
/// The session coordinator dispatches them; the CLI prints them as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    TimerStarted {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerPaused {
        phase: Phase,
        remaining_secs: u64,
        at: DateTime<Utc>,
    },
    TimerReset {
        at: DateTime<Utc>,
    },
    /// A multiple of the milestone spacing of focus minutes was crossed.
    FiveMinuteMilestone {
        elapsed_focus_minutes: u32,
        at: DateTime<Utc>,
    },
    /// A full focus countdown reached 0:00.
    FocusSessionComplete {
        focus_minutes: u32,
        at: DateTime<Utc>,
    },
    BreakComplete {
        at: DateTime<Utc>,
    },
    StateSnapshot {
        status: TimerStatus,
        phase: Phase,
        minutes_remaining: u32,
        seconds_remaining: u32,
        running: bool,
        elapsed_focus_minutes: u32,
        progress_pct: f64,
        at: DateTime<Utc>,
    },
    /// The ledger accepted an XP grant.
    XpGranted {
        amount: u64,
        xp: u64,
        level: u32,
        at: DateTime<Utc>,
    },
    AchievementUnlocked {
        achievement_id: String,
        at: DateTime<Utc>,
    },
    TaskCompleted {
        task_id: Uuid,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Completion events are the ones that carry rewards.
    pub fn is_reward_trigger(&self) -> bool {
        matches!(
            self,
            Event::FocusSessionComplete { .. }
                | Event::FiveMinuteMilestone { .. }
                | Event::TaskCompleted { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_snake_case_tag() {
        let event = Event::FocusSessionComplete {
            focus_minutes: 25,
            at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "focus_session_complete");
        assert_eq!(json["focus_minutes"], 25);
    }

    #[test]
    fn only_completions_trigger_rewards() {
        assert!(Event::FiveMinuteMilestone {
            elapsed_focus_minutes: 5,
            at: Utc::now()
        }
        .is_reward_trigger());
        assert!(!Event::BreakComplete { at: Utc::now() }.is_reward_trigger());
        assert!(!Event::TimerReset { at: Utc::now() }.is_reward_trigger());
    }
}
