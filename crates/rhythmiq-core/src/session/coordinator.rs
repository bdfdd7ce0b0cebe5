use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::worker::{RewardJob, RewardQueue};
use crate::error::{CoreError, Result};
use crate::events::Event;
use crate::tasks::{TaskBoard, TaskToggle};
use crate::timer::{TimerEngine, TimerSettings};

/// Owns the timer for one mounted session and turns its events into
/// reward jobs.
///
/// Without a signed-in user every reward path is a silent no-op.
pub struct SessionCoordinator {
    engine: TimerEngine,
    user: Option<Uuid>,
    queue: RewardQueue,
}

impl SessionCoordinator {
    pub fn new(settings: TimerSettings, user: Option<Uuid>, queue: RewardQueue) -> Self {
        Self {
            engine: TimerEngine::new(settings),
            user,
            queue,
        }
    }

    pub fn engine(&self) -> &TimerEngine {
        &self.engine
    }

    pub fn user(&self) -> Option<Uuid> {
        self.user
    }

    pub fn set_user(&mut self, user: Option<Uuid>) {
        self.user = user;
    }

    pub fn start(&mut self) -> Option<Event> {
        self.engine.start()
    }

    pub fn pause(&mut self) -> Option<Event> {
        self.engine.pause()
    }

    pub fn toggle(&mut self) -> Option<Event> {
        self.engine.toggle()
    }

    pub fn reset(&mut self) -> Event {
        self.engine.reset()
    }

    pub fn snapshot(&self) -> Event {
        self.engine.snapshot()
    }

    /// Advance the timer one second and dispatch whatever it emits.
    pub fn tick(&mut self) -> Option<Event> {
        let event = self.engine.tick()?;
        match &event {
            Event::FocusSessionComplete { .. } => info!("Focus session complete"),
            Event::BreakComplete { .. } => info!("Break complete"),
            _ => {}
        }
        self.dispatch(&event);
        Some(event)
    }

    /// Queue the reward job for `event`, if it carries one and a user is
    /// signed in. Returns the queued job.
    pub fn dispatch(&self, event: &Event) -> Option<RewardJob> {
        if !event.is_reward_trigger() {
            return None;
        }
        let Some(user) = self.user else {
            debug!("No user signed in, skipping reward");
            return None;
        };
        let job = match event {
            Event::FocusSessionComplete { focus_minutes, at } => RewardJob::FocusSession {
                user,
                focus_minutes: *focus_minutes,
                completed_at: *at,
            },
            Event::FiveMinuteMilestone {
                elapsed_focus_minutes,
                ..
            } => RewardJob::Milestone {
                user,
                elapsed_focus_minutes: *elapsed_focus_minutes,
            },
            Event::TaskCompleted { task_id, .. } => RewardJob::TaskCompleted {
                user,
                task_id: *task_id,
            },
            _ => return None,
        };
        self.queue.submit(job.clone()).then_some(job)
    }

    /// Toggle a task on `board`, rewarding the open → completed transition.
    ///
    /// The board enforces the time lock and rolls back on a failed write;
    /// the reward is queued only after the store confirmed the change, so a
    /// completion is rewarded at most once.
    pub fn toggle_task(
        &self,
        board: &mut TaskBoard,
        task_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<TaskToggle> {
        match self.user {
            Some(user) if user == board.user() => {}
            _ => return Err(CoreError::NotAuthenticated),
        }
        let toggle = board.toggle(task_id, now)?;
        if toggle == TaskToggle::Completed {
            self.dispatch(&Event::TaskCompleted { task_id, at: now });
        }
        Ok(toggle)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    use super::*;
    use crate::error::ValidationError;
    use crate::session::worker::RewardWorker;
    use crate::tasks::testing::FakeTasks;

    fn coordinator(user: Option<Uuid>) -> (SessionCoordinator, UnboundedReceiver<RewardJob>) {
        let (queue, rx) = RewardWorker::channel();
        (SessionCoordinator::new(TimerSettings::default(), user, queue), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<RewardJob>) -> Vec<RewardJob> {
        let mut jobs = Vec::new();
        while let Ok(job) = rx.try_recv() {
            jobs.push(job);
        }
        jobs
    }

    #[test]
    fn full_focus_run_queues_five_milestones_and_one_session() {
        let user = Uuid::new_v4();
        let (mut c, mut rx) = coordinator(Some(user));
        c.start();
        for _ in 0..1501 {
            c.tick();
        }
        let jobs = drain(&mut rx);
        let milestones = jobs
            .iter()
            .filter(|j| matches!(j, RewardJob::Milestone { .. }))
            .count();
        let sessions = jobs
            .iter()
            .filter(|j| matches!(j, RewardJob::FocusSession { .. }))
            .count();
        assert_eq!(milestones, 5);
        assert_eq!(sessions, 1);
        assert!(matches!(jobs.last(), Some(RewardJob::FocusSession { .. })));
    }

    #[test]
    fn break_completion_queues_nothing() {
        let (mut c, mut rx) = coordinator(Some(Uuid::new_v4()));
        c.start();
        for _ in 0..1501 {
            c.tick();
        }
        drain(&mut rx);
        c.start();
        for _ in 0..301 {
            c.tick();
        }
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn signed_out_session_still_ticks_but_rewards_nothing() {
        let (mut c, mut rx) = coordinator(None);
        c.start();
        for _ in 0..1501 {
            c.tick();
        }
        assert!(drain(&mut rx).is_empty());
        assert_eq!(c.engine().display(), "05:00");
    }

    #[test]
    fn task_completion_is_rewarded_once() {
        let user = Uuid::new_v4();
        let (c, mut rx) = coordinator(Some(user));
        let mut board = TaskBoard::new(user, Arc::new(FakeTasks::default()));
        let now = Utc::now();
        let task = board.add("Email", None, now).unwrap();

        assert_eq!(c.toggle_task(&mut board, task.id, now).unwrap(), TaskToggle::Completed);
        assert_eq!(c.toggle_task(&mut board, task.id, now).unwrap(), TaskToggle::Reopened);
        let jobs = drain(&mut rx);
        assert_eq!(
            jobs,
            vec![RewardJob::TaskCompleted {
                user,
                task_id: task.id
            }]
        );
    }

    #[test]
    fn locked_task_is_rejected_without_reward() {
        let user = Uuid::new_v4();
        let (c, mut rx) = coordinator(Some(user));
        let mut board = TaskBoard::new(user, Arc::new(FakeTasks::default()));
        let now = Utc::now();
        let task = board.add("Read", Some((0, 0, 30)), now).unwrap();

        let err = c
            .toggle_task(&mut board, task.id, now + Duration::seconds(10))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::WaitRemaining { seconds: 20, .. })
        ));
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn toggling_without_user_is_not_authenticated() {
        let (c, _rx) = coordinator(None);
        let mut board = TaskBoard::new(Uuid::new_v4(), Arc::new(FakeTasks::default()));
        let task = board.add("Email", None, Utc::now()).unwrap();
        assert!(matches!(
            c.toggle_task(&mut board, task.id, Utc::now()),
            Err(CoreError::NotAuthenticated)
        ));
        assert!(!board.get(task.id).unwrap().completed);
    }
}
