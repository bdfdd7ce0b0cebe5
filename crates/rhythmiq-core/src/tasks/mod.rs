//! Tasks and the reconciling task board.
//!
//! Tasks live in the backend. [`TaskBoard`] keeps a local copy that is
//! updated optimistically, confirmed by the store and rolled back when the
//! store write fails.

mod lock;

pub use lock::{Remaining, TimeLock};

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Result, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub text: String,
    pub completed: bool,
    #[serde(default)]
    pub time_lock: Option<TimeLock>,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// New open task. Blank text is rejected.
    pub fn new(text: &str, time_lock: Option<TimeLock>, now: DateTime<Utc>) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ValidationError::EmptyText("Task").into());
        }
        Ok(Self {
            id: Uuid::new_v4(),
            text: text.to_string(),
            completed: false,
            time_lock,
            created_at: now,
        })
    }

    /// Whether the task may go from open to completed at `now`.
    ///
    /// Reopening a completed task is never gated.
    pub fn check_completion(&self, now: DateTime<Utc>) -> Result<(), ValidationError> {
        match (&self.time_lock, self.completed) {
            (Some(lock), false) => lock.check(now),
            _ => Ok(()),
        }
    }
}

/// The external task table, scoped per user.
pub trait TaskStore: Send + Sync {
    /// Newest first.
    fn list_tasks(&self, user: Uuid) -> Result<Vec<Task>>;

    fn insert_task(&self, user: Uuid, task: &Task) -> Result<()>;

    fn set_task_completed(&self, user: Uuid, id: Uuid, completed: bool) -> Result<()>;

    fn delete_task(&self, user: Uuid, id: Uuid) -> Result<()>;

    /// Returns how many rows were removed.
    fn delete_tasks(&self, user: Uuid, ids: &[Uuid]) -> Result<usize>;

    fn count_completed_tasks(&self, user: Uuid) -> Result<u64>;
}

/// What a toggle did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskToggle {
    Completed,
    Reopened,
}

/// Local, reconciled view of one user's tasks.
pub struct TaskBoard {
    user: Uuid,
    store: Arc<dyn TaskStore>,
    tasks: Vec<Task>,
}

impl TaskBoard {
    pub fn new(user: Uuid, store: Arc<dyn TaskStore>) -> Self {
        Self {
            user,
            store,
            tasks: Vec::new(),
        }
    }

    /// Load the board from the store.
    pub fn load(user: Uuid, store: Arc<dyn TaskStore>) -> Result<Self> {
        let mut board = Self::new(user, store);
        board.refresh()?;
        Ok(board)
    }

    pub fn user(&self) -> Uuid {
        self.user
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: Uuid) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn completed_count(&self) -> usize {
        self.tasks.iter().filter(|t| t.completed).count()
    }

    /// Replace the local copy with the store's rows.
    pub fn refresh(&mut self) -> Result<()> {
        self.tasks = self.store.list_tasks(self.user)?;
        Ok(())
    }

    /// Add a task, optionally time-locked from `now`.
    pub fn add(
        &mut self,
        text: &str,
        lock: Option<(u32, u32, u32)>,
        now: DateTime<Utc>,
    ) -> Result<Task> {
        let time_lock = lock
            .map(|(h, m, s)| TimeLock::new(h, m, s, now))
            .transpose()?;
        let task = Task::new(text, time_lock, now)?;

        self.tasks.insert(0, task.clone());
        if let Err(e) = self.store.insert_task(self.user, &task) {
            warn!(task = %task.id, error = %e, "Task insert failed, rolling back");
            self.tasks.retain(|t| t.id != task.id);
            return Err(e);
        }
        debug!(task = %task.id, "Task added");
        Ok(task)
    }

    /// Flip a task's completion.
    ///
    /// Completing a time-locked task before its lock elapses is rejected
    /// with [`ValidationError::WaitRemaining`] and leaves the task unchanged.
    pub fn toggle(&mut self, id: Uuid, now: DateTime<Utc>) -> Result<TaskToggle> {
        let idx = self.index_of(id)?;
        self.tasks[idx].check_completion(now)?;

        let completed = !self.tasks[idx].completed;
        self.tasks[idx].completed = completed;

        if let Err(e) = self.store.set_task_completed(self.user, id, completed) {
            warn!(task = %id, error = %e, "Task update failed, rolling back");
            if let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) {
                task.completed = !completed;
            }
            return Err(e);
        }

        Ok(if completed {
            TaskToggle::Completed
        } else {
            TaskToggle::Reopened
        })
    }

    pub fn delete(&mut self, id: Uuid) -> Result<()> {
        self.index_of(id)?;
        self.store.delete_task(self.user, id)?;
        self.tasks.retain(|t| t.id != id);
        Ok(())
    }

    /// Delete every completed task. Returns how many were removed.
    pub fn clear_completed(&mut self) -> Result<usize> {
        let ids: Vec<Uuid> = self
            .tasks
            .iter()
            .filter(|t| t.completed)
            .map(|t| t.id)
            .collect();
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = self.store.delete_tasks(self.user, &ids)?;
        self.tasks.retain(|t| !t.completed);
        Ok(removed)
    }

    fn index_of(&self, id: Uuid) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| {
                ValidationError::NotFound {
                    kind: "Task",
                    id: id.to_string(),
                }
                .into()
            })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    use super::*;
    use crate::error::CoreError;

    #[derive(Default)]
    pub struct FakeTasks {
        pub rows: Mutex<HashMap<Uuid, Vec<Task>>>,
        pub fail_writes: AtomicBool,
    }

    impl FakeTasks {
        fn check(&self) -> Result<()> {
            if self.fail_writes.load(Ordering::SeqCst) {
                Err(CoreError::Network("write rejected".into()))
            } else {
                Ok(())
            }
        }
    }

    impl TaskStore for FakeTasks {
        fn list_tasks(&self, user: Uuid) -> Result<Vec<Task>> {
            Ok(self.rows.lock().unwrap().get(&user).cloned().unwrap_or_default())
        }

        fn insert_task(&self, user: Uuid, task: &Task) -> Result<()> {
            self.check()?;
            self.rows.lock().unwrap().entry(user).or_default().insert(0, task.clone());
            Ok(())
        }

        fn set_task_completed(&self, user: Uuid, id: Uuid, completed: bool) -> Result<()> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            if let Some(t) = rows.entry(user).or_default().iter_mut().find(|t| t.id == id) {
                t.completed = completed;
            }
            Ok(())
        }

        fn delete_task(&self, user: Uuid, id: Uuid) -> Result<()> {
            self.check()?;
            self.rows.lock().unwrap().entry(user).or_default().retain(|t| t.id != id);
            Ok(())
        }

        fn delete_tasks(&self, user: Uuid, ids: &[Uuid]) -> Result<usize> {
            self.check()?;
            let mut rows = self.rows.lock().unwrap();
            let list = rows.entry(user).or_default();
            let before = list.len();
            list.retain(|t| !ids.contains(&t.id));
            Ok(before - list.len())
        }

        fn count_completed_tasks(&self, user: Uuid) -> Result<u64> {
            Ok(self.list_tasks(user)?.iter().filter(|t| t.completed).count() as u64)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use chrono::Duration;

    use super::testing::FakeTasks;
    use super::*;
    use crate::error::CoreError;

    fn board() -> (Arc<FakeTasks>, TaskBoard) {
        let store = Arc::new(FakeTasks::default());
        let board = TaskBoard::new(Uuid::new_v4(), store.clone());
        (store, board)
    }

    #[test]
    fn empty_text_is_rejected() {
        let (_, mut board) = board();
        let err = board.add("   ", None, Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::EmptyText(_))
        ));
        assert!(board.tasks().is_empty());
    }

    #[test]
    fn zero_time_lock_is_rejected() {
        let (_, mut board) = board();
        let err = board.add("Read", Some((0, 0, 0)), Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::MissingTimeLock)
        ));
    }

    #[test]
    fn time_lock_gates_completion_at_the_exact_second() {
        let (_, mut board) = board();
        let start = Utc::now();
        let task = board.add("Stretch", Some((0, 2, 0)), start).unwrap();

        let err = board
            .toggle(task.id, start + Duration::seconds(119))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::WaitRemaining {
                hours: 0,
                minutes: 0,
                seconds: 1
            })
        ));
        assert!(!board.get(task.id).unwrap().completed);

        let toggled = board.toggle(task.id, start + Duration::seconds(120)).unwrap();
        assert_eq!(toggled, TaskToggle::Completed);
        assert!(board.get(task.id).unwrap().completed);
    }

    #[test]
    fn reopening_is_never_gated() {
        let (_, mut board) = board();
        let start = Utc::now();
        let task = board.add("Write", Some((1, 0, 0)), start).unwrap();
        board.toggle(task.id, start + Duration::hours(2)).unwrap();
        assert_eq!(board.toggle(task.id, start).unwrap(), TaskToggle::Reopened);
    }

    #[test]
    fn failed_write_rolls_back_the_optimistic_flip() {
        let (store, mut board) = board();
        let task = board.add("Plan", None, Utc::now()).unwrap();

        store.fail_writes.store(true, Ordering::SeqCst);
        assert!(board.toggle(task.id, Utc::now()).is_err());
        assert!(!board.get(task.id).unwrap().completed);
    }

    #[test]
    fn failed_insert_removes_the_optimistic_row() {
        let (store, mut board) = board();
        store.fail_writes.store(true, Ordering::SeqCst);
        assert!(board.add("Plan", None, Utc::now()).is_err());
        assert!(board.tasks().is_empty());
    }

    #[test]
    fn clear_completed_keeps_open_tasks() {
        let (store, mut board) = board();
        let a = board.add("A", None, Utc::now()).unwrap();
        board.add("B", None, Utc::now()).unwrap();
        board.toggle(a.id, Utc::now()).unwrap();

        assert_eq!(board.clear_completed().unwrap(), 1);
        assert_eq!(board.tasks().len(), 1);
        assert_eq!(board.tasks()[0].text, "B");
        assert_eq!(store.list_tasks(board.user()).unwrap().len(), 1);
        assert_eq!(board.clear_completed().unwrap(), 0);
    }

    #[test]
    fn unknown_task_is_not_found() {
        let (_, mut board) = board();
        assert!(matches!(
            board.toggle(Uuid::new_v4(), Utc::now()),
            Err(CoreError::Validation(ValidationError::NotFound { .. }))
        ));
    }
}
