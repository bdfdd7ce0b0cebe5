//! Background execution of reward jobs.
//!
//! Backend calls never run on the tick path. The coordinator drops jobs
//! into a [`RewardQueue`]; a single worker task drains it in order, running
//! each job on the blocking pool.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;

use super::FocusLog;
use crate::achievements::{AchievementEvaluator, RequirementType};
use crate::rewards::{RewardDispatcher, RewardSettings};
use crate::tasks::TaskStore;

/// One unit of reward work, produced exactly once per completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum RewardJob {
    FocusSession {
        user: Uuid,
        focus_minutes: u32,
        completed_at: DateTime<Utc>,
    },
    Milestone {
        user: Uuid,
        elapsed_focus_minutes: u32,
    },
    TaskCompleted {
        user: Uuid,
        task_id: Uuid,
    },
}

impl RewardJob {
    pub fn user(&self) -> Uuid {
        match self {
            RewardJob::FocusSession { user, .. }
            | RewardJob::Milestone { user, .. }
            | RewardJob::TaskCompleted { user, .. } => *user,
        }
    }
}

/// What a job achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobReport {
    pub granted_xp: u64,
    pub unlocked: Vec<String>,
}

/// Everything a job needs to talk to the backend.
#[derive(Clone)]
pub struct RewardContext {
    pub dispatcher: RewardDispatcher,
    pub evaluator: AchievementEvaluator,
    pub tasks: Arc<dyn TaskStore>,
    pub focus_log: Arc<dyn FocusLog>,
    pub settings: RewardSettings,
}

impl RewardContext {
    /// Run one job to completion. Failures are logged, never propagated:
    /// a lost grant or unlock is accepted.
    pub fn run(&self, job: RewardJob) -> JobReport {
        let mut report = JobReport::default();
        match job {
            RewardJob::FocusSession {
                user,
                focus_minutes,
                completed_at,
            } => {
                if let Err(e) = self.focus_log.record_focus(user, focus_minutes, completed_at) {
                    warn!(%user, error = %e, "Failed to record focus session");
                }
                report.granted_xp = self
                    .dispatcher
                    .grant_xp(user, self.settings.focus_session_xp);
                match self.dispatcher.refresh(user) {
                    Ok(balance) => {
                        report.unlocked = self.unlock(
                            user,
                            RequirementType::LevelReached,
                            u64::from(balance.level),
                        );
                    }
                    Err(e) => warn!(%user, error = %e, "Could not read level after focus session"),
                }
            }
            RewardJob::Milestone { user, .. } => {
                report.granted_xp = self.dispatcher.grant_xp(user, self.settings.milestone_xp);
            }
            RewardJob::TaskCompleted { user, task_id } => {
                report.granted_xp = self.dispatcher.grant_xp(user, self.settings.task_xp);
                match self.tasks.count_completed_tasks(user) {
                    Ok(count) => {
                        report.unlocked = self.unlock(user, RequirementType::TasksCompleted, count);
                    }
                    Err(e) => warn!(%user, task = %task_id, error = %e, "Could not count completed tasks"),
                }
            }
        }
        report
    }

    fn unlock(&self, user: Uuid, requirement: RequirementType, value: u64) -> Vec<String> {
        self.evaluator
            .check_and_unlock(user, requirement, value)
            .unwrap_or_else(|e| {
                warn!(%user, %requirement, error = %e, "Achievement check failed");
                Vec::new()
            })
    }
}

/// Sending half of the reward pipeline.
#[derive(Clone)]
pub struct RewardQueue {
    tx: mpsc::UnboundedSender<RewardJob>,
}

impl RewardQueue {
    /// Queue a job. Returns false when the worker is gone and the job was
    /// dropped.
    pub fn submit(&self, job: RewardJob) -> bool {
        debug!(?job, "Queueing reward job");
        match self.tx.send(job) {
            Ok(()) => true,
            Err(e) => {
                warn!(job = ?e.0, "Reward worker gone, job dropped");
                false
            }
        }
    }
}

pub struct RewardWorker;

impl RewardWorker {
    /// A queue and its raw receiving end, for callers that drain jobs
    /// themselves.
    pub fn channel() -> (RewardQueue, mpsc::UnboundedReceiver<RewardJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RewardQueue { tx }, rx)
    }

    /// Spawn the worker on the current runtime.
    ///
    /// The task exits once every [`RewardQueue`] clone is dropped and the
    /// queue is drained, so jobs queued before a session unmounts still
    /// complete.
    pub fn spawn(ctx: RewardContext) -> (RewardQueue, JoinHandle<()>) {
        let (queue, mut rx) = Self::channel();
        let handle = tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                let ctx = ctx.clone();
                match tokio::task::spawn_blocking(move || ctx.run(job)).await {
                    Ok(report) => debug!(?report, "Reward job finished"),
                    Err(e) => warn!(error = %e, "Reward job panicked"),
                }
            }
            debug!("Reward worker stopped");
        });
        (queue, handle)
    }
}
