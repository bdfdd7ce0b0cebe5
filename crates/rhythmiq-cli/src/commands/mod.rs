pub mod achievements;
pub mod admin;
pub mod challenge;
pub mod config;
pub mod feedback;
pub mod leaderboard;
pub mod library;
pub mod shop;
pub mod task;
pub mod timer;
pub mod user;
pub mod xp;

use std::sync::Arc;

use rhythmiq_core::{
    AchievementEvaluator, Config, CoreError, LocalBackend, RewardContext, RewardDispatcher, User,
    XpDisplay,
};
use serde::Serialize;

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// Backend and config shared by every command.
pub struct App {
    pub backend: Arc<LocalBackend>,
    pub config: Config,
}

impl App {
    pub fn open() -> Result<Self, CoreError> {
        Ok(Self {
            config: Config::load()?,
            backend: Arc::new(LocalBackend::open()?),
        })
    }

    pub fn current_user(&self) -> Result<Option<User>, CoreError> {
        self.backend.with_db(|db| Ok(db.current_user()?))
    }

    /// The signed-in user, or [`CoreError::NotAuthenticated`].
    pub fn require_user(&self) -> Result<User, CoreError> {
        self.current_user()?.ok_or(CoreError::NotAuthenticated)
    }

    pub fn evaluator(&self) -> AchievementEvaluator {
        AchievementEvaluator::new(self.backend.clone())
    }

    pub fn dispatcher(&self, display: XpDisplay) -> RewardDispatcher {
        RewardDispatcher::new(self.backend.clone(), display)
    }

    pub fn reward_context(&self, display: XpDisplay) -> RewardContext {
        RewardContext {
            dispatcher: self.dispatcher(display),
            evaluator: self.evaluator(),
            tasks: self.backend.clone(),
            focus_log: self.backend.clone(),
            settings: self.config.rewards.clone(),
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// One event per line, for streaming output.
pub fn print_json_line<T: Serialize + ?Sized>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
