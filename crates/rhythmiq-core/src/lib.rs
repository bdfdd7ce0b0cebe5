//! # Rhythmiq Core Library
//!
//! Core logic for Rhythmiq, a gamified focus timer: a Pomodoro countdown
//! whose completions earn XP, unlock achievements and feed daily challenges
//! and an XP shop. Every operation is also exposed by the standalone
//! `rhythmiq-cli` binary.
//!
//! ## Architecture
//!
//! - **Timer Engine**: second-granular state machine; the caller invokes
//!   `tick()` once per second
//! - **Session**: owns the timer for a mounted session and hands reward work
//!   to a background worker
//! - **Rewards / Achievements**: XP ledger access and achievement unlocking
//! - **Storage**: SQLite backend implementing every collaborator trait, plus
//!   TOML configuration
//!
//! ## Key Components
//!
//! - [`TimerEngine`]: Core timer state machine
//! - [`SessionCoordinator`] / [`Session`]: timer plus reward side effects
//! - [`RewardDispatcher`]: XP grants through a [`Ledger`]
//! - [`AchievementEvaluator`]: unlocks through an [`AchievementStore`]
//! - [`LocalBackend`]: SQLite implementation of the collaborator traits
//! - [`Config`]: Application configuration management
//! - [`AdminConsole`]: role-gated usage dashboard

pub mod achievements;
pub mod admin;
pub mod challenges;
pub mod error;
pub mod events;
pub mod feed;
pub mod feedback;
pub mod leaderboard;
pub mod library;
pub mod rewards;
pub mod session;
pub mod shop;
pub mod storage;
pub mod tasks;
pub mod timer;

pub use achievements::{Achievement, AchievementEvaluator, AchievementStore, Badge, RequirementType};
pub use admin::{AdminConsole, AdminStore, Dashboard, UsageStats};
pub use challenges::{Challenge, ChallengeBoard, ChallengeGoal, ChallengeStatus, ChallengeStore};
pub use error::{ConfigError, CoreError, DatabaseError, Result, ValidationError};
pub use events::Event;
pub use feed::{ChangeFeed, ChangeFilter, ChangeKind, LocalChangeFeed, RowChange, Subscription, Table};
pub use leaderboard::{Leaderboard, LeaderboardEntry};
pub use library::{Library, LibraryStore, Player, Playlist, Track};
pub use rewards::{Ledger, RewardDispatcher, RewardSettings, XpBalance, XpDisplay, XpProgress};
pub use session::{FocusLog, RewardContext, RewardQueue, RewardWorker, Session, SessionCoordinator};
pub use shop::{MerchItem, Shop, ShopStore};
pub use storage::{Config, Database, LocalBackend, User};
pub use tasks::{Task, TaskBoard, TaskStore, TaskToggle, TimeLock};
pub use timer::{Phase, TimerEngine, TimerSettings, TimerState, TimerStatus};
