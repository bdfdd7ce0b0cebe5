//! Core error types for rhythmiq-core.
//!
//! Every failure degrades to "no state change plus a visible notice"; none
//! of these errors is fatal to the process. The timer engine itself has no
//! error states.

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for rhythmiq-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Backend call failed (transient, never retried).
    #[error("Network error: {0}")]
    Network(String),

    /// User input or a business rule rejected the action.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// The action needs a signed-in user.
    #[error("Not authenticated")]
    NotAuthenticated,

    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// True for failures the user may retry by repeating the action.
    pub fn is_transient(&self) -> bool {
        matches!(self, CoreError::Network(_) | CoreError::Database(DatabaseError::Locked))
    }
}

/// Database-specific errors.
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Failed to open database connection
    #[error("Failed to open database at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Query execution failed
    #[error("Query failed: {0}")]
    QueryFailed(String),

    /// Migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database is locked
    #[error("Database is locked")]
    Locked,

    /// The connection mutex was poisoned by a panicking holder.
    #[error("Database connection poisoned")]
    Poisoned,
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Unknown configuration key
    #[error("Unknown configuration key: {0}")]
    UnknownKey(String),

    /// Home/config directory unavailable
    #[error("Cannot determine data directory")]
    NoDataDir,
}

/// Validation errors surfaced to the user as a rejection.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Task or feedback text is blank.
    #[error("{0} cannot be empty")]
    EmptyText(&'static str),

    /// A time lock must be non-zero.
    #[error("Please set a time for the task")]
    MissingTimeLock,

    /// The task's time lock has not elapsed yet.
    #[error("Please wait {hours}h {minutes}m {seconds}s before completing this task")]
    WaitRemaining { hours: u64, minutes: u64, seconds: u64 },

    /// No row with that id.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Not enough spendable XP for a purchase.
    #[error("Not enough XP: need {required}, have {available}")]
    InsufficientXp { required: u64, available: u64 },

    /// Item or challenge already redeemed.
    #[error("Already redeemed: {0}")]
    AlreadyRedeemed(String),

    /// The signed-in user lacks the role the action needs.
    #[error("Access denied: {0} only")]
    RoleRequired(&'static str),

    /// Challenge goal not reached yet.
    #[error("Challenge not completed yet: {0}")]
    ChallengeIncomplete(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for DatabaseError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(err, _msg) => {
                if err.code == rusqlite::ErrorCode::DatabaseLocked
                    || err.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    DatabaseError::Locked
                } else {
                    DatabaseError::QueryFailed(err.to_string())
                }
            }
            _ => DatabaseError::QueryFailed(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Database(err.into())
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::InvalidValue {
            key: "<file>".into(),
            message: err.to_string(),
        }
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
