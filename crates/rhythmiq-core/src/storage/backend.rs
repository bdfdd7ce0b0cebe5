//! SQLite implementation of every collaborator interface.
//!
//! Each mutation is published on the backend's [`LocalChangeFeed`] after
//! the connection lock has been released, so listeners may call back into
//! the backend.

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use tracing::warn;
use uuid::Uuid;

use super::database::{parse_time, parse_uuid, Database};
use crate::achievements::{
    Achievement, AchievementRequirement, AchievementStore, RequirementType, UnlockOutcome,
};
use crate::admin::{AdminStore, FeedbackEntry, UserSummary};
use crate::challenges::{Challenge, ChallengeGoal, ChallengeStore};
use crate::error::{CoreError, DatabaseError, Result, ValidationError};
use crate::feed::{
    ChangeFeed, ChangeFilter, ChangeKind, Listener, LocalChangeFeed, RowChange, Subscription,
    SubscriptionId, Table,
};
use crate::feedback::{Feedback, FeedbackStore};
use crate::leaderboard::{Leaderboard, UserXp};
use crate::library::{LibraryStore, Playlist, Track};
use crate::rewards::{level_for_xp, Ledger, XpBalance};
use crate::session::FocusLog;
use crate::shop::ShopStore;
use crate::tasks::{Task, TaskStore, TimeLock};

fn ts(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn sql_limit(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

pub struct LocalBackend {
    db: Mutex<Database>,
    feed: LocalChangeFeed,
}

impl LocalBackend {
    pub fn new(db: Database) -> Self {
        Self {
            db: Mutex::new(db),
            feed: LocalChangeFeed::new(),
        }
    }

    /// Open the database in the data directory.
    pub fn open() -> Result<Self> {
        Ok(Self::new(Database::open()?))
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        Ok(Self::new(Database::open_at(path)?))
    }

    pub fn open_memory() -> Result<Self> {
        Ok(Self::new(Database::open_memory()?))
    }

    pub fn feed(&self) -> &LocalChangeFeed {
        &self.feed
    }

    /// Run `f` with the connection locked.
    pub fn with_db<T>(&self, f: impl FnOnce(&mut Database) -> Result<T>) -> Result<T> {
        let mut db = self.lock()?;
        f(&mut db)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Database>> {
        self.db
            .lock()
            .map_err(|_| CoreError::Database(DatabaseError::Poisoned))
    }

    fn publish(&self, table: Table, kind: ChangeKind, user_id: Uuid, row: impl Serialize) {
        let row = match serde_json::to_value(row) {
            Ok(row) => row,
            Err(e) => {
                warn!(?table, error = %e, "Could not encode change row");
                return;
            }
        };
        self.feed.publish(&RowChange {
            table,
            kind,
            user_id,
            row,
        });
    }
}

impl ChangeFeed for LocalBackend {
    fn subscribe(&self, table: Table, filter: ChangeFilter, on_change: Listener) -> Subscription {
        self.feed.subscribe(table, filter, on_change)
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        self.feed.unsubscribe(id);
    }
}

fn read_xp(db: &Database, user: Uuid) -> rusqlite::Result<u64> {
    Ok(db
        .conn()
        .query_row(
            "SELECT xp FROM user_xp WHERE user_id = ?1",
            params![user.to_string()],
            |row| row.get::<_, u64>(0),
        )
        .optional()?
        .unwrap_or(0))
}

fn spent_xp(db: &Database, user: Uuid) -> rusqlite::Result<u64> {
    db.conn().query_row(
        "SELECT COALESCE(SUM(xp_cost), 0) FROM purchases WHERE user_id = ?1",
        params![user.to_string()],
        |row| row.get::<_, u64>(0),
    )
}

impl Ledger for LocalBackend {
    fn increment(&self, user: Uuid, amount: u64) -> Result<XpBalance> {
        let balance = self.with_db(|db| {
            let now = ts(Utc::now());
            let tx = db.conn_mut().transaction()?;
            tx.execute(
                "INSERT OR IGNORE INTO user_xp (user_id, xp, level, updated_at) VALUES (?1, 0, 1, ?2)",
                params![user.to_string(), now],
            )?;
            let xp: u64 = tx.query_row(
                "SELECT xp FROM user_xp WHERE user_id = ?1",
                params![user.to_string()],
                |row| row.get(0),
            )?;
            let balance = XpBalance::from_xp(xp.saturating_add(amount));
            tx.execute(
                "UPDATE user_xp SET xp = ?2, level = ?3, updated_at = ?4 WHERE user_id = ?1",
                params![user.to_string(), balance.xp, balance.level, now],
            )?;
            tx.commit()?;
            Ok(balance)
        })?;
        self.publish(Table::UserXp, ChangeKind::Update, user, balance);
        Ok(balance)
    }

    fn balance(&self, user: Uuid) -> Result<XpBalance> {
        self.with_db(|db| Ok(XpBalance::from_xp(read_xp(db, user)?)))
    }
}

fn row_to_achievement(row: &rusqlite::Row<'_>) -> rusqlite::Result<(Achievement, String)> {
    let kind: String = row.get(4)?;
    Ok((
        Achievement {
            id: row.get(0)?,
            name: row.get(1)?,
            description: row.get(2)?,
            icon: row.get(3)?,
            requirement: AchievementRequirement {
                requirement_type: RequirementType::LevelReached,
                requirement_value: row.get(5)?,
            },
        },
        kind,
    ))
}

impl AchievementStore for LocalBackend {
    fn list_all(&self) -> Result<Vec<Achievement>> {
        self.with_db(|db| {
            let mut stmt = db.conn().prepare(
                "SELECT id, name, description, icon, requirement_type, requirement_value
                 FROM achievements ORDER BY requirement_value, id",
            )?;
            let rows = stmt.query_map([], row_to_achievement)?;
            let mut out = Vec::new();
            for row in rows {
                let (mut achievement, kind) = row?;
                match kind.parse::<RequirementType>() {
                    Ok(t) => {
                        achievement.requirement.requirement_type = t;
                        out.push(achievement);
                    }
                    Err(_) => warn!(achievement = %achievement.id, %kind, "Unknown requirement type"),
                }
            }
            Ok(out)
        })
    }

    fn list_candidates(&self, requirement_type: RequirementType, value: u64) -> Result<Vec<String>> {
        self.with_db(|db| {
            let mut stmt = db.conn().prepare(
                "SELECT id FROM achievements
                 WHERE requirement_type = ?1 AND requirement_value <= ?2
                 ORDER BY requirement_value, id",
            )?;
            let ids = stmt
                .query_map(params![requirement_type.as_str(), value], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })
    }

    fn list_unlocked(&self, user: Uuid) -> Result<HashSet<String>> {
        self.with_db(|db| {
            let mut stmt = db
                .conn()
                .prepare("SELECT achievement_id FROM user_achievements WHERE user_id = ?1")?;
            let ids = stmt
                .query_map(params![user.to_string()], |row| row.get(0))?
                .collect::<rusqlite::Result<HashSet<String>>>()?;
            Ok(ids)
        })
    }

    fn unlock(&self, user: Uuid, achievement_id: &str) -> Result<UnlockOutcome> {
        let now = Utc::now();
        let inserted = self.with_db(|db| {
            Ok(db.conn().execute(
                "INSERT OR IGNORE INTO user_achievements (user_id, achievement_id, unlocked_at)
                 VALUES (?1, ?2, ?3)",
                params![user.to_string(), achievement_id, ts(now)],
            )?)
        })?;
        if inserted == 0 {
            return Ok(UnlockOutcome::AlreadyUnlocked);
        }
        self.publish(
            Table::UserAchievements,
            ChangeKind::Insert,
            user,
            serde_json::json!({ "achievement_id": achievement_id, "unlocked_at": now }),
        );
        Ok(UnlockOutcome::Unlocked)
    }
}

fn row_to_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let lock_started: Option<String> = row.get(6)?;
    let time_lock = match lock_started {
        Some(_) => Some(TimeLock {
            hours: row.get::<_, Option<u32>>(3)?.unwrap_or(0),
            minutes: row.get::<_, Option<u32>>(4)?.unwrap_or(0),
            seconds: row.get::<_, Option<u32>>(5)?.unwrap_or(0),
            started_at: parse_time(row, 6)?,
        }),
        None => None,
    };
    Ok(Task {
        id: parse_uuid(row, 0)?,
        text: row.get(1)?,
        completed: row.get(2)?,
        time_lock,
        created_at: parse_time(row, 7)?,
    })
}

impl TaskStore for LocalBackend {
    fn list_tasks(&self, user: Uuid) -> Result<Vec<Task>> {
        self.with_db(|db| {
            let mut stmt = db.conn().prepare(
                "SELECT id, text, completed, lock_hours, lock_minutes, lock_seconds,
                        lock_started_at, created_at
                 FROM tasks WHERE user_id = ?1
                 ORDER BY created_at DESC, rowid DESC",
            )?;
            let tasks = stmt
                .query_map(params![user.to_string()], row_to_task)?
                .collect::<rusqlite::Result<Vec<Task>>>()?;
            Ok(tasks)
        })
    }

    fn insert_task(&self, user: Uuid, task: &Task) -> Result<()> {
        self.with_db(|db| {
            let lock = task.time_lock.as_ref();
            db.conn().execute(
                "INSERT INTO tasks (id, user_id, text, completed, lock_hours, lock_minutes,
                                    lock_seconds, lock_started_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    task.id.to_string(),
                    user.to_string(),
                    task.text,
                    task.completed,
                    lock.map(|l| l.hours),
                    lock.map(|l| l.minutes),
                    lock.map(|l| l.seconds),
                    lock.map(|l| ts(l.started_at)),
                    ts(task.created_at),
                ],
            )?;
            Ok(())
        })?;
        self.publish(Table::Tasks, ChangeKind::Insert, user, task);
        Ok(())
    }

    fn set_task_completed(&self, user: Uuid, id: Uuid, completed: bool) -> Result<()> {
        let changed = self.with_db(|db| {
            Ok(db.conn().execute(
                "UPDATE tasks SET completed = ?3 WHERE id = ?1 AND user_id = ?2",
                params![id.to_string(), user.to_string(), completed],
            )?)
        })?;
        if changed == 0 {
            return Err(ValidationError::NotFound {
                kind: "Task",
                id: id.to_string(),
            }
            .into());
        }
        self.publish(
            Table::Tasks,
            ChangeKind::Update,
            user,
            serde_json::json!({ "id": id, "completed": completed }),
        );
        Ok(())
    }

    fn delete_task(&self, user: Uuid, id: Uuid) -> Result<()> {
        let deleted = self.delete_tasks(user, &[id])?;
        if deleted == 0 {
            return Err(ValidationError::NotFound {
                kind: "Task",
                id: id.to_string(),
            }
            .into());
        }
        Ok(())
    }

    fn delete_tasks(&self, user: Uuid, ids: &[Uuid]) -> Result<usize> {
        let deleted = self.with_db(|db| {
            let tx = db.conn_mut().transaction()?;
            let mut deleted = Vec::new();
            {
                let mut stmt = tx.prepare("DELETE FROM tasks WHERE id = ?1 AND user_id = ?2")?;
                for id in ids {
                    if stmt.execute(params![id.to_string(), user.to_string()])? > 0 {
                        deleted.push(*id);
                    }
                }
            }
            tx.commit()?;
            Ok(deleted)
        })?;
        for id in &deleted {
            self.publish(Table::Tasks, ChangeKind::Delete, user, serde_json::json!({ "id": id }));
        }
        Ok(deleted.len())
    }

    fn count_completed_tasks(&self, user: Uuid) -> Result<u64> {
        self.with_db(|db| {
            Ok(db.conn().query_row(
                "SELECT COUNT(*) FROM tasks WHERE user_id = ?1 AND completed = 1",
                params![user.to_string()],
                |row| row.get(0),
            )?)
        })
    }
}

impl FocusLog for LocalBackend {
    fn record_focus(&self, user: Uuid, minutes: u32, completed_at: DateTime<Utc>) -> Result<()> {
        self.with_db(|db| {
            db.conn().execute(
                "INSERT INTO focus_sessions (user_id, minutes, completed_at) VALUES (?1, ?2, ?3)",
                params![user.to_string(), minutes, ts(completed_at)],
            )?;
            Ok(())
        })
    }

    fn focus_minutes_since(&self, user: Uuid, since: DateTime<Utc>) -> Result<u64> {
        self.with_db(|db| {
            Ok(db.conn().query_row(
                "SELECT COALESCE(SUM(minutes), 0) FROM focus_sessions
                 WHERE user_id = ?1 AND completed_at >= ?2",
                params![user.to_string(), ts(since)],
                |row| row.get(0),
            )?)
        })
    }
}

fn parse_goal(kind: &str, target: u64) -> Option<ChallengeGoal> {
    match kind {
        "tasks_completed" => Some(ChallengeGoal::TasksCompleted(target)),
        "focus_minutes" => Some(ChallengeGoal::FocusMinutes(target)),
        "playlist_tracks" => Some(ChallengeGoal::PlaylistTracks(target)),
        _ => None,
    }
}

impl ChallengeStore for LocalBackend {
    fn list_challenges(&self, limit: usize) -> Result<Vec<Challenge>> {
        self.with_db(|db| {
            let mut stmt = db.conn().prepare(
                "SELECT id, title, description, xp_reward, goal_kind, goal_target
                 FROM daily_challenges ORDER BY position, id LIMIT ?1",
            )?;
            let rows = stmt.query_map(params![sql_limit(limit)], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, u64>(5)?,
                ))
            })?;
            let mut out = Vec::new();
            for row in rows {
                let (id, title, description, xp_reward, kind, target) = row?;
                match parse_goal(&kind, target) {
                    Some(goal) => out.push(Challenge {
                        id,
                        title,
                        description,
                        xp_reward,
                        goal,
                    }),
                    None => warn!(challenge = %id, %kind, "Unknown challenge goal"),
                }
            }
            Ok(out)
        })
    }

    fn completed_challenges(&self, user: Uuid) -> Result<HashSet<String>> {
        self.with_db(|db| {
            let mut stmt = db
                .conn()
                .prepare("SELECT challenge_id FROM user_challenge_completions WHERE user_id = ?1")?;
            let ids = stmt
                .query_map(params![user.to_string()], |row| row.get(0))?
                .collect::<rusqlite::Result<HashSet<String>>>()?;
            Ok(ids)
        })
    }

    fn record_completion(&self, user: Uuid, challenge_id: &str) -> Result<bool> {
        let now = Utc::now();
        let inserted = self.with_db(|db| {
            Ok(db.conn().execute(
                "INSERT OR IGNORE INTO user_challenge_completions (user_id, challenge_id, completed_at)
                 VALUES (?1, ?2, ?3)",
                params![user.to_string(), challenge_id, ts(now)],
            )?)
        })?;
        if inserted == 0 {
            return Ok(false);
        }
        self.publish(
            Table::ChallengeCompletions,
            ChangeKind::Insert,
            user,
            serde_json::json!({ "challenge_id": challenge_id, "completed_at": now }),
        );
        Ok(true)
    }

    fn count_completions(&self, user: Uuid) -> Result<u64> {
        self.with_db(|db| {
            Ok(db.conn().query_row(
                "SELECT COUNT(*) FROM user_challenge_completions WHERE user_id = ?1",
                params![user.to_string()],
                |row| row.get(0),
            )?)
        })
    }

    fn playlist_track_count(&self, user: Uuid) -> Result<u64> {
        self.with_db(|db| {
            Ok(db.conn().query_row(
                "SELECT COUNT(*) FROM playlist_tracks pt
                 JOIN playlists p ON p.id = pt.playlist_id
                 WHERE p.user_id = ?1",
                params![user.to_string()],
                |row| row.get(0),
            )?)
        })
    }
}

impl ShopStore for LocalBackend {
    fn spendable_xp(&self, user: Uuid) -> Result<u64> {
        self.with_db(|db| Ok(read_xp(db, user)?.saturating_sub(spent_xp(db, user)?)))
    }

    fn purchased_items(&self, user: Uuid) -> Result<HashSet<String>> {
        self.with_db(|db| {
            let mut stmt = db
                .conn()
                .prepare("SELECT item_id FROM purchases WHERE user_id = ?1")?;
            let ids = stmt
                .query_map(params![user.to_string()], |row| row.get(0))?
                .collect::<rusqlite::Result<HashSet<String>>>()?;
            Ok(ids)
        })
    }

    fn purchase(&self, user: Uuid, item_id: &str, xp_cost: u64) -> Result<u64> {
        let now = Utc::now();
        let remaining = self.with_db(|db| {
            let available = read_xp(db, user)?.saturating_sub(spent_xp(db, user)?);
            if available < xp_cost {
                return Err(ValidationError::InsufficientXp {
                    required: xp_cost,
                    available,
                }
                .into());
            }
            let tx = db.conn_mut().transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO purchases (user_id, item_id, xp_cost, purchased_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![user.to_string(), item_id, xp_cost, ts(now)],
            )?;
            if inserted == 0 {
                return Err(ValidationError::AlreadyRedeemed(item_id.to_string()).into());
            }
            tx.commit()?;
            Ok(available - xp_cost)
        })?;
        self.publish(
            Table::Purchases,
            ChangeKind::Insert,
            user,
            serde_json::json!({ "item_id": item_id, "xp_cost": xp_cost, "purchased_at": now }),
        );
        Ok(remaining)
    }
}

fn row_to_track(row: &rusqlite::Row<'_>) -> rusqlite::Result<Track> {
    Ok(Track {
        id: row.get(0)?,
        title: row.get(1)?,
        artist: row.get(2)?,
        thumbnail: row.get(3)?,
        duration: row.get(4)?,
    })
}

fn owns_playlist(db: &Database, user: Uuid, playlist_id: Uuid) -> Result<()> {
    let owned: Option<i64> = db
        .conn()
        .query_row(
            "SELECT 1 FROM playlists WHERE id = ?1 AND user_id = ?2",
            params![playlist_id.to_string(), user.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    match owned {
        Some(_) => Ok(()),
        None => Err(ValidationError::NotFound {
            kind: "Playlist",
            id: playlist_id.to_string(),
        }
        .into()),
    }
}

impl LibraryStore for LocalBackend {
    fn list_tracks(&self) -> Result<Vec<Track>> {
        self.with_db(|db| {
            let mut stmt = db.conn().prepare(
                "SELECT id, title, artist, thumbnail, duration FROM tracks ORDER BY position, id",
            )?;
            let tracks = stmt
                .query_map([], row_to_track)?
                .collect::<rusqlite::Result<Vec<Track>>>()?;
            Ok(tracks)
        })
    }

    fn liked_tracks(&self, user: Uuid) -> Result<Vec<String>> {
        self.with_db(|db| {
            let mut stmt = db.conn().prepare(
                "SELECT track_id FROM liked_tracks WHERE user_id = ?1 ORDER BY liked_at, rowid",
            )?;
            let ids = stmt
                .query_map(params![user.to_string()], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<String>>>()?;
            Ok(ids)
        })
    }

    fn like_track(&self, user: Uuid, track_id: &str) -> Result<bool> {
        let inserted = self.with_db(|db| {
            Ok(db.conn().execute(
                "INSERT OR IGNORE INTO liked_tracks (user_id, track_id, liked_at) VALUES (?1, ?2, ?3)",
                params![user.to_string(), track_id, ts(Utc::now())],
            )?)
        })?;
        if inserted > 0 {
            self.publish(
                Table::LikedTracks,
                ChangeKind::Insert,
                user,
                serde_json::json!({ "track_id": track_id }),
            );
        }
        Ok(inserted > 0)
    }

    fn unlike_track(&self, user: Uuid, track_id: &str) -> Result<()> {
        let deleted = self.with_db(|db| {
            Ok(db.conn().execute(
                "DELETE FROM liked_tracks WHERE user_id = ?1 AND track_id = ?2",
                params![user.to_string(), track_id],
            )?)
        })?;
        if deleted > 0 {
            self.publish(
                Table::LikedTracks,
                ChangeKind::Delete,
                user,
                serde_json::json!({ "track_id": track_id }),
            );
        }
        Ok(())
    }

    fn list_playlists(&self, user: Uuid) -> Result<Vec<Playlist>> {
        self.with_db(|db| {
            let mut stmt = db.conn().prepare(
                "SELECT id, name, created_at FROM playlists WHERE user_id = ?1
                 ORDER BY created_at, rowid",
            )?;
            let mut playlists = stmt
                .query_map(params![user.to_string()], |row| {
                    Ok(Playlist {
                        id: parse_uuid(row, 0)?,
                        name: row.get(1)?,
                        created_at: parse_time(row, 2)?,
                        tracks: Vec::new(),
                    })
                })?
                .collect::<rusqlite::Result<Vec<Playlist>>>()?;

            let mut tracks = db.conn().prepare(
                "SELECT track_id FROM playlist_tracks WHERE playlist_id = ?1
                 ORDER BY added_at, rowid",
            )?;
            for playlist in &mut playlists {
                playlist.tracks = tracks
                    .query_map(params![playlist.id.to_string()], |row| row.get(0))?
                    .collect::<rusqlite::Result<Vec<String>>>()?;
            }
            Ok(playlists)
        })
    }

    fn create_playlist(&self, user: Uuid, name: &str, now: DateTime<Utc>) -> Result<Playlist> {
        let playlist = Playlist {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: now,
            tracks: Vec::new(),
        };
        self.with_db(|db| {
            db.conn().execute(
                "INSERT INTO playlists (id, user_id, name, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![playlist.id.to_string(), user.to_string(), playlist.name, ts(now)],
            )?;
            Ok(())
        })?;
        self.publish(Table::Playlists, ChangeKind::Insert, user, &playlist);
        Ok(playlist)
    }

    fn delete_playlist(&self, user: Uuid, playlist_id: Uuid) -> Result<()> {
        self.with_db(|db| {
            owns_playlist(db, user, playlist_id)?;
            db.conn().execute(
                "DELETE FROM playlists WHERE id = ?1",
                params![playlist_id.to_string()],
            )?;
            Ok(())
        })?;
        self.publish(
            Table::Playlists,
            ChangeKind::Delete,
            user,
            serde_json::json!({ "id": playlist_id }),
        );
        Ok(())
    }

    fn add_to_playlist(&self, user: Uuid, playlist_id: Uuid, track_id: &str) -> Result<bool> {
        let inserted = self.with_db(|db| {
            owns_playlist(db, user, playlist_id)?;
            Ok(db.conn().execute(
                "INSERT OR IGNORE INTO playlist_tracks (playlist_id, track_id, added_at)
                 VALUES (?1, ?2, ?3)",
                params![playlist_id.to_string(), track_id, ts(Utc::now())],
            )?)
        })?;
        if inserted > 0 {
            self.publish(
                Table::PlaylistTracks,
                ChangeKind::Insert,
                user,
                serde_json::json!({ "playlist_id": playlist_id, "track_id": track_id }),
            );
        }
        Ok(inserted > 0)
    }
}

impl FeedbackStore for LocalBackend {
    fn insert_feedback(&self, user: Uuid, feedback: &Feedback) -> Result<()> {
        self.with_db(|db| {
            db.conn().execute(
                "INSERT INTO feedback (id, user_id, message, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![
                    feedback.id.to_string(),
                    user.to_string(),
                    feedback.message,
                    ts(feedback.created_at)
                ],
            )?;
            Ok(())
        })?;
        self.publish(Table::Feedback, ChangeKind::Insert, user, feedback);
        Ok(())
    }

    fn count_feedback(&self, user: Uuid) -> Result<u64> {
        self.with_db(|db| {
            Ok(db.conn().query_row(
                "SELECT COUNT(*) FROM feedback WHERE user_id = ?1",
                params![user.to_string()],
                |row| row.get(0),
            )?)
        })
    }
}

impl AdminStore for LocalBackend {
    fn has_role(&self, user: Uuid, role: &str) -> Result<bool> {
        self.with_db(|db| {
            Ok(db
                .conn()
                .query_row(
                    "SELECT 1 FROM user_roles WHERE user_id = ?1 AND role = ?2",
                    params![user.to_string(), role],
                    |_| Ok(()),
                )
                .optional()?
                .is_some())
        })
    }

    fn grant_role(&self, user: Uuid, role: &str, now: DateTime<Utc>) -> Result<bool> {
        let inserted = self.with_db(|db| {
            if db.user(user)?.is_none() {
                return Err(ValidationError::NotFound {
                    kind: "User",
                    id: user.to_string(),
                }
                .into());
            }
            Ok(db.conn().execute(
                "INSERT OR IGNORE INTO user_roles (user_id, role, granted_at) VALUES (?1, ?2, ?3)",
                params![user.to_string(), role, ts(now)],
            )?)
        })?;
        if inserted > 0 {
            self.publish(
                Table::UserRoles,
                ChangeKind::Insert,
                user,
                serde_json::json!({ "role": role }),
            );
        }
        Ok(inserted > 0)
    }

    fn count_role(&self, role: &str) -> Result<u64> {
        self.with_db(|db| {
            Ok(db.conn().query_row(
                "SELECT COUNT(*) FROM user_roles WHERE role = ?1",
                params![role],
                |row| row.get(0),
            )?)
        })
    }

    fn user_summaries(&self) -> Result<Vec<UserSummary>> {
        self.with_db(|db| {
            let mut stmt = db.conn().prepare(
                "SELECT u.id, u.name, u.created_at, COALESCE(x.xp, 0) FROM users u
                 LEFT JOIN user_xp x ON x.user_id = u.id
                 ORDER BY u.created_at DESC, u.name",
            )?;
            let users = stmt
                .query_map([], |row| {
                    let xp: u64 = row.get(3)?;
                    Ok(UserSummary {
                        user_id: parse_uuid(row, 0)?,
                        name: row.get(1)?,
                        created_at: parse_time(row, 2)?,
                        xp,
                        level: level_for_xp(xp),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
    }

    fn list_feedback(&self) -> Result<Vec<FeedbackEntry>> {
        self.with_db(|db| {
            let mut stmt = db.conn().prepare(
                "SELECT f.id, f.message, f.created_at, COALESCE(u.name, 'Unknown User')
                 FROM feedback f
                 LEFT JOIN users u ON u.id = f.user_id
                 ORDER BY f.created_at DESC",
            )?;
            let entries = stmt
                .query_map([], |row| {
                    Ok(FeedbackEntry {
                        id: parse_uuid(row, 0)?,
                        message: row.get(1)?,
                        created_at: parse_time(row, 2)?,
                        username: row.get(3)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(entries)
        })
    }
}

impl Leaderboard for LocalBackend {
    fn top_users(&self, limit: usize) -> Result<Vec<UserXp>> {
        self.with_db(|db| {
            let mut stmt = db.conn().prepare(
                "SELECT u.id, u.name, x.xp FROM user_xp x
                 JOIN users u ON u.id = x.user_id
                 ORDER BY x.xp DESC, u.name
                 LIMIT ?1",
            )?;
            let users = stmt
                .query_map(params![sql_limit(limit)], |row| {
                    Ok(UserXp {
                        user_id: parse_uuid(row, 0)?,
                        name: row.get(1)?,
                        xp: row.get(2)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<UserXp>>>()?;
            Ok(users)
        })
    }
}
