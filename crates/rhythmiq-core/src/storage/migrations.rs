//! Database schema migrations for rhythmiq.
//!
//! Migrations are versioned and applied automatically when opening the database.
//! The `schema_version` table tracks the current migration version.

use indoc::indoc;
use rusqlite::{params, Connection, Result as SqliteResult};
use tracing::{debug, warn};

/// Current schema version.
///
/// Increment this when adding new migrations.
pub const SCHEMA_VERSION: i32 = 3;

/// Apply all pending migrations to bring the database to the current schema version.
///
/// # Errors
/// Returns an error if migration fails.
pub fn migrate(conn: &Connection) -> SqliteResult<()> {
    create_schema_version_table(conn)?;

    let current_version = get_schema_version(conn);

    if current_version < 1 {
        migrate_v1(conn)?;
    }
    if current_version < 2 {
        migrate_v2(conn)?;
    }
    if current_version < 3 {
        migrate_v3(conn)?;
    }

    Ok(())
}

fn create_schema_version_table(conn: &Connection) -> SqliteResult<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY
        );",
    )
}

/// Returns 0 if no version is set (initial database).
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row("SELECT version FROM schema_version", [], |row| {
        row.get::<_, i32>(0)
    })
    .unwrap_or_else(|e| {
        if !matches!(e, rusqlite::Error::QueryReturnedNoRows) {
            warn!(error = %e, "Failed to read schema_version");
        }
        0
    })
}

fn set_schema_version(conn: &Connection, version: i32) -> SqliteResult<()> {
    conn.execute("DELETE FROM schema_version", [])?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])?;
    debug!(version, "Schema version set");
    Ok(())
}

/// Migration v1: baseline schema.
fn migrate_v1(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(indoc! {"
        CREATE TABLE IF NOT EXISTS users (
            id          TEXT PRIMARY KEY,
            name        TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_xp (
            user_id     TEXT PRIMARY KEY REFERENCES users(id) ON DELETE CASCADE,
            xp          INTEGER NOT NULL DEFAULT 0,
            level       INTEGER NOT NULL DEFAULT 1,
            updated_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS achievements (
            id                TEXT PRIMARY KEY,
            name              TEXT NOT NULL,
            description       TEXT NOT NULL DEFAULT '',
            icon              TEXT NOT NULL DEFAULT '',
            requirement_type  TEXT NOT NULL,
            requirement_value INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS user_achievements (
            user_id        TEXT NOT NULL,
            achievement_id TEXT NOT NULL REFERENCES achievements(id),
            unlocked_at    TEXT NOT NULL,
            UNIQUE (user_id, achievement_id)
        );

        CREATE TABLE IF NOT EXISTS tasks (
            id               TEXT PRIMARY KEY,
            user_id          TEXT NOT NULL,
            text             TEXT NOT NULL,
            completed        INTEGER NOT NULL DEFAULT 0,
            lock_hours       INTEGER,
            lock_minutes     INTEGER,
            lock_seconds     INTEGER,
            lock_started_at  TEXT,
            created_at       TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS focus_sessions (
            id            INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id       TEXT NOT NULL,
            minutes       INTEGER NOT NULL,
            completed_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS daily_challenges (
            id           TEXT PRIMARY KEY,
            title        TEXT NOT NULL,
            description  TEXT NOT NULL DEFAULT '',
            xp_reward    INTEGER NOT NULL,
            goal_kind    TEXT NOT NULL,
            goal_target  INTEGER NOT NULL,
            position     INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS user_challenge_completions (
            user_id       TEXT NOT NULL,
            challenge_id  TEXT NOT NULL REFERENCES daily_challenges(id),
            completed_at  TEXT NOT NULL,
            UNIQUE (user_id, challenge_id)
        );

        CREATE TABLE IF NOT EXISTS purchases (
            user_id       TEXT NOT NULL,
            item_id       TEXT NOT NULL,
            xp_cost       INTEGER NOT NULL,
            purchased_at  TEXT NOT NULL,
            UNIQUE (user_id, item_id)
        );

        CREATE TABLE IF NOT EXISTS tracks (
            id         TEXT PRIMARY KEY,
            title      TEXT NOT NULL,
            artist     TEXT NOT NULL,
            thumbnail  TEXT NOT NULL DEFAULT '',
            duration   TEXT NOT NULL DEFAULT '',
            position   INTEGER NOT NULL DEFAULT 0
        );

        CREATE TABLE IF NOT EXISTS liked_tracks (
            user_id   TEXT NOT NULL,
            track_id  TEXT NOT NULL REFERENCES tracks(id),
            liked_at  TEXT NOT NULL,
            UNIQUE (user_id, track_id)
        );

        CREATE TABLE IF NOT EXISTS playlists (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            name        TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS playlist_tracks (
            playlist_id  TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
            track_id     TEXT NOT NULL REFERENCES tracks(id),
            added_at     TEXT NOT NULL,
            UNIQUE (playlist_id, track_id)
        );

        CREATE TABLE IF NOT EXISTS feedback (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL,
            message     TEXT NOT NULL,
            created_at  TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS kv (
            key    TEXT PRIMARY KEY,
            value  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_tasks_user ON tasks(user_id, created_at);
        CREATE INDEX IF NOT EXISTS idx_focus_sessions_user ON focus_sessions(user_id, completed_at);
        CREATE INDEX IF NOT EXISTS idx_user_xp_xp ON user_xp(xp);
        CREATE INDEX IF NOT EXISTS idx_playlists_user ON playlists(user_id, created_at);
    "})?;
    set_schema_version(&tx, 1)?;
    tx.commit()
}

const ACHIEVEMENTS: &[(&str, &str, &str, &str, &str, u64)] = &[
    ("first-steps", "First Steps", "Reach level 2", "🌱", "level_reached", 2),
    ("rising-star", "Rising Star", "Reach level 5", "⭐", "level_reached", 5),
    ("focus-master", "Focus Master", "Reach level 10", "🏆", "level_reached", 10),
    ("first-task", "Getting Things Done", "Complete your first task", "✅", "tasks_completed", 1),
    ("task-crusher", "Task Crusher", "Complete 10 tasks", "💪", "tasks_completed", 10),
    ("taskmaster", "Taskmaster", "Complete 50 tasks", "🎯", "tasks_completed", 50),
    ("music-lover", "Music Lover", "Like your first track", "❤️", "liked_tracks", 1),
    ("curator", "Curator", "Like 10 tracks", "🎧", "liked_tracks", 10),
    ("playlist-creator", "Playlist Creator", "Create your first playlist", "🎵", "playlists_created", 1),
    ("dj", "Resident DJ", "Create 5 playlists", "💿", "playlists_created", 5),
    ("challenger", "Challenger", "Redeem a daily challenge", "🔥", "challenges_completed", 1),
    ("challenge-champion", "Challenge Champion", "Redeem 10 daily challenges", "🏅", "challenges_completed", 10),
    ("voice-heard", "Voice Heard", "Send your first feedback", "💬", "feedback_submitted", 1),
];

const CHALLENGES: &[(&str, &str, &str, u64, &str, u64)] = &[
    ("complete-5-tasks", "Complete 5 tasks", "Finish five tasks from your list", 50, "tasks_completed", 5),
    ("focus-25-minutes", "Focus for 25 minutes", "Complete a full focus session today", 30, "focus_minutes", 25),
    ("add-3-tracks", "Add 3 tracks", "Add three tracks to your playlists", 20, "playlist_tracks", 3),
    ("focus-100-minutes", "Focus for 100 minutes", "Four full focus sessions in one day", 100, "focus_minutes", 100),
    ("complete-20-tasks", "Complete 20 tasks", "Keep the list moving", 150, "tasks_completed", 20),
];

const TRACKS: &[(&str, &str, &str, &str)] = &[
    ("jfKfPfyJRdk", "lofi hip hop radio 📚 - beats to relax/study to", "Lofi Girl", "LIVE"),
    ("lTRiuFIWV54", "Deep Focus - Music For Studying, Concentration and Work", "Study Music Project", "3:00:00"),
    ("5qap5aO4i9A", "Lofi Hip Hop Mix - Beats to Relax/Study to", "ChilledCow", "1:30:00"),
    ("DWcJFNfaw9c", "Peaceful Piano - Relaxing Music for Study & Work", "Peaceful Piano", "2:00:00"),
    ("1ZYbU82GVz4", "Jazz Music for Work & Study - Smooth Jazz Cafe", "Cafe Music BGM channel", "2:30:00"),
    ("Dx5qFachd3A", "Lofi Hip Hop Radio - Calm Study Beats", "Lofi Hip Hop", "LIVE"),
    ("7NOSDKb0HlU", "Deep Focus - Ambient Music for Concentration", "Relaxing Music", "2:15:00"),
    ("2OEL4P1Rz04", "Chill Study Beats - Lofi Hip Hop Mix", "ChillHop Music", "1:45:00"),
];

/// Migration v2: seed the achievement catalog, daily challenges and the
/// default track list.
fn migrate_v2(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    {
        let mut stmt = tx.prepare(indoc! {"
            INSERT OR IGNORE INTO achievements
                (id, name, description, icon, requirement_type, requirement_value)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "})?;
        for (id, name, description, icon, kind, value) in ACHIEVEMENTS {
            stmt.execute(params![id, name, description, icon, kind, value])?;
        }

        let mut stmt = tx.prepare(indoc! {"
            INSERT OR IGNORE INTO daily_challenges
                (id, title, description, xp_reward, goal_kind, goal_target, position)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "})?;
        for (position, (id, title, description, xp, kind, target)) in CHALLENGES.iter().enumerate()
        {
            stmt.execute(params![id, title, description, xp, kind, target, position as i64])?;
        }

        let mut stmt = tx.prepare(indoc! {"
            INSERT OR IGNORE INTO tracks (id, title, artist, thumbnail, duration, position)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "})?;
        for (position, (id, title, artist, duration)) in TRACKS.iter().enumerate() {
            let thumbnail = format!("https://i.ytimg.com/vi/{id}/mqdefault.jpg");
            stmt.execute(params![id, title, artist, thumbnail, duration, position as i64])?;
        }
    }
    set_schema_version(&tx, 2)?;
    tx.commit()
}

/// Migration v3: user roles for the admin dashboard.
fn migrate_v3(conn: &Connection) -> SqliteResult<()> {
    let tx = conn.unchecked_transaction()?;
    tx.execute_batch(indoc! {"
        CREATE TABLE IF NOT EXISTS user_roles (
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            role        TEXT NOT NULL,
            granted_at  TEXT NOT NULL,
            UNIQUE (user_id, role)
        );

        CREATE INDEX IF NOT EXISTS idx_user_roles_role ON user_roles(role);
    "})?;
    set_schema_version(&tx, 3)?;
    tx.commit()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn test_migrate_from_scratch() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();

        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
        assert_eq!(count(&conn, "achievements"), ACHIEVEMENTS.len() as i64);
        assert_eq!(count(&conn, "daily_challenges"), 5);
        assert_eq!(count(&conn, "tracks"), TRACKS.len() as i64);
    }

    #[test]
    fn test_migrate_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        migrate(&conn).unwrap();

        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
        assert_eq!(count(&conn, "achievements"), ACHIEVEMENTS.len() as i64);
    }

    #[test]
    fn test_incremental_migration_keeps_rows() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        conn.execute(
            "INSERT INTO kv (key, value) VALUES ('current_user', 'abc')",
            [],
        )
        .unwrap();

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), SCHEMA_VERSION);
        assert_eq!(count(&conn, "kv"), 1);
        assert_eq!(count(&conn, "tracks"), TRACKS.len() as i64);
        assert_eq!(count(&conn, "user_roles"), 0);
    }

    #[test]
    fn v2_database_gains_user_roles() {
        let conn = Connection::open_in_memory().unwrap();
        create_schema_version_table(&conn).unwrap();
        migrate_v1(&conn).unwrap();
        migrate_v2(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 2);

        migrate(&conn).unwrap();
        assert_eq!(get_schema_version(&conn), 3);
        conn.execute(
            "INSERT INTO users (id, name, created_at) VALUES ('u1', 'ana', '2026-01-01T00:00:00Z')",
            [],
        )
        .unwrap();
        let grant = "INSERT OR IGNORE INTO user_roles (user_id, role, granted_at)
                     VALUES ('u1', 'admin', '2026-01-01T00:00:00Z')";
        assert_eq!(conn.execute(grant, []).unwrap(), 1);
        assert_eq!(conn.execute(grant, []).unwrap(), 0);
    }

    #[test]
    fn seeded_requirement_types_are_known() {
        use crate::achievements::RequirementType;
        for (_, _, _, _, kind, _) in ACHIEVEMENTS {
            assert!(kind.parse::<RequirementType>().is_ok(), "{kind}");
        }
    }

    #[test]
    fn user_achievements_are_unique_per_user() {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        let insert = "INSERT OR IGNORE INTO user_achievements (user_id, achievement_id, unlocked_at)
                      VALUES ('u1', 'first-task', '2026-01-01T00:00:00Z')";
        assert_eq!(conn.execute(insert, []).unwrap(), 1);
        assert_eq!(conn.execute(insert, []).unwrap(), 0);
    }
}
