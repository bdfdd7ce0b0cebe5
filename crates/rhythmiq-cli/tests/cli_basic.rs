//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary HOME, so the
//! database and config never leak between tests.

use std::process::Command;

use tempfile::TempDir;

struct Cli {
    home: TempDir,
}

impl Cli {
    fn new() -> Self {
        Self {
            home: TempDir::new().expect("temp home"),
        }
    }

    /// Run a CLI command and return (stdout, stderr, exit code).
    fn run(&self, args: &[&str]) -> (String, String, i32) {
        let output = Command::new(env!("CARGO_BIN_EXE_rhythmiq-cli"))
            .args(args)
            .env("HOME", self.home.path())
            .env_remove("RHYTHMIQ_ENV")
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute CLI command");

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let code = output.status.code().unwrap_or(-1);
        (stdout, stderr, code)
    }

    fn ok(&self, args: &[&str]) -> String {
        let (stdout, stderr, code) = self.run(args);
        assert_eq!(code, 0, "{args:?} failed: {stderr}");
        stdout
    }

    fn fails(&self, args: &[&str]) -> String {
        let (_, stderr, code) = self.run(args);
        assert_ne!(code, 0, "{args:?} unexpectedly succeeded");
        stderr
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        let stdout = self.ok(args);
        serde_json::from_str(&stdout).expect("JSON output")
    }

    fn signed_in(name: &str) -> Self {
        let cli = Self::new();
        cli.ok(&["user", "create", name]);
        cli
    }
}

#[test]
fn test_commands_need_a_signed_in_user() {
    let cli = Cli::new();
    let stderr = cli.fails(&["task", "list"]);
    assert!(stderr.contains("error: Not authenticated"), "{stderr}");
}

#[test]
fn test_user_create_login_logout() {
    let cli = Cli::new();
    let user = cli.json(&["user", "create", "ana"]);
    assert_eq!(user["name"], "ana");

    let whoami = cli.json(&["user", "whoami"]);
    assert_eq!(whoami["name"], "ana");
    assert_eq!(whoami["level"], 1);

    cli.ok(&["user", "logout"]);
    cli.fails(&["user", "whoami"]);

    assert!(cli.ok(&["user", "login", "ana"]).contains("signed in as ana"));
    cli.fails(&["user", "login", "nobody"]);
    cli.fails(&["user", "create", "ana"]);
}

#[test]
fn test_task_lifecycle_rewards_completion() {
    let cli = Cli::signed_in("ana");
    let out = cli.ok(&["task", "add", "Write report"]);
    assert!(out.contains("Task created:"));

    let tasks = cli.json(&["task", "list", "--json"]);
    let id = tasks[0]["id"].as_str().unwrap().to_string();
    assert_eq!(tasks[0]["completed"], false);

    let out = cli.ok(&["task", "toggle", &id]);
    assert!(out.starts_with("completed"));
    assert!(out.contains("\"type\":\"xp_granted\""));
    assert!(out.contains("first-task"));

    let balance = cli.json(&["xp", "balance"]);
    assert_eq!(balance["xp"], 5);

    assert!(cli.ok(&["task", "clear"]).contains("cleared 1"));
    assert_eq!(cli.json(&["task", "list", "--json"]), serde_json::json!([]));
}

#[test]
fn test_task_time_lock_and_validation() {
    let cli = Cli::signed_in("ana");
    cli.fails(&["task", "add", "   "]);
    cli.fails(&["task", "add", "Zero lock", "--lock", "0:0:0"]);
    cli.fails(&["task", "add", "Bad lock", "--lock", "90"]);

    cli.ok(&["task", "add", "Deep read", "--lock", "1:0:0"]);
    let tasks = cli.json(&["task", "list", "--json"]);
    let id = tasks[0]["id"].as_str().unwrap().to_string();
    let stderr = cli.fails(&["task", "toggle", &id]);
    assert!(stderr.contains("Please wait"), "{stderr}");
    assert!(cli.ok(&["task", "list"]).contains("locked"));
}

#[test]
fn test_config_get_set_list_reset() {
    let cli = Cli::new();
    assert_eq!(cli.ok(&["config", "get", "timer.focus_minutes"]).trim(), "25");

    cli.ok(&["config", "set", "timer.focus_minutes", "50"]);
    assert_eq!(cli.ok(&["config", "get", "timer.focus_minutes"]).trim(), "50");
    assert!(cli.ok(&["config", "list"]).contains("timer.focus_minutes = 50"));

    cli.fails(&["config", "set", "timer.focus_minutes", "0"]);
    cli.fails(&["config", "set", "timer.nope", "1"]);
    cli.fails(&["config", "get", "nope"]);

    cli.ok(&["config", "reset"]);
    let config = cli.json(&["config", "list", "--json"]);
    assert_eq!(config["timer"]["focus_minutes"], 25);
    assert_eq!(config["feed"]["enabled"], true);
}

#[test]
fn test_timer_status_uses_configured_focus_length() {
    let cli = Cli::new();
    cli.ok(&["config", "set", "timer.focus_minutes", "30"]);
    let status = cli.json(&["timer", "status"]);
    assert_eq!(status["type"], "state_snapshot");
    assert_eq!(status["minutes_remaining"], 30);
    assert_eq!(status["running"], false);
}

#[test]
fn test_timer_run_completes_a_short_session() {
    let cli = Cli::signed_in("ana");
    cli.ok(&["config", "set", "timer.focus_minutes", "1"]);

    let out = cli.ok(&["timer", "run", "--sessions", "1", "--tick-ms", "1"]);
    let events: Vec<serde_json::Value> = out
        .lines()
        .map(|l| serde_json::from_str(l).expect("event line"))
        .collect();
    assert_eq!(events[0]["type"], "timer_started");
    assert!(events.iter().any(|e| e["type"] == "focus_session_complete"));
    assert!(events.iter().any(|e| e["type"] == "xp_granted" && e["xp"] == 50));

    let balance = cli.json(&["xp", "balance"]);
    assert_eq!(balance["xp"], 50);
}

#[test]
fn test_challenges_and_shop() {
    let cli = Cli::signed_in("ana");
    let challenges = cli.json(&["challenge", "list", "--json"]);
    assert_eq!(challenges.as_array().unwrap().len(), 5);

    let stderr = cli.fails(&["challenge", "redeem", "complete-5-tasks"]);
    assert!(stderr.contains("not completed"), "{stderr}");

    let items = cli.json(&["shop", "list", "--json"]);
    assert_eq!(items.as_array().unwrap().len(), 6);
    let stderr = cli.fails(&["shop", "buy", "sticker-pack"]);
    assert!(stderr.contains("Not enough XP"), "{stderr}");
}

#[test]
fn test_tracks_playlists_and_feedback() {
    let cli = Cli::signed_in("ana");
    let tracks = cli.json(&["track", "list", "--json"]);
    let first = tracks[0]["id"].as_str().unwrap().to_string();

    assert!(cli.ok(&["track", "like", &first]).contains("liked"));
    let liked = cli.json(&["track", "list", "--liked", "--json"]);
    assert_eq!(liked.as_array().unwrap().len(), 1);

    let out = cli.ok(&["playlist", "add", &first]);
    assert!(out.contains("My Playlist"));
    cli.fails(&["playlist", "add", &first]);

    let playing = cli.json(&["track", "play", &first]);
    assert_eq!(playing["now_playing"]["id"], first.as_str());
    assert_eq!(playing["state"], "playing");

    cli.ok(&["feedback", "Love the lo-fi picks"]);
    cli.fails(&["feedback", "  "]);

    let badges = cli.json(&["achievements", "list", "--unlocked", "--json"]);
    let ids: Vec<&str> = badges
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|b| b["id"].as_str())
        .collect();
    assert!(ids.contains(&"music-lover"));
    assert!(ids.contains(&"playlist-creator"));
    assert!(ids.contains(&"voice-heard"));
}

#[test]
fn test_leaderboard_lists_users() {
    let cli = Cli::signed_in("ana");
    cli.ok(&["user", "create", "bo"]);
    let board = cli.json(&["leaderboard"]);
    assert_eq!(board.as_array().unwrap().len(), 2);
    assert_eq!(board[0]["rank"], 1);
}

#[test]
fn test_admin_dashboard_is_for_admins_only() {
    let cli = Cli::new();
    let stderr = cli.fails(&["admin", "dashboard"]);
    assert!(stderr.contains("Not authenticated"), "{stderr}");

    cli.ok(&["user", "create", "ana"]);
    let stderr = cli.fails(&["admin", "dashboard"]);
    assert!(stderr.contains("Access denied"), "{stderr}");

    cli.ok(&["feedback", "More rain sounds"]);
    assert!(cli.ok(&["admin", "grant", "ana"]).contains("ana is now an admin"));

    let dashboard = cli.json(&["admin", "dashboard", "--json"]);
    assert_eq!(dashboard["stats"]["total_users"], 1);
    assert_eq!(dashboard["stats"]["avg_level"], 1.0);
    assert_eq!(dashboard["feedback"][0]["username"], "ana");
    assert_eq!(dashboard["feedback"][0]["message"], "More rain sounds");
    assert!(cli.ok(&["admin", "dashboard"]).contains("ana: More rain sounds"));
}

#[test]
fn test_admin_role_cannot_be_self_granted_twice() {
    let cli = Cli::signed_in("ana");
    cli.ok(&["admin", "grant", "ana"]);
    cli.ok(&["user", "create", "bo"]);

    let stderr = cli.fails(&["admin", "grant", "bo"]);
    assert!(stderr.contains("Access denied"), "{stderr}");
    cli.fails(&["admin", "dashboard"]);

    cli.ok(&["user", "login", "ana"]);
    assert!(cli.ok(&["admin", "grant", "bo"]).contains("bo is now an admin"));
    cli.fails(&["admin", "grant", "nobody"]);
}
