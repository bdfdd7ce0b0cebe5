//! Task management commands for CLI.

use chrono::Utc;
use clap::Subcommand;
use rhythmiq_core::{Event, RewardWorker, SessionCoordinator, TaskBoard, TaskToggle, XpDisplay};
use uuid::Uuid;

use super::{print_json, print_json_line, App, CmdResult};

#[derive(Subcommand)]
pub enum TaskAction {
    /// Add a task
    Add {
        /// Task text
        text: String,
        /// Time lock as h:m:s; the task cannot be completed before it elapses
        #[arg(long, value_parser = parse_lock)]
        lock: Option<(u32, u32, u32)>,
    },
    /// List tasks, newest first
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Complete or reopen a task
    Toggle {
        /// Task ID
        id: Uuid,
    },
    /// Delete a task
    Delete {
        /// Task ID
        id: Uuid,
    },
    /// Delete every completed task
    Clear,
}

fn parse_lock(s: &str) -> Result<(u32, u32, u32), String> {
    let parts: Vec<&str> = s.split(':').collect();
    let [h, m, sec] = parts.as_slice() else {
        return Err(format!("expected h:m:s, got '{s}'"));
    };
    let parse = |v: &str| {
        v.trim()
            .parse::<u32>()
            .map_err(|_| format!("'{v}' is not a whole number"))
    };
    Ok((parse(*h)?, parse(*m)?, parse(*sec)?))
}

pub fn run(action: TaskAction) -> CmdResult {
    let app = App::open()?;
    let user = app.require_user()?;
    let mut board = TaskBoard::load(user.id, app.backend.clone())?;
    let now = Utc::now();

    match action {
        TaskAction::Add { text, lock } => {
            let task = board.add(&text, lock, now)?;
            println!("Task created: {}", task.id);
        }
        TaskAction::List { json } => {
            if json {
                print_json(board.tasks())?;
                return Ok(());
            }
            if board.tasks().is_empty() {
                println!("no tasks");
            }
            for task in board.tasks() {
                let mark = if task.completed { "x" } else { " " };
                let lock = match task.time_lock.as_ref().and_then(|l| l.remaining(now)) {
                    Some(r) => format!(" (locked {}h {}m {}s)", r.hours, r.minutes, r.seconds),
                    None => String::new(),
                };
                println!("[{mark}] {}  {}{lock}", task.id, task.text);
            }
        }
        TaskAction::Toggle { id } => {
            // Rewards run inline so their outcome can be reported before exit.
            let (queue, mut jobs) = RewardWorker::channel();
            let coordinator =
                SessionCoordinator::new(app.config.timer.clone(), Some(user.id), queue);
            let toggle = coordinator.toggle_task(&mut board, id, now)?;
            match toggle {
                TaskToggle::Completed => println!("completed"),
                TaskToggle::Reopened => println!("reopened"),
            }

            let ctx = app.reward_context(XpDisplay::new());
            while let Ok(job) = jobs.try_recv() {
                let report = ctx.run(job);
                let at = Utc::now();
                if report.granted_xp > 0 {
                    let balance = ctx.dispatcher.display().current();
                    print_json_line(&Event::XpGranted {
                        amount: report.granted_xp,
                        xp: balance.map_or(0, |b| b.xp),
                        level: balance.map_or(1, |b| b.level),
                        at,
                    })?;
                }
                for achievement_id in report.unlocked {
                    print_json_line(&Event::AchievementUnlocked { achievement_id, at })?;
                }
            }
        }
        TaskAction::Delete { id } => {
            board.delete(id)?;
            println!("Task deleted: {id}");
        }
        TaskAction::Clear => {
            let removed = board.clear_completed()?;
            println!("cleared {removed} completed task(s)");
        }
    }
    Ok(())
}
