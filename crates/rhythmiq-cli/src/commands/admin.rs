use chrono::Utc;
use clap::Subcommand;
use rhythmiq_core::{AdminConsole, ValidationError};

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum AdminAction {
    /// Usage totals, users and feedback (admins only)
    Dashboard {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Grant the admin role to a user
    Grant {
        /// User name
        name: String,
    },
}

pub fn run(action: AdminAction) -> CmdResult {
    let app = App::open()?;
    let caller = app.current_user()?.map(|u| u.id);
    let console = AdminConsole::new(app.backend.clone());

    match action {
        AdminAction::Dashboard { json } => {
            let dashboard = console.dashboard(caller)?;
            if json {
                return print_json(&dashboard);
            }
            let stats = &dashboard.stats;
            println!(
                "users: {}  total xp: {}  avg level: {:.1}",
                stats.total_users, stats.total_xp, stats.avg_level
            );
            println!();
            for user in &dashboard.users {
                println!(
                    "{:<20} level {:<3} {:>6} xp  joined {}",
                    user.name,
                    user.level,
                    user.xp,
                    user.created_at.format("%Y-%m-%d")
                );
            }
            println!();
            if dashboard.feedback.is_empty() {
                println!("no feedback yet");
            }
            for entry in &dashboard.feedback {
                println!(
                    "[{}] {}: {}",
                    entry.created_at.format("%Y-%m-%d %H:%M"),
                    entry.username,
                    entry.message
                );
            }
        }
        AdminAction::Grant { name } => {
            let target = app
                .backend
                .with_db(|db| Ok(db.find_user_by_name(name.trim())?))?
                .ok_or_else(|| ValidationError::NotFound {
                    kind: "User",
                    id: name.clone(),
                })?;
            if console.grant_admin(caller, target.id, Utc::now())? {
                println!("{} is now an admin", target.name);
            } else {
                println!("{} is already an admin", target.name);
            }
        }
    }
    Ok(())
}
