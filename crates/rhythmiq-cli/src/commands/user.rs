use chrono::Utc;
use clap::Subcommand;
use rhythmiq_core::{Ledger, ValidationError};
use serde_json::json;

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum UserAction {
    /// Create a user and sign in as them
    Create {
        /// Display name (unique)
        name: String,
    },
    /// Sign in as an existing user
    Login {
        name: String,
    },
    /// Sign out
    Logout,
    /// Show the signed-in user
    Whoami,
}

pub fn run(action: UserAction) -> CmdResult {
    let app = App::open()?;

    match action {
        UserAction::Create { name } => {
            let user = app.backend.with_db(|db| {
                let user = db.create_user(&name, Utc::now())?;
                db.set_current_user(user.id)?;
                Ok(user)
            })?;
            print_json(&user)?;
        }
        UserAction::Login { name } => {
            let user = app.backend.with_db(|db| {
                let user = db
                    .find_user_by_name(name.trim())?
                    .ok_or_else(|| ValidationError::NotFound {
                        kind: "User",
                        id: name.clone(),
                    })?;
                db.set_current_user(user.id)?;
                Ok(user)
            })?;
            println!("signed in as {}", user.name);
        }
        UserAction::Logout => {
            app.backend.with_db(|db| Ok(db.clear_current_user()?))?;
            println!("signed out");
        }
        UserAction::Whoami => {
            let user = app.require_user()?;
            let balance = app.backend.balance(user.id)?;
            print_json(&json!({
                "id": user.id,
                "name": user.name,
                "created_at": user.created_at,
                "xp": balance.xp,
                "level": balance.level,
            }))?;
        }
    }
    Ok(())
}
