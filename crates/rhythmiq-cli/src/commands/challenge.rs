use chrono::Utc;
use clap::Subcommand;
use rhythmiq_core::{ChallengeBoard, XpDisplay};
use serde_json::json;

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum ChallengeAction {
    /// Today's challenges with progress
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Claim the XP of a completed challenge
    Redeem {
        /// Challenge ID
        id: String,
    },
}

pub fn run(action: ChallengeAction) -> CmdResult {
    let app = App::open()?;
    let user = app.require_user()?;
    let board = ChallengeBoard::new(
        app.backend.clone(),
        app.backend.clone(),
        app.backend.clone(),
        app.dispatcher(XpDisplay::new()),
        app.evaluator(),
    );
    let now = Utc::now();

    match action {
        ChallengeAction::List { json } => {
            let challenges = board.list(user.id, now)?;
            if json {
                return print_json(&challenges);
            }
            for status in &challenges {
                let c = &status.challenge;
                let state = if status.completed {
                    "redeemed".to_string()
                } else {
                    format!("{}/{}", status.progress.min(c.goal.target()), c.goal.target())
                };
                println!("{:<20} {:<10} +{}xp  {}", c.id, state, c.xp_reward, c.title);
            }
        }
        ChallengeAction::Redeem { id } => {
            let granted = board.redeem(user.id, &id, now)?;
            print_json(&json!({ "challenge_id": id, "granted_xp": granted }))?;
        }
    }
    Ok(())
}
