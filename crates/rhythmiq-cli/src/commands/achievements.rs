use clap::Subcommand;

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum AchievementsAction {
    /// List every achievement with its unlock status
    List {
        /// Only show unlocked achievements
        #[arg(long)]
        unlocked: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

pub fn run(action: AchievementsAction) -> CmdResult {
    let app = App::open()?;
    let user = app.require_user()?;

    match action {
        AchievementsAction::List { unlocked, json } => {
            let badges: Vec<_> = app
                .evaluator()
                .badges(user.id)?
                .into_iter()
                .filter(|b| !unlocked || b.unlocked)
                .collect();
            if json {
                return print_json(&badges);
            }
            for badge in &badges {
                let mark = if badge.unlocked { "*" } else { " " };
                let a = &badge.achievement;
                println!(
                    "[{mark}] {:<18} {} ({} >= {})",
                    a.id, a.name, a.requirement.requirement_type, a.requirement.requirement_value
                );
            }
        }
    }
    Ok(())
}
