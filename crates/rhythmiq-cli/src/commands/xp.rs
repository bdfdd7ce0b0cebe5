use clap::Subcommand;
use rhythmiq_core::{Ledger, ShopStore};
use serde_json::json;

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum XpAction {
    /// Lifetime XP, level and spendable XP
    Balance,
    /// Position within the current level
    Progress,
}

pub fn run(action: XpAction) -> CmdResult {
    let app = App::open()?;
    let user = app.require_user()?;
    let balance = app.backend.balance(user.id)?;

    match action {
        XpAction::Balance => {
            let spendable = app.backend.spendable_xp(user.id)?;
            print_json(&json!({
                "xp": balance.xp,
                "level": balance.level,
                "spendable_xp": spendable,
            }))?;
        }
        XpAction::Progress => {
            print_json(&balance.progress())?;
        }
    }
    Ok(())
}
