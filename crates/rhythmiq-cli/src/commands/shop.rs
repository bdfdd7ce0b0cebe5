use clap::Subcommand;
use rhythmiq_core::{Shop, ShopStore};

use super::{print_json, App, CmdResult};

#[derive(Subcommand)]
pub enum ShopAction {
    /// Catalog with purchase and affordability flags
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Redeem spendable XP for an item
    Buy {
        /// Item ID (e.g. "sticker-pack")
        item: String,
    },
}

pub fn run(action: ShopAction) -> CmdResult {
    let app = App::open()?;
    let user = app.require_user()?;
    let shop = Shop::new(app.backend.clone());

    match action {
        ShopAction::List { json } => {
            let items = shop.items(user.id)?;
            if json {
                return print_json(&items);
            }
            println!("spendable: {} xp", app.backend.spendable_xp(user.id)?);
            for entry in &items {
                let status = match (entry.purchased, entry.affordable) {
                    (true, _) => "owned",
                    (false, true) => "available",
                    (false, false) => "locked",
                };
                println!(
                    "{:<14} {:>5}xp  {:<9} {}",
                    entry.item.id, entry.item.xp_cost, status, entry.item.name
                );
            }
        }
        ShopAction::Buy { item } => {
            let receipt = shop.purchase(user.id, &item)?;
            print_json(&receipt)?;
        }
    }
    Ok(())
}
