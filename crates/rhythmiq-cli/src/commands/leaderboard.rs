use rhythmiq_core::leaderboard::standings;

use super::{print_json, App, CmdResult};

pub fn run(limit: Option<usize>) -> CmdResult {
    let app = App::open()?;
    let limit = limit.unwrap_or(app.config.leaderboard.size);
    print_json(&standings(app.backend.as_ref(), limit)?)
}
