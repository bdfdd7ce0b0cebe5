use chrono::Utc;
use rhythmiq_core::feedback;

use super::{App, CmdResult};

pub fn run(message: &str) -> CmdResult {
    let app = App::open()?;
    let user = app.require_user()?;
    let entry = feedback::submit(
        app.backend.as_ref(),
        &app.evaluator(),
        user.id,
        message,
        Utc::now(),
    )?;
    println!("Feedback sent: {}", entry.id);
    Ok(())
}
