use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use clap::Subcommand;
use rhythmiq_core::{
    AchievementStore, ChangeFeed, Event, RewardWorker, Session, SessionCoordinator, TimerEngine,
    XpBalance, XpDisplay,
};
use tokio::sync::broadcast::error::RecvError;
use tracing::warn;
use uuid::Uuid;

use super::{print_json, print_json_line, App, CmdResult};

/// How long to wait for queued rewards after the session ends.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Subcommand)]
pub enum TimerAction {
    /// Run a live session, printing timer events as JSON lines until
    /// interrupted or the requested number of focus sessions completes
    Run {
        /// Focus sessions to complete before exiting (0: run until Ctrl-C)
        #[arg(long, default_value_t = 1)]
        sessions: u32,
        /// Tick period in milliseconds
        #[arg(long, default_value_t = 1000, hide = true)]
        tick_ms: u64,
    },
    /// Print the initial timer state for the configured durations
    Status,
}

pub fn run(action: TimerAction) -> CmdResult {
    let app = App::open()?;

    match action {
        TimerAction::Run { sessions, tick_ms } => {
            let runtime = tokio::runtime::Runtime::new()?;
            runtime.block_on(run_session(app, sessions, Duration::from_millis(tick_ms.max(1))))?;
        }
        TimerAction::Status => {
            let engine = TimerEngine::new(app.config.timer.clone());
            print_json(&engine.snapshot())?;
        }
    }
    Ok(())
}

async fn run_session(app: App, sessions: u32, period: Duration) -> CmdResult {
    let user = app.current_user()?.map(|u| u.id);
    if user.is_none() {
        eprintln!("not signed in: this session earns no XP");
    }

    let display = XpDisplay::new();
    let unlocked_before = unlocked(&app, user);
    if let Some(user) = user {
        app.dispatcher(display.clone()).refresh(user)?;
    }
    let mut last_xp = display.current().map(|b| b.xp);

    let (queue, worker) = RewardWorker::spawn(app.reward_context(display.clone()));
    let coordinator = SessionCoordinator::new(app.config.timer.clone(), user, queue);
    let feed = app
        .config
        .feed
        .enabled
        .then_some(app.backend.as_ref() as &dyn ChangeFeed);
    let session = Session::mount(coordinator, feed, display.clone(), period);

    let mut events = session.subscribe();
    let mut xp = display.subscribe();
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    session.start();
    let mut completed = 0;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    print_json_line(&event)?;
                    match event {
                        Event::FocusSessionComplete { .. } => {
                            completed += 1;
                            if sessions > 0 && completed >= sessions {
                                break;
                            }
                            session.start();
                        }
                        Event::BreakComplete { .. } => {
                            session.start();
                        }
                        _ => {}
                    }
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "Event output lagged"),
                Err(RecvError::Closed) => break,
            },
            Ok(()) = xp.changed() => {
                let balance = *xp.borrow_and_update();
                report_xp(balance, &mut last_xp)?;
            }
            _ = &mut ctrl_c => {
                if let Some(event) = session.pause() {
                    print_json_line(&event)?;
                }
                break;
            }
        }
    }

    session.unmount();
    if tokio::time::timeout(DRAIN_TIMEOUT, worker).await.is_err() {
        warn!("Reward worker still busy, exiting without its results");
    }

    report_xp(display.current(), &mut last_xp)?;
    let at = Utc::now();
    let mut new_unlocks: Vec<String> = unlocked(&app, user)
        .difference(&unlocked_before)
        .cloned()
        .collect();
    new_unlocks.sort();
    for achievement_id in new_unlocks {
        print_json_line(&Event::AchievementUnlocked { achievement_id, at })?;
    }
    Ok(())
}

/// Print an `xp_granted` event when the displayed balance moved.
fn report_xp(balance: Option<XpBalance>, last_xp: &mut Option<u64>) -> CmdResult {
    let Some(balance) = balance else {
        return Ok(());
    };
    let previous = last_xp.unwrap_or(0);
    if balance.xp > previous {
        print_json_line(&Event::XpGranted {
            amount: balance.xp - previous,
            xp: balance.xp,
            level: balance.level,
            at: Utc::now(),
        })?;
    }
    *last_xp = Some(balance.xp);
    Ok(())
}

fn unlocked(app: &App, user: Option<Uuid>) -> HashSet<String> {
    user.and_then(|u| match app.backend.list_unlocked(u) {
        Ok(set) => Some(set),
        Err(e) => {
            warn!(error = %e, "Could not list unlocked achievements");
            None
        }
    })
    .unwrap_or_default()
}
