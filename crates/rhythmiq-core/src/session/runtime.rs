use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use super::coordinator::SessionCoordinator;
use crate::events::Event;
use crate::feed::{ChangeFeed, ChangeFilter, RowChange, Subscription, Table};
use crate::rewards::{XpBalance, XpDisplay};

const EVENT_CAPACITY: usize = 64;

/// A mounted timer session.
///
/// Mounting spawns the tick loop and subscribes the XP display to ledger
/// changes. Dropping (or [`Session::unmount`]) stops the loop and releases
/// the subscription; reward jobs already queued still run to completion.
pub struct Session {
    coordinator: Arc<Mutex<SessionCoordinator>>,
    events: broadcast::Sender<Event>,
    ticker: JoinHandle<()>,
    xp_feed: Option<Subscription>,
}

impl Session {
    /// Mount on the current tokio runtime. `tick_period` is one second in
    /// production.
    pub fn mount(
        coordinator: SessionCoordinator,
        feed: Option<&dyn ChangeFeed>,
        display: XpDisplay,
        tick_period: Duration,
    ) -> Self {
        let xp_feed = match (feed, coordinator.user()) {
            (Some(feed), Some(user)) => {
                let display = display.clone();
                Some(feed.subscribe(
                    Table::UserXp,
                    ChangeFilter::User(user),
                    Box::new(move |change: &RowChange| {
                        if let Ok(balance) = serde_json::from_value::<XpBalance>(change.row.clone()) {
                            display.publish(balance);
                        }
                    }),
                ))
            }
            _ => None,
        };

        let coordinator = Arc::new(Mutex::new(coordinator));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let ticker = tokio::spawn(tick_loop(
            Arc::clone(&coordinator),
            events.clone(),
            tick_period,
        ));
        info!("Session mounted");

        Self {
            coordinator,
            events,
            ticker,
            xp_feed,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn start(&self) -> Option<Event> {
        self.command(SessionCoordinator::start)
    }

    pub fn pause(&self) -> Option<Event> {
        self.command(SessionCoordinator::pause)
    }

    pub fn toggle(&self) -> Option<Event> {
        self.command(SessionCoordinator::toggle)
    }

    pub fn reset(&self) -> Option<Event> {
        self.command(|c| Some(c.reset()))
    }

    pub fn snapshot(&self) -> Option<Event> {
        self.coordinator.lock().ok().map(|c| c.snapshot())
    }

    /// Run `f` against the coordinator while holding its lock.
    pub fn with_coordinator<T>(&self, f: impl FnOnce(&mut SessionCoordinator) -> T) -> Option<T> {
        self.coordinator.lock().ok().map(|mut c| f(&mut c))
    }

    pub fn is_subscribed(&self) -> bool {
        self.xp_feed.is_some()
    }

    /// Tear down explicitly. Equivalent to dropping the session.
    pub fn unmount(self) {}

    fn command(&self, f: impl FnOnce(&mut SessionCoordinator) -> Option<Event>) -> Option<Event> {
        let event = self.coordinator.lock().ok().and_then(|mut c| f(&mut c))?;
        let _ = self.events.send(event.clone());
        Some(event)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.ticker.abort();
        drop(self.xp_feed.take());
        info!("Session unmounted");
    }
}

async fn tick_loop(
    coordinator: Arc<Mutex<SessionCoordinator>>,
    events: broadcast::Sender<Event>,
    period: Duration,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        let event = match coordinator.lock() {
            Ok(mut c) => c.tick(),
            Err(_) => break,
        };
        if let Some(event) = event {
            debug!(?event, "Timer event");
            let _ = events.send(event);
        }
    }
}
