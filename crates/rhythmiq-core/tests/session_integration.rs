//! End-to-end timer sessions against the SQLite backend.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rhythmiq_core::achievements::AchievementStore;
use rhythmiq_core::{
    AchievementEvaluator, ChangeFeed, Event, FocusLog, Ledger, LocalBackend, RewardContext,
    RewardDispatcher, RewardSettings, RewardWorker, Session, SessionCoordinator, TimerSettings,
    XpDisplay,
};
use uuid::Uuid;

fn backend_with_user(xp: u64) -> (Arc<LocalBackend>, Uuid) {
    let backend = Arc::new(LocalBackend::open_memory().unwrap());
    let user = backend
        .with_db(|db| db.create_user("ana", Utc::now()))
        .unwrap();
    if xp > 0 {
        backend.increment(user.id, xp).unwrap();
    }
    (backend, user.id)
}

fn reward_context(backend: &Arc<LocalBackend>, display: XpDisplay) -> RewardContext {
    RewardContext {
        dispatcher: RewardDispatcher::new(backend.clone(), display),
        evaluator: AchievementEvaluator::new(backend.clone()),
        tasks: backend.clone(),
        focus_log: backend.clone(),
        settings: RewardSettings::default(),
    }
}

fn run_focus(coordinator: &mut SessionCoordinator, ticks: usize) -> Vec<Event> {
    coordinator.start();
    (0..ticks).filter_map(|_| coordinator.tick()).collect()
}

#[tokio::test]
async fn focus_session_from_95_xp_reaches_level_2() {
    let (backend, user) = backend_with_user(95);
    let display = XpDisplay::new();
    let (queue, worker) = RewardWorker::spawn(reward_context(&backend, display.clone()));

    let settings = TimerSettings {
        milestone_minutes: 0,
        ..TimerSettings::default()
    };
    let mut coordinator = SessionCoordinator::new(settings, Some(user), queue);
    let events = run_focus(&mut coordinator, 1501);
    assert!(matches!(
        events.last(),
        Some(Event::FocusSessionComplete { focus_minutes: 25, .. })
    ));

    drop(coordinator);
    worker.await.unwrap();

    let balance = backend.balance(user).unwrap();
    assert_eq!(balance.xp, 145);
    assert_eq!(balance.level, 2);
    assert_eq!(display.level_label(), "Level 2");
    assert!(backend.list_unlocked(user).unwrap().contains("first-steps"));
    assert_eq!(
        backend
            .focus_minutes_since(user, Utc::now() - chrono::Duration::hours(1))
            .unwrap(),
        25
    );
}

#[tokio::test]
async fn milestones_add_to_the_session_reward() {
    let (backend, user) = backend_with_user(0);
    let (queue, worker) = RewardWorker::spawn(reward_context(&backend, XpDisplay::new()));
    let mut coordinator = SessionCoordinator::new(TimerSettings::default(), Some(user), queue);

    let events = run_focus(&mut coordinator, 1501);
    let milestones = events
        .iter()
        .filter(|e| matches!(e, Event::FiveMinuteMilestone { .. }))
        .count();
    assert_eq!(milestones, 5);

    drop(coordinator);
    worker.await.unwrap();
    assert_eq!(backend.balance(user).unwrap().xp, 75);
}

#[tokio::test]
async fn signed_out_session_never_touches_the_ledger() {
    let (backend, user) = backend_with_user(10);
    let (queue, worker) = RewardWorker::spawn(reward_context(&backend, XpDisplay::new()));
    let mut coordinator = SessionCoordinator::new(TimerSettings::default(), None, queue);

    run_focus(&mut coordinator, 1501);
    drop(coordinator);
    worker.await.unwrap();
    assert_eq!(backend.balance(user).unwrap().xp, 10);
}

#[tokio::test(start_paused = true)]
async fn mounted_session_ticks_once_per_second() {
    let user = Uuid::new_v4();
    let (queue, _rx) = RewardWorker::channel();
    let coordinator = SessionCoordinator::new(TimerSettings::default(), Some(user), queue);
    let session = Session::mount(coordinator, None, XpDisplay::new(), Duration::from_secs(1));
    let mut events = session.subscribe();

    assert!(matches!(session.start(), Some(Event::TimerStarted { .. })));
    assert!(matches!(events.recv().await, Ok(Event::TimerStarted { .. })));

    tokio::time::sleep(Duration::from_millis(90_500)).await;
    let display = session.with_coordinator(|c| c.engine().display()).unwrap();
    assert_eq!(display, "23:30");

    session.pause();
    tokio::time::sleep(Duration::from_secs(10)).await;
    let display = session.with_coordinator(|c| c.engine().display()).unwrap();
    assert_eq!(display, "23:30");
}

#[tokio::test]
async fn unmount_releases_the_xp_subscription() {
    let (backend, user) = backend_with_user(0);
    let display = XpDisplay::new();
    let (queue, _rx) = RewardWorker::channel();
    let coordinator = SessionCoordinator::new(TimerSettings::default(), Some(user), queue);

    assert_eq!(backend.feed().subscriber_count(), 0);
    let session = Session::mount(
        coordinator,
        Some(backend.as_ref() as &dyn ChangeFeed),
        display.clone(),
        Duration::from_secs(1),
    );
    assert!(session.is_subscribed());
    assert_eq!(backend.feed().subscriber_count(), 1);

    backend.increment(user, 30).unwrap();
    assert_eq!(display.current().map(|b| b.xp), Some(30));

    session.unmount();
    assert_eq!(backend.feed().subscriber_count(), 0);

    backend.increment(user, 30).unwrap();
    assert_eq!(display.current().map(|b| b.xp), Some(30));
}

#[test]
fn concurrent_unlocks_never_duplicate() {
    let (backend, user) = backend_with_user(0);
    let evaluator = AchievementEvaluator::new(backend.clone());

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let evaluator = evaluator.clone();
            std::thread::spawn(move || {
                evaluator
                    .check_and_unlock(
                        user,
                        rhythmiq_core::RequirementType::TasksCompleted,
                        10,
                    )
                    .unwrap()
            })
        })
        .collect();

    let mut all: Vec<String> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort();
    assert_eq!(all, vec!["first-task".to_string(), "task-crusher".to_string()]);
    assert_eq!(backend.list_unlocked(user).unwrap().len(), 2);
}
