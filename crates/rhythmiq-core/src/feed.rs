//! Row-level change notifications.
//!
//! Listeners register for a table (optionally narrowed to one user) and get
//! back a [`Subscription`] guard. Dropping the guard unsubscribes, so a
//! session that goes away can never be called back.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    UserXp,
    Tasks,
    UserAchievements,
    ChallengeCompletions,
    Purchases,
    LikedTracks,
    Playlists,
    PlaylistTracks,
    Feedback,
    UserRoles,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// One mutated row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowChange {
    pub table: Table,
    pub kind: ChangeKind,
    pub user_id: Uuid,
    pub row: serde_json::Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeFilter {
    All,
    User(Uuid),
}

impl ChangeFilter {
    fn matches(&self, change: &RowChange) -> bool {
        match self {
            ChangeFilter::All => true,
            ChangeFilter::User(id) => change.user_id == *id,
        }
    }
}

pub type Listener = Box<dyn Fn(&RowChange) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Handle returned by [`ChangeFeed::subscribe`]. Unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    id: SubscriptionId,
    release: Option<Box<dyn FnOnce(SubscriptionId) + Send>>,
}

impl Subscription {
    pub fn new(id: SubscriptionId, release: impl FnOnce(SubscriptionId) + Send + 'static) -> Self {
        Self {
            id,
            release: Some(Box::new(release)),
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release(self.id);
        }
    }
}

/// Push notifications of row mutations.
pub trait ChangeFeed: Send + Sync {
    fn subscribe(&self, table: Table, filter: ChangeFilter, on_change: Listener) -> Subscription;

    /// Remove a listener. Unknown ids are ignored.
    fn unsubscribe(&self, id: SubscriptionId);
}

struct Entry {
    table: Table,
    filter: ChangeFilter,
    listener: Arc<dyn Fn(&RowChange) + Send + Sync>,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: HashMap<SubscriptionId, Entry>,
}

/// In-process feed used by the local backend.
#[derive(Clone, Default)]
pub struct LocalChangeFeed {
    registry: Arc<Mutex<Registry>>,
}

impl LocalChangeFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `change` to every matching listener. Returns how many ran.
    ///
    /// Listeners are invoked outside the registry lock so they may
    /// subscribe or unsubscribe themselves.
    pub fn publish(&self, change: &RowChange) -> usize {
        let listeners: Vec<_> = match self.registry.lock() {
            Ok(registry) => registry
                .entries
                .values()
                .filter(|e| e.table == change.table && e.filter.matches(change))
                .map(|e| Arc::clone(&e.listener))
                .collect(),
            Err(_) => return 0,
        };
        debug!(table = ?change.table, kind = ?change.kind, listeners = listeners.len(), "Publishing row change");
        for listener in &listeners {
            listener(change);
        }
        listeners.len()
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.lock().map(|r| r.entries.len()).unwrap_or(0)
    }

    fn remove(registry: &Mutex<Registry>, id: SubscriptionId) {
        if let Ok(mut registry) = registry.lock() {
            registry.entries.remove(&id);
        }
    }
}

impl ChangeFeed for LocalChangeFeed {
    fn subscribe(&self, table: Table, filter: ChangeFilter, on_change: Listener) -> Subscription {
        let id = match self.registry.lock() {
            Ok(mut registry) => {
                registry.next_id += 1;
                let id = SubscriptionId(registry.next_id);
                registry.entries.insert(
                    id,
                    Entry {
                        table,
                        filter,
                        listener: Arc::from(on_change),
                    },
                );
                id
            }
            Err(_) => SubscriptionId(0),
        };
        let weak: Weak<Mutex<Registry>> = Arc::downgrade(&self.registry);
        Subscription::new(id, move |id| {
            if let Some(registry) = weak.upgrade() {
                LocalChangeFeed::remove(&registry, id);
            }
        })
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        LocalChangeFeed::remove(&self.registry, id);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn change(table: Table, user_id: Uuid) -> RowChange {
        RowChange {
            table,
            kind: ChangeKind::Update,
            user_id,
            row: serde_json::json!({}),
        }
    }

    fn counter() -> (Arc<AtomicUsize>, Listener) {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        (hits, Box::new(move |_: &RowChange| {
            h.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn delivers_only_matching_table_and_user() {
        let feed = LocalChangeFeed::new();
        let me = Uuid::new_v4();
        let (hits, listener) = counter();
        let _sub = feed.subscribe(Table::UserXp, ChangeFilter::User(me), listener);

        feed.publish(&change(Table::UserXp, me));
        feed.publish(&change(Table::UserXp, Uuid::new_v4()));
        feed.publish(&change(Table::Tasks, me));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dropping_guard_unsubscribes() {
        let feed = LocalChangeFeed::new();
        let (hits, listener) = counter();
        let sub = feed.subscribe(Table::Tasks, ChangeFilter::All, listener);
        assert_eq!(feed.subscriber_count(), 1);

        drop(sub);
        assert_eq!(feed.subscriber_count(), 0);
        feed.publish(&change(Table::Tasks, Uuid::new_v4()));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn explicit_unsubscribe_then_drop_is_harmless() {
        let feed = LocalChangeFeed::new();
        let (_hits, listener) = counter();
        let sub = feed.subscribe(Table::Tasks, ChangeFilter::All, listener);
        feed.unsubscribe(sub.id());
        assert_eq!(feed.subscriber_count(), 0);
        drop(sub);
    }

    #[test]
    fn guard_outliving_feed_is_harmless() {
        let feed = LocalChangeFeed::new();
        let (_hits, listener) = counter();
        let sub = feed.subscribe(Table::Tasks, ChangeFilter::All, listener);
        drop(feed);
        drop(sub);
    }
}
