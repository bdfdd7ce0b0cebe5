use std::sync::Arc;

use tokio::sync::watch;

use super::XpBalance;

/// Last ledger balance known to the client.
///
/// Cloning shares the same underlying channel. Renderers hold a
/// [`watch::Receiver`] from [`XpDisplay::subscribe`] and redraw on change.
#[derive(Clone)]
pub struct XpDisplay {
    tx: Arc<watch::Sender<Option<XpBalance>>>,
}

impl XpDisplay {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    /// Replace the shown balance. Works with or without receivers.
    pub fn publish(&self, balance: XpBalance) {
        self.tx.send_replace(Some(balance));
    }

    pub fn current(&self) -> Option<XpBalance> {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<XpBalance>> {
        self.tx.subscribe()
    }

    /// "Level N", with level 1 before anything was fetched.
    pub fn level_label(&self) -> String {
        let level = self.current().map(|b| b.level).unwrap_or(1);
        format!("Level {level}")
    }
}

impl Default for XpDisplay {
    fn default() -> Self {
        Self::new()
    }
}
