//! XP merchandise shop.
//!
//! Purchases spend XP without lowering it: the ledger's lifetime XP (and so
//! the level) stays monotonic, and spendable XP is lifetime XP minus what
//! the user already spent.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{Result, ValidationError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MerchItem {
    pub id: String,
    pub name: String,
    pub description: String,
    pub xp_cost: u64,
}

impl MerchItem {
    fn new(id: &str, name: &str, description: &str, xp_cost: u64) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            xp_cost,
        }
    }
}

/// The merchandise on offer.
pub fn default_catalog() -> Vec<MerchItem> {
    vec![
        MerchItem::new("sticker-pack", "Rhythmiq Sticker Pack", "5 premium vinyl stickers with gradient designs", 500),
        MerchItem::new("tshirt", "Focus Mode T-Shirt", "Premium cotton tee with glow-in-dark logo", 1500),
        MerchItem::new("hoodie", "Flow State Hoodie", "Ultra-soft hoodie perfect for study sessions", 2500),
        MerchItem::new("notebook", "Productivity Journal", "120-page guided journal with focus templates", 800),
        MerchItem::new("mug", "Focus Fuel Mug", "Ceramic mug with motivational gradient design", 600),
        MerchItem::new("poster", "Motivation Poster Set", "3 minimalist posters for your study space", 1000),
    ]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopItem {
    #[serde(flatten)]
    pub item: MerchItem,
    pub purchased: bool,
    pub affordable: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub item_id: String,
    pub xp_cost: u64,
    pub spendable_after: u64,
}

pub trait ShopStore: Send + Sync {
    fn spendable_xp(&self, user: Uuid) -> Result<u64>;

    fn purchased_items(&self, user: Uuid) -> Result<HashSet<String>>;

    /// Atomically re-check balance and uniqueness, then record the
    /// purchase. Returns spendable XP afterwards.
    fn purchase(&self, user: Uuid, item_id: &str, xp_cost: u64) -> Result<u64>;
}

pub struct Shop {
    store: Arc<dyn ShopStore>,
    catalog: Vec<MerchItem>,
}

impl Shop {
    pub fn new(store: Arc<dyn ShopStore>) -> Self {
        Self::with_catalog(store, default_catalog())
    }

    pub fn with_catalog(store: Arc<dyn ShopStore>, catalog: Vec<MerchItem>) -> Self {
        Self { store, catalog }
    }

    pub fn catalog(&self) -> &[MerchItem] {
        &self.catalog
    }

    pub fn items(&self, user: Uuid) -> Result<Vec<ShopItem>> {
        let spendable = self.store.spendable_xp(user)?;
        let purchased = self.store.purchased_items(user)?;
        Ok(self
            .catalog
            .iter()
            .map(|item| ShopItem {
                purchased: purchased.contains(&item.id),
                affordable: spendable >= item.xp_cost,
                item: item.clone(),
            })
            .collect())
    }

    pub fn purchase(&self, user: Uuid, item_id: &str) -> Result<Receipt> {
        let item = self
            .catalog
            .iter()
            .find(|i| i.id == item_id)
            .ok_or_else(|| ValidationError::NotFound {
                kind: "Item",
                id: item_id.to_string(),
            })?;

        if self.store.purchased_items(user)?.contains(&item.id) {
            return Err(ValidationError::AlreadyRedeemed(item.name.clone()).into());
        }
        let available = self.store.spendable_xp(user)?;
        if available < item.xp_cost {
            return Err(ValidationError::InsufficientXp {
                required: item.xp_cost,
                available,
            }
            .into());
        }

        let spendable_after = self.store.purchase(user, &item.id, item.xp_cost)?;
        info!(%user, item = %item.id, cost = item.xp_cost, "Item redeemed");
        Ok(Receipt {
            item_id: item.id.clone(),
            xp_cost: item.xp_cost,
            spendable_after,
        })
    }
}
