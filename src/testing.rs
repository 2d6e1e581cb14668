//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::catalog::models::{Cafe, UserInteraction};
use crate::catalog::repo::LikeOutcome;
use crate::catalog::{CafeFields, CatalogSource, CatalogUpdater, ItemFields, MenuItem};
use crate::orders::model::Order;
use crate::orders::{OrderStatus, OrderStore};
use crate::recommend::model::{Recommendation, Scope};
use crate::recommend::RecommendationStore;

#[derive(Default)]
pub struct InMemoryCatalog {
    pub cafes: Mutex<Vec<(Cafe, Vec<MenuItem>)>>,
    /// Cafe slugs whose item fetch fails.
    pub broken_cafes: Mutex<HashSet<String>>,
    /// Cafe or "cafe/item" keys whose updates fail.
    pub failing_updates: Mutex<HashSet<String>>,
    /// Calls to `get_cafe_items`, failed ones included.
    pub item_fetches: AtomicUsize,
}

impl InMemoryCatalog {
    pub fn with_cafes(cafes: Vec<(Cafe, Vec<MenuItem>)>) -> Self {
        Self {
            cafes: Mutex::new(cafes),
            ..Default::default()
        }
    }

    pub fn fail_items_of(&self, cafe: &str) {
        self.broken_cafes.lock().unwrap().insert(cafe.to_string());
    }

    pub fn fail_update_of(&self, key: &str) {
        self.failing_updates.lock().unwrap().insert(key.to_string());
    }

    pub fn cafe(&self, slug: &str) -> Cafe {
        self.cafes
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| c.slug == slug)
            .map(|(c, _)| c.clone())
            .unwrap()
    }

    pub fn item(&self, cafe: &str, item: &str) -> MenuItem {
        self.cafes
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| c.slug == cafe)
            .and_then(|(_, items)| items.iter().find(|i| i.slug == item).cloned())
            .unwrap()
    }

    fn check(&self, key: &str) -> anyhow::Result<()> {
        if self.failing_updates.lock().unwrap().contains(key) {
            anyhow::bail!("update of {} rejected with status 500", key);
        }
        Ok(())
    }
}

pub fn cafe(slug: &str) -> Cafe {
    Cafe {
        slug: slug.to_string(),
        name: slug.replace('-', " "),
        health_score: None,
    }
}

#[async_trait]
impl CatalogSource for InMemoryCatalog {
    async fn get_all_cafes(&self) -> anyhow::Result<Vec<Cafe>> {
        Ok(self.cafes.lock().unwrap().iter().map(|(c, _)| c.clone()).collect())
    }

    async fn get_cafe_items(&self, slug: &str) -> anyhow::Result<Vec<MenuItem>> {
        self.item_fetches.fetch_add(1, Ordering::SeqCst);
        if self.broken_cafes.lock().unwrap().contains(slug) {
            anyhow::bail!("items of {} unavailable", slug);
        }
        self.cafes
            .lock()
            .unwrap()
            .iter()
            .find(|(c, _)| c.slug == slug)
            .map(|(_, items)| items.clone())
            .ok_or_else(|| anyhow::anyhow!("cafe {} not found", slug))
    }
}

#[async_trait]
impl CatalogUpdater for InMemoryCatalog {
    async fn update_cafe(&self, slug: &str, fields: &CafeFields) -> anyhow::Result<()> {
        self.check(slug)?;
        let mut cafes = self.cafes.lock().unwrap();
        let (cafe, _) = cafes
            .iter_mut()
            .find(|(c, _)| c.slug == slug)
            .ok_or_else(|| anyhow::anyhow!("cafe {} not found", slug))?;
        if let Some(name) = &fields.name {
            cafe.name = name.clone();
        }
        if let Some(score) = fields.health_score {
            cafe.health_score = Some(score);
        }
        Ok(())
    }

    async fn update_menu_item(
        &self,
        cafe_slug: &str,
        item_slug: &str,
        fields: &ItemFields,
    ) -> anyhow::Result<()> {
        self.check(&format!("{cafe_slug}/{item_slug}"))?;
        let mut cafes = self.cafes.lock().unwrap();
        let item = cafes
            .iter_mut()
            .find(|(c, _)| c.slug == cafe_slug)
            .and_then(|(_, items)| items.iter_mut().find(|i| i.slug == item_slug))
            .ok_or_else(|| anyhow::anyhow!("item {}/{} not found", cafe_slug, item_slug))?;
        if let Some(name) = &fields.name {
            item.name = name.clone();
        }
        if let Some(score) = fields.health_score {
            item.health_score = Some(score);
        }
        Ok(())
    }

    async fn record_like(
        &self,
        cafe_slug: &str,
        item_slug: &str,
        interaction: &UserInteraction,
    ) -> anyhow::Result<LikeOutcome> {
        let mut cafes = self.cafes.lock().unwrap();
        let Some(item) = cafes
            .iter_mut()
            .find(|(c, _)| c.slug == cafe_slug)
            .and_then(|(_, items)| items.iter_mut().find(|i| i.slug == item_slug))
        else {
            return Ok(LikeOutcome::UnknownItem);
        };
        Ok(if item.add_like(interaction.clone()) {
            LikeOutcome::Recorded
        } else {
            LikeOutcome::AlreadyLiked
        })
    }
}

#[derive(Default)]
pub struct InMemoryOrders {
    pub orders: Mutex<Vec<Order>>,
    pub failing_ids: Mutex<HashSet<Uuid>>,
}

impl InMemoryOrders {
    pub fn with_orders(orders: Vec<Order>) -> Self {
        Self {
            orders: Mutex::new(orders),
            ..Default::default()
        }
    }

    pub fn get(&self, id: Uuid) -> Order {
        self.orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.id == id)
            .cloned()
            .unwrap()
    }
}

pub fn order(
    cafe_slug: &str,
    user_id: Uuid,
    items: &[&str],
    status: OrderStatus,
    created_at: OffsetDateTime,
) -> Order {
    Order {
        id: Uuid::new_v4(),
        cafe_slug: cafe_slug.to_string(),
        user_id,
        items: items.iter().map(|s| s.to_string()).collect(),
        status,
        created_at,
        updated_at: created_at,
    }
}

#[async_trait]
impl OrderStore for InMemoryOrders {
    async fn find_by_status_created_before(
        &self,
        statuses: &[OrderStatus],
        before: OffsetDateTime,
    ) -> anyhow::Result<Vec<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| statuses.contains(&o.status) && o.created_at < before)
            .cloned()
            .collect())
    }

    async fn transition_if_status(
        &self,
        id: Uuid,
        expected: OrderStatus,
        to: OrderStatus,
        updated_at: OffsetDateTime,
    ) -> anyhow::Result<bool> {
        if self.failing_ids.lock().unwrap().contains(&id) {
            anyhow::bail!("order store unavailable for {}", id);
        }
        let mut orders = self.orders.lock().unwrap();
        match orders.iter_mut().find(|o| o.id == id && o.status == expected) {
            Some(o) => {
                o.status = to;
                o.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn completed_orders(&self) -> anyhow::Result<Vec<Order>> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.status == OrderStatus::Completed)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryRecommendations {
    pub rows: Mutex<HashMap<(Scope, String), Recommendation>>,
    pub failing_subjects: Mutex<HashSet<String>>,
}

impl InMemoryRecommendations {
    pub fn items(&self, scope: Scope, subject: &str) -> Option<Vec<String>> {
        self.rows
            .lock()
            .unwrap()
            .get(&(scope, subject.to_string()))
            .map(|r| r.items.clone())
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl RecommendationStore for InMemoryRecommendations {
    async fn replace(&self, rec: &Recommendation) -> anyhow::Result<()> {
        if self.failing_subjects.lock().unwrap().contains(&rec.subject) {
            anyhow::bail!("write of {} rejected", rec.subject);
        }
        self.rows
            .lock()
            .unwrap()
            .insert((rec.scope, rec.subject.clone()), rec.clone());
        Ok(())
    }

    async fn get(&self, scope: Scope, subject: &str) -> anyhow::Result<Option<Recommendation>> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .get(&(scope, subject.to_string()))
            .cloned())
    }
}
