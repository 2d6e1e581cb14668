use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use time::OffsetDateTime;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::engines::{CafeEngine, GlobalEngine, HealthBotEngine, PersonalEngine};
use super::model::{item_ref, Recommendation, Scope};
use super::repo::RecommendationStore;
use crate::catalog::services::{load_snapshot, CatalogSnapshot};
use crate::catalog::{CafeCatalog, CatalogSource};
use crate::error::Result;
use crate::health::HealthScorer;
use crate::orders::OrderStore;
use crate::scheduler::{call_with_timeout, BatchReport, Job};

/// user -> cafe slug -> consumed item slugs
type History = BTreeMap<Uuid, BTreeMap<String, HashSet<String>>>;

/// Recomputes every recommendation list and swaps it into the store.
#[derive(Clone)]
pub struct RecommendationRefresh {
    catalog: Arc<dyn CatalogSource>,
    orders: Arc<dyn OrderStore>,
    store: Arc<dyn RecommendationStore>,
    global: GlobalEngine,
    bot: HealthBotEngine,
    call_timeout: Duration,
}

impl RecommendationRefresh {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        orders: Arc<dyn OrderStore>,
        store: Arc<dyn RecommendationStore>,
        scorer: Arc<HealthScorer>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            orders,
            store,
            global: GlobalEngine::default(),
            bot: HealthBotEngine::new(scorer),
            call_timeout,
        }
    }

    pub fn with_global_engine(mut self, engine: GlobalEngine) -> Self {
        self.global = engine;
        self
    }

    async fn write(&self, rec: Recommendation, report: &mut BatchReport) {
        let res = call_with_timeout(
            "replace_recommendation",
            self.call_timeout,
            self.store.replace(&rec),
        )
        .await;
        match res {
            Ok(()) => report.updated += 1,
            Err(e) => {
                error!(scope = %rec.scope, subject = %rec.subject, error = %e, "recommendation write failed");
                report.failed += 1;
            }
        }
    }

    pub async fn refresh_bot(&self, catalogs: &[CafeCatalog]) -> BatchReport {
        let mut report = BatchReport::default();
        let ranked = self.bot.recommend_all(catalogs);
        report.skipped = catalogs.len() - ranked.len();
        for (slug, items) in ranked {
            self.write(Recommendation::for_cafe(Scope::Bot, &slug, items), &mut report)
                .await;
        }
        report
    }

    pub async fn refresh_public(&self, catalogs: &[CafeCatalog], at: OffsetDateTime) -> BatchReport {
        let mut report = BatchReport::default();
        for c in catalogs {
            match self.global.recommend(&c.items, at) {
                Ok(items) => {
                    self.write(Recommendation::for_cafe(Scope::Public, &c.cafe.slug, items), &mut report)
                        .await
                }
                Err(e) => {
                    debug!(cafe = %c.cafe.slug, error = %e, "no public recommendation");
                    report.skipped += 1;
                }
            }
        }
        report
    }

    async fn load_history(&self) -> Result<History> {
        let completed = call_with_timeout(
            "completed_orders",
            self.call_timeout,
            self.orders.completed_orders(),
        )
        .await?;

        let mut history = History::new();
        for order in completed {
            history
                .entry(order.user_id)
                .or_default()
                .entry(order.cafe_slug)
                .or_default()
                .extend(order.items);
        }
        Ok(history)
    }

    /// Personal and cafe-level lists for every user with a completed order.
    ///
    /// Both lists draw on every cafe, so when any menu is missing from the
    /// snapshot the stored lists are kept and counted as skipped.
    pub async fn refresh_users(&self, snapshot: &CatalogSnapshot) -> Result<BatchReport> {
        let history = self.load_history().await?;
        let mut report = BatchReport::default();

        if !snapshot.is_complete() {
            warn!(
                unavailable = ?snapshot.unavailable,
                users = history.len(),
                "catalog incomplete; keeping per-user lists"
            );
            report.skipped = history.len() * 2;
            return Ok(report);
        }
        let catalogs = &snapshot.cafes;

        for (user_id, visits) in &history {
            let mut scored = Vec::new();
            let mut consumed_names = Vec::new();

            for c in catalogs.iter().filter(|c| visits.contains_key(&c.cafe.slug)) {
                let consumed = &visits[&c.cafe.slug];
                consumed_names.extend(
                    c.items
                        .iter()
                        .filter(|i| consumed.contains(&i.slug))
                        .map(|i| i.name.clone()),
                );
                match PersonalEngine.recommend(consumed, &c.items) {
                    Ok(ranked) => scored.extend(
                        ranked
                            .into_iter()
                            .map(|s| (s.score, item_ref(&c.cafe.slug, &s.slug))),
                    ),
                    Err(e) => debug!(user = %user_id, cafe = %c.cafe.slug, error = %e, "cafe skipped"),
                }
            }

            // stable: equal scores keep cafe then menu order
            scored.sort_by(|a, b| b.0.total_cmp(&a.0));
            let personal = scored.into_iter().map(|(_, r)| r).collect();
            self.write(Recommendation::for_user(Scope::Personal, *user_id, personal), &mut report)
                .await;

            match CafeEngine.recommend(&consumed_names, catalogs) {
                Ok(cafes) => {
                    self.write(Recommendation::for_user(Scope::Cafe, *user_id, cafes), &mut report)
                        .await
                }
                Err(e) => {
                    debug!(user = %user_id, error = %e, "no cafe recommendation");
                    report.skipped += 1;
                }
            }
        }
        Ok(report)
    }

    /// One full sweep over all four scopes. Cafes whose menu could not be
    /// read count as failed and keep their stored lists.
    #[instrument(skip(self))]
    pub async fn refresh_all(&self, at: OffsetDateTime) -> Result<BatchReport> {
        let snapshot = load_snapshot(self.catalog.as_ref(), self.call_timeout).await?;

        let mut report = BatchReport {
            failed: snapshot.unavailable.len(),
            ..BatchReport::default()
        };
        report += self.refresh_bot(&snapshot.cafes).await;
        report += self.refresh_public(&snapshot.cafes, at).await;
        report += self.refresh_users(&snapshot).await?;

        info!(
            cafes = snapshot.cafes.len(),
            updated = report.updated,
            failed = report.failed,
            skipped = report.skipped,
            "recommendations refreshed"
        );
        Ok(report)
    }
}

#[async_trait]
impl Job for RecommendationRefresh {
    fn name(&self) -> &'static str {
        "recommendation-refresh"
    }

    async fn run_once(&self) -> Result<()> {
        self.refresh_all(OffsetDateTime::now_utc()).await.map(|_| ())
    }
}
