use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{error, info, instrument, warn};

use super::scorer::HealthScorer;
use crate::catalog::services::load_snapshot;
use crate::catalog::{CafeCatalog, CafeFields, CatalogSource, CatalogUpdater, ItemFields};
use crate::error::Result;
use crate::scheduler::{call_with_timeout, BatchReport, Job};

/// Pushes recomputed health scores for every item and cafe.
#[derive(Clone)]
pub struct HealthRefresh {
    catalog: Arc<dyn CatalogSource>,
    updater: Arc<dyn CatalogUpdater>,
    scorer: Arc<HealthScorer>,
    call_timeout: Duration,
}

impl HealthRefresh {
    pub fn new(
        catalog: Arc<dyn CatalogSource>,
        updater: Arc<dyn CatalogUpdater>,
        scorer: Arc<HealthScorer>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            catalog,
            updater,
            scorer,
            call_timeout,
        }
    }

    /// One update per item of every fetched menu.
    #[instrument(skip_all)]
    pub async fn update_items_health_score(&self, catalogs: &[CafeCatalog]) -> BatchReport {
        let mut report = BatchReport::default();
        for c in catalogs {
            for item in &c.items {
                let fields = ItemFields {
                    health_score: Some(self.scorer.health_score(item)),
                    ..ItemFields::default()
                };
                let res = call_with_timeout(
                    "update_menu_item",
                    self.call_timeout,
                    self.updater.update_menu_item(&c.cafe.slug, &item.slug, &fields),
                )
                .await;
                match res {
                    Ok(()) => report.updated += 1,
                    Err(e) => {
                        error!(cafe = %c.cafe.slug, item = %item.slug, error = %e, "item score update failed");
                        report.failed += 1;
                    }
                }
            }
        }

        info!(
            updated = report.updated,
            failed = report.failed,
            "item health scores refreshed"
        );
        report
    }

    /// One update per cafe with the mean of its item scores. Empty menus are skipped.
    #[instrument(skip_all)]
    pub async fn update_cafes_health_score(&self, catalogs: &[CafeCatalog]) -> BatchReport {
        let mut report = BatchReport::default();
        for c in catalogs {
            let Some(score) = self.scorer.cafe_score(&c.items) else {
                report.skipped += 1;
                continue;
            };
            let fields = CafeFields {
                health_score: Some(score),
                ..CafeFields::default()
            };
            let res = call_with_timeout(
                "update_cafe_health_score",
                self.call_timeout,
                self.updater.update_cafe_health_score(&c.cafe.slug, &fields),
            )
            .await;
            match res {
                Ok(()) => report.updated += 1,
                Err(e) => {
                    error!(cafe = %c.cafe.slug, error = %e, "cafe score update failed");
                    report.failed += 1;
                }
            }
        }

        info!(
            updated = report.updated,
            failed = report.failed,
            skipped = report.skipped,
            "cafe health scores refreshed"
        );
        report
    }

    /// Reads the catalog once and pushes item then cafe scores from it.
    /// Cafes whose menu could not be read count as failed.
    #[instrument(skip(self))]
    pub async fn refresh_all(&self) -> Result<BatchReport> {
        let snapshot = load_snapshot(self.catalog.as_ref(), self.call_timeout).await?;
        if !snapshot.is_complete() {
            warn!(unavailable = ?snapshot.unavailable, "scoring a partial catalog");
        }

        let mut report = BatchReport {
            failed: snapshot.unavailable.len(),
            ..BatchReport::default()
        };
        report += self.update_items_health_score(&snapshot.cafes).await;
        report += self.update_cafes_health_score(&snapshot.cafes).await;
        Ok(report)
    }
}

#[async_trait]
impl Job for HealthRefresh {
    fn name(&self) -> &'static str {
        "health-refresh"
    }

    async fn run_once(&self) -> Result<()> {
        self.refresh_all().await.map(|_| ())
    }
}
