use std::sync::Arc;

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};
use tracing::{debug, error, info, instrument, warn};

use super::model::{OrderStatus, OPEN_STATUSES};
use super::repo::OrderStore;
use crate::error::{CafeError, Result};
use crate::scheduler::{call_with_timeout, Job};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub scanned: usize,
    pub cancelled: usize,
    /// Orders that changed status between the scan and the update.
    pub skipped: usize,
    pub failed: usize,
}

/// Cancels PLACED/READY orders older than the staleness window.
#[derive(Clone)]
pub struct OrderSweeper {
    store: Arc<dyn OrderStore>,
    staleness: Duration,
    call_timeout: std::time::Duration,
}

impl OrderSweeper {
    pub fn new(
        store: Arc<dyn OrderStore>,
        staleness: Duration,
        call_timeout: std::time::Duration,
    ) -> Self {
        Self {
            store,
            staleness,
            call_timeout,
        }
    }

    /// One pass at `now`. Only the initial scan can fail the sweep; each
    /// order update stands alone.
    #[instrument(skip(self), fields(staleness_secs = self.staleness.whole_seconds()))]
    pub async fn sweep(&self, now: OffsetDateTime) -> Result<SweepReport> {
        if !self.staleness.is_positive() {
            return Err(CafeError::invalid_input(format!(
                "staleness window must be positive, got {}",
                self.staleness
            )));
        }
        let cutoff = now.checked_sub(self.staleness).ok_or_else(|| {
            CafeError::invalid_input(format!("staleness window {} out of range", self.staleness))
        })?;
        let candidates = call_with_timeout(
            "find_stale_orders",
            self.call_timeout,
            self.store.find_by_status_created_before(&OPEN_STATUSES, cutoff),
        )
        .await?;

        let mut report = SweepReport {
            scanned: candidates.len(),
            ..Default::default()
        };

        for order in candidates {
            let updated_at = match order.stale_cancellation(now, self.staleness) {
                Ok(Some(at)) => at,
                Ok(None) => continue,
                Err(e) => {
                    warn!(order_id = %order.id, error = %e, "order not cancellable");
                    report.failed += 1;
                    continue;
                }
            };

            let res = call_with_timeout(
                "cancel_order",
                self.call_timeout,
                self.store.transition_if_status(
                    order.id,
                    order.status,
                    OrderStatus::Cancelled,
                    updated_at,
                ),
            )
            .await;

            match res {
                Ok(true) => {
                    debug!(order_id = %order.id, from = %order.status, "order auto-cancelled");
                    report.cancelled += 1;
                }
                Ok(false) => {
                    debug!(order_id = %order.id, "order changed concurrently; left alone");
                    report.skipped += 1;
                }
                Err(e) => {
                    error!(order_id = %order.id, error = %e, "failed to cancel order");
                    report.failed += 1;
                }
            }
        }

        info!(
            scanned = report.scanned,
            cancelled = report.cancelled,
            skipped = report.skipped,
            failed = report.failed,
            "order sweep complete"
        );
        Ok(report)
    }
}

#[async_trait]
impl Job for OrderSweeper {
    fn name(&self) -> &'static str {
        "order-sweep"
    }

    async fn run_once(&self) -> Result<()> {
        self.sweep(OffsetDateTime::now_utc()).await.map(|_| ())
    }
}
