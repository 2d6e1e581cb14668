use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::error::{CafeError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Placed,
    Ready,
    Completed,
    Cancelled,
}

/// Statuses the sweep may still cancel.
pub const OPEN_STATUSES: [OrderStatus; 2] = [OrderStatus::Placed, OrderStatus::Ready];

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Placed => "PLACED",
            OrderStatus::Ready => "READY",
            OrderStatus::Completed => "COMPLETED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    pub fn can_transition_to(self, to: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, to),
            (Placed, Ready) | (Ready, Completed) | (Placed, Cancelled) | (Ready, Cancelled)
        )
    }

    pub fn transition(self, to: OrderStatus) -> Result<OrderStatus> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(CafeError::InvalidTransition { from: self, to })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = CafeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "PLACED" => Ok(OrderStatus::Placed),
            "READY" => Ok(OrderStatus::Ready),
            "COMPLETED" => Ok(OrderStatus::Completed),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(CafeError::invalid_input(format!("unknown order status {other}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub cafe_slug: String,
    pub user_id: Uuid,
    /// Item slugs within `cafe_slug`.
    pub items: Vec<String>,
    pub status: OrderStatus,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl Order {
    /// False when `now - window` falls outside the representable range.
    pub fn is_stale(&self, now: OffsetDateTime, window: Duration) -> bool {
        now.checked_sub(window)
            .is_some_and(|cutoff| self.created_at < cutoff)
    }

    /// The `updated_at` to write when the sweep cancels this order, or `None`
    /// when it is not yet stale. Cancelling a terminal order is an error.
    ///
    /// The timestamp is anchored to `created_at + window`, not to `now`, so
    /// the audit trail records when the order actually went stale.
    pub fn stale_cancellation(
        &self,
        now: OffsetDateTime,
        window: Duration,
    ) -> Result<Option<OffsetDateTime>> {
        if !self.is_stale(now, window) {
            return Ok(None);
        }
        self.status.transition(OrderStatus::Cancelled)?;
        let at = self
            .created_at
            .checked_add(window)
            .ok_or_else(|| CafeError::invalid_input(format!("staleness window {window} out of range")))?;
        Ok(Some(at))
    }
}
