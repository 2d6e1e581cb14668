use crate::catalog::MenuItem;
use crate::error::Result;

use super::rules::{HealthRules, MAX_SCORE, MIN_SCORE};

/// 1 when the item's quantity of `nutrient` exceeds `threshold`, else 0.
pub fn contains_high_nutrient(nutrient: &str, threshold: f64, item: &MenuItem) -> u8 {
    u8::from(item.nutrient(nutrient) > threshold)
}

/// Scores items against a rule table:
/// `clamp(baseline - Σ weight_i × contains_high_nutrient_i, 0, 100)`.
/// Higher is healthier.
#[derive(Debug, Clone)]
pub struct HealthScorer {
    rules: HealthRules,
}

impl HealthScorer {
    pub fn new(rules: HealthRules) -> Result<Self> {
        rules.validate()?;
        Ok(Self { rules })
    }

    pub fn health_score(&self, item: &MenuItem) -> f64 {
        let penalty: f64 = self
            .rules
            .rules
            .iter()
            .map(|r| r.weight * f64::from(contains_high_nutrient(&r.nutrient, r.threshold, item)))
            .sum();
        (self.rules.baseline - penalty).clamp(MIN_SCORE, MAX_SCORE)
    }

    /// Item slugs, healthiest first. Stable: equal scores keep menu order.
    pub fn sort_by_health_score(&self, items: &[MenuItem]) -> Vec<String> {
        let mut scored: Vec<(f64, &MenuItem)> =
            items.iter().map(|i| (self.health_score(i), i)).collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.into_iter().map(|(_, i)| i.slug.clone()).collect()
    }

    /// Mean item score rounded to 2 decimals; `None` for an empty menu.
    pub fn cafe_score(&self, items: &[MenuItem]) -> Option<f64> {
        if items.is_empty() {
            return None;
        }
        let total: f64 = items.iter().map(|i| self.health_score(i)).sum();
        let mean = total / items.len() as f64;
        Some((mean * 100.0).round() / 100.0)
    }
}
