use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;

use time::OffsetDateTime;
use tracing::debug;

use crate::catalog::{CafeCatalog, MenuItem};
use crate::error::{CafeError, Result};
use crate::health::HealthScorer;
use crate::similarity::{cosine_similarity, jaccard, nutrient_vector};

/// Menus larger than this only recommend their top half.
pub const HALVING_THRESHOLD: usize = 50;

pub fn candidate_count(n: usize) -> usize {
    if n > HALVING_THRESHOLD {
        n / 2
    } else {
        n
    }
}

fn ensure_catalog(items: &[MenuItem]) -> Result<()> {
    if items.is_empty() {
        return Err(CafeError::invalid_input("empty catalog"));
    }
    Ok(())
}

/// Popularity signal for the global engine. Implementations may weight by
/// the time of day `at`.
pub trait ItemScorer: Send + Sync {
    fn score(&self, item: &MenuItem, at: OffsetDateTime) -> f64;
}

/// Number of likes, regardless of time.
#[derive(Debug, Clone, Copy, Default)]
pub struct LikeCount;

impl ItemScorer for LikeCount {
    fn score(&self, item: &MenuItem, _at: OffsetDateTime) -> f64 {
        item.like_count() as f64
    }
}

#[derive(Clone)]
pub struct GlobalEngine {
    scorer: Arc<dyn ItemScorer>,
}

impl Default for GlobalEngine {
    fn default() -> Self {
        Self::new(Arc::new(LikeCount))
    }
}

impl GlobalEngine {
    pub fn new(scorer: Arc<dyn ItemScorer>) -> Self {
        Self { scorer }
    }

    /// The `candidate_count(n)` best-scoring slugs, best first.
    ///
    /// Same result as repeatedly extracting the remaining maximum with ties
    /// going to the earliest item: a stable descending sort keeps equal
    /// scores in menu order.
    pub fn recommend(&self, items: &[MenuItem], at: OffsetDateTime) -> Result<Vec<String>> {
        ensure_catalog(items)?;

        let mut scored: Vec<(f64, &MenuItem)> = items
            .iter()
            .map(|i| (self.scorer.score(i, at), i))
            .collect();
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));

        Ok(scored
            .into_iter()
            .take(candidate_count(items.len()))
            .map(|(_, i)| i.slug.clone())
            .collect())
    }
}

#[derive(Clone)]
pub struct HealthBotEngine {
    scorer: Arc<HealthScorer>,
}

impl HealthBotEngine {
    pub fn new(scorer: Arc<HealthScorer>) -> Self {
        Self { scorer }
    }

    pub fn recommend(&self, items: &[MenuItem]) -> Result<Vec<String>> {
        ensure_catalog(items)?;
        Ok(self.scorer.sort_by_health_score(items))
    }

    /// Cafe slug -> ranked item slugs. Cafes with an empty menu are left out.
    pub fn recommend_all(&self, catalogs: &[CafeCatalog]) -> BTreeMap<String, Vec<String>> {
        catalogs
            .iter()
            .filter_map(|c| match self.recommend(&c.items) {
                Ok(ranked) => Some((c.cafe.slug.clone(), ranked)),
                Err(e) => {
                    debug!(cafe = %c.cafe.slug, error = %e, "no bot recommendation");
                    None
                }
            })
            .collect()
    }
}

/// Menu items the user has not consumed yet, in menu order.
pub fn meal_not_consumed<'a>(
    consumed: &HashSet<String>,
    menu: &'a [MenuItem],
) -> Result<Vec<&'a MenuItem>> {
    ensure_catalog(menu)?;
    Ok(menu.iter().filter(|i| !consumed.contains(&i.slug)).collect())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub slug: String,
    pub score: f64,
}

/// Ranks unconsumed items by their closest nutritional match among what the
/// user already had. Scores are cosine similarities floored at 0; with no
/// history every candidate scores 0 and menu order is kept.
#[derive(Debug, Clone, Copy, Default)]
pub struct PersonalEngine;

impl PersonalEngine {
    pub fn recommend(&self, consumed: &HashSet<String>, menu: &[MenuItem]) -> Result<Vec<ScoredItem>> {
        let candidates = meal_not_consumed(consumed, menu)?;

        let keys: BTreeSet<&str> = menu
            .iter()
            .flat_map(|i| i.nutritional_informations.keys().map(String::as_str))
            .collect();
        let keys: Vec<&str> = keys.into_iter().collect();

        let history: Vec<Vec<f64>> = menu
            .iter()
            .filter(|i| consumed.contains(&i.slug))
            .map(|i| nutrient_vector(i, &keys))
            .collect();

        let mut scored: Vec<ScoredItem> = candidates
            .into_iter()
            .map(|item| {
                let v = nutrient_vector(item, &keys);
                let score = history
                    .iter()
                    .filter_map(|h| cosine_similarity(&v, h).ok())
                    .fold(0.0, f64::max);
                ScoredItem {
                    slug: item.slug.clone(),
                    score,
                }
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        Ok(scored)
    }
}

/// Ranks cafes for a user by the Jaccard overlap between the names of what
/// the user consumed and each cafe's menu. Empty menus are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct CafeEngine;

impl CafeEngine {
    pub fn recommend(&self, consumed_names: &[String], catalogs: &[CafeCatalog]) -> Result<Vec<String>> {
        if catalogs.is_empty() {
            return Err(CafeError::invalid_input("no cafes to rank"));
        }
        let taste: Vec<String> = consumed_names.iter().map(|n| n.to_lowercase()).collect();

        let mut scored = Vec::with_capacity(catalogs.len());
        for c in catalogs.iter().filter(|c| !c.items.is_empty()) {
            let menu: Vec<String> = c.items.iter().map(|i| i.name.to_lowercase()).collect();
            scored.push((jaccard(&taste, &menu)?, c.cafe.slug.clone()));
        }
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        Ok(scored.into_iter().map(|(_, slug)| slug).collect())
    }
}
