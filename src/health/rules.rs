use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CafeError, Result};

pub const BASELINE: f64 = 80.0;
pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// (nutrient, threshold, weight). Positive weights penalise, negative ones reward.
pub const DEFAULT_RULES: &[(&str, f64, f64)] = &[
    ("lipids", 3.0, 20.0),
    ("saturated_fats", 1.5, 15.0),
    ("sugars", 5.0, 25.0),
    ("salt", 1.5, 20.0),
    ("proteins", 10.0, -10.0),
    ("fibers", 3.0, -10.0),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NutrientRule {
    pub nutrient: String,
    pub threshold: f64,
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRules {
    #[serde(default = "default_baseline")]
    pub baseline: f64,
    pub rules: Vec<NutrientRule>,
}

fn default_baseline() -> f64 {
    BASELINE
}

impl Default for HealthRules {
    fn default() -> Self {
        Self {
            baseline: BASELINE,
            rules: DEFAULT_RULES
                .iter()
                .map(|&(nutrient, threshold, weight)| NutrientRule {
                    nutrient: nutrient.to_string(),
                    threshold,
                    weight,
                })
                .collect(),
        }
    }
}

impl HealthRules {
    /// Built-in table when `path` is `None`, otherwise the JSON file at `path`.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let Some(path) = path else {
            info!("using built-in health rules");
            return Ok(Self::default());
        };

        let raw = std::fs::read_to_string(path).map_err(|e| {
            CafeError::Configuration(format!("read health rules {path}: {e}"))
        })?;
        let rules = Self::from_json(&raw)?;
        info!(path, rules = rules.rules.len(), "loaded health rules");
        Ok(rules)
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let rules: Self = serde_json::from_str(raw)
            .map_err(|e| CafeError::Configuration(format!("parse health rules: {e}")))?;
        rules.validate()?;
        Ok(rules)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rules.is_empty() {
            return Err(CafeError::Configuration("health rule table is empty".into()));
        }
        if !self.baseline.is_finite() {
            return Err(CafeError::Configuration("baseline must be finite".into()));
        }
        for rule in &self.rules {
            if rule.nutrient.trim().is_empty() {
                return Err(CafeError::Configuration("rule with empty nutrient".into()));
            }
            if !rule.threshold.is_finite() || !rule.weight.is_finite() {
                return Err(CafeError::Configuration(format!(
                    "rule {} has a non-finite threshold or weight",
                    rule.nutrient
                )));
            }
        }
        Ok(())
    }
}
