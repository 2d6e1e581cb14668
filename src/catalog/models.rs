use std::collections::BTreeMap;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Nutrient name -> quantity, in the units of the nutrition data source.
pub type NutritionalInformations = BTreeMap<String, f64>;

pub fn is_valid_slug(slug: &str) -> bool {
    lazy_static! {
        static ref SLUG_RE: Regex = Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
    }
    SLUG_RE.is_match(slug)
}

/// A like/attend/support event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInteraction {
    pub user_id: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub interaction_time: OffsetDateTime,
}

impl UserInteraction {
    pub fn now(user_id: Uuid) -> Self {
        Self {
            user_id,
            interaction_time: OffsetDateTime::now_utc(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub nutritional_informations: NutritionalInformations,
    #[serde(default)]
    pub likes: Vec<UserInteraction>,
    /// Derived; recomputed by the health refresh job.
    #[serde(default)]
    pub health_score: Option<f64>,
}

impl MenuItem {
    pub fn new(slug: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            slug: slug.into(),
            name: name.into(),
            nutritional_informations: NutritionalInformations::new(),
            likes: Vec::new(),
            health_score: None,
        }
    }

    pub fn with_nutrient(mut self, nutrient: impl Into<String>, quantity: f64) -> Self {
        self.nutritional_informations.insert(nutrient.into(), quantity);
        self
    }

    /// Quantity of a nutrient, 0 when the item does not list it.
    pub fn nutrient(&self, nutrient: &str) -> f64 {
        self.nutritional_informations
            .get(nutrient)
            .copied()
            .unwrap_or(0.0)
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    pub fn is_liked_by(&self, user_id: Uuid) -> bool {
        self.likes.iter().any(|l| l.user_id == user_id)
    }

    /// Appends a like unless this user already liked the item.
    /// Returns true when the like was stored.
    pub fn add_like(&mut self, interaction: UserInteraction) -> bool {
        if self.is_liked_by(interaction.user_id) {
            return false;
        }
        self.likes.push(interaction);
        true
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cafe {
    pub slug: String,
    pub name: String,
    #[serde(default)]
    pub health_score: Option<f64>,
}

/// A cafe together with its menu, in menu order.
#[derive(Debug, Clone, PartialEq)]
pub struct CafeCatalog {
    pub cafe: Cafe,
    pub items: Vec<MenuItem>,
}

/// Partial update of a cafe document; `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CafeFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_score: Option<f64>,
}

/// Partial update of a menu item.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ItemFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_score: Option<f64>,
}
