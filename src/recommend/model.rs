use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::CafeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Per cafe: items ranked by health score.
    Bot,
    /// Per cafe: items ranked by popularity.
    Public,
    /// Per user: unconsumed items across the user's cafes.
    Personal,
    /// Per user: cafes.
    Cafe,
}

impl Scope {
    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Bot => "bot",
            Scope::Public => "public",
            Scope::Personal => "personal",
            Scope::Cafe => "cafe",
        }
    }

    pub fn is_per_cafe(self) -> bool {
        matches!(self, Scope::Bot | Scope::Public)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = CafeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bot" => Ok(Scope::Bot),
            "public" => Ok(Scope::Public),
            "personal" => Ok(Scope::Personal),
            "cafe" => Ok(Scope::Cafe),
            other => Err(CafeError::invalid_input(format!(
                "unknown recommendation scope {other}"
            ))),
        }
    }
}

/// A ranked list for one subject; `items[0]` is the top pick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub scope: Scope,
    /// Cafe slug for per-cafe scopes, user id otherwise.
    pub subject: String,
    pub items: Vec<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub generated_at: OffsetDateTime,
}

impl Recommendation {
    pub fn for_cafe(scope: Scope, cafe_slug: &str, items: Vec<String>) -> Self {
        debug_assert!(scope.is_per_cafe());
        Self {
            scope,
            subject: cafe_slug.to_string(),
            items,
            generated_at: OffsetDateTime::now_utc(),
        }
    }

    pub fn for_user(scope: Scope, user_id: Uuid, items: Vec<String>) -> Self {
        debug_assert!(!scope.is_per_cafe());
        Self {
            scope,
            subject: user_id.to_string(),
            items,
            generated_at: OffsetDateTime::now_utc(),
        }
    }
}

/// Reference to an item outside its cafe's own lists.
pub fn item_ref(cafe_slug: &str, item_slug: &str) -> String {
    format!("{cafe_slug}/{item_slug}")
}
