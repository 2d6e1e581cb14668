use std::time::Duration;

use tracing::warn;

use super::models::CafeCatalog;
use super::repo::CatalogSource;
use crate::error::Result;
use crate::scheduler::call_with_timeout;

/// Every cafe with its menu, read once per job run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CatalogSnapshot {
    pub cafes: Vec<CafeCatalog>,
    /// Cafes whose menu could not be fetched.
    pub unavailable: Vec<String>,
}

impl CatalogSnapshot {
    pub fn is_complete(&self) -> bool {
        self.unavailable.is_empty()
    }
}

/// Fails only when the cafe list itself cannot be read. A cafe whose menu
/// fetch fails is recorded in `unavailable` and left out of `cafes`.
pub async fn load_snapshot(
    source: &dyn CatalogSource,
    call_timeout: Duration,
) -> Result<CatalogSnapshot> {
    let cafes = call_with_timeout("get_all_cafes", call_timeout, source.get_all_cafes()).await?;

    let mut snapshot = CatalogSnapshot::default();
    for cafe in cafes {
        match call_with_timeout(
            "get_cafe_items",
            call_timeout,
            source.get_cafe_items(&cafe.slug),
        )
        .await
        {
            Ok(items) => snapshot.cafes.push(CafeCatalog { cafe, items }),
            Err(e) => {
                warn!(cafe = %cafe.slug, error = %e, "skipping cafe");
                snapshot.unavailable.push(cafe.slug);
            }
        }
    }
    Ok(snapshot)
}
