mod handlers;
pub mod models;
pub mod repo;
pub mod services;

pub(crate) use handlers::ensure_slug;
pub use handlers::router;
pub use models::{CafeCatalog, CafeFields, ItemFields, MenuItem};
pub use repo::{CatalogSource, CatalogUpdater, PgCatalog};
