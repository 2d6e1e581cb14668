pub mod engines;
mod handlers;
pub mod model;
mod repo;
mod services;

pub use engines::{GlobalEngine, LikeCount};
pub use handlers::router;
pub use repo::{PgRecommendations, RecommendationStore};
pub use services::RecommendationRefresh;
