mod rules;
mod scorer;
mod services;

pub use rules::HealthRules;
pub use scorer::HealthScorer;
pub use services::HealthRefresh;
