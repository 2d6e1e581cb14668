use std::sync::Arc;

use tracing::{error, info};

mod app;
mod auth;
mod catalog;
mod config;
mod db;
mod error;
mod health;
mod orders;
mod recommend;
mod scheduler;
mod similarity;
mod state;
#[cfg(test)]
mod testing;

use crate::catalog::PgCatalog;
use crate::config::AppConfig;
use crate::health::{HealthRefresh, HealthRules, HealthScorer};
use crate::orders::{OrderSweeper, PgOrders};
use crate::recommend::{GlobalEngine, LikeCount, PgRecommendations, RecommendationRefresh};
use crate::scheduler::{JobRunner, Scheduler};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "cafebot=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = Arc::new(AppConfig::from_env()?);

    // Bad rules are fatal: every score would be wrong.
    let rules = HealthRules::load(config.health_rules_path.as_deref())?;
    let scorer = Arc::new(HealthScorer::new(rules)?);

    let db = db::connect(&config.database_url).await?;
    if let Err(e) = db::migrate(&db).await {
        error!(error = %e, "migration failed");
        return Err(e);
    }

    let catalog = Arc::new(PgCatalog::new(db.clone()));
    let orders = Arc::new(PgOrders::new(db.clone()));
    let recommendations = Arc::new(PgRecommendations::new(db));

    let sched = &config.scheduler;
    let mut scheduler = Scheduler::new();
    scheduler.start(
        JobRunner::new(Arc::new(OrderSweeper::new(
            orders.clone(),
            sched.order_staleness(),
            sched.call_timeout(),
        ))),
        sched.order_sweep_interval(),
    );
    scheduler.start(
        JobRunner::new(Arc::new(HealthRefresh::new(
            catalog.clone(),
            catalog.clone(),
            scorer.clone(),
            sched.call_timeout(),
        ))),
        sched.health_refresh_interval(),
    );
    scheduler.start(
        JobRunner::new(Arc::new(
            RecommendationRefresh::new(
                catalog.clone(),
                orders,
                recommendations.clone(),
                scorer,
                sched.call_timeout(),
            )
            .with_global_engine(GlobalEngine::new(Arc::new(LikeCount))),
        )),
        sched.recommendation_refresh_interval(),
    );

    let state = AppState::from_parts(config.clone(), catalog, recommendations);
    let shutdown = scheduler.token();
    tokio::spawn(app::shutdown_signal(shutdown.clone()));

    let served = app::serve(app::build_app(state), shutdown).await;
    scheduler.stop().await;
    info!("stopped");
    served
}
