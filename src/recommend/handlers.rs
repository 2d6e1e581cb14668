use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use tracing::instrument;

use super::model::{Recommendation, Scope};
use crate::{
    auth::AuthUser,
    catalog::ensure_slug,
    error::{CafeError, Result},
    scheduler::call_with_timeout,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/cafes/:slug/recommendations/:scope", get(cafe_recommendations))
        .route("/me/recommendations", get(my_items))
        .route("/me/recommendations/cafes", get(my_cafes))
}

async fn load(state: &AppState, scope: Scope, subject: &str) -> Result<Recommendation> {
    call_with_timeout(
        "get_recommendation",
        state.config.scheduler.call_timeout(),
        state.recommendations.get(scope, subject),
    )
    .await?
    .ok_or_else(|| CafeError::NotFound(format!("{scope} recommendations for {subject}")))
}

/// GET /cafes/:slug/recommendations/:scope, scope is `bot` or `public`.
#[instrument(skip(state))]
pub async fn cafe_recommendations(
    State(state): State<AppState>,
    Path((slug, scope)): Path<(String, String)>,
) -> Result<Json<Recommendation>> {
    ensure_slug("cafe", &slug)?;
    let scope: Scope = scope.parse()?;
    if !scope.is_per_cafe() {
        return Err(CafeError::invalid_input(format!("{scope} is not a cafe scope")));
    }
    Ok(Json(load(&state, scope, &slug).await?))
}

#[instrument(skip(state))]
pub async fn my_items(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Recommendation>> {
    Ok(Json(load(&state, Scope::Personal, &user_id.to_string()).await?))
}

#[instrument(skip(state))]
pub async fn my_cafes(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Recommendation>> {
    Ok(Json(load(&state, Scope::Cafe, &user_id.to_string()).await?))
}
