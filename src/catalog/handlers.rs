use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::Serialize;
use tracing::{info, instrument};

use super::models::{is_valid_slug, UserInteraction};
use super::repo::LikeOutcome;
use crate::{
    auth::AuthUser,
    error::{CafeError, Result},
    scheduler::call_with_timeout,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/cafes/:cafe/items/:item/like", post(like_item))
}

#[derive(Debug, Serialize)]
pub struct LikeResponse {
    pub cafe: String,
    pub item: String,
    /// False when the caller had already liked the item.
    pub recorded: bool,
}

pub(crate) fn ensure_slug(kind: &str, slug: &str) -> Result<()> {
    if !is_valid_slug(slug) {
        return Err(CafeError::invalid_input(format!("malformed {kind} slug {slug:?}")));
    }
    Ok(())
}

#[instrument(skip(state))]
pub async fn like_item(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path((cafe, item)): Path<(String, String)>,
) -> Result<(StatusCode, Json<LikeResponse>)> {
    ensure_slug("cafe", &cafe)?;
    ensure_slug("item", &item)?;

    let interaction = UserInteraction::now(user_id);
    let outcome = call_with_timeout(
        "record_like",
        state.config.scheduler.call_timeout(),
        state.catalog.record_like(&cafe, &item, &interaction),
    )
    .await?;

    let status = match outcome {
        LikeOutcome::Recorded => {
            info!(%user_id, %cafe, %item, "like recorded");
            StatusCode::CREATED
        }
        LikeOutcome::AlreadyLiked => StatusCode::OK,
        LikeOutcome::UnknownItem => {
            return Err(CafeError::NotFound(format!("item {cafe}/{item}")));
        }
    };

    Ok((
        status,
        Json(LikeResponse {
            cafe,
            item,
            recorded: outcome == LikeOutcome::Recorded,
        }),
    ))
}
