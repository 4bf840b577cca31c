//! Read-only HTTP API over the ledger.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use referral_ledger::{
    Error as LedgerError, Leaderboard, Ledger, LedgerStats, ReferralLinks, UserId,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Largest leaderboard page the API serves.
pub const MAX_PAGE: usize = 500;

/// What the handlers need.
pub struct ApiState {
    pub ledger: Arc<Ledger>,
    pub links: ReferralLinks,
}

type AppState = Arc<ApiState>;

/// Build the API router.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        .route("/api/v1/leaderboard", get(leaderboard))
        .route("/api/v1/stats", get(stats))
        .route("/api/v1/users/:id", get(get_user))
        .route("/api/v1/users/:id/link", get(get_link))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "OK"
}

fn status_for(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::InvalidUserId(_) => StatusCode::BAD_REQUEST,
        e => {
            tracing::error!(error = %e, "API request failed");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}

#[derive(Debug, Deserialize)]
struct PageParams {
    limit: Option<usize>,
}

async fn leaderboard(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Leaderboard>, StatusCode> {
    let limit = params.limit.unwrap_or(MAX_PAGE).min(MAX_PAGE);
    let board = state.ledger.leaderboard().await.map_err(|e| status_for(&e))?;
    Ok(Json(board.truncated(limit)))
}

async fn stats(State(state): State<AppState>) -> Result<Json<LedgerStats>, StatusCode> {
    state.ledger.stats().await.map(Json).map_err(|e| status_for(&e))
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct UserView {
    user_id: UserId,
    display_name: String,
    username: Option<String>,
    referral_count: u64,
    rank: usize,
}

async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<UserView>, StatusCode> {
    let id = UserId::new(id);
    let board = state.ledger.leaderboard().await.map_err(|e| status_for(&e))?;
    let entry = board
        .iter()
        .find(|e| e.user_id == id)
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(UserView {
        user_id: entry.user_id.clone(),
        display_name: entry.display_name.clone(),
        username: entry.username.clone(),
        referral_count: entry.referral_count,
        rank: entry.rank,
    }))
}

#[derive(Debug, Serialize)]
struct LinkView {
    user_id: UserId,
    link: String,
}

async fn get_link(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<LinkView>, StatusCode> {
    let user_id = UserId::new(id);
    let link = state.links.derive(&user_id).map_err(|e| status_for(&e))?;
    Ok(Json(LinkView { user_id, link }))
}
