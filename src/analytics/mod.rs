pub mod summary;

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::{
    auth::services::AuthUser,
    error::ApiResult,
    food::{self, dto::DateQuery},
    profile, water, weight,
    state::AppState,
};
use summary::{DailyReport, WeeklyReport};

const MAX_DAYS: u16 = 90;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/analytics/daily", get(daily))
        .route("/analytics/weekly", get(weekly))
}

#[derive(Debug, Deserialize)]
pub struct WeeklyQuery {
    #[serde(default = "default_days")]
    pub days: u16,
}

fn default_days() -> u16 {
    7
}

#[instrument(skip(state))]
pub async fn daily(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DateQuery>,
) -> ApiResult<Json<DailyReport>> {
    let food = food::repo::logs_for_date(&state.db, user_id, q.date).await?;
    let water = water::between(&state.db, user_id, q.date, q.date).await?;
    let targets = profile::repo::targets_or_default(&state.db, user_id).await?;
    Ok(Json(summary::daily(&food, &water, targets)))
}

#[instrument(skip(state))]
pub async fn weekly(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<WeeklyQuery>,
) -> ApiResult<Json<WeeklyReport>> {
    let days = q.days.clamp(1, MAX_DAYS);
    let today = OffsetDateTime::now_utc().date();
    let (start, end) = summary::window(today, days);

    let food = food::repo::logs_between(&state.db, user_id, start, end).await?;
    let water = water::between(&state.db, user_id, start, end).await?;
    let targets = profile::repo::targets_or_default(&state.db, user_id).await?;
    let logged = food::repo::logged_days(&state.db, user_id).await?;
    let weights = weight::latest(
        &state.db,
        user_id,
        Some(summary::weight_since(start)),
        summary::WEIGHT_TREND_POINTS,
    )
    .await?;

    let streak = summary::streak(&logged, today);
    debug!(%start, %end, entries = food.len(), "weekly summary");
    Ok(Json(summary::weekly(
        start, days, &food, &water, targets, streak, weights,
    )))
}
