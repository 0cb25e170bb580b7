use anyhow::Context;
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::services::AuthUser,
    error::{ApiError, ApiResult},
    state::AppState,
};

/// How many weigh-ins `GET /weight` returns.
pub const HISTORY_LEN: i64 = 30;

pub fn router() -> Router<AppState> {
    Router::new().route("/weight", post(log_weight).get(get_weight_logs))
}

#[derive(Debug, Deserialize)]
pub struct WeightLogCreate {
    pub date: Date,
    pub weight_kg: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct WeightLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: Date,
    pub weight_kg: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// One weigh-in per user and day; a second entry for the same day replaces it.
pub async fn upsert(db: &PgPool, user_id: Uuid, log: &WeightLogCreate) -> anyhow::Result<WeightLog> {
    let row = sqlx::query_as::<_, WeightLog>(
        r#"
        INSERT INTO weight_logs (user_id, date, weight_kg)
        VALUES ($1, $2, $3)
        ON CONFLICT (user_id, date) DO UPDATE SET weight_kg = EXCLUDED.weight_kg
        RETURNING id, user_id, date, weight_kg, created_at
        "#,
    )
    .bind(user_id)
    .bind(log.date)
    .bind(log.weight_kg)
    .fetch_one(db)
    .await
    .context("upsert weight log")?;
    Ok(row)
}

/// Newest first.
pub async fn latest(
    db: &PgPool,
    user_id: Uuid,
    since: Option<Date>,
    limit: i64,
) -> anyhow::Result<Vec<WeightLog>> {
    let rows = sqlx::query_as::<_, WeightLog>(
        r#"
        SELECT id, user_id, date, weight_kg, created_at
        FROM weight_logs
        WHERE user_id = $1 AND ($2::date IS NULL OR date >= $2)
        ORDER BY date DESC
        LIMIT $3
        "#,
    )
    .bind(user_id)
    .bind(since)
    .bind(limit)
    .fetch_all(db)
    .await
    .context("select weight logs")?;
    Ok(rows)
}

#[instrument(skip(state, body))]
pub async fn log_weight(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<WeightLogCreate>,
) -> ApiResult<Json<WeightLog>> {
    if !(body.weight_kg.is_finite() && body.weight_kg > 0.0) {
        return Err(ApiError::bad_request("weight_kg must be positive"));
    }
    let log = upsert(&state.db, user_id, &body).await?;
    info!(%user_id, date = %log.date, "weight logged");
    Ok(Json(log))
}

#[instrument(skip(state))]
pub async fn get_weight_logs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<WeightLog>>> {
    Ok(Json(latest(&state.db, user_id, None, HISTORY_LEN).await?))
}
