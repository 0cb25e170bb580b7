use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use tracing::{info, instrument};
use uuid::Uuid;

use crate::{
    auth::services::AuthUser,
    error::{ApiError, ApiResult},
    food::dto::DateQuery,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/water", post(log_water).get(get_water_logs))
}

#[derive(Debug, Deserialize)]
pub struct WaterLogCreate {
    pub date: Date,
    pub amount_ml: i32,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct WaterLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: Date,
    pub amount_ml: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

pub async fn insert(db: &PgPool, user_id: Uuid, log: &WaterLogCreate) -> anyhow::Result<WaterLog> {
    let row = sqlx::query_as::<_, WaterLog>(
        r#"
        INSERT INTO water_logs (user_id, date, amount_ml)
        VALUES ($1, $2, $3)
        RETURNING id, user_id, date, amount_ml, created_at
        "#,
    )
    .bind(user_id)
    .bind(log.date)
    .bind(log.amount_ml)
    .fetch_one(db)
    .await
    .context("insert water log")?;
    Ok(row)
}

pub async fn between(db: &PgPool, user_id: Uuid, from: Date, to: Date) -> anyhow::Result<Vec<WaterLog>> {
    let rows = sqlx::query_as::<_, WaterLog>(
        r#"
        SELECT id, user_id, date, amount_ml, created_at
        FROM water_logs
        WHERE user_id = $1 AND date BETWEEN $2 AND $3
        ORDER BY date, created_at
        "#,
    )
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(db)
    .await
    .context("select water logs")?;
    Ok(rows)
}

#[instrument(skip(state, body))]
pub async fn log_water(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<WaterLogCreate>,
) -> ApiResult<(StatusCode, Json<WaterLog>)> {
    if body.amount_ml <= 0 {
        return Err(ApiError::bad_request("amount_ml must be positive"));
    }
    let log = insert(&state.db, user_id, &body).await?;
    info!(%user_id, amount_ml = log.amount_ml, date = %log.date, "water logged");
    Ok((StatusCode::CREATED, Json(log)))
}

#[instrument(skip(state))]
pub async fn get_water_logs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DateQuery>,
) -> ApiResult<Json<Vec<WaterLog>>> {
    Ok(Json(between(&state.db, user_id, q.date, q.date).await?))
}
