use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    auth::services::AuthUser,
    error::{ApiError, ApiResult},
    nutrition::{TargetRecord, TargetUpdate, UserProfile},
    profile::repo::{self, Profile},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/profile/targets", get(get_targets).put(update_targets))
}

/// Either the saved record, a bare `{}` or a `{"message": ..}` notice.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Reply<T> {
    Saved(T),
    Empty {},
    Notice { message: &'static str },
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Reply<Profile>>> {
    let reply = match repo::find_profile(&state.db, user_id).await? {
        Some(p) => Reply::Saved(p),
        None => Reply::Empty {},
    };
    Ok(Json(reply))
}

#[instrument(skip(state, update))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(update): Json<UserProfile>,
) -> ApiResult<Json<Reply<Profile>>> {
    if update.is_empty() {
        return Ok(Json(Reply::Notice {
            message: "No data to update",
        }));
    }
    validate_profile(&update)?;

    let profile = repo::upsert_profile(&state.db, user_id, &update).await?;
    info!(%user_id, "profile saved");
    Ok(Json(Reply::Saved(profile)))
}

#[instrument(skip(state))]
pub async fn get_targets(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<TargetRecord>> {
    Ok(Json(repo::targets_or_default(&state.db, user_id).await?))
}

#[instrument(skip(state, update))]
pub async fn update_targets(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(update): Json<TargetUpdate>,
) -> ApiResult<Json<Reply<TargetRecord>>> {
    if update.is_empty() {
        return Ok(Json(Reply::Notice { message: "No data" }));
    }
    validate_targets(&update)?;

    let targets = repo::upsert_targets(&state.db, user_id, &update).await?;
    info!(%user_id, calories = targets.calories_target, "targets saved");
    Ok(Json(Reply::Saved(targets)))
}

fn validate_profile(p: &UserProfile) -> Result<(), ApiError> {
    if p.age.is_some_and(|a| a <= 0) {
        return Err(ApiError::bad_request("age must be positive"));
    }
    if p.height_cm.is_some_and(|h| h <= 0) {
        return Err(ApiError::bad_request("height_cm must be positive"));
    }
    if p.weight_kg.is_some_and(|w| !(w.is_finite() && w > 0.0)) {
        return Err(ApiError::bad_request("weight_kg must be positive"));
    }
    if p.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
        return Err(ApiError::bad_request("name must not be blank"));
    }
    Ok(())
}

fn validate_targets(t: &TargetUpdate) -> Result<(), ApiError> {
    let fields = [
        t.calories_target,
        t.protein_target_g,
        t.carbs_target_g,
        t.fats_target_g,
        t.water_target_ml,
    ];
    if fields.iter().flatten().any(|v| *v < 0) {
        return Err(ApiError::bad_request("targets must not be negative"));
    }
    Ok(())
}
