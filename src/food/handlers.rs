use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use tracing::{debug, info, instrument};
use uuid::Uuid;

use crate::{
    auth::services::AuthUser,
    error::{ApiError, ApiResult},
    food::{
        dto::{DateQuery, Deleted, FavoriteRequest, FoodCreate, FoodLogCreate, RecentQuery, SearchQuery},
        repo::{self, FavoriteFood, Favorite, Food, FoodLog, FoodRef, RecentFood, SearchResults},
    },
    state::AppState,
};

const MAX_RECENT: i64 = 100;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/food/search", get(search_foods))
        .route("/food/custom", post(create_custom_food))
        .route("/food/log", post(log_food).get(get_food_logs))
        .route("/food/log/:id", put(update_food_log).delete(delete_food_log))
        .route("/food/favorites", get(get_favorites))
        .route(
            "/food/favorites/:food_id",
            post(add_favorite).delete(remove_favorite),
        )
        .route("/food/recent", get(get_recent_foods))
}

#[instrument(skip(state))]
pub async fn search_foods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(params): Query<SearchQuery>,
) -> ApiResult<Json<SearchResults>> {
    if params.q.trim().is_empty() {
        return Ok(Json(SearchResults {
            master: Vec::new(),
            custom: Vec::new(),
        }));
    }
    let results = repo::search(&state.db, user_id, &params.q).await?;
    debug!(
        master = results.master.len(),
        custom = results.custom.len(),
        "food search"
    );
    Ok(Json(results))
}

#[instrument(skip(state, body))]
pub async fn create_custom_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<FoodCreate>,
) -> ApiResult<(StatusCode, Json<Food>)> {
    body.validate()?;
    let food = repo::create_custom(&state.db, user_id, &body).await?;
    info!(%user_id, food_id = %food.id, "custom food created");
    Ok((StatusCode::CREATED, Json(food)))
}

#[instrument(skip(state, body))]
pub async fn log_food(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(body): Json<FoodLogCreate>,
) -> ApiResult<(StatusCode, Json<FoodLog>)> {
    body.validate()?;
    let log = repo::insert_log(&state.db, user_id, &body).await?;
    info!(%user_id, log_id = %log.id, date = %log.date, "food logged");
    Ok((StatusCode::CREATED, Json(log)))
}

#[instrument(skip(state))]
pub async fn get_food_logs(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<DateQuery>,
) -> ApiResult<Json<Vec<FoodLog>>> {
    Ok(Json(repo::logs_for_date(&state.db, user_id, q.date).await?))
}

#[instrument(skip(state, body))]
pub async fn update_food_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
    Json(body): Json<FoodLogCreate>,
) -> ApiResult<Json<FoodLog>> {
    body.validate()?;
    let log = repo::update_log(&state.db, user_id, id, &body)
        .await?
        .ok_or_else(|| ApiError::not_found("Food log not found"))?;
    Ok(Json(log))
}

#[instrument(skip(state))]
pub async fn delete_food_log(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<Deleted>> {
    let deleted = repo::delete_log(&state.db, user_id, id).await?;
    Ok(Json(Deleted { deleted }))
}

#[instrument(skip(state, body))]
pub async fn add_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(food_id): Path<Uuid>,
    body: Option<Json<FavoriteRequest>>,
) -> ApiResult<(StatusCode, Json<Favorite>)> {
    let Json(req) = body.unwrap_or_default();
    let food = if req.is_custom {
        FoodRef::Custom(food_id)
    } else {
        FoodRef::Master(food_id)
    };
    let fav = repo::add_favorite(&state.db, user_id, food)
        .await?
        .ok_or_else(|| ApiError::Conflict("Already a favorite".into()))?;
    Ok((StatusCode::CREATED, Json(fav)))
}

#[instrument(skip(state))]
pub async fn remove_favorite(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Path(food_id): Path<Uuid>,
) -> ApiResult<Json<Deleted>> {
    let deleted = repo::remove_favorite(&state.db, user_id, food_id).await?;
    Ok(Json(Deleted { deleted }))
}

#[instrument(skip(state))]
pub async fn get_favorites(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> ApiResult<Json<Vec<FavoriteFood>>> {
    Ok(Json(repo::favorites(&state.db, user_id).await?))
}

#[instrument(skip(state))]
pub async fn get_recent_foods(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Query(q): Query<RecentQuery>,
) -> ApiResult<Json<Vec<RecentFood>>> {
    let limit = q.limit.clamp(1, MAX_RECENT);
    Ok(Json(repo::recent(&state.db, user_id, limit).await?))
}
