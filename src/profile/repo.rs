use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::nutrition::{
    ActivityLevel, GoalType, TargetRecord, TargetUpdate, UserProfile, DEFAULT_TARGETS,
};

pub const DEFAULT_NAME: &str = "User";

/// One row of `profiles`; `id` is the owning user's id.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Profile {
    pub id: Uuid,
    pub name: String,
    pub age: Option<i32>,
    pub height_cm: Option<i32>,
    pub weight_kg: Option<f64>,
    pub activity_level: String,
    pub goal_type: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, FromRow)]
pub struct TargetsRow {
    pub calories_target: i32,
    pub protein_target_g: i32,
    pub carbs_target_g: i32,
    pub fats_target_g: i32,
    pub water_target_ml: i32,
}

impl From<TargetsRow> for TargetRecord {
    fn from(r: TargetsRow) -> Self {
        TargetRecord {
            calories_target: r.calories_target,
            protein_target_g: r.protein_target_g,
            carbs_target_g: r.carbs_target_g,
            fats_target_g: r.fats_target_g,
            water_target_ml: r.water_target_ml,
        }
    }
}

const PROFILE_COLUMNS: &str =
    "id, name, age, height_cm, weight_kg, activity_level, goal_type, created_at, updated_at";

pub async fn find_profile(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Profile>> {
    let sql = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");
    let row = sqlx::query_as::<_, Profile>(&sql)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .context("select profile")?;
    Ok(row)
}

/// Row values for a profile created from `update`.
#[derive(Debug, PartialEq)]
struct ProfileSeed<'a> {
    name: &'a str,
    activity_level: &'static str,
    goal_type: &'static str,
}

impl<'a> From<&'a UserProfile> for ProfileSeed<'a> {
    fn from(update: &'a UserProfile) -> Self {
        ProfileSeed {
            name: update.name.as_deref().unwrap_or(DEFAULT_NAME),
            activity_level: update.activity_level.unwrap_or(ActivityLevel::Medium).as_str(),
            goal_type: update.goal_type.unwrap_or(GoalType::Maintain).as_str(),
        }
    }
}

/// Applies `update` to the user's profile. A missing profile is created with
/// default name, activity and goal, together with a default targets row.
///
/// Insert and update are one statement, so concurrent first saves for the
/// same user both land on the same row.
pub async fn upsert_profile(
    db: &PgPool,
    user_id: Uuid,
    update: &UserProfile,
) -> anyhow::Result<Profile> {
    let seed = ProfileSeed::from(update);
    let mut tx = db.begin().await?;

    let sql = format!(
        r#"
        INSERT INTO profiles (id, name, age, height_cm, weight_kg, activity_level, goal_type)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (id) DO UPDATE SET
            name = COALESCE($8, profiles.name),
            age = COALESCE($3, profiles.age),
            height_cm = COALESCE($4, profiles.height_cm),
            weight_kg = COALESCE($5, profiles.weight_kg),
            activity_level = COALESCE($9, profiles.activity_level),
            goal_type = COALESCE($10, profiles.goal_type),
            updated_at = now()
        RETURNING {PROFILE_COLUMNS}
        "#
    );
    let profile = sqlx::query_as::<_, Profile>(&sql)
        .bind(user_id)
        .bind(seed.name)
        .bind(update.age)
        .bind(update.height_cm)
        .bind(update.weight_kg)
        .bind(seed.activity_level)
        .bind(seed.goal_type)
        .bind(update.name.as_deref())
        .bind(update.activity_level.map(ActivityLevel::as_str))
        .bind(update.goal_type.map(GoalType::as_str))
        .fetch_one(&mut *tx)
        .await
        .context("upsert profile")?;

    sqlx::query(
        r#"
        INSERT INTO daily_targets
            (user_id, calories_target, protein_target_g, carbs_target_g, fats_target_g, water_target_ml)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(DEFAULT_TARGETS.calories_target)
    .bind(DEFAULT_TARGETS.protein_target_g)
    .bind(DEFAULT_TARGETS.carbs_target_g)
    .bind(DEFAULT_TARGETS.fats_target_g)
    .bind(DEFAULT_TARGETS.water_target_ml)
    .execute(&mut *tx)
    .await
    .context("insert default targets")?;

    tx.commit().await?;
    Ok(profile)
}

pub async fn find_targets(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<TargetRecord>> {
    let row = sqlx::query_as::<_, TargetsRow>(
        r#"
        SELECT calories_target, protein_target_g, carbs_target_g, fats_target_g, water_target_ml
        FROM daily_targets
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_optional(db)
    .await
    .context("select targets")?;
    Ok(row.map(TargetRecord::from))
}

/// Stored targets, or the defaults for users without a row.
pub async fn targets_or_default(db: &PgPool, user_id: Uuid) -> anyhow::Result<TargetRecord> {
    Ok(find_targets(db, user_id).await?.unwrap_or_default())
}

/// Writes the fields present in `update`; a new row starts from the defaults.
pub async fn upsert_targets(
    db: &PgPool,
    user_id: Uuid,
    update: &TargetUpdate,
) -> anyhow::Result<TargetRecord> {
    let seed = DEFAULT_TARGETS.apply(update);
    let row = sqlx::query_as::<_, TargetsRow>(
        r#"
        INSERT INTO daily_targets
            (user_id, calories_target, protein_target_g, carbs_target_g, fats_target_g, water_target_ml)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (user_id) DO UPDATE SET
            calories_target = COALESCE($7, daily_targets.calories_target),
            protein_target_g = COALESCE($8, daily_targets.protein_target_g),
            carbs_target_g = COALESCE($9, daily_targets.carbs_target_g),
            fats_target_g = COALESCE($10, daily_targets.fats_target_g),
            water_target_ml = COALESCE($11, daily_targets.water_target_ml),
            updated_at = now()
        RETURNING calories_target, protein_target_g, carbs_target_g, fats_target_g, water_target_ml
        "#,
    )
    .bind(user_id)
    .bind(seed.calories_target)
    .bind(seed.protein_target_g)
    .bind(seed.carbs_target_g)
    .bind(seed.fats_target_g)
    .bind(seed.water_target_ml)
    .bind(update.calories_target)
    .bind(update.protein_target_g)
    .bind(update.carbs_target_g)
    .bind(update.fats_target_g)
    .bind(update.water_target_ml)
    .fetch_one(db)
    .await
    .context("upsert targets")?;
    Ok(row.into())
}
