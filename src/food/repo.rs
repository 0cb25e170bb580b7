use std::collections::HashSet;

use anyhow::Context;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::dto::{FoodCreate, FoodLogCreate};

/// Food from either `foods_master` or `foods_custom`; both share this shape.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Food {
    pub id: Uuid,
    pub name: String,
    pub unit_type: String,
    pub base_qty: f64,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
}

#[derive(Debug, Serialize)]
pub struct SearchResults {
    pub master: Vec<Food>,
    pub custom: Vec<Food>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FoodLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: Date,
    pub meal_type: String,
    pub food_source: String,
    pub food_master_id: Option<Uuid>,
    pub food_custom_id: Option<Uuid>,
    pub food_name: String,
    pub qty: f64,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Favorite {
    pub id: Uuid,
    pub user_id: Uuid,
    pub food_master_id: Option<Uuid>,
    pub food_custom_id: Option<Uuid>,
}

/// A favorited food, flattened with its favorite id.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct FavoriteFood {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub food: Food,
    pub favorite_id: Uuid,
    pub is_custom: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecentFood {
    #[serde(flatten)]
    pub food: Food,
    pub is_custom: bool,
}

/// Food reference carried by a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FoodRef {
    Master(Uuid),
    Custom(Uuid),
}

#[derive(Debug, FromRow)]
struct LogRef {
    food_master_id: Option<Uuid>,
    food_custom_id: Option<Uuid>,
}

const FOOD_COLUMNS: &str = "id, name, unit_type, base_qty, calories, protein_g, carbs_g, fats_g";
const LOG_COLUMNS: &str = "id, user_id, date, meal_type, food_source, food_master_id, \
    food_custom_id, food_name, qty, calories, protein_g, carbs_g, fats_g, created_at";

pub const SEARCH_LIMIT: i64 = 20;

pub async fn search(db: &PgPool, user_id: Uuid, q: &str) -> anyhow::Result<SearchResults> {
    let pattern = format!("%{}%", escape_like(q.trim()));

    let master = sqlx::query_as::<_, Food>(&format!(
        "SELECT {FOOD_COLUMNS} FROM foods_master WHERE name ILIKE $1 ORDER BY name LIMIT $2"
    ))
    .bind(&pattern)
    .bind(SEARCH_LIMIT)
    .fetch_all(db)
    .await
    .context("search master foods")?;

    let custom = sqlx::query_as::<_, Food>(&format!(
        "SELECT {FOOD_COLUMNS} FROM foods_custom \
         WHERE user_id = $1 AND name ILIKE $2 ORDER BY name LIMIT $3"
    ))
    .bind(user_id)
    .bind(&pattern)
    .bind(SEARCH_LIMIT)
    .fetch_all(db)
    .await
    .context("search custom foods")?;

    Ok(SearchResults { master, custom })
}

/// Escapes LIKE wildcards so user input matches literally.
pub(crate) fn escape_like(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

pub async fn create_custom(db: &PgPool, user_id: Uuid, food: &FoodCreate) -> anyhow::Result<Food> {
    let row = sqlx::query_as::<_, Food>(&format!(
        r#"
        INSERT INTO foods_custom (user_id, name, unit_type, base_qty, calories, protein_g, carbs_g, fats_g)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {FOOD_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(food.name.trim())
    .bind(food.unit_type.as_str())
    .bind(food.base_qty)
    .bind(food.calories)
    .bind(food.protein_g)
    .bind(food.carbs_g)
    .bind(food.fats_g)
    .fetch_one(db)
    .await
    .context("insert custom food")?;
    Ok(row)
}

pub async fn insert_log(db: &PgPool, user_id: Uuid, log: &FoodLogCreate) -> anyhow::Result<FoodLog> {
    let row = sqlx::query_as::<_, FoodLog>(&format!(
        r#"
        INSERT INTO food_logs
            (user_id, date, meal_type, food_source, food_master_id, food_custom_id,
             food_name, qty, calories, protein_g, carbs_g, fats_g)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {LOG_COLUMNS}
        "#
    ))
    .bind(user_id)
    .bind(log.date)
    .bind(log.meal_type.as_str())
    .bind(log.source().as_str())
    .bind(log.food_master_id)
    .bind(log.food_custom_id)
    .bind(log.food_name.trim())
    .bind(log.qty)
    .bind(log.calories)
    .bind(log.protein_g)
    .bind(log.carbs_g)
    .bind(log.fats_g)
    .fetch_one(db)
    .await
    .context("insert food log")?;
    Ok(row)
}

pub async fn logs_for_date(db: &PgPool, user_id: Uuid, date: Date) -> anyhow::Result<Vec<FoodLog>> {
    let rows = sqlx::query_as::<_, FoodLog>(&format!(
        "SELECT {LOG_COLUMNS} FROM food_logs WHERE user_id = $1 AND date = $2 ORDER BY created_at"
    ))
    .bind(user_id)
    .bind(date)
    .fetch_all(db)
    .await
    .context("select food logs")?;
    Ok(rows)
}

pub async fn logs_between(
    db: &PgPool,
    user_id: Uuid,
    from: Date,
    to: Date,
) -> anyhow::Result<Vec<FoodLog>> {
    let rows = sqlx::query_as::<_, FoodLog>(&format!(
        "SELECT {LOG_COLUMNS} FROM food_logs \
         WHERE user_id = $1 AND date BETWEEN $2 AND $3 ORDER BY date, created_at"
    ))
    .bind(user_id)
    .bind(from)
    .bind(to)
    .fetch_all(db)
    .await
    .context("select food logs in range")?;
    Ok(rows)
}

/// Distinct days with at least one food entry, oldest first.
pub async fn logged_days(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<Date>> {
    let rows: Vec<(Date,)> =
        sqlx::query_as("SELECT DISTINCT date FROM food_logs WHERE user_id = $1 ORDER BY date")
            .bind(user_id)
            .fetch_all(db)
            .await
            .context("select logged days")?;
    Ok(rows.into_iter().map(|(d,)| d).collect())
}

/// Replaces an entry owned by `user_id`; `None` when there is no such entry.
pub async fn update_log(
    db: &PgPool,
    user_id: Uuid,
    id: Uuid,
    log: &FoodLogCreate,
) -> anyhow::Result<Option<FoodLog>> {
    let row = sqlx::query_as::<_, FoodLog>(&format!(
        r#"
        UPDATE food_logs SET
            date = $3, meal_type = $4, food_source = $5, food_master_id = $6,
            food_custom_id = $7, food_name = $8, qty = $9, calories = $10,
            protein_g = $11, carbs_g = $12, fats_g = $13
        WHERE id = $1 AND user_id = $2
        RETURNING {LOG_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(user_id)
    .bind(log.date)
    .bind(log.meal_type.as_str())
    .bind(log.source().as_str())
    .bind(log.food_master_id)
    .bind(log.food_custom_id)
    .bind(log.food_name.trim())
    .bind(log.qty)
    .bind(log.calories)
    .bind(log.protein_g)
    .bind(log.carbs_g)
    .bind(log.fats_g)
    .fetch_optional(db)
    .await
    .context("update food log")?;
    Ok(row)
}

pub async fn delete_log(db: &PgPool, user_id: Uuid, id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query("DELETE FROM food_logs WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(db)
        .await
        .context("delete food log")?;
    Ok(res.rows_affected() > 0)
}

/// `None` when the food is already a favorite.
pub async fn add_favorite(
    db: &PgPool,
    user_id: Uuid,
    food: FoodRef,
) -> anyhow::Result<Option<Favorite>> {
    let (master, custom) = match food {
        FoodRef::Master(id) => (Some(id), None),
        FoodRef::Custom(id) => (None, Some(id)),
    };
    let row = sqlx::query_as::<_, Favorite>(
        r#"
        INSERT INTO favorites (user_id, food_master_id, food_custom_id)
        VALUES ($1, $2, $3)
        ON CONFLICT DO NOTHING
        RETURNING id, user_id, food_master_id, food_custom_id
        "#,
    )
    .bind(user_id)
    .bind(master)
    .bind(custom)
    .fetch_optional(db)
    .await
    .context("insert favorite")?;
    Ok(row)
}

pub async fn remove_favorite(db: &PgPool, user_id: Uuid, food_id: Uuid) -> anyhow::Result<bool> {
    let res = sqlx::query(
        "DELETE FROM favorites WHERE user_id = $1 AND (food_master_id = $2 OR food_custom_id = $2)",
    )
    .bind(user_id)
    .bind(food_id)
    .execute(db)
    .await
    .context("delete favorite")?;
    Ok(res.rows_affected() > 0)
}

pub async fn favorites(db: &PgPool, user_id: Uuid) -> anyhow::Result<Vec<FavoriteFood>> {
    let rows = sqlx::query_as::<_, FavoriteFood>(
        r#"
        SELECT m.id, m.name, m.unit_type, m.base_qty, m.calories, m.protein_g, m.carbs_g, m.fats_g,
               f.id AS favorite_id, FALSE AS is_custom
        FROM favorites f
        JOIN foods_master m ON m.id = f.food_master_id
        WHERE f.user_id = $1
        UNION ALL
        SELECT c.id, c.name, c.unit_type, c.base_qty, c.calories, c.protein_g, c.carbs_g, c.fats_g,
               f.id AS favorite_id, TRUE AS is_custom
        FROM favorites f
        JOIN foods_custom c ON c.id = f.food_custom_id AND c.user_id = f.user_id
        WHERE f.user_id = $1
        ORDER BY name
        "#,
    )
    .bind(user_id)
    .fetch_all(db)
    .await
    .context("select favorites")?;
    Ok(rows)
}

/// Unique foods from newest entries first, at most `limit`.
pub(crate) fn pick_recent(refs: impl IntoIterator<Item = FoodRef>, limit: usize) -> Vec<FoodRef> {
    let mut seen = HashSet::new();
    refs.into_iter()
        .filter(|r| seen.insert(*r))
        .take(limit)
        .collect()
}

pub async fn recent(db: &PgPool, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<RecentFood>> {
    let logs = sqlx::query_as::<_, LogRef>(
        r#"
        SELECT food_master_id, food_custom_id
        FROM food_logs
        WHERE user_id = $1 AND (food_master_id IS NOT NULL OR food_custom_id IS NOT NULL)
        ORDER BY created_at DESC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit * 2)
    .fetch_all(db)
    .await
    .context("select recent log refs")?;

    let refs = logs.into_iter().filter_map(|l| match (l.food_master_id, l.food_custom_id) {
        (Some(id), _) => Some(FoodRef::Master(id)),
        (None, Some(id)) => Some(FoodRef::Custom(id)),
        (None, None) => None,
    });
    let picked = pick_recent(refs, limit.max(0) as usize);

    let master_ids: Vec<Uuid> = picked
        .iter()
        .filter_map(|r| match r {
            FoodRef::Master(id) => Some(*id),
            FoodRef::Custom(_) => None,
        })
        .collect();
    let custom_ids: Vec<Uuid> = picked
        .iter()
        .filter_map(|r| match r {
            FoodRef::Custom(id) => Some(*id),
            FoodRef::Master(_) => None,
        })
        .collect();

    let mut master = sqlx::query_as::<_, Food>(&format!(
        "SELECT {FOOD_COLUMNS} FROM foods_master WHERE id = ANY($1)"
    ))
    .bind(&master_ids)
    .fetch_all(db)
    .await
    .context("select recent master foods")?;
    let mut custom = sqlx::query_as::<_, Food>(&format!(
        "SELECT {FOOD_COLUMNS} FROM foods_custom WHERE user_id = $1 AND id = ANY($2)"
    ))
    .bind(user_id)
    .bind(&custom_ids)
    .fetch_all(db)
    .await
    .context("select recent custom foods")?;

    let mut out = Vec::with_capacity(picked.len());
    for r in picked {
        let found = match r {
            FoodRef::Master(id) => take_food(&mut master, id).map(|food| RecentFood {
                food,
                is_custom: false,
            }),
            FoodRef::Custom(id) => take_food(&mut custom, id).map(|food| RecentFood {
                food,
                is_custom: true,
            }),
        };
        out.extend(found);
    }
    Ok(out)
}

fn take_food(foods: &mut Vec<Food>, id: Uuid) -> Option<Food> {
    let idx = foods.iter().position(|f| f.id == id)?;
    Some(foods.swap_remove(idx))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("apple"), "apple");
    }

    #[test]
    fn recent_keeps_first_occurrence_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        let picked = pick_recent(
            [
                FoodRef::Master(a),
                FoodRef::Custom(b),
                FoodRef::Master(a),
                FoodRef::Master(c),
                FoodRef::Custom(b),
            ],
            10,
        );
        assert_eq!(
            picked,
            vec![FoodRef::Master(a), FoodRef::Custom(b), FoodRef::Master(c)]
        );
    }

    #[test]
    fn recent_respects_limit() {
        let refs: Vec<FoodRef> = (0..5).map(|_| FoodRef::Master(Uuid::new_v4())).collect();
        assert_eq!(pick_recent(refs.clone(), 2), refs[..2].to_vec());
        assert!(pick_recent(refs, 0).is_empty());
    }
}
