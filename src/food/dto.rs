use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    G,
    Ml,
    Serving,
}

impl UnitType {
    pub fn as_str(self) -> &'static str {
        match self {
            UnitType::G => "g",
            UnitType::Ml => "ml",
            UnitType::Serving => "serving",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MealType {
    Breakfast,
    Lunch,
    Snacks,
    Dinner,
}

impl MealType {
    pub fn as_str(self) -> &'static str {
        match self {
            MealType::Breakfast => "breakfast",
            MealType::Lunch => "lunch",
            MealType::Snacks => "snacks",
            MealType::Dinner => "dinner",
        }
    }
}

/// Where a logged entry came from.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FoodSource {
    #[default]
    Master,
    Custom,
    Manual,
}

impl FoodSource {
    pub fn as_str(self) -> &'static str {
        match self {
            FoodSource::Master => "master",
            FoodSource::Custom => "custom",
            FoodSource::Manual => "manual",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct FoodCreate {
    pub name: String,
    pub unit_type: UnitType,
    pub base_qty: f64,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
}

impl FoodCreate {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.name.trim().is_empty() {
            return Err(ApiError::bad_request("name must not be blank"));
        }
        if !(self.base_qty > 0.0) {
            return Err(ApiError::bad_request("base_qty must be positive"));
        }
        check_macros(self.calories, self.protein_g, self.carbs_g, self.fats_g)
    }
}

#[derive(Debug, Deserialize)]
pub struct FoodLogCreate {
    pub date: Date,
    pub meal_type: MealType,
    #[serde(default)]
    pub food_source: Option<FoodSource>,
    #[serde(default)]
    pub food_master_id: Option<Uuid>,
    #[serde(default)]
    pub food_custom_id: Option<Uuid>,
    pub food_name: String,
    pub qty: f64,
    pub calories: f64,
    pub protein_g: f64,
    pub carbs_g: f64,
    pub fats_g: f64,
}

impl FoodLogCreate {
    pub fn source(&self) -> FoodSource {
        self.food_source.unwrap_or_default()
    }

    pub fn validate(&self) -> Result<(), ApiError> {
        if self.food_name.trim().is_empty() {
            return Err(ApiError::bad_request("food_name must not be blank"));
        }
        if !(self.qty > 0.0) {
            return Err(ApiError::bad_request("qty must be positive"));
        }
        check_macros(self.calories, self.protein_g, self.carbs_g, self.fats_g)
    }
}

fn check_macros(calories: f64, protein: f64, carbs: f64, fats: f64) -> Result<(), ApiError> {
    if [calories, protein, carbs, fats]
        .iter()
        .any(|v| !v.is_finite() || *v < 0.0)
    {
        return Err(ApiError::bad_request("nutrient values must not be negative"));
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct DateQuery {
    pub date: Date,
}

#[derive(Debug, Deserialize)]
pub struct RecentQuery {
    #[serde(default = "default_recent_limit")]
    pub limit: i64,
}

fn default_recent_limit() -> i64 {
    20
}

#[derive(Debug, Default, Deserialize)]
pub struct FavoriteRequest {
    #[serde(default)]
    pub is_custom: bool,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub deleted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn log_body() -> serde_json::Value {
        json!({
            "date": "2025-03-04",
            "meal_type": "lunch",
            "food_name": "Rice",
            "qty": 150.0,
            "calories": 195.0,
            "protein_g": 4.0,
            "carbs_g": 42.0,
            "fats_g": 0.5
        })
    }

    #[test]
    fn food_log_defaults_to_master_source() {
        let log: FoodLogCreate = serde_json::from_value(log_body()).unwrap();
        assert_eq!(log.source(), FoodSource::Master);
        assert_eq!(log.date.to_string(), "2025-03-04");
        assert_eq!(log.meal_type, MealType::Lunch);
        assert!(log.validate().is_ok());
    }

    #[test]
    fn food_log_rejects_zero_qty_and_negative_macros() {
        let mut body = log_body();
        body["qty"] = json!(0);
        let log: FoodLogCreate = serde_json::from_value(body).unwrap();
        assert!(log.validate().is_err());

        let mut body = log_body();
        body["fats_g"] = json!(-2.0);
        let log: FoodLogCreate = serde_json::from_value(body).unwrap();
        assert!(log.validate().is_err());
    }

    #[test]
    fn unknown_meal_type_fails_to_parse() {
        let mut body = log_body();
        body["meal_type"] = json!("brunch");
        assert!(serde_json::from_value::<FoodLogCreate>(body).is_err());
    }

    #[test]
    fn custom_food_validation() {
        let food: FoodCreate = serde_json::from_value(json!({
            "name": "Oat bar", "unit_type": "serving", "base_qty": 1.0,
            "calories": 210.0, "protein_g": 6.0, "carbs_g": 30.0, "fats_g": 7.0
        }))
        .unwrap();
        assert_eq!(food.unit_type.as_str(), "serving");
        assert!(food.validate().is_ok());

        let blank = FoodCreate {
            name: " ".into(),
            ..food
        };
        assert!(blank.validate().is_err());
    }
}
