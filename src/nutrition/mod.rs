pub mod targets;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

pub use targets::{calculate_targets, TargetInputs};

/// How often the user trains.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ActivityLevel {
    /// 1-2 days/week
    Low,
    /// 3-5 days/week
    #[default]
    Medium,
    /// 6-7 days/week
    High,
}

impl ActivityLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            ActivityLevel::Low => "low",
            ActivityLevel::Medium => "medium",
            ActivityLevel::High => "high",
        }
    }
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivityLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "low" => Ok(ActivityLevel::Low),
            "medium" => Ok(ActivityLevel::Medium),
            "high" => Ok(ActivityLevel::High),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum GoalType {
    FatLoss,
    #[default]
    Maintain,
    MuscleGain,
}

impl GoalType {
    pub fn as_str(self) -> &'static str {
        match self {
            GoalType::FatLoss => "fat_loss",
            GoalType::Maintain => "maintain",
            GoalType::MuscleGain => "muscle_gain",
        }
    }
}

impl fmt::Display for GoalType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GoalType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "fat_loss" => Ok(GoalType::FatLoss),
            "maintain" => Ok(GoalType::Maintain),
            "muscle_gain" => Ok(GoalType::MuscleGain),
            other => Err(UnknownVariant(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variant `{0}`")]
pub struct UnknownVariant(pub String);

/// Daily nutrition targets. All values are non-negative.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DailyTargets {
    pub calories: i32,
    pub protein_g: i32,
    pub carbs_g: i32,
    pub fats_g: i32,
    pub water_ml: i32,
}

impl DailyTargets {
    /// Energy implied by the macro split (4/4/9 kcal per gram).
    pub fn macro_calories(&self) -> i32 {
        self.protein_g * 4 + self.carbs_g * 4 + self.fats_g * 9
    }
}

/// Profile fields as sent to `PUT /api/profile`. Absent fields are left
/// untouched by the server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_cm: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight_kg: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_level: Option<ActivityLevel>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal_type: Option<GoalType>,
}

impl UserProfile {
    pub fn is_empty(&self) -> bool {
        *self == UserProfile::default()
    }
}

/// Target fields as sent to `PUT /api/profile/targets`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories_target: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protein_target_g: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub carbs_target_g: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fats_target_g: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub water_target_ml: Option<i32>,
}

impl TargetUpdate {
    pub fn is_empty(&self) -> bool {
        *self == TargetUpdate::default()
    }
}

impl From<DailyTargets> for TargetUpdate {
    fn from(t: DailyTargets) -> Self {
        Self {
            calories_target: Some(t.calories),
            protein_target_g: Some(t.protein_g),
            carbs_target_g: Some(t.carbs_g),
            fats_target_g: Some(t.fats_g),
            water_target_ml: Some(t.water_ml),
        }
    }
}

/// Targets as stored by the backend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TargetRecord {
    pub calories_target: i32,
    pub protein_target_g: i32,
    pub carbs_target_g: i32,
    pub fats_target_g: i32,
    pub water_target_ml: i32,
}

/// Used for users who never completed onboarding.
pub const DEFAULT_TARGETS: TargetRecord = TargetRecord {
    calories_target: 2000,
    protein_target_g: 120,
    carbs_target_g: 250,
    fats_target_g: 60,
    water_target_ml: 2500,
};

impl Default for TargetRecord {
    fn default() -> Self {
        DEFAULT_TARGETS
    }
}

impl TargetRecord {
    /// Overlays the fields present in `update`.
    pub fn apply(self, update: &TargetUpdate) -> Self {
        Self {
            calories_target: update.calories_target.unwrap_or(self.calories_target),
            protein_target_g: update.protein_target_g.unwrap_or(self.protein_target_g),
            carbs_target_g: update.carbs_target_g.unwrap_or(self.carbs_target_g),
            fats_target_g: update.fats_target_g.unwrap_or(self.fats_target_g),
            water_target_ml: update.water_target_ml.unwrap_or(self.water_target_ml),
        }
    }
}

impl From<TargetRecord> for DailyTargets {
    fn from(r: TargetRecord) -> Self {
        Self {
            calories: r.calories_target,
            protein_g: r.protein_target_g,
            carbs_g: r.carbs_target_g,
            fats_g: r.fats_target_g,
            water_ml: r.water_target_ml,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_update_overlays_defaults() {
        let update = TargetUpdate {
            calories_target: Some(1800),
            water_target_ml: Some(3000),
            ..Default::default()
        };
        let merged = DEFAULT_TARGETS.apply(&update);
        assert_eq!(merged.calories_target, 1800);
        assert_eq!(merged.protein_target_g, 120);
        assert_eq!(merged.water_target_ml, 3000);
        assert_eq!(DailyTargets::from(merged).calories, 1800);
    }

    #[test]
    fn enums_use_wire_names() {
        assert_eq!(serde_json::to_string(&GoalType::FatLoss).unwrap(), "\"fat_loss\"");
        assert_eq!(serde_json::to_string(&ActivityLevel::High).unwrap(), "\"high\"");
        assert_eq!("muscle_gain".parse::<GoalType>().unwrap(), GoalType::MuscleGain);
        assert!("sedentary".parse::<ActivityLevel>().is_err());
    }

    #[test]
    fn empty_profile_serializes_to_empty_object() {
        let json = serde_json::to_value(UserProfile::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }

    #[test]
    fn target_update_from_daily_targets() {
        let t = DailyTargets {
            calories: 2000,
            protein_g: 120,
            carbs_g: 250,
            fats_g: 60,
            water_ml: 2500,
        };
        let update = TargetUpdate::from(t);
        assert_eq!(update.calories_target, Some(2000));
        assert_eq!(update.water_target_ml, Some(2500));
        assert!(!update.is_empty());
    }
}
