//! Daily target calculation (Mifflin-St Jeor BMR, activity-scaled TDEE).
//!
//! Inputs come from free-text fields, so nothing here fails: unparseable or
//! non-positive numbers fall back to fixed defaults.

use super::{ActivityLevel, DailyTargets, GoalType};

pub const DEFAULT_HEIGHT_CM: f64 = 170.0;
pub const DEFAULT_WEIGHT_KG: f64 = 70.0;
pub const DEFAULT_AGE_YEARS: f64 = 25.0;

const PROTEIN_G_PER_KG: f64 = 2.2;
const FAT_SHARE: f64 = 0.25;
const WATER_ML_PER_KG: f64 = 35.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetInputs {
    pub height_cm: f64,
    pub weight_kg: f64,
    pub age_years: f64,
    pub activity: ActivityLevel,
    pub goal: GoalType,
}

impl Default for TargetInputs {
    fn default() -> Self {
        Self {
            height_cm: DEFAULT_HEIGHT_CM,
            weight_kg: DEFAULT_WEIGHT_KG,
            age_years: DEFAULT_AGE_YEARS,
            activity: ActivityLevel::default(),
            goal: GoalType::default(),
        }
    }
}

impl TargetInputs {
    /// Builds inputs from raw text entry, substituting defaults for anything
    /// missing or invalid.
    pub fn from_raw(
        height: &str,
        weight: &str,
        age: &str,
        activity: Option<ActivityLevel>,
        goal: Option<GoalType>,
    ) -> Self {
        Self {
            height_cm: parse_positive(height).unwrap_or(DEFAULT_HEIGHT_CM),
            weight_kg: parse_positive(weight).unwrap_or(DEFAULT_WEIGHT_KG),
            age_years: parse_positive(age)
                .map(f64::trunc)
                .filter(|a| *a > 0.0)
                .unwrap_or(DEFAULT_AGE_YEARS),
            activity: activity.unwrap_or_default(),
            goal: goal.unwrap_or_default(),
        }
    }
}

/// Parses a strictly positive, finite number. Surrounding whitespace is ignored.
pub fn parse_positive(raw: &str) -> Option<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

impl ActivityLevel {
    pub fn multiplier(self) -> f64 {
        match self {
            ActivityLevel::Low => 1.2,
            ActivityLevel::Medium => 1.55,
            ActivityLevel::High => 1.9,
        }
    }
}

impl GoalType {
    /// kcal added to (or removed from) TDEE.
    pub fn calorie_adjustment(self) -> f64 {
        match self {
            GoalType::FatLoss => -500.0,
            GoalType::Maintain => 0.0,
            GoalType::MuscleGain => 300.0,
        }
    }
}

/// Mifflin-St Jeor, `+5` coefficient form.
pub fn bmr(weight_kg: f64, height_cm: f64, age_years: f64) -> f64 {
    10.0 * weight_kg + 6.25 * height_cm - 5.0 * age_years + 5.0
}

pub fn tdee(bmr: f64, activity: ActivityLevel) -> f64 {
    bmr * activity.multiplier()
}

pub fn calculate_targets(inputs: &TargetInputs) -> DailyTargets {
    let energy = tdee(
        bmr(inputs.weight_kg, inputs.height_cm, inputs.age_years),
        inputs.activity,
    ) + inputs.goal.calorie_adjustment();

    let protein = round_non_negative(inputs.weight_kg * PROTEIN_G_PER_KG);
    let fats = round_non_negative(FAT_SHARE * energy / 9.0);
    let carbs = round_non_negative((energy - f64::from(protein) * 4.0 - f64::from(fats) * 9.0) / 4.0);

    DailyTargets {
        calories: round_non_negative(energy),
        protein_g: protein,
        carbs_g: carbs,
        fats_g: fats,
        water_ml: round_non_negative(inputs.weight_kg * WATER_ML_PER_KG),
    }
}

fn round_non_negative(v: f64) -> i32 {
    if !v.is_finite() || v <= 0.0 {
        return 0;
    }
    let rounded = v.round();
    if rounded >= f64::from(i32::MAX) {
        i32::MAX
    } else {
        rounded as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(activity: ActivityLevel, goal: GoalType) -> TargetInputs {
        TargetInputs {
            activity,
            goal,
            ..TargetInputs::default()
        }
    }

    #[test]
    fn reference_profile_medium_maintain() {
        let t = calculate_targets(&inputs(ActivityLevel::Medium, GoalType::Maintain));
        // BMR 1642.5, TDEE 2545.875
        assert_eq!(t.calories, 2546);
        assert_eq!(t.protein_g, 154);
        assert_eq!(t.fats_g, 71);
        assert_eq!(t.carbs_g, 323);
        assert_eq!(t.water_ml, 2450);
    }

    #[test]
    fn bmr_and_tdee_components() {
        assert!((bmr(70.0, 170.0, 25.0) - 1642.5).abs() < 1e-9);
        assert!((tdee(1000.0, ActivityLevel::Low) - 1200.0).abs() < 1e-9);
        assert!((tdee(1000.0, ActivityLevel::High) - 1900.0).abs() < 1e-9);
    }

    #[test]
    fn goal_adjustment_shifts_calories() {
        for activity in [ActivityLevel::Low, ActivityLevel::Medium, ActivityLevel::High] {
            let maintain = calculate_targets(&inputs(activity, GoalType::Maintain)).calories;
            let cut = calculate_targets(&inputs(activity, GoalType::FatLoss)).calories;
            let bulk = calculate_targets(&inputs(activity, GoalType::MuscleGain)).calories;
            assert!((maintain - 500 - cut).abs() <= 1, "{activity}: {maintain} vs {cut}");
            assert!((maintain + 300 - bulk).abs() <= 1, "{activity}: {maintain} vs {bulk}");
        }
    }

    #[test]
    fn macro_split_matches_calories() {
        for goal in [GoalType::FatLoss, GoalType::Maintain, GoalType::MuscleGain] {
            let t = calculate_targets(&TargetInputs {
                height_cm: 182.0,
                weight_kg: 84.5,
                age_years: 41.0,
                activity: ActivityLevel::High,
                goal,
            });
            assert!((t.macro_calories() - t.calories).abs() <= 8, "{t:?}");
        }
    }

    #[test]
    fn invalid_text_falls_back_to_defaults() {
        let parsed = TargetInputs::from_raw("", "abc", "-3", None, None);
        assert_eq!(parsed, TargetInputs::default());

        let t = calculate_targets(&TargetInputs::from_raw("", "70", "25", None, None));
        assert_eq!(t, calculate_targets(&TargetInputs::default()));
    }

    #[test]
    fn raw_values_are_trimmed_and_decimal_weight_kept() {
        let parsed = TargetInputs::from_raw(" 180 ", "72.5", "30", Some(ActivityLevel::Low), Some(GoalType::FatLoss));
        assert_eq!(parsed.height_cm, 180.0);
        assert_eq!(parsed.weight_kg, 72.5);
        assert_eq!(parsed.age_years, 30.0);
        assert_eq!(parsed.activity, ActivityLevel::Low);
        assert_eq!(parsed.goal, GoalType::FatLoss);
    }

    #[test]
    fn outputs_never_negative() {
        let grid = [1.0, 40.0, 170.0, 250.0];
        for h in grid {
            for w in [1.0, 45.0, 90.0, 300.0] {
                for a in [1.0, 25.0, 80.0, 150.0] {
                    let t = calculate_targets(&TargetInputs {
                        height_cm: h,
                        weight_kg: w,
                        age_years: a,
                        activity: ActivityLevel::Low,
                        goal: GoalType::FatLoss,
                    });
                    assert!(t.calories >= 0 && t.protein_g >= 0 && t.carbs_g >= 0);
                    assert!(t.fats_g >= 0 && t.water_ml >= 0);
                }
            }
        }
    }
}
