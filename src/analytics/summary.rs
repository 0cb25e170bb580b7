//! Pure aggregation behind the analytics endpoints.

use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::{food::repo::FoodLog, nutrition::TargetRecord, water::WaterLog, weight::WeightLog};

/// Totals for one day.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct DaySummary {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fats: f64,
    pub water: i64,
}

impl DaySummary {
    fn add_food(&mut self, log: &FoodLog) {
        self.calories += log.calories;
        self.protein += log.protein_g;
        self.carbs += log.carbs_g;
        self.fats += log.fats_g;
    }

    fn add_water(&mut self, log: &WaterLog) {
        self.water += i64::from(log.amount_ml);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyReport {
    pub summary: DaySummary,
    pub targets: TargetRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DayReport {
    pub date: Date,
    pub summary: DaySummary,
    pub targets: TargetRecord,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub current_streak: u32,
    pub best_streak: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyReport {
    pub data: Vec<DayReport>,
    pub targets: TargetRecord,
    pub streak: Streak,
    pub weight_trend: f64,
    pub weight_logs: Vec<WeightLog>,
}

/// Inclusive `[start, end]` window of `days` days ending at `end`.
pub fn window(end: Date, days: u16) -> (Date, Date) {
    let back = i64::from(days.max(1)) - 1;
    (end - Duration::days(back), end)
}

/// Weigh-ins considered for the trend start this many days before the window.
pub const WEIGHT_LOOKBACK_DAYS: i64 = 30;
pub const WEIGHT_TREND_POINTS: i64 = 10;

pub fn weight_since(start: Date) -> Date {
    start - Duration::days(WEIGHT_LOOKBACK_DAYS)
}

pub fn daily(food: &[FoodLog], water: &[WaterLog], targets: TargetRecord) -> DailyReport {
    let mut summary = DaySummary::default();
    food.iter().for_each(|l| summary.add_food(l));
    water.iter().for_each(|l| summary.add_water(l));
    DailyReport { summary, targets }
}

/// One entry per day from `start`, in order; entries outside the window are
/// ignored.
pub fn per_day(
    start: Date,
    days: u16,
    food: &[FoodLog],
    water: &[WaterLog],
    targets: TargetRecord,
) -> Vec<DayReport> {
    let mut out: Vec<DayReport> = (0..i64::from(days))
        .map(|i| DayReport {
            date: start + Duration::days(i),
            summary: DaySummary::default(),
            targets,
        })
        .collect();

    let slot = |date: Date| -> Option<usize> {
        let offset = (date - start).whole_days();
        (0..i64::from(days)).contains(&offset).then_some(offset as usize)
    };

    for log in food {
        if let Some(i) = slot(log.date) {
            out[i].summary.add_food(log);
        }
    }
    for log in water {
        if let Some(i) = slot(log.date) {
            out[i].summary.add_water(log);
        }
    }
    out
}

/// Newest minus oldest of `logs` (newest first), rounded to 0.1 kg.
/// Zero with fewer than two weigh-ins.
pub fn weight_trend(logs: &[WeightLog]) -> f64 {
    match (logs.first(), logs.last()) {
        (Some(newest), Some(oldest)) if logs.len() >= 2 => {
            round1(newest.weight_kg - oldest.weight_kg)
        }
        _ => 0.0,
    }
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

/// Streak over days with at least one food entry. `days` must be sorted
/// ascending without duplicates. The current streak is still alive when the
/// last logged day is yesterday.
pub fn streak(days: &[Date], today: Date) -> Streak {
    let mut best = 0u32;
    let mut run = 0u32;
    let mut prev: Option<Date> = None;
    for &d in days.iter().filter(|d| **d <= today) {
        run = match prev {
            Some(p) if d - p == Duration::days(1) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(d);
    }

    let current = match prev {
        Some(last) if today - last <= Duration::days(1) => run,
        _ => 0,
    };
    Streak {
        current_streak: current,
        best_streak: best,
    }
}

pub fn weekly(
    start: Date,
    days: u16,
    food: &[FoodLog],
    water: &[WaterLog],
    targets: TargetRecord,
    streak: Streak,
    weight_logs: Vec<WeightLog>,
) -> WeeklyReport {
    WeeklyReport {
        data: per_day(start, days, food, water, targets),
        targets,
        streak,
        weight_trend: weight_trend(&weight_logs),
        weight_logs,
    }
}
