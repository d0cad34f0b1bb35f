//! Persisted meal and workout plans: status, week bucketing and the
//! regeneration cap.

pub mod repo;

use serde::{Deserialize, Serialize};
use time::{Date, Duration};

use crate::error::ApiError;

pub const MAX_REGENERATIONS: i32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Partial,
    Active,
    Complete,
    Archived,
}

impl PlanStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            PlanStatus::Partial => "partial",
            PlanStatus::Active => "active",
            PlanStatus::Complete => "complete",
            PlanStatus::Archived => "archived",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "partial" => Some(PlanStatus::Partial),
            "active" => Some(PlanStatus::Active),
            "complete" => Some(PlanStatus::Complete),
            "archived" => Some(PlanStatus::Archived),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    Meal,
    Workout,
}

impl PlanKind {
    pub fn table(self) -> &'static str {
        match self {
            PlanKind::Meal => "meal_plans",
            PlanKind::Workout => "workout_plans",
        }
    }
}

/// Monday of the UTC week containing `date`.
pub fn week_start(date: Date) -> Date {
    date - Duration::days(i64::from(date.weekday().number_days_from_monday()))
}

/// Regeneration count for a new plan given the current one, if any.
pub fn next_regeneration_count(existing: Option<i32>, force: bool) -> Result<i32, ApiError> {
    match existing {
        None => Ok(0),
        Some(count) if count >= MAX_REGENERATIONS && !force => Err(ApiError::RegenerationLimit {
            limit: MAX_REGENERATIONS,
        }),
        Some(count) => Ok(count + 1),
    }
}

pub fn remaining_regenerations(count: i32) -> i32 {
    (MAX_REGENERATIONS - count).max(0)
}
