use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::pipeline::{plan_check::PlanCheck, types::lenient};

/// Reps arrive as `10`, `"8-12"` or `"30 seconds"`; keep them as text.
fn reps<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub name: String,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub sets: Option<u32>,
    #[serde(default, deserialize_with = "reps")]
    pub reps: Option<String>,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub rest_seconds: Option<u32>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutDay {
    pub day: String,
    #[serde(default)]
    pub focus: Option<String>,
    #[serde(default)]
    pub is_rest_day: bool,
    #[serde(default, deserialize_with = "lenient::opt_u32")]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutPlan {
    #[serde(default)]
    pub weekly_plan: Vec<WorkoutDay>,
    #[serde(default)]
    pub summary: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validation: Option<PlanCheck>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingProfile {
    pub fitness_level: &'static str,
    pub training_days: u32,
    pub session_minutes: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutRequest {
    #[serde(default)]
    pub force_regenerate: bool,
    #[serde(default)]
    pub survey_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutResponse {
    pub success: bool,
    pub workout_plan_id: Uuid,
    pub regeneration_count: i32,
    pub remaining_regenerations: i32,
    pub profile: TrainingProfile,
    pub workout_plan: WorkoutPlan,
}
