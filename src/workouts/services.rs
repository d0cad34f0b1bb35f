use std::collections::BTreeSet;

use anyhow::Context;
use tracing::info;

use super::{
    dto::{TrainingProfile, WorkoutPlan, WorkoutResponse},
    validate::check_workout,
};
use crate::{
    clients::ImageKind,
    error::ApiError,
    pipeline::{images::find_images, prompts, Pipeline, PipelineError},
    plans::{
        next_regeneration_count, remaining_regenerations,
        repo::{self, NewPlan, PlanRow},
        PlanKind, PlanStatus,
    },
    state::AppState,
    survey::{context::UserContext, dto::ActivityLevel, services::StoredSurvey},
};

const DAYS_PER_WEEK: usize = 7;

pub fn training_profile(level: Option<ActivityLevel>) -> TrainingProfile {
    let (fitness_level, training_days, session_minutes) = match level {
        Some(ActivityLevel::Sedentary) => ("beginner", 3, 20),
        Some(ActivityLevel::LightlyActive) => ("beginner", 4, 25),
        Some(ActivityLevel::ModeratelyActive) | None => ("intermediate", 5, 35),
        Some(ActivityLevel::VeryActive) | Some(ActivityLevel::ExtremelyActive) => ("advanced", 6, 45),
    };
    TrainingProfile {
        fitness_level,
        training_days,
        session_minutes,
    }
}

/// One model call; a plan that does not cover exactly seven days is
/// rejected. Other findings are attached as `validation`.
pub async fn draft_plan(
    p: &Pipeline,
    ctx: &UserContext,
    profile: TrainingProfile,
) -> Result<WorkoutPlan, PipelineError> {
    let request = prompts::workout_plan(
        ctx,
        profile.fitness_level,
        profile.training_days,
        profile.session_minutes,
    );
    let mut plan: WorkoutPlan = p.chat_json(&request, "workout-plan").await?;
    if plan.weekly_plan.len() != DAYS_PER_WEEK {
        return Err(PipelineError::Upstream(format!(
            "workout plan has {} days, expected {DAYS_PER_WEEK}",
            plan.weekly_plan.len()
        )));
    }
    plan.validation = Some(check_workout(&plan));
    Ok(plan)
}

pub async fn attach_exercise_images(p: &Pipeline, mut plan: WorkoutPlan) -> WorkoutPlan {
    let names: BTreeSet<String> = plan
        .weekly_plan
        .iter()
        .flat_map(|day| day.exercises.iter())
        .filter(|e| e.image_url.is_none() && !e.name.trim().is_empty())
        .map(|e| e.name.clone())
        .collect();
    let found = find_images(p, ImageKind::Workout, names).await;
    for exercise in plan.weekly_plan.iter_mut().flat_map(|d| d.exercises.iter_mut()) {
        if exercise.image_url.is_none() {
            exercise.image_url = found.get(&exercise.name).cloned();
        }
    }
    plan
}

pub async fn generate_workout_plan(
    state: &AppState,
    stored: &StoredSurvey,
    force: bool,
) -> Result<WorkoutResponse, ApiError> {
    let ctx = stored.context();
    let existing = repo::find_active(&state.db, PlanKind::Workout, stored.id, ctx.week_of).await?;
    let regeneration_count =
        next_regeneration_count(existing.as_ref().map(|r| r.regeneration_count), force)?;

    let profile = training_profile(stored.survey.activity_level);
    let p = state.pipeline();
    let plan = draft_plan(&p, &ctx, profile).await?;
    let plan = attach_exercise_images(&p, plan).await;

    let row = repo::replace_current(
        &state.db,
        PlanKind::Workout,
        &NewPlan {
            survey_id: stored.id,
            user_id: stored.user_id.clone(),
            week_of: ctx.week_of,
            status: PlanStatus::Active,
            regeneration_count,
            user_context: serde_json::to_value(&ctx).context("encode user context")?,
            plan_data: serde_json::to_value(&plan).context("encode workout plan")?,
        },
    )
    .await?;
    info!(survey_id = %stored.id, plan_id = %row.id, regeneration_count, "workout plan stored");

    Ok(WorkoutResponse {
        success: true,
        workout_plan_id: row.id,
        regeneration_count,
        remaining_regenerations: remaining_regenerations(regeneration_count),
        profile,
        workout_plan: plan,
    })
}

/// This week's workout plan, else the newest one that is not archived.
pub async fn current_workout(state: &AppState, stored: &StoredSurvey) -> Result<PlanRow, ApiError> {
    let ctx = stored.context();
    if let Some(row) =
        repo::find_current(&state.db, PlanKind::Workout, stored.id, ctx.week_of).await?
    {
        return Ok(row);
    }
    repo::find_latest(&state.db, PlanKind::Workout, stored.id)
        .await?
        .ok_or_else(|| ApiError::NotFound("No workout plan found".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        clients::{
            fake::{FakeChat, FakeImages},
            Clients,
        },
        config::PipelineConfig,
        survey::validate::tests::minimal_survey,
    };
    use serde_json::json;
    use std::{sync::Arc, time::Duration};
    use time::OffsetDateTime;
    use uuid::Uuid;

    fn pipeline_answering(days: usize) -> Pipeline {
        let exercises = json!([
            { "name": "Goblet Squat", "sets": 3, "reps": 12, "restSeconds": 60 },
            { "name": "Plank", "sets": "3", "reps": "30 seconds" }
        ]);
        let week: Vec<serde_json::Value> = (0..days)
            .map(|i| {
                let rest = i == 6;
                json!({
                    "day": format!("day {}", i + 1),
                    "focus": "full body",
                    "isRestDay": rest,
                    "durationMinutes": "35 min",
                    "exercises": if rest { json!([]) } else { exercises.clone() }
                })
            })
            .collect();
        let reply = json!({ "weeklyPlan": week, "summary": "Five sessions" }).to_string();
        let mut clients = Clients::fake();
        clients.chat = Arc::new(FakeChat::new(move |_| Ok(reply.clone())));
        clients.images = Arc::new(FakeImages {
            url: Some("https://img.example".into()),
            fail: false,
        });
        Pipeline::new(
            clients,
            PipelineConfig {
                retry_delay_override: Some(Duration::ZERO),
                ..Default::default()
            },
        )
    }

    fn ctx() -> UserContext {
        UserContext::new(Uuid::new_v4(), minimal_survey(), OffsetDateTime::now_utc())
    }

    #[test]
    fn activity_maps_to_training_load() {
        let p = training_profile(Some(ActivityLevel::Sedentary));
        assert_eq!((p.fitness_level, p.training_days, p.session_minutes), ("beginner", 3, 20));
        let p = training_profile(Some(ActivityLevel::ExtremelyActive));
        assert_eq!((p.fitness_level, p.training_days, p.session_minutes), ("advanced", 6, 45));
        assert_eq!(training_profile(None).fitness_level, "intermediate");
    }

    #[tokio::test]
    async fn seven_day_plan_gets_exercise_images() {
        let p = pipeline_answering(7);
        let plan = draft_plan(&p, &ctx(), training_profile(None)).await.unwrap();
        assert_eq!(plan.weekly_plan[0].duration_minutes, Some(35));
        assert_eq!(plan.weekly_plan[0].exercises[0].reps.as_deref(), Some("12"));

        let plan = attach_exercise_images(&p, plan).await;
        assert_eq!(
            plan.weekly_plan[0].exercises[1].image_url.as_deref(),
            Some("https://img.example/plank")
        );
        assert!(plan.weekly_plan[6].is_rest_day);
        let check = plan.validation.as_ref().unwrap();
        assert!(check.valid, "{check:?}");
        assert!(check.warnings.iter().any(|w| w.ends_with(": 2 exercises")));
    }

    #[tokio::test]
    async fn wrong_day_count_is_an_upstream_error() {
        let p = pipeline_answering(5);
        let err = draft_plan(&p, &ctx(), training_profile(None)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Upstream(_)));
        assert!(err.to_string().contains("5 days"));
    }
}
