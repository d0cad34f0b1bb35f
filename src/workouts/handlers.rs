use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;

use super::{
    dto::{WorkoutRequest, WorkoutResponse},
    services,
};
use crate::{
    error::ApiError,
    extract::JsonOrEmpty,
    plans::repo::PlanRow,
    session::Session,
    state::AppState,
    survey::services::require,
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/ai/workouts/generate", post(generate))
        .route("/ai/workouts/current", get(current))
}

#[instrument(skip(state, req))]
pub async fn generate(
    State(state): State<AppState>,
    session: Session,
    JsonOrEmpty(req): JsonOrEmpty<WorkoutRequest>,
) -> Result<Json<WorkoutResponse>, ApiError> {
    let stored = require(&state.db, &session, req.survey_id).await?;
    let response = services::generate_workout_plan(&state, &stored, req.force_regenerate).await?;
    Ok(Json(response))
}

#[instrument(skip(state))]
pub async fn current(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<PlanRow>, ApiError> {
    let stored = require(&state.db, &session, None).await?;
    Ok(Json(services::current_workout(&state, &stored).await?))
}
