use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use serde_json::Value;
use tracing::instrument;

use super::{
    dto::{SurveyCreated, SurveyView},
    services::{self, StoredSurvey},
};
use crate::{
    error::ApiError,
    meals::services::spawn_generation,
    session::{self, Session},
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/survey", post(submit_survey).get(get_survey).patch(patch_survey))
}

fn view(stored: StoredSurvey) -> SurveyView {
    SurveyView {
        id: stored.id,
        targets: stored.targets(),
        weekly_budget_cents: stored.weekly_budget_cents(),
        created_at: stored.created_at,
        updated_at: stored.updated_at,
        survey: stored.survey,
    }
}

/// POST /survey. Kicks off meal-plan generation in the background; the
/// client polls `/ai/meals/status`.
#[instrument(skip(state, body))]
pub async fn submit_survey(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<Value>,
) -> Result<(StatusCode, HeaderMap, Json<SurveyCreated>), ApiError> {
    let created = services::accept(&state.db, &session, &body, |stored| {
        spawn_generation(state.clone(), stored)
    })
    .await?;

    let mut headers = HeaderMap::new();
    if let Some(cookie) = session::set_cookie(session::SURVEY_ID, &created.survey_id.to_string()) {
        headers.insert(header::SET_COOKIE, cookie);
    }
    Ok((StatusCode::CREATED, headers, Json(created)))
}

#[instrument(skip(state))]
pub async fn get_survey(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<SurveyView>, ApiError> {
    match services::resolve(&state.db, &session, None).await? {
        Some(stored) => Ok(Json(view(stored))),
        None => Err(ApiError::NotFound("Survey not found".into())),
    }
}

#[instrument(skip(state, patch))]
pub async fn patch_survey(
    State(state): State<AppState>,
    session: Session,
    Json(patch): Json<Value>,
) -> Result<Json<SurveyView>, ApiError> {
    let stored = services::resolve(&state.db, &session, None)
        .await?
        .ok_or_else(|| ApiError::NotFound("Survey not found".into()))?;
    let updated = services::amend(&state.db, &stored, &patch).await?;
    Ok(Json(view(updated)))
}
