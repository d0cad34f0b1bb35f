use axum::{
    extract::State,
    http::{header, HeaderMap},
    routing::{get, post},
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use super::{
    dto::{
        GenerateRequest, GenerateResponse, GroceryResponse, PlanRef, PlanStatusView,
        PlanningPreview, SelectRequest, SelectResponse, SurveyRef,
    },
    services,
};
use crate::{
    error::ApiError,
    extract::JsonOrEmpty,
    plans::repo::PlanRow,
    session::{self, Session},
    state::AppState,
    survey::services::{require, resolve},
};

pub fn generate_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/meals/generate", post(generate))
        .route("/ai/meals/generate-restaurants", post(generate_restaurants))
        .route("/ai/meals/planning-preview", post(planning_preview))
        .route("/ai/meals/select", post(select))
        .route("/ai/meals/generate-groceries", post(generate_groceries))
}

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/ai/meals/status", get(status))
        .route("/ai/meals/current", get(current))
}

fn plan_cookie(plan_id: Option<Uuid>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Some(cookie) =
        plan_id.and_then(|id| session::set_cookie(session::MEAL_PLAN_ID, &id.to_string()))
    {
        headers.insert(header::SET_COOKIE, cookie);
    }
    headers
}

#[instrument(skip(state, req))]
pub async fn generate(
    State(state): State<AppState>,
    session: Session,
    JsonOrEmpty(req): JsonOrEmpty<GenerateRequest>,
) -> Result<(HeaderMap, Json<GenerateResponse>), ApiError> {
    let stored = require(&state.db, &session, req.survey_id).await?;
    let response = services::generate_meal_plan(&state, &stored, req.force_regenerate).await?;
    Ok((plan_cookie(response.meal_plan_id), Json(response)))
}

#[instrument(skip(state, req))]
pub async fn generate_restaurants(
    State(state): State<AppState>,
    session: Session,
    JsonOrEmpty(req): JsonOrEmpty<SurveyRef>,
) -> Result<(HeaderMap, Json<GenerateResponse>), ApiError> {
    let stored = require(&state.db, &session, req.survey_id).await?;
    let response = services::generate_restaurants(&state, &stored, session.meal_plan_id).await?;
    Ok((plan_cookie(response.meal_plan_id), Json(response)))
}

#[instrument(skip(state, req))]
pub async fn planning_preview(
    State(state): State<AppState>,
    session: Session,
    JsonOrEmpty(req): JsonOrEmpty<SurveyRef>,
) -> Result<Json<PlanningPreview>, ApiError> {
    let stored = require(&state.db, &session, req.survey_id).await?;
    let preview = services::planning_preview(&state, &stored, session.meal_plan_id).await?;
    Ok(Json(preview))
}

#[instrument(skip(state, req))]
pub async fn select(
    State(state): State<AppState>,
    session: Session,
    JsonOrEmpty(req): JsonOrEmpty<SelectRequest>,
) -> Result<Json<SelectResponse>, ApiError> {
    let stored = require(&state.db, &session, req.survey_id).await?;
    let response = services::select_meal(&state, &stored, session.meal_plan_id, &req).await?;
    Ok(Json(response))
}

#[instrument(skip(state, req))]
pub async fn generate_groceries(
    State(state): State<AppState>,
    session: Session,
    JsonOrEmpty(req): JsonOrEmpty<PlanRef>,
) -> Result<Json<GroceryResponse>, ApiError> {
    let stored = require(&state.db, &session, req.survey_id).await?;
    let preferred = req.meal_plan_id.or(session.meal_plan_id);
    let response = services::generate_groceries(&state, &stored, preferred).await?;
    Ok(Json(response))
}

#[instrument(skip(state))]
pub async fn status(
    State(state): State<AppState>,
    session: Session,
) -> Result<Json<PlanStatusView>, ApiError> {
    let stored = resolve(&state.db, &session, None).await?;
    Ok(Json(services::plan_status(&state, stored.as_ref()).await?))
}

#[instrument(skip(state))]
pub async fn current(
    State(state): State<AppState>,
    session: Session,
) -> Result<(HeaderMap, Json<PlanRow>), ApiError> {
    let stored = require(&state.db, &session, None).await?;
    let row = services::current_plan(&state, &stored).await?;
    Ok((plan_cookie(Some(row.id)), Json(row)))
}
