use anyhow::Context;
use serde_json::Value;
use sqlx::PgPool;
use time::OffsetDateTime;
use uuid::Uuid;

use super::{
    context::UserContext,
    dto::{SurveyCreated, SurveyInput},
    repo::{self, NewSurvey, SurveyRow, SurveyStore},
    targets::{nutrition_targets, weekly_budget_cents, NutritionTargets},
    validate::{merge_patch, parse_survey},
};
use crate::{error::ApiError, session::Session};

/// A persisted survey decoded back into its validated form.
#[derive(Debug, Clone)]
pub struct StoredSurvey {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub survey: SurveyInput,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl StoredSurvey {
    fn from_row(row: SurveyRow) -> Result<Self, ApiError> {
        let survey: SurveyInput = serde_json::from_value(row.data)
            .with_context(|| format!("stored survey {} is unreadable", row.id))?;
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            survey,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    pub fn context(&self) -> UserContext {
        UserContext::new(self.id, self.survey.clone(), OffsetDateTime::now_utc())
    }

    pub fn targets(&self) -> NutritionTargets {
        nutrition_targets(&self.survey)
    }

    pub fn weekly_budget_cents(&self) -> u32 {
        weekly_budget_cents(&self.survey.budget_tier, self.survey.zip_code.as_deref())
    }
}

fn derived(survey: &SurveyInput) -> Result<(Value, i32), ApiError> {
    let targets = serde_json::to_value(nutrition_targets(survey)).context("encode targets")?;
    let budget = weekly_budget_cents(&survey.budget_tier, survey.zip_code.as_deref());
    Ok((targets, i32::try_from(budget).unwrap_or(i32::MAX)))
}

/// Validates and persists a new survey.
pub async fn submit<S: SurveyStore + ?Sized>(
    store: &S,
    session: &Session,
    body: &Value,
) -> Result<StoredSurvey, ApiError> {
    let survey = parse_survey(body).map_err(ApiError::Validation)?;
    let data = serde_json::to_value(&survey).context("encode survey")?;
    let (targets, budget) = derived(&survey)?;

    let row = store
        .insert(NewSurvey {
            email: &survey.email,
            user_id: session.user_id.as_deref(),
            guest_session: session.guest_session.as_deref(),
            data,
            targets,
            weekly_budget_cents: budget,
        })
        .await?;
    tracing::info!(survey_id = %row.id, "survey stored");
    StoredSurvey::from_row(row)
}

/// Stores the survey, then hands it to `on_stored`. Nothing is started for a
/// survey that failed to save.
pub async fn accept<S, F>(
    store: &S,
    session: &Session,
    body: &Value,
    on_stored: F,
) -> Result<SurveyCreated, ApiError>
where
    S: SurveyStore + ?Sized,
    F: FnOnce(StoredSurvey),
{
    let stored = submit(store, session, body).await?;
    let created = SurveyCreated {
        ok: true,
        survey_id: stored.id,
        targets: stored.targets(),
        weekly_budget_cents: stored.weekly_budget_cents(),
    };
    on_stored(stored);
    Ok(created)
}

/// The survey a request refers to: an explicit id first, then the
/// `survey_id` cookie, then the latest one filed under the user or guest
/// session.
pub async fn resolve(
    db: &PgPool,
    session: &Session,
    explicit: Option<Uuid>,
) -> Result<Option<StoredSurvey>, ApiError> {
    let row = match explicit.or(session.survey_id) {
        Some(id) => repo::find_by_id(db, id).await?,
        None => {
            repo::find_latest_for(
                db,
                session.user_id.as_deref(),
                session.guest_session.as_deref(),
            )
            .await?
        }
    };
    row.map(StoredSurvey::from_row).transpose()
}

/// Like [`resolve`], but a missing survey is a client error.
pub async fn require(
    db: &PgPool,
    session: &Session,
    explicit: Option<Uuid>,
) -> Result<StoredSurvey, ApiError> {
    resolve(db, session, explicit)
        .await?
        .ok_or(ApiError::MissingSurvey)
}

/// Merges the patch onto the stored survey, re-validates and recomputes the
/// derived targets.
pub async fn amend(db: &PgPool, stored: &StoredSurvey, patch: &Value) -> Result<StoredSurvey, ApiError> {
    let survey = merge_patch(&stored.survey, patch).map_err(ApiError::Validation)?;
    let data = serde_json::to_value(&survey).context("encode survey")?;
    let (targets, budget) = derived(&survey)?;
    let row = repo::update(db, stored.id, &survey.email, data, targets, budget).await?;
    tracing::info!(survey_id = %row.id, "survey updated");
    StoredSurvey::from_row(row)
}
