use async_trait::async_trait;
use serde_json::Value;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// `email`, `guest_session`, `targets` and `weekly_budget_cents` are written
/// for lookups and reporting; the app reads everything back from `data`.
const COLUMNS: &str = "id, user_id, data, created_at, updated_at";

#[derive(Debug, Clone, FromRow)]
pub struct SurveyRow {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub data: Value,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

pub struct NewSurvey<'a> {
    pub email: &'a str,
    pub user_id: Option<&'a str>,
    pub guest_session: Option<&'a str>,
    pub data: Value,
    pub targets: Value,
    pub weekly_budget_cents: i32,
}

/// Where new surveys are written.
#[async_trait]
pub trait SurveyStore: Send + Sync {
    async fn insert(&self, survey: NewSurvey<'_>) -> sqlx::Result<SurveyRow>;
}

#[async_trait]
impl SurveyStore for PgPool {
    async fn insert(&self, survey: NewSurvey<'_>) -> sqlx::Result<SurveyRow> {
        insert(self, survey).await
    }
}

pub async fn insert(db: &PgPool, survey: NewSurvey<'_>) -> sqlx::Result<SurveyRow> {
    let sql = format!(
        r#"
        INSERT INTO survey_responses (id, email, user_id, guest_session, data, targets, weekly_budget_cents)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {COLUMNS}
        "#
    );
    sqlx::query_as::<_, SurveyRow>(&sql)
    .bind(Uuid::new_v4())
    .bind(survey.email)
    .bind(survey.user_id)
    .bind(survey.guest_session)
    .bind(survey.data)
    .bind(survey.targets)
    .bind(survey.weekly_budget_cents)
    .fetch_one(db)
    .await
}

pub async fn find_by_id(db: &PgPool, id: Uuid) -> sqlx::Result<Option<SurveyRow>> {
    let sql = format!("SELECT {COLUMNS} FROM survey_responses WHERE id = $1");
    sqlx::query_as::<_, SurveyRow>(&sql)
    .bind(id)
    .fetch_optional(db)
    .await
}

/// Latest survey filed under a user id or guest session.
pub async fn find_latest_for(
    db: &PgPool,
    user_id: Option<&str>,
    guest_session: Option<&str>,
) -> sqlx::Result<Option<SurveyRow>> {
    if user_id.is_none() && guest_session.is_none() {
        return Ok(None);
    }
    let sql = format!(
        r#"
        SELECT {COLUMNS}
        FROM survey_responses
        WHERE ($1::text IS NOT NULL AND user_id = $1)
           OR ($2::text IS NOT NULL AND guest_session = $2)
        ORDER BY created_at DESC
        LIMIT 1
        "#
    );
    sqlx::query_as::<_, SurveyRow>(&sql)
    .bind(user_id)
    .bind(guest_session)
    .fetch_optional(db)
    .await
}

pub async fn update(
    db: &PgPool,
    id: Uuid,
    email: &str,
    data: Value,
    targets: Value,
    weekly_budget_cents: i32,
) -> sqlx::Result<SurveyRow> {
    let sql = format!(
        r#"
        UPDATE survey_responses
        SET email = $2, data = $3, targets = $4, weekly_budget_cents = $5, updated_at = now()
        WHERE id = $1
        RETURNING {COLUMNS}
        "#
    );
    sqlx::query_as::<_, SurveyRow>(&sql)
    .bind(id)
    .bind(email)
    .bind(data)
    .bind(targets)
    .bind(weekly_budget_cents)
    .fetch_one(db)
    .await
}
