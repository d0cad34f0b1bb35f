use serde::Serialize;
use serde_json::Value;
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use super::{PlanKind, PlanStatus};

const COLUMNS: &str = "id, survey_id, user_id, week_of, status, regeneration_count, user_context, plan_data, created_at, updated_at";

#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PlanRow {
    pub id: Uuid,
    pub survey_id: Uuid,
    pub user_id: Option<String>,
    pub week_of: Date,
    pub status: String,
    pub regeneration_count: i32,
    pub user_context: Value,
    pub plan_data: Value,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl PlanRow {
    pub fn status(&self) -> Option<PlanStatus> {
        PlanStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone)]
pub struct NewPlan {
    pub survey_id: Uuid,
    pub user_id: Option<String>,
    pub week_of: Date,
    pub status: PlanStatus,
    pub regeneration_count: i32,
    pub user_context: Value,
    pub plan_data: Value,
}

/// Latest active plan for the survey's week; this is the row the
/// regeneration cap is counted against.
pub async fn find_active(
    db: &PgPool,
    kind: PlanKind,
    survey_id: Uuid,
    week_of: Date,
) -> sqlx::Result<Option<PlanRow>> {
    let sql = format!(
        r#"
        SELECT {COLUMNS}
        FROM {}
        WHERE survey_id = $1 AND week_of = $2 AND status = 'active'
        ORDER BY created_at DESC
        LIMIT 1
        "#,
        kind.table()
    );
    sqlx::query_as::<_, PlanRow>(&sql)
        .bind(survey_id)
        .bind(week_of)
        .fetch_optional(db)
        .await
}

/// Latest active or partial plan for the survey's week.
pub async fn find_current(
    db: &PgPool,
    kind: PlanKind,
    survey_id: Uuid,
    week_of: Date,
) -> sqlx::Result<Option<PlanRow>> {
    let sql = format!(
        r#"
        SELECT {COLUMNS}
        FROM {}
        WHERE survey_id = $1 AND week_of = $2 AND status IN ('active', 'partial')
        ORDER BY created_at DESC
        LIMIT 1
        "#,
        kind.table()
    );
    sqlx::query_as::<_, PlanRow>(&sql)
        .bind(survey_id)
        .bind(week_of)
        .fetch_optional(db)
        .await
}

/// Most recent non-archived plan for the survey, any week.
pub async fn find_latest(db: &PgPool, kind: PlanKind, survey_id: Uuid) -> sqlx::Result<Option<PlanRow>> {
    let sql = format!(
        r#"
        SELECT {COLUMNS}
        FROM {}
        WHERE survey_id = $1 AND status <> 'archived'
        ORDER BY created_at DESC
        LIMIT 1
        "#,
        kind.table()
    );
    sqlx::query_as::<_, PlanRow>(&sql)
        .bind(survey_id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_id(db: &PgPool, kind: PlanKind, id: Uuid) -> sqlx::Result<Option<PlanRow>> {
    let sql = format!("SELECT {COLUMNS} FROM {} WHERE id = $1", kind.table());
    sqlx::query_as::<_, PlanRow>(&sql)
        .bind(id)
        .fetch_optional(db)
        .await
}

async fn archive_week_tx(
    tx: &mut Transaction<'_, Postgres>,
    kind: PlanKind,
    survey_id: Uuid,
    week_of: Date,
) -> sqlx::Result<u64> {
    let sql = format!(
        r#"
        UPDATE {}
        SET status = 'archived', updated_at = now()
        WHERE survey_id = $1 AND week_of = $2 AND status IN ('active', 'partial')
        "#,
        kind.table()
    );
    let done = sqlx::query(&sql)
        .bind(survey_id)
        .bind(week_of)
        .execute(&mut **tx)
        .await?;
    Ok(done.rows_affected())
}

async fn insert_tx(
    tx: &mut Transaction<'_, Postgres>,
    kind: PlanKind,
    plan: &NewPlan,
) -> sqlx::Result<PlanRow> {
    let sql = format!(
        r#"
        INSERT INTO {} (id, survey_id, user_id, week_of, status, regeneration_count, user_context, plan_data)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {COLUMNS}
        "#,
        kind.table()
    );
    sqlx::query_as::<_, PlanRow>(&sql)
        .bind(Uuid::new_v4())
        .bind(plan.survey_id)
        .bind(plan.user_id.as_deref())
        .bind(plan.week_of)
        .bind(plan.status.as_str())
        .bind(plan.regeneration_count)
        .bind(&plan.user_context)
        .bind(&plan.plan_data)
        .fetch_one(&mut **tx)
        .await
}

/// Archives the week's current plans and inserts `plan` in one transaction.
pub async fn replace_current(db: &PgPool, kind: PlanKind, plan: &NewPlan) -> sqlx::Result<PlanRow> {
    let mut tx = db.begin().await?;
    let archived = archive_week_tx(&mut tx, kind, plan.survey_id, plan.week_of).await?;
    let row = insert_tx(&mut tx, kind, plan).await?;
    tx.commit().await?;
    tracing::debug!(table = kind.table(), archived, id = %row.id, "plan stored");
    Ok(row)
}

pub async fn update(
    db: &PgPool,
    kind: PlanKind,
    id: Uuid,
    status: PlanStatus,
    plan_data: &Value,
) -> sqlx::Result<PlanRow> {
    let sql = format!(
        r#"
        UPDATE {}
        SET status = $2, plan_data = $3, updated_at = now()
        WHERE id = $1
        RETURNING {COLUMNS}
        "#,
        kind.table()
    );
    sqlx::query_as::<_, PlanRow>(&sql)
        .bind(id)
        .bind(status.as_str())
        .bind(plan_data)
        .fetch_one(db)
        .await
}
