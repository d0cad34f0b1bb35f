use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use sqlx::{types::Json, PgPool};
use time::{Duration, OffsetDateTime};
use tracing::{debug, warn};

pub const RESTAURANT_TTL: Duration = Duration::hours(24);
pub const MENU_TTL: Duration = Duration::hours(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTable {
    Restaurants,
    Menus,
    FoodImages,
    WorkoutImages,
}

impl CacheTable {
    pub const ALL: [CacheTable; 4] = [
        CacheTable::Restaurants,
        CacheTable::Menus,
        CacheTable::FoodImages,
        CacheTable::WorkoutImages,
    ];

    pub fn table(self) -> &'static str {
        match self {
            CacheTable::Restaurants => "restaurant_cache",
            CacheTable::Menus => "menu_cache",
            CacheTable::FoodImages => "food_images",
            CacheTable::WorkoutImages => "workout_images",
        }
    }
}

/// Lowercase, alphanumeric words joined by `-`.
pub fn normalize_key(raw: &str) -> String {
    raw.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// Read-through cache over Postgres. Failures are logged and treated as a
/// miss so a broken cache never fails a lookup.
#[derive(Clone)]
pub struct Cache {
    db: PgPool,
}

impl Cache {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn get<T: DeserializeOwned>(&self, table: CacheTable, key: &str) -> Option<T> {
        let sql = format!(
            "SELECT payload FROM {} WHERE cache_key = $1 AND (expires_at IS NULL OR expires_at > now())",
            table.table()
        );
        let row = sqlx::query_as::<_, (Value,)>(&sql)
            .bind(key)
            .fetch_optional(&self.db)
            .await;
        match row {
            Ok(Some((payload,))) => match serde_json::from_value(payload) {
                Ok(value) => {
                    debug!(table = table.table(), key, "cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(table = table.table(), key, error = %e, "stale cache payload");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!(table = table.table(), key, error = %e, "cache read failed");
                None
            }
        }
    }

    pub async fn put<T: Serialize>(&self, table: CacheTable, key: &str, value: &T, ttl: Option<Duration>) {
        let payload = match serde_json::to_value(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(table = table.table(), key, error = %e, "cache payload not serializable");
                return;
            }
        };
        let expires_at = ttl.map(|ttl| OffsetDateTime::now_utc() + ttl);
        let sql = format!(
            r#"
            INSERT INTO {} (cache_key, payload, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (cache_key)
            DO UPDATE SET payload = EXCLUDED.payload, expires_at = EXCLUDED.expires_at, updated_at = now()
            "#,
            table.table()
        );
        if let Err(e) = sqlx::query(&sql)
            .bind(key)
            .bind(Json(payload))
            .bind(expires_at)
            .execute(&self.db)
            .await
        {
            warn!(table = table.table(), key, error = %e, "cache write failed");
        }
    }

    pub async fn clear(&self, table: CacheTable) -> sqlx::Result<u64> {
        let sql = format!("DELETE FROM {}", table.table());
        let done = sqlx::query(&sql).execute(&self.db).await?;
        Ok(done.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_normalized() {
        assert_eq!(normalize_key("  Chipotle Mexican Grill "), "chipotle-mexican-grill");
        assert_eq!(normalize_key("Açaí Bowl (large)!"), "açaí-bowl-large");
        assert_eq!(normalize_key("Dumbbell  Bench-Press"), "dumbbell-bench-press");
    }
}
