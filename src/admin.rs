use std::collections::BTreeMap;

use axum::{extract::State, routing::post, Json, Router};
use serde::Serialize;
use tracing::{info, instrument};

use crate::{
    clients::cache::{Cache, CacheTable},
    error::ApiError,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new().route("/admin/cache/clear", post(clear_cache))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheCleared {
    pub success: bool,
    pub deleted: BTreeMap<&'static str, u64>,
    pub total: u64,
}

/// POST /admin/cache/clear. Empties every vendor cache table.
#[instrument(skip(state))]
pub async fn clear_cache(State(state): State<AppState>) -> Result<Json<CacheCleared>, ApiError> {
    let cache = Cache::new(state.db.clone());
    let mut deleted = BTreeMap::new();
    for table in CacheTable::ALL {
        deleted.insert(table.table(), cache.clear(table).await?);
    }
    let total = deleted.values().sum();
    info!(total, "caches cleared");
    Ok(Json(CacheCleared {
        success: true,
        deleted,
        total,
    }))
}
