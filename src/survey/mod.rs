pub mod context;
pub mod dto;
pub mod handlers;
mod repo;
pub mod services;
pub mod targets;
pub mod validate;

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
