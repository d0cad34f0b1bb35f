use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use crate::pipeline::PipelineError;

/// Errors that reach the HTTP boundary. Messages are returned to the client
/// as-is.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Invalid input")]
    Validation(Vec<String>),
    #[error("Survey data required")]
    MissingSurvey,
    #[error("{0}")]
    NotFound(String),
    #[error("Maximum regenerations reached ({limit}/{limit})")]
    RegenerationLimit { limit: i32 },
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) | ApiError::MissingSurvey => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::RegenerationLimit { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Pipeline(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::Validation(fields) => json!({ "error": self.to_string(), "fields": fields }),
            ApiError::Pipeline(_) | ApiError::Database(_) | ApiError::Internal(_) => {
                tracing::error!(error = %self, "request failed");
                json!({ "error": "Request failed", "details": self.to_string() })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_category() {
        assert_eq!(
            ApiError::Validation(vec!["age".into()]).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::MissingSurvey.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ApiError::RegenerationLimit { limit: 2 }.status(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn regeneration_message_names_the_cap() {
        let err = ApiError::RegenerationLimit { limit: 2 };
        assert_eq!(err.to_string(), "Maximum regenerations reached (2/2)");
    }
}
