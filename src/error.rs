use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PollError {
    #[error("Poll not found")]
    NotFound,
    #[error("Invalid request: {0}")]
    Validation(String),
    #[error("Database error: {0}")]
    Persistence(String),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

impl IntoResponse for PollError {
    fn into_response(self) -> Response {
        let (status, error_message) = match &self {
            PollError::NotFound => (StatusCode::NOT_FOUND, "Vote not found"),
            PollError::Validation(_) => (StatusCode::BAD_REQUEST, "Invalid request"),
            PollError::Persistence(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "details": self.to_string()
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for PollError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => PollError::NotFound,
            other => PollError::Persistence(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for PollError {
    fn from(error: serde_json::Error) -> Self {
        PollError::Validation(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            PollError::NotFound.into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            PollError::Validation("empty".into()).into_response().status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            PollError::Persistence("down".into()).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_row_not_found_maps_to_not_found() {
        assert_eq!(PollError::from(sqlx::Error::RowNotFound), PollError::NotFound);
    }
}
