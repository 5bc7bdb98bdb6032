//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use climacal_domain::error::ClimateError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`ClimateError`] to an HTTP response with appropriate status code.
pub struct ApiError(ClimateError);

impl From<ClimateError> for ApiError {
    fn from(err: ClimateError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            ClimateError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            ClimateError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            ClimateError::Configuration(err) => {
                (StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
            }
            ClimateError::Transport(err) | ClimateError::EventSource(err) => {
                tracing::error!(error = %err, "upstream error");
                (StatusCode::BAD_GATEWAY, self.0.to_string())
            }
            ClimateError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use climacal_domain::error::{NotFoundError, ValidationError};

    #[test]
    fn should_map_validation_error_to_bad_request() {
        let response = ApiError::from(ClimateError::from(ValidationError::MissingForceTarget))
            .into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn should_map_not_found_error_to_not_found() {
        let err = NotFoundError {
            entity: "Slot",
            id: "party".to_string(),
        };
        let response = ApiError::from(ClimateError::from(err)).into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn should_hide_storage_details() {
        let response = ApiError::from(ClimateError::Storage("disk full".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
