use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use postline_core::CoreError;
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    Auth(String),
    NotFound(String),
    Conflict(String),
    Validation(String),
    Internal(String),
}

impl AppError {
    /// Generic 401 for any bearer-token failure.
    pub fn unauthorized() -> Self {
        AppError::Auth("Could not validate credentials".to_string())
    }
}

#[derive(Serialize)]
struct ErrorBody {
    success: bool,
    error: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Validation(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            AppError::Internal(msg) => {
                // Log the real error server-side, return generic message to client
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = ErrorBody {
            success: false,
            error: message,
        };

        let mut response = (status, axum::Json(body)).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<CoreError> for AppError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::AuthInvalid => AppError::unauthorized(),
            CoreError::NotFound(_) => AppError::NotFound(e.to_string()),
            CoreError::Conflict(msg) => AppError::Conflict(msg),
            CoreError::Validation(msg) => AppError::Validation(msg),
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl From<tokio::task::JoinError> for AppError {
    fn from(e: tokio::task::JoinError) -> Self {
        AppError::Internal(format!("blocking task failed: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_invalid_maps_to_generic_401() {
        let response = AppError::from(CoreError::AuthInvalid).into_response();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
    }

    #[test]
    fn conflict_maps_to_400() {
        let response = AppError::from(CoreError::Conflict("taken".into())).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn not_found_names_entity() {
        let err = AppError::from(CoreError::NotFound("recipient".into()));
        assert!(matches!(err, AppError::NotFound(ref msg) if msg == "recipient not found"));
    }

    #[test]
    fn internal_details_are_not_leaked() {
        let response =
            AppError::from(CoreError::PasswordHash("$argon2id$secret".into())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
