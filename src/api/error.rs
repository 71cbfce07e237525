use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

/// Errors surfaced to HTTP clients.
///
/// Messages are deliberately generic; details stay in the server log.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ApiError {
    #[error("Method not allowed")]
    MethodNotAllowed,

    #[error("Invalid JSON body")]
    InvalidBody,

    #[error("Wrong password")]
    WrongPassword,

    #[error("Not authenticated. Please enter the access code first.")]
    NotAuthenticated,

    #[error("Server configuration error")]
    Configuration,

    #[error("Failed to generate download link")]
    LinkGeneration,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            ApiError::InvalidBody => StatusCode::BAD_REQUEST,
            ApiError::WrongPassword | ApiError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ApiError::Configuration | ApiError::LinkGeneration => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = json!({
            "error": self.to_string(),
            "status": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}
