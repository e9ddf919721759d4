//! API error types with HTTP response mapping.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorCode};
use projections::ProjectionError;

/// API-level error type that maps to HTTP responses.
///
/// Every response carries `{"error": <message>, "code": <code>}` where the
/// code is one of the stable [`ErrorCode`] strings.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request: body, path, query or actor headers.
    BadRequest(String),
    /// Domain logic error; status follows its code.
    Domain(DomainError),
    /// A read model could not be refreshed.
    Projection(ProjectionError),
}

/// HTTP status for each error code.
pub fn status_for(code: ErrorCode) -> StatusCode {
    match code {
        ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
        ErrorCode::AlreadyAssigned | ErrorCode::ConcurrentModification => StatusCode::CONFLICT,
        ErrorCode::InvalidTransition
        | ErrorCode::NoEligibleMerchant
        | ErrorCode::UnsupportedDeliveryMode => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCode::Forbidden => StatusCode::FORBIDDEN,
        ErrorCode::NotFound => StatusCode::NOT_FOUND,
        ErrorCode::DirectoryUnavailable => StatusCode::BAD_GATEWAY,
        ErrorCode::StoreFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ApiError::BadRequest(_) => ErrorCode::ValidationError,
            ApiError::Domain(err) => err.code(),
            ApiError::Projection(_) => ErrorCode::StoreFailure,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.code();
        let status = status_for(code);
        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Domain(err) => err.to_string(),
            ApiError::Projection(err) => err.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(code = %code, error = %message, "request failed");
        } else {
            tracing::debug!(code = %code, error = %message, "request rejected");
        }

        let body = serde_json::json!({ "error": message, "code": code.as_str() });
        (status, axum::Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        ApiError::Domain(err)
    }
}

impl From<ProjectionError> for ApiError {
    fn from(err: ProjectionError) -> Self {
        ApiError::Projection(err)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
