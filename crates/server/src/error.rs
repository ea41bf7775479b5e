use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use claw_office_engine::RegistryError;
use claw_office_protocol::api::{ErrorBody, ErrorCode};
use claw_office_protocol::ParseEnumError;
use serde_json::{json, Map, Value};

/// Every Control API failure. Rendered as `{ ok: false, error, message, ...detail }`.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: ErrorCode,
    pub message: String,
    pub detail: Map<String, Value>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            detail: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: Value) -> Self {
        self.detail.insert(key.to_string(), value);
        self
    }

    pub fn unauthorized() -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            ErrorCode::Unauthorized,
            "missing or invalid API token",
        )
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, ErrorCode::BadRequest, message)
    }

    /// `BadRequest` with a machine-readable `reason` such as `InvalidDirection`.
    pub fn invalid(reason: &str, message: impl Into<String>) -> Self {
        Self::bad_request(message).with("reason", json!(reason))
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::Internal,
            message,
        )
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self.code, self.message)
    }
}

impl From<ParseEnumError> for ApiError {
    fn from(err: ParseEnumError) -> Self {
        Self::invalid(err.reason, err.to_string())
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::bad_request(rejection.body_text())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        let message = err.to_string();
        match err {
            RegistryError::NotFound(id) => {
                Self::new(StatusCode::NOT_FOUND, ErrorCode::NotFound, message).with("id", json!(id))
            }
            RegistryError::Forbidden { id, .. } => {
                Self::new(StatusCode::FORBIDDEN, ErrorCode::Forbidden, message).with("id", json!(id))
            }
            RegistryError::AlreadyBound { id, bound_by } => {
                Self::new(StatusCode::CONFLICT, ErrorCode::AlreadyBound, message)
                    .with("id", json!(id))
                    .with("boundBy", json!(bound_by))
            }
            RegistryError::Unbound(id) => {
                Self::new(StatusCode::CONFLICT, ErrorCode::Unbound, message).with("id", json!(id))
            }
            RegistryError::UnknownLocation(key) => {
                Self::new(StatusCode::NOT_FOUND, ErrorCode::UnknownLocation, message)
                    .with("location", json!(key))
            }
            RegistryError::NoPathFound { from, to } => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::NoPathFound,
                message,
            )
            .with("from", json!(from))
            .with("to", json!(to)),
            RegistryError::NoWalkableTileFound => Self::new(
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorCode::NoWalkableTileFound,
                message,
            ),
            RegistryError::MapUnavailable => Self::new(
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorCode::MapUnavailable,
                message,
            ),
            RegistryError::Storage(err) => {
                tracing::error!(error = %format!("{err:#}"), "snapshot store failure");
                Self::internal("snapshot store unavailable")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            ok: false,
            error: self.code,
            message: self.message,
            detail: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<Json<T>, ApiError>;
