use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use nestly_core::booking::CONFLICT_MESSAGE;
use nestly_core::{BookingConflict, CoreError, FieldErrors};
use serde::Serialize;

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(FieldErrors),
    NotFoundError(String),
    ConflictError {
        message: String,
        errors: Option<FieldErrors>,
    },
    BookingConflict(BookingConflict),
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl AppError {
    pub fn forbidden() -> Self {
        AppError::AuthorizationError("Forbidden".to_string())
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, msg, None),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, msg, None),
            AppError::ValidationError(errors) => {
                (StatusCode::BAD_REQUEST, "Bad Request".to_string(), Some(errors))
            }
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, msg, None),
            AppError::ConflictError { message, errors } => (StatusCode::CONFLICT, message, errors),
            AppError::BookingConflict(conflict) => (
                StatusCode::FORBIDDEN,
                CONFLICT_MESSAGE.to_string(),
                Some(conflict.errors()),
            ),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), None)
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string(), None)
            }
        };

        (status, Json(ErrorBody { message, errors })).into_response()
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(errors) => AppError::ValidationError(errors),
            CoreError::BookingConflict(conflict) => AppError::BookingConflict(conflict),
            CoreError::NotFound(msg) => AppError::NotFoundError(msg),
            CoreError::AlreadyExists { field, .. } => AppError::ConflictError {
                message: "User already exists".to_string(),
                errors: Some(FieldErrors::single(
                    field,
                    format!("User with that {field} already exists"),
                )),
            },
            CoreError::Contention(msg) => AppError::ConflictError {
                message: msg,
                errors: None,
            },
            CoreError::Internal(msg) => AppError::InternalServerError(msg),
        }
    }
}

impl From<FieldErrors> for AppError {
    fn from(errors: FieldErrors) -> Self {
        AppError::ValidationError(errors)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Anyhow(err)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::ValidationError(FieldErrors::single("body", rejection.body_text()))
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        match rejection {
            PathRejection::FailedToDeserializePathParams(err) => {
                AppError::ValidationError(FieldErrors::single("path", err.kind().to_string()))
            }
            other => AppError::InternalServerError(other.body_text()),
        }
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::ValidationError(FieldErrors::single("query", rejection.body_text()))
    }
}
