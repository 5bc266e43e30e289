use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use larder_db::DbError;
use larder_types::api::ErrorResponse;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{message}")]
    Validation { field: &'static str, message: String },

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    AlreadyExists(&'static str),

    #[error("you do not have permission to perform this action")]
    PermissionDenied,

    #[error("{0}")]
    SelfReference(&'static str),

    #[error("authentication credentials were not provided or are invalid")]
    Unauthorized,

    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        ApiError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "validation_error",
            ApiError::NotFound(_) => "not_found",
            ApiError::AlreadyExists(_) => "already_exists",
            ApiError::PermissionDenied => "permission_denied",
            ApiError::SelfReference(_) => "self_reference",
            ApiError::Unauthorized => "unauthorized",
            ApiError::Internal => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::SelfReference(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyExists(_) => StatusCode::CONFLICT,
            ApiError::PermissionDenied => StatusCode::FORBIDDEN,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let field = match &self {
            ApiError::Validation { field, .. } => Some(field.to_string()),
            _ => None,
        };
        let body = ErrorResponse {
            kind: self.kind().to_string(),
            message: self.to_string(),
            field,
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Constraint failures that reach this far without a more specific mapping
/// are still reported as duplicates, never as raw storage errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict => ApiError::AlreadyExists("record already exists"),
            DbError::MissingReference(field) => {
                ApiError::validation(field, "references an id that does not exist")
            }
            other => {
                error!("Store failure: {}", other);
                ApiError::Internal
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflicts_become_already_exists() {
        let err = ApiError::from(DbError::Conflict);
        assert_eq!(err.kind(), "already_exists");
        assert_eq!(err.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn missing_references_name_the_field() {
        match ApiError::from(DbError::MissingReference("tags")) {
            ApiError::Validation { field, .. } => assert_eq!(field, "tags"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn other_store_errors_do_not_leak() {
        let err = ApiError::from(DbError::LockPoisoned);
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "internal server error");
    }
}
