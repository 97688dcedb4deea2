/// Error handling for the API server
///
/// Handlers return `ApiResult<T>`; an `ApiError` renders as
///
/// ```json
/// { "status": "fail", "error": "unauthorized", "message": "Unknown access key" }
/// ```
///
/// with a matching HTTP status. Validation failures add a `details` list.
/// Store and mail failures are logged here and reach the client only as a
/// generic `internal_error`.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

use vuedoo_shared::auth::access::AccessError;
use vuedoo_shared::auth::password::PasswordError;
use vuedoo_shared::auth::privilege::PrivilegeError;
use vuedoo_shared::login::LoginError;
use vuedoo_shared::mail::MailError;
use vuedoo_shared::models::block::BlockError;
use vuedoo_shared::models::meta::MetaError;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Unauthorized (401)
    Unauthorized(String),

    /// Forbidden (403)
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. a slug held by a deleted block
    Conflict(String),

    /// Unprocessable entity (422)
    ValidationError(Vec<ValidationErrorDetail>),

    /// Internal server error (500)
    InternalError(String),

    /// Bad gateway (502): the mail provider failed
    MailFailure(String),
}

/// Validation error detail
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationErrorDetail {
    pub field: String,
    pub message: String,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Always `"fail"`
    pub status: String,

    /// Machine readable code, e.g. `"bad_request"`
    pub error: String,

    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
            ApiError::MailFailure(msg) => write!(f, "Mail failure: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::InternalError(msg) => {
                tracing::error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            ApiError::MailFailure(msg) => {
                tracing::error!("Mail failure: {}", msg);
                (
                    StatusCode::BAD_GATEWAY,
                    "mail_failure",
                    "The verification email could not be sent".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            status: "fail".to_string(),
            error: error_code.to_string(),
            message,
            details,
        });

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => ApiError::NotFound("Resource not found".to_string()),
            sqlx::Error::Database(db_err) => {
                if let Some(constraint) = db_err.constraint() {
                    return ApiError::Conflict(format!("Constraint violation: {}", constraint));
                }
                ApiError::InternalError(format!("Database error: {}", db_err))
            }
            _ => ApiError::InternalError(format!("Database error: {}", err)),
        }
    }
}

impl From<MetaError> for ApiError {
    fn from(err: MetaError) -> Self {
        match err {
            MetaError::Database(err) => err.into(),
            MetaError::Encoding(err) => ApiError::InternalError(format!("Meta encoding error: {}", err)),
        }
    }
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::UnknownToken => ApiError::Unauthorized("Unknown access key".to_string()),
            AccessError::Database(err) => err.into(),
        }
    }
}

impl From<BlockError> for ApiError {
    fn from(err: BlockError) -> Self {
        match err {
            BlockError::SlugConflict(slug) => ApiError::Conflict(format!("Slug {} is no longer available", slug)),
            BlockError::SlugExhausted => ApiError::InternalError("Could not draw an unused slug".to_string()),
            BlockError::InvalidSlug(slug) => ApiError::ValidationError(vec![ValidationErrorDetail {
                field: "slug".to_string(),
                message: format!("Invalid slug: {}", slug),
            }]),
            BlockError::Database(err) => err.into(),
        }
    }
}

impl From<PrivilegeError> for ApiError {
    fn from(err: PrivilegeError) -> Self {
        match err {
            PrivilegeError::MissingCapability(capability, _) => {
                ApiError::Forbidden(format!("Missing required capability: {}", capability))
            }
            PrivilegeError::Meta(err) => err.into(),
        }
    }
}

impl From<PasswordError> for ApiError {
    fn from(err: PasswordError) -> Self {
        ApiError::InternalError(format!("Password operation failed: {}", err))
    }
}

impl From<MailError> for ApiError {
    fn from(err: MailError) -> Self {
        ApiError::MailFailure(err.to_string())
    }
}

impl From<LoginError> for ApiError {
    fn from(err: LoginError) -> Self {
        match err {
            LoginError::InvalidEmail => ApiError::ValidationError(vec![ValidationErrorDetail {
                field: "email".to_string(),
                message: "Invalid email format".to_string(),
            }]),
            LoginError::InvalidCode => ApiError::Unauthorized("Invalid or expired verification code".to_string()),
            LoginError::Database(err) => err.into(),
            LoginError::Meta(err) => err.into(),
            LoginError::Mail(err) => err.into(),
            LoginError::Password(err) => err.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let details = errors
            .field_errors()
            .iter()
            .flat_map(|(field, errors)| {
                errors.iter().map(move |error| ValidationErrorDetail {
                    field: field.to_string(),
                    message: error
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| "Validation failed".to_string()),
                })
            })
            .collect();

        ApiError::ValidationError(details)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("Workspace not found".to_string());
        assert_eq!(err.to_string(), "Not found: Workspace not found");
    }

    #[tokio::test]
    async fn test_envelope_carries_fail_status() {
        let (status, body) = body_json(ApiError::Unauthorized("Unknown access key".to_string())).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["status"], "fail");
        assert_eq!(body["error"], "unauthorized");
        assert_eq!(body["message"], "Unknown access key");
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let (status, body) = body_json(ApiError::InternalError("connection reset by peer".to_string())).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "An internal error occurred");
    }

    #[tokio::test]
    async fn test_validation_details() {
        let err = ApiError::ValidationError(vec![ValidationErrorDetail {
            field: "email".to_string(),
            message: "Invalid email format".to_string(),
        }]);
        let (status, body) = body_json(err).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["details"][0]["field"], "email");
    }

    #[test]
    fn test_shared_error_mapping() {
        assert!(matches!(ApiError::from(AccessError::UnknownToken), ApiError::Unauthorized(_)));
        assert!(matches!(
            ApiError::from(BlockError::SlugConflict("abc".to_string())),
            ApiError::Conflict(_)
        ));
        assert!(matches!(ApiError::from(LoginError::InvalidEmail), ApiError::ValidationError(_)));
        assert!(matches!(ApiError::from(sqlx::Error::RowNotFound), ApiError::NotFound(_)));
        assert!(matches!(
            ApiError::from(MailError::Rejected {
                status: 500,
                body: String::new()
            }),
            ApiError::MailFailure(_)
        ));
    }
}
