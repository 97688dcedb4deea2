/// Passwordless login endpoints
///
/// # Endpoints
///
/// - `POST /api/login` - Start a login; mails a code or, for a federated
///   assertion, returns the access key directly
/// - `POST /api/verify` - Exchange a mailed code for the access key

use crate::{app::AppState, error::ApiResult};
use axum::{extract::rejection::JsonRejection, extract::State, Extension, Json};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use validator::Validate;
use vuedoo_shared::auth::access::AccessContext;
use vuedoo_shared::login::{self, LoginError, LoginRequest};

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginBody {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    /// Federated identity assertion fields
    #[serde(default)]
    pub aud: Option<serde_json::Value>,

    #[serde(default)]
    pub azp: Option<serde_json::Value>,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    /// `success` when a user was identified or created
    pub status: String,

    /// Empty until the code is verified, except for federated logins
    pub access_key: String,
}

/// Verify request
#[derive(Debug, Deserialize, Validate)]
pub struct VerifyBody {
    #[validate(length(min = 1, max = 32, message = "Code is required"))]
    pub code: String,

    /// Restricts the match to this user's pending code
    #[serde(default)]
    pub email: Option<String>,
}

/// Verify response
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyResponse {
    pub status: String,
    pub access_key: String,
    pub email: String,
}

/// Starts a login
///
/// ```text
/// POST /api/login
/// Content-Type: application/json
///
/// { "email": "user@example.com" }
/// ```
///
/// ```json
/// { "status": "success", "access_key": "" }
/// ```
///
/// # Errors
///
/// - `400 Bad Request`: body is not JSON
/// - `422 Unprocessable Entity`: invalid email
/// - `502 Bad Gateway`: the verification email could not be sent
pub async fn login(
    State(state): State<AppState>,
    Extension(ctx): Extension<AccessContext>,
    body: Result<Json<LoginBody>, JsonRejection>,
) -> ApiResult<Json<LoginResponse>> {
    let Json(body) = body?;
    body.validate()?;

    let request = LoginRequest {
        email: body.email,
        aud: body.aud,
        azp: body.azp,
    };

    let outcome = login::login(
        &state.db,
        state.mailer.as_ref(),
        &mut OsRng,
        &state.login,
        ctx,
        request,
    )
    .await?;

    Ok(Json(LoginResponse {
        status: if outcome.user_id > 0 { "success" } else { "fail" }.to_string(),
        access_key: outcome.access_key,
    }))
}

/// Exchanges a verification code for the access key
///
/// ```text
/// POST /api/verify
/// Content-Type: application/json
///
/// { "code": "482913" }
/// ```
///
/// ```json
/// { "status": "success", "access_key": "…", "email": "user@example.com" }
/// ```
///
/// An unknown, expired or already used code answers 200 with
/// `status: "fail"` and empty fields.
pub async fn verify(
    State(state): State<AppState>,
    body: Result<Json<VerifyBody>, JsonRejection>,
) -> ApiResult<Json<VerifyResponse>> {
    let Json(body) = body?;
    body.validate()?;

    match login::verify(&state.db, &state.login, &body.code, body.email.as_deref()).await {
        Ok(verified) => Ok(Json(VerifyResponse {
            status: "success".to_string(),
            access_key: verified.access_key,
            email: verified.email,
        })),
        Err(LoginError::InvalidCode) => Ok(Json(VerifyResponse {
            status: "fail".to_string(),
            access_key: String::new(),
            email: String::new(),
        })),
        Err(err) => Err(err.into()),
    }
}
