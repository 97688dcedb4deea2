/// Passwordless login
///
/// # Flow
///
/// 1. [`login`] identifies the user by email, creating the account on first
///    sight with a hashed random placeholder password and a fresh access key.
/// 2. A request carrying a federated identity assertion (`aud` and `azp`)
///    gets the existing access key back at once. Checking the assertion is
///    done upstream.
/// 3. Otherwise a 6-digit code is drawn, stored on the user as a pending
///    verification (`validation_key` meta holding the code's SHA-256 and the
///    issue time) and mailed. The response carries an empty access key.
/// 4. [`verify`] takes the code back, matches it exactly against fresh
///    pending verifications, consumes the match and returns the user's
///    access key.
///
/// Codes and access keys never reach the log.

use chrono::{DateTime, Utc};
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::time::Duration;

use crate::auth::access::AccessContext;
use crate::auth::password::{hash_password, PasswordError};
use crate::ids::{generate_access_key, generate_numeric_code, hash_code, VERIFICATION_CODE_DIGITS};
use crate::mail::{templates::verification_email, MailError, Mailer};
use crate::models::meta::{Meta, MetaError, MetaOwner};
use crate::models::user::{normalize_email, CreateUser, User};

/// Meta key of a user's pending verification
pub const VALIDATION_KEY: &str = "validation_key";

/// Error type for the login flow
#[derive(Debug, thiserror::Error)]
pub enum LoginError {
    #[error("Invalid email address")]
    InvalidEmail,

    /// No fresh pending verification matches the submitted code
    #[error("Invalid or expired verification code")]
    InvalidCode,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Meta(#[from] MetaError),

    #[error("Failed to send verification email: {0}")]
    Mail(#[from] MailError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Tunables of the flow
#[derive(Debug, Clone)]
pub struct LoginSettings {
    /// How long an issued code stays valid
    pub code_ttl: Duration,

    /// Signature at the bottom of verification emails
    pub sender_name: String,
}

impl Default for LoginSettings {
    fn default() -> Self {
        Self {
            code_ttl: Duration::from_secs(900),
            sender_name: "The Vuedoo Team".to_string(),
        }
    }
}

/// Login input
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoginRequest {
    pub email: String,

    /// Audience of a federated identity assertion
    #[serde(default)]
    pub aud: Option<serde_json::Value>,

    /// Authorized party of a federated identity assertion
    #[serde(default)]
    pub azp: Option<serde_json::Value>,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            ..Self::default()
        }
    }

    /// True when both assertion fields are present and not null
    pub fn is_federated(&self) -> bool {
        let present = |v: &Option<serde_json::Value>| matches!(v, Some(value) if !value.is_null());
        present(&self.aud) && present(&self.azp)
    }
}

/// Result of [`login`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginOutcome {
    pub user_id: i64,
    pub email: String,

    /// Empty unless the request was federated
    pub access_key: String,

    /// Whether the account was created by this call
    pub created: bool,
}

/// Result of a successful [`verify`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verified {
    pub user_id: i64,
    pub email: String,
    pub access_key: String,
}

/// Pending verification stored under [`VALIDATION_KEY`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingVerification {
    #[serde(with = "crate::models::rfc3339")]
    pub timestamp: DateTime<Utc>,

    /// SHA-256 hex of the code
    pub code_hash: String,
}

impl PendingVerification {
    pub fn issue(code: &str, now: DateTime<Utc>) -> Self {
        Self {
            timestamp: now,
            code_hash: hash_code(code),
        }
    }

    /// True while `now` is within `ttl` of the issue time
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match now.signed_duration_since(self.timestamp).to_std() {
            Ok(age) => age <= ttl,
            // Issued slightly in the future: clock skew between replicas
            Err(_) => true,
        }
    }

    /// Exact comparison against a submitted code
    pub fn matches(&self, code: &str) -> bool {
        self.code_hash == hash_code(code)
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.') && !domain.starts_with('.'),
        None => false,
    }
}

/// Starts a login for `request.email`
pub async fn login<R: Rng + CryptoRng>(
    pool: &PgPool,
    mailer: &dyn Mailer,
    rng: &mut R,
    settings: &LoginSettings,
    ctx: AccessContext,
    request: LoginRequest,
) -> Result<LoginOutcome, LoginError> {
    let email = normalize_email(&request.email);
    if !looks_like_email(&email) {
        return Err(LoginError::InvalidEmail);
    }

    let (user, created) = match User::find_by_email(pool, &email).await? {
        Some(user) => (user, false),
        None => {
            let placeholder = generate_numeric_code(rng, VERIFICATION_CODE_DIGITS);
            let data = CreateUser {
                email: email.clone(),
                password_hash: hash_password(&placeholder)?,
                access_key: generate_access_key(rng),
                tenant_id: ctx.tenant_id,
            };
            User::find_or_create(pool, data).await?
        }
    };

    if created {
        tracing::info!(user_id = user.id, tenant_id = ctx.tenant_id, "Created user on first login");
    }

    if request.is_federated() {
        tracing::info!(user_id = user.id, "Federated login");
        return Ok(LoginOutcome {
            user_id: user.id,
            email: user.email,
            access_key: user.access_key,
            created,
        });
    }

    let code = generate_numeric_code(rng, VERIFICATION_CODE_DIGITS);
    let pending = PendingVerification::issue(&code, Utc::now());
    Meta::put(pool, &MetaOwner::user(user.id), VALIDATION_KEY, &pending).await?;

    mailer
        .send(verification_email(&user.email, &code, &settings.sender_name))
        .await?;

    tracing::info!(user_id = user.id, "Verification code sent");

    Ok(LoginOutcome {
        user_id: user.id,
        email: user.email,
        access_key: String::new(),
        created,
    })
}

/// Consumes a verification code and returns the owner's access key
///
/// When `email` is given only that user's pending verification is
/// considered. Of two concurrent calls with one code, one succeeds.
pub async fn verify(
    pool: &PgPool,
    settings: &LoginSettings,
    code: &str,
    email: Option<&str>,
) -> Result<Verified, LoginError> {
    let code = code.trim();
    if code.len() != VERIFICATION_CODE_DIGITS || !code.bytes().all(|b| b.is_ascii_digit()) {
        return Err(LoginError::InvalidCode);
    }

    let owner_id = match email.map(str::trim).filter(|e| !e.is_empty()) {
        Some(email) => match User::find_by_email(pool, email).await? {
            Some(user) => Some(user.id),
            None => return Err(LoginError::InvalidCode),
        },
        None => None,
    };

    let candidates =
        Meta::find_by_json_field(pool, "user", VALIDATION_KEY, "code_hash", &hash_code(code), owner_id).await?;

    let now = Utc::now();
    let newest = candidates
        .into_iter()
        .filter_map(|(user_id, raw)| {
            let pending: PendingVerification = serde_json::from_str(&raw).ok()?;
            (pending.matches(code) && pending.is_fresh(now, settings.code_ttl)).then_some((user_id, raw, pending))
        })
        .max_by_key(|(_, _, pending)| pending.timestamp);

    let Some((user_id, raw, _)) = newest else {
        return Err(LoginError::InvalidCode);
    };

    if !Meta::remove_if_value(pool, &MetaOwner::user(user_id), VALIDATION_KEY, &raw).await? {
        tracing::debug!(user_id, "Verification code consumed concurrently");
        return Err(LoginError::InvalidCode);
    }

    let user = User::find_by_id(pool, user_id)
        .await?
        .ok_or(LoginError::InvalidCode)?;

    tracing::info!(user_id, "Verified login");

    Ok(Verified {
        user_id: user.id,
        email: user.email,
        access_key: user.access_key,
    })
}
