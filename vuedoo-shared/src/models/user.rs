/// User model and database operations
///
/// Accounts are passwordless: a user row is created the first time an email
/// tries to log in, with a hashed placeholder password and an opaque access
/// key. The access key is the only credential a client ever holds.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE users (
///     id BIGSERIAL PRIMARY KEY,
///     email VARCHAR(255) NOT NULL UNIQUE,
///     password_hash VARCHAR(255) NOT NULL,
///     access_key VARCHAR(64) NOT NULL UNIQUE,
///     tenant_id BIGINT NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// User account
///
/// `password_hash` and `access_key` are never serialized.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,

    /// Email address, stored lowercase
    pub email: String,

    /// Argon2id hash of the placeholder password
    #[serde(skip_serializing, default)]
    pub password_hash: String,

    /// Opaque bearer credential
    #[serde(skip_serializing, default)]
    pub access_key: String,

    /// Tenant the account was created under (0 = none)
    pub tenant_id: i64,

    #[serde(with = "super::rfc3339")]
    pub created_at: DateTime<Utc>,
}

/// Input for creating a user
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub email: String,
    pub password_hash: String,
    pub access_key: String,
    pub tenant_id: i64,
}

/// Normalizes an email for storage and lookup
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl User {
    /// Returns the user for `data.email`, creating it if absent
    ///
    /// The boolean is true when this call inserted the row. Creation is an
    /// `INSERT ... ON CONFLICT DO NOTHING` on the unique email, so concurrent
    /// first logins for one email yield one account.
    pub async fn find_or_create(pool: &PgPool, data: CreateUser) -> Result<(Self, bool), sqlx::Error> {
        let email = normalize_email(&data.email);

        let inserted = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, access_key, tenant_id)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (email) DO NOTHING
            RETURNING id, email, password_hash, access_key, tenant_id, created_at
            "#,
        )
        .bind(&email)
        .bind(&data.password_hash)
        .bind(&data.access_key)
        .bind(data.tenant_id)
        .fetch_optional(pool)
        .await?;

        if let Some(user) = inserted {
            return Ok((user, true));
        }

        let existing = Self::find_by_email(pool, &email)
            .await?
            .ok_or(sqlx::Error::RowNotFound)?;

        Ok((existing, false))
    }

    /// Finds a user by ID
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, access_key, tenant_id, created_at
            FROM users
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Finds a user by email (normalized before lookup)
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, access_key, tenant_id, created_at
            FROM users
            WHERE email = $1
            "#,
        )
        .bind(normalize_email(email))
        .fetch_optional(pool)
        .await
    }

    /// Finds the user holding `access_key`
    pub async fn find_by_access_key(pool: &PgPool, access_key: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"
            SELECT id, email, password_hash, access_key, tenant_id, created_at
            FROM users
            WHERE access_key = $1
            "#,
        )
        .bind(access_key)
        .fetch_optional(pool)
        .await
    }
}
