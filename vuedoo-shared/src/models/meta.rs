/// Meta store: key/value attributes attached to blocks and users
///
/// A meta is addressed by `(owner_kind, owner_id, key)`. `owner_kind` is a
/// discriminator such as `"user"`, `"workspace"` or `"thread"`, and
/// `owner_id` is the id of the user or block it belongs to.
///
/// Values are text. Strings are stored verbatim; anything else is stored as
/// its JSON serialization, so structured values round-trip through
/// [`Meta::get_json`].
///
/// # Schema
///
/// ```sql
/// CREATE TABLE metas (
///     owner_kind VARCHAR(64) NOT NULL,
///     owner_id BIGINT NOT NULL,
///     meta_key VARCHAR(255) NOT NULL,
///     meta_value TEXT NOT NULL,
///     status SMALLINT NOT NULL DEFAULT 1,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     PRIMARY KEY (owner_kind, owner_id, meta_key)
/// );
/// ```
///
/// # Example
///
/// ```no_run
/// use vuedoo_shared::models::meta::{Meta, MetaOwner};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let owner = MetaOwner::new("workspace", 42);
/// Meta::put(&pool, &owner, "description", &"Quarterly planning").await?;
/// Meta::put(&pool, &owner, "tags", &vec!["q3", "planning"]).await?;
///
/// let tags: Option<Vec<String>> = Meta::get_json(&pool, &owner, "tags").await?;
/// # Ok(())
/// # }
/// ```

use serde::{de::DeserializeOwned, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;

use super::status;

/// The `(owner_kind, owner_id)` pair a meta hangs off
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MetaOwner {
    pub kind: String,
    pub id: i64,
}

impl MetaOwner {
    pub fn new(kind: impl Into<String>, id: i64) -> Self {
        Self {
            kind: kind.into(),
            id,
        }
    }

    /// Owner for a user's own metas
    pub fn user(id: i64) -> Self {
        Self::new("user", id)
    }
}

/// Error raised when a value cannot be encoded or decoded
#[derive(Debug, thiserror::Error)]
pub enum MetaError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Meta value is not valid JSON for the requested type: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Stateless accessor for the `metas` table
pub struct Meta;

/// Encodes a value the way it is stored: strings as-is, everything else as JSON
pub fn encode_value<V: Serialize + ?Sized>(value: &V) -> Result<String, serde_json::Error> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => serde_json::to_string(&other),
    }
}

/// Decodes a stored value into `T`
///
/// A stored plain string that is not itself JSON is retried as a JSON string,
/// so `Meta::get_json::<String>` works for values written from `&str`.
pub fn decode_value<T: DeserializeOwned>(raw: &str) -> Result<T, serde_json::Error> {
    serde_json::from_str(raw).or_else(|err| {
        serde_json::from_value(serde_json::Value::String(raw.to_string())).map_err(|_| err)
    })
}

impl Meta {
    /// Upserts a meta value
    ///
    /// One atomic `INSERT ... ON CONFLICT DO UPDATE`; a soft-deleted row with
    /// the same key is revived.
    pub async fn put<V: Serialize + ?Sized>(
        pool: &PgPool,
        owner: &MetaOwner,
        key: &str,
        value: &V,
    ) -> Result<(), MetaError> {
        let encoded = encode_value(value)?;
        Self::put_raw(pool, owner, key, &encoded).await?;
        Ok(())
    }

    /// Upserts an already encoded value
    pub async fn put_raw(pool: &PgPool, owner: &MetaOwner, key: &str, value: &str) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            INSERT INTO metas (owner_kind, owner_id, meta_key, meta_value, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (owner_kind, owner_id, meta_key)
            DO UPDATE SET meta_value = EXCLUDED.meta_value,
                          status = EXCLUDED.status,
                          updated_at = NOW()
            "#,
        )
        .bind(&owner.kind)
        .bind(owner.id)
        .bind(key)
        .bind(value)
        .bind(status::LIVE)
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Reads a live meta value as stored
    pub async fn get(pool: &PgPool, owner: &MetaOwner, key: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT meta_value FROM metas
            WHERE owner_kind = $1 AND owner_id = $2 AND meta_key = $3 AND status = $4
            "#,
        )
        .bind(&owner.kind)
        .bind(owner.id)
        .bind(key)
        .bind(status::LIVE)
        .fetch_optional(pool)
        .await
    }

    /// Reads a live meta value and decodes it
    pub async fn get_json<T: DeserializeOwned>(
        pool: &PgPool,
        owner: &MetaOwner,
        key: &str,
    ) -> Result<Option<T>, MetaError> {
        match Self::get(pool, owner, key).await? {
            Some(raw) => Ok(Some(decode_value(&raw)?)),
            None => Ok(None),
        }
    }

    /// Reads several live metas; an empty `keys` slice reads all of them
    pub async fn get_many(
        pool: &PgPool,
        owner: &MetaOwner,
        keys: &[&str],
    ) -> Result<BTreeMap<String, String>, sqlx::Error> {
        let rows: Vec<(String, String)> = if keys.is_empty() {
            sqlx::query_as(
                r#"
                SELECT meta_key, meta_value FROM metas
                WHERE owner_kind = $1 AND owner_id = $2 AND status = $3
                "#,
            )
            .bind(&owner.kind)
            .bind(owner.id)
            .bind(status::LIVE)
            .fetch_all(pool)
            .await?
        } else {
            sqlx::query_as(
                r#"
                SELECT meta_key, meta_value FROM metas
                WHERE owner_kind = $1 AND owner_id = $2 AND status = $3
                  AND meta_key = ANY($4)
                "#,
            )
            .bind(&owner.kind)
            .bind(owner.id)
            .bind(status::LIVE)
            .bind(keys.iter().map(|k| k.to_string()).collect::<Vec<_>>())
            .fetch_all(pool)
            .await?
        };

        Ok(rows.into_iter().collect())
    }

    /// Reads live metas of one owner whose key starts with `prefix`
    pub async fn get_prefixed(
        pool: &PgPool,
        owner: &MetaOwner,
        prefix: &str,
    ) -> Result<Vec<(String, String)>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT meta_key, meta_value FROM metas
            WHERE owner_kind = $1 AND owner_id = $2 AND status = $3
              AND starts_with(meta_key, $4)
            ORDER BY meta_key
            "#,
        )
        .bind(&owner.kind)
        .bind(owner.id)
        .bind(status::LIVE)
        .bind(prefix)
        .fetch_all(pool)
        .await
    }

    /// Finds live `key` metas of `owner_kind` whose JSON value has `field` equal to `expected`
    ///
    /// Returns `(owner_id, raw value)` pairs, optionally restricted to one
    /// owner. Only rows under `key` are parsed as JSON.
    pub async fn find_by_json_field(
        pool: &PgPool,
        owner_kind: &str,
        key: &str,
        field: &str,
        expected: &str,
        owner_id: Option<i64>,
    ) -> Result<Vec<(i64, String)>, sqlx::Error> {
        sqlx::query_as(
            r#"
            SELECT owner_id, meta_value FROM metas
            WHERE owner_kind = $1 AND meta_key = $2 AND status = $3
              AND ($6::BIGINT IS NULL OR owner_id = $6)
              AND CASE WHEN meta_key = $2 THEN meta_value::jsonb ->> $4 END = $5
            ORDER BY updated_at DESC
            "#,
        )
        .bind(owner_kind)
        .bind(key)
        .bind(status::LIVE)
        .bind(field)
        .bind(expected)
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    /// Soft-deletes a meta; returns false if there was no live row
    pub async fn remove(pool: &PgPool, owner: &MetaOwner, key: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE metas SET status = $4, updated_at = NOW()
            WHERE owner_kind = $1 AND owner_id = $2 AND meta_key = $3 AND status = $5
            "#,
        )
        .bind(&owner.kind)
        .bind(owner.id)
        .bind(key)
        .bind(status::DELETED)
        .bind(status::LIVE)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Soft-deletes a meta only if it still holds `expected`
    ///
    /// Used to consume one-time values: of two concurrent callers, exactly one
    /// sees `true`.
    pub async fn remove_if_value(
        pool: &PgPool,
        owner: &MetaOwner,
        key: &str,
        expected: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE metas SET status = $5, updated_at = NOW()
            WHERE owner_kind = $1 AND owner_id = $2 AND meta_key = $3
              AND meta_value = $4 AND status = $6
            "#,
        )
        .bind(&owner.kind)
        .bind(owner.id)
        .bind(key)
        .bind(expected)
        .bind(status::DELETED)
        .bind(status::LIVE)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
