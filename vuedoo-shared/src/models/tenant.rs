/// Tenant model and database operations
///
/// A tenant is a domain (or subdomain) pointed at this service. Tenants are
/// never created explicitly: the first request carrying an unseen domain
/// provisions one, and the id is used to scope new users.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE tenants (
///     id BIGSERIAL PRIMARY KEY,
///     domain VARCHAR(255) NOT NULL,
///     subdomain VARCHAR(255) NOT NULL,
///     status SMALLINT NOT NULL DEFAULT 1,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// CREATE UNIQUE INDEX tenants_active_domain_key ON tenants (domain) WHERE status = 1;
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tracing::info;

use super::status;

/// Tenant row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tenant {
    pub id: i64,

    /// Domain the tenant was provisioned for
    pub domain: String,

    /// Alternative host name that resolves to the same tenant
    pub subdomain: String,

    /// 1 = active, 0 = inactive
    pub status: i16,

    #[serde(with = "super::rfc3339")]
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    /// Finds the active tenant whose domain or subdomain equals `host`
    pub async fn find_active(pool: &PgPool, host: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Tenant>(
            r#"
            SELECT id, domain, subdomain, status, created_at
            FROM tenants
            WHERE (domain = $1 OR subdomain = $1) AND status = $2
            ORDER BY id
            LIMIT 1
            "#,
        )
        .bind(host)
        .bind(status::LIVE)
        .fetch_optional(pool)
        .await
    }

    /// Returns the id of the active tenant for `host`, provisioning it if needed
    ///
    /// Provisioning is a single `INSERT ... ON CONFLICT` against the partial
    /// unique index on active domains, so two first requests racing for the
    /// same domain resolve to the same row.
    pub async fn resolve_or_provision(pool: &PgPool, host: &str) -> Result<i64, sqlx::Error> {
        if let Some(tenant) = Self::find_active(pool, host).await? {
            return Ok(tenant.id);
        }

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO tenants (domain, subdomain, status)
            VALUES ($1, $1, $2)
            ON CONFLICT (domain) WHERE status = 1
            DO UPDATE SET domain = EXCLUDED.domain
            RETURNING id
            "#,
        )
        .bind(host)
        .bind(status::LIVE)
        .fetch_one(pool)
        .await?;

        info!(tenant_id = id, domain = host, "Provisioned tenant");
        Ok(id)
    }
}
