/// Request-scoped access context
///
/// Every API request carries two optional headers: the domain it was made
/// for and an opaque access key. [`resolve`] maps them to an
/// [`AccessContext`] of `(tenant_id, user_id)`, provisioning the tenant on
/// first sight. An id of 0 means "none": no tenant scoping, or anonymous.
///
/// An empty access key is anonymous access. A non-empty key that matches no
/// user is an authentication failure, never silently anonymous.
///
/// # Example
///
/// ```no_run
/// use vuedoo_shared::auth::access::{resolve, AccessError};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), AccessError> {
/// let ctx = resolve(&pool, "shop.example.com", "").await?;
/// assert!(ctx.is_anonymous());
/// assert!(ctx.tenant_id > 0);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::ids::parse_access_key;
use crate::models::tenant::Tenant;
use crate::models::user::User;

/// Header naming the tenant domain
pub const DOMAIN_HEADER: &str = "x-vuedoo-domain";

/// Header carrying the access key
pub const ACCESS_KEY_HEADER: &str = "x-vuedoo-access-key";

/// Resolved identity of one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessContext {
    /// Tenant the request was made for (0 = none)
    pub tenant_id: i64,

    /// Authenticated user (0 = anonymous)
    pub user_id: i64,
}

impl AccessContext {
    pub fn anonymous(tenant_id: i64) -> Self {
        Self { tenant_id, user_id: 0 }
    }

    pub fn is_anonymous(&self) -> bool {
        self.user_id == 0
    }
}

/// Error type for access resolution
#[derive(Debug, thiserror::Error)]
pub enum AccessError {
    /// A non-empty access key matched no user
    #[error("Unknown access key")]
    UnknownToken,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Resolves the domain and access key of a request
pub async fn resolve(pool: &PgPool, domain: &str, access_key: &str) -> Result<AccessContext, AccessError> {
    let domain = domain.trim();
    let tenant_id = if domain.is_empty() {
        0
    } else {
        Tenant::resolve_or_provision(pool, &domain.to_lowercase()).await?
    };

    let access_key = access_key.trim();
    if access_key.is_empty() {
        return Ok(AccessContext::anonymous(tenant_id));
    }

    // Keys are UUIDs; anything else cannot match a row
    let key = parse_access_key(access_key).ok_or(AccessError::UnknownToken)?;

    let user = User::find_by_access_key(pool, &key.to_string())
        .await?
        .ok_or(AccessError::UnknownToken)?;

    tracing::debug!(tenant_id, user_id = user.id, "Resolved access context");

    Ok(AccessContext {
        tenant_id,
        user_id: user.id,
    })
}
