/// Per-block privileges stored as metas
///
/// A privilege is a meta on the block itself: owner kind is the block's type,
/// owner id is the block id, the key is `privilege_<user id>` and the value is
/// the JSON list of capability tags granted to that user.
///
/// # Permission Model
///
/// 1. **Visibility**: a block is visible to its author and to every user with
///    a live privilege row on it, whatever the row lists.
/// 2. **Mutation**: updating or deleting a block requires authorship or the
///    [`Capability::ADMIN`] capability.
///
/// # Example
///
/// ```no_run
/// use vuedoo_shared::auth::privilege::{Capability, Privileges};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// Privileges::grant(&pool, "workspace", 42, 7, &[Capability::admin()]).await?;
/// assert!(Privileges::has(&pool, "workspace", 42, 7, &Capability::admin()).await?);
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeSet;
use std::fmt;

use crate::models::block::Block;
use crate::models::meta::{decode_value, Meta, MetaError, MetaOwner};

/// Key prefix of privilege metas
pub const PRIVILEGE_KEY_PREFIX: &str = "privilege_";

/// Error type for privilege checks
#[derive(Debug, thiserror::Error)]
pub enum PrivilegeError {
    /// Caller may see the block but not change it
    #[error("Missing capability {0} on block {1}")]
    MissingCapability(Capability, i64),

    #[error(transparent)]
    Meta(#[from] MetaError),
}

impl From<sqlx::Error> for PrivilegeError {
    fn from(err: sqlx::Error) -> Self {
        PrivilegeError::Meta(MetaError::Database(err))
    }
}

/// Capability tag granted on a block
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Capability(String);

impl Capability {
    pub const ADMIN: &'static str = "admin";

    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn admin() -> Self {
        Self::new(Self::ADMIN)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Meta key holding one user's privileges, `privilege_<user id>`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PrivilegeKey(i64);

impl PrivilegeKey {
    pub fn for_user(user_id: i64) -> Self {
        Self(user_id)
    }

    pub fn user_id(&self) -> i64 {
        self.0
    }

    /// Parses a meta key; anything but `privilege_<integer>` is rejected
    pub fn parse(key: &str) -> Option<Self> {
        let digits = key.strip_prefix(PRIVILEGE_KEY_PREFIX)?;
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        digits.parse().ok().map(Self)
    }
}

impl fmt::Display for PrivilegeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", PRIVILEGE_KEY_PREFIX, self.0)
    }
}

/// One user's grant on a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grant {
    pub user_id: i64,
    pub capabilities: BTreeSet<Capability>,
}

/// Stateless accessor for privilege metas
pub struct Privileges;

impl Privileges {
    /// Grants `capabilities` to `user_id` on a block, replacing any earlier grant
    pub async fn grant(
        pool: &PgPool,
        block_kind: &str,
        block_id: i64,
        user_id: i64,
        capabilities: &[Capability],
    ) -> Result<(), PrivilegeError> {
        let set: BTreeSet<&Capability> = capabilities.iter().collect();
        let owner = MetaOwner::new(block_kind, block_id);
        Meta::put(pool, &owner, &PrivilegeKey::for_user(user_id).to_string(), &set).await?;

        tracing::debug!(block_kind, block_id, user_id, "Granted privileges");
        Ok(())
    }

    /// Removes a user's grant; the block becomes invisible to them unless authored
    pub async fn revoke(pool: &PgPool, block_kind: &str, block_id: i64, user_id: i64) -> Result<bool, PrivilegeError> {
        let owner = MetaOwner::new(block_kind, block_id);
        let removed = Meta::remove(pool, &owner, &PrivilegeKey::for_user(user_id).to_string()).await?;
        Ok(removed)
    }

    /// Capabilities granted to `user_id`, or `None` if there is no grant at all
    pub async fn capabilities(
        pool: &PgPool,
        block_kind: &str,
        block_id: i64,
        user_id: i64,
    ) -> Result<Option<BTreeSet<Capability>>, PrivilegeError> {
        let owner = MetaOwner::new(block_kind, block_id);
        let caps = Meta::get_json(pool, &owner, &PrivilegeKey::for_user(user_id).to_string()).await?;
        Ok(caps)
    }

    /// True if the user's grant lists `capability`
    pub async fn has(
        pool: &PgPool,
        block_kind: &str,
        block_id: i64,
        user_id: i64,
        capability: &Capability,
    ) -> Result<bool, PrivilegeError> {
        let caps = Self::capabilities(pool, block_kind, block_id, user_id).await?;
        Ok(caps.map_or(false, |set| set.contains(capability)))
    }

    /// Every live grant on a block, ordered by user id
    pub async fn list_grants(pool: &PgPool, block_kind: &str, block_id: i64) -> Result<Vec<Grant>, PrivilegeError> {
        let owner = MetaOwner::new(block_kind, block_id);
        let rows = Meta::get_prefixed(pool, &owner, PRIVILEGE_KEY_PREFIX).await?;

        let mut grants = Vec::with_capacity(rows.len());
        for (key, value) in rows {
            let Some(privilege) = PrivilegeKey::parse(&key) else {
                continue;
            };
            let capabilities = decode_value(&value).map_err(MetaError::from)?;
            grants.push(Grant {
                user_id: privilege.user_id(),
                capabilities,
            });
        }

        grants.sort_by_key(|g| g.user_id);
        Ok(grants)
    }

    /// Succeeds if `user_id` authored the block or holds `capability` on it
    pub async fn require(
        pool: &PgPool,
        block: &Block,
        user_id: i64,
        capability: &Capability,
    ) -> Result<(), PrivilegeError> {
        if user_id != 0 && block.author == user_id {
            return Ok(());
        }

        if Self::has(pool, &block.kind, block.id, user_id, capability).await? {
            return Ok(());
        }

        Err(PrivilegeError::MissingCapability(capability.clone(), block.id))
    }
}
