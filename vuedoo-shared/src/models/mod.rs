/// Database models for Vuedoo
///
/// - `tenant`: domains served by the instance, provisioned on first sight
/// - `user`: passwordless accounts and their access keys
/// - `block`: generic typed records (workspaces, threads, ...)
/// - `meta`: key/value attributes attached to any block or user
/// - `query`: typed predicates used to build block queries
/// - `subscription`: per-user plan summary shown next to workspace lists
///
/// # Example
///
/// ```no_run
/// use vuedoo_shared::models::block::{Block, NewBlock};
/// use sqlx::PgPool;
///
/// # async fn example(pool: PgPool) -> Result<(), Box<dyn std::error::Error>> {
/// let block = Block::create(&pool, &mut rand::thread_rng(), NewBlock::new(1, "workspace", "Launch")).await?;
/// let found = Block::find_by_slug(&pool, 1, "workspace", &block.slug).await?;
/// assert!(found.is_some());
/// # Ok(())
/// # }
/// ```

pub mod block;
pub mod meta;
pub mod query;
pub mod subscription;
pub mod tenant;
pub mod user;

/// Row status shared by tenants, blocks and metas
pub mod status {
    /// Soft-deleted or inactive; excluded from every read
    pub const DELETED: i16 = 0;

    /// Live row
    pub const LIVE: i16 = 1;
}

/// Serializes timestamps as UTC RFC 3339 with second precision
pub(crate) mod rfc3339 {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Secs, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
