/// Block store: generic typed records
///
/// A block is any record the product needs (a workspace, a thread, ...),
/// told apart by its `type` column. Every block has a globally unique slug
/// and may hang under a parent block. Deletion is soft: `status` flips to 0
/// and the row disappears from every read.
///
/// Reads are privilege-aware: a viewer sees a block they authored, or one
/// carrying a privilege meta for them (see [`crate::auth::privilege`]).
///
/// # Schema
///
/// ```sql
/// CREATE TABLE blocks (
///     id BIGSERIAL PRIMARY KEY,
///     type VARCHAR(64) NOT NULL,
///     title TEXT NOT NULL DEFAULT '',
///     content TEXT NOT NULL DEFAULT '',
///     author BIGINT NOT NULL,
///     slug VARCHAR(64) NOT NULL UNIQUE,
///     parent BIGINT REFERENCES blocks (id),
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     modified_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     status SMALLINT NOT NULL DEFAULT 1
/// );
/// ```

use chrono::{DateTime, Utc};
use rand::{CryptoRng, Rng};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use std::collections::BTreeMap;

use super::meta::{Meta, MetaOwner};
use super::query::{BlockFilter, BlockQuery, Page};
use super::status;
use crate::ids::{generate_slug, is_valid_slug};

/// Attempts at drawing a fresh slug before giving up
const SLUG_ATTEMPTS: usize = 3;

/// Block kinds the service itself works with
pub mod kinds {
    pub const WORKSPACE: &str = "workspace";

    /// Child of a workspace
    pub const THREAD: &str = "thread";
}

const RETURNING_COLUMNS: &str =
    "id, type, title, content, author, slug, parent, created_at, modified_at, status";

/// A stored block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Block {
    pub id: i64,

    /// Type tag, e.g. `"workspace"` or `"thread"`
    #[serde(rename = "type")]
    #[sqlx(rename = "type")]
    pub kind: String,

    pub title: String,

    /// Opaque payload (text or JSON)
    pub content: String,

    /// User id of the creator
    pub author: i64,

    pub slug: String,

    pub parent: Option<i64>,

    #[serde(with = "super::rfc3339")]
    pub created_at: DateTime<Utc>,

    #[serde(with = "super::rfc3339")]
    pub modified_at: DateTime<Utc>,

    pub status: i16,
}

impl Block {
    pub fn is_live(&self) -> bool {
        self.status == status::LIVE
    }
}

/// Input for [`Block::create`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBlock {
    pub author: i64,
    pub kind: String,
    pub title: String,
    pub content: String,
    pub parent: Option<i64>,

    /// Existing slug to upsert on; `None` or empty draws a fresh one
    pub slug: Option<String>,
}

impl NewBlock {
    pub fn new(author: i64, kind: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            author,
            kind: kind.into(),
            title: title.into(),
            content: String::new(),
            parent: None,
            slug: None,
        }
    }

    pub fn content(mut self, content: impl Into<String>) -> Self {
        self.content = content.into();
        self
    }

    pub fn parent(mut self, parent: i64) -> Self {
        self.parent = (parent > 0).then_some(parent);
        self
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        let slug = slug.into();
        self.slug = (!slug.is_empty()).then_some(slug);
        self
    }
}

/// Error type for block writes
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    /// The slug belongs to a soft-deleted block
    #[error("Slug {0} is taken by a deleted block")]
    SlugConflict(String),

    #[error("Could not draw an unused slug")]
    SlugExhausted,

    #[error("Invalid slug: {0}")]
    InvalidSlug(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Filters for [`Block::get`]; every supplied field is ANDed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockLookup {
    /// User the read is made for (0 = anonymous)
    pub viewer: i64,
    pub kind: Option<String>,
    pub id: Option<i64>,
    pub slug: Option<String>,
    pub parent: Option<i64>,

    /// Type of the children to load with the block; none loaded when unset
    pub child_kind: Option<String>,
}

impl BlockLookup {
    pub fn for_viewer(viewer: i64) -> Self {
        Self {
            viewer,
            ..Self::default()
        }
    }

    pub fn kind(mut self, kind: impl Into<String>) -> Self {
        self.kind = Some(kind.into());
        self
    }

    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn slug(mut self, slug: impl Into<String>) -> Self {
        self.slug = Some(slug.into());
        self
    }

    pub fn parent(mut self, parent: i64) -> Self {
        self.parent = Some(parent);
        self
    }

    pub fn with_children(mut self, child_kind: impl Into<String>) -> Self {
        self.child_kind = Some(child_kind.into());
        self
    }

    fn query(&self) -> BlockQuery {
        BlockQuery::new()
            .filter(BlockFilter::VisibleTo(self.viewer))
            .filter_opt(self.kind.clone(), BlockFilter::Kind)
            .filter_opt(self.id, BlockFilter::Id)
            .filter_opt(self.slug.clone(), BlockFilter::Slug)
            .filter_opt(self.parent, BlockFilter::Parent)
    }
}

/// A block with its visible children and its metas
#[derive(Debug, Clone, Serialize)]
pub struct BlockDetail {
    #[serde(flatten)]
    pub block: Block,
    pub children: Vec<Block>,
    pub metas: BTreeMap<String, String>,
}

impl Block {
    /// Creates a block, or updates the live block already holding the slug
    ///
    /// On an existing live slug only title, content and `modified_at` change.
    /// A slug held by a soft-deleted block is a [`BlockError::SlugConflict`].
    pub async fn create<R: Rng + CryptoRng>(
        pool: &PgPool,
        rng: &mut R,
        data: NewBlock,
    ) -> Result<Self, BlockError> {
        if let Some(slug) = data.slug.as_deref() {
            if !is_valid_slug(slug) {
                return Err(BlockError::InvalidSlug(slug.to_string()));
            }

            let slug = slug.to_string();
            let upserted = Self::upsert(pool, &data, &slug).await?;
            return upserted.ok_or(BlockError::SlugConflict(slug));
        }

        // A drawn slug must never land on somebody else's block
        for _ in 0..SLUG_ATTEMPTS {
            let slug = generate_slug(rng);
            if let Some(block) = Self::insert_fresh(pool, &data, &slug).await? {
                tracing::debug!(block_id = block.id, kind = %block.kind, "Created block");
                return Ok(block);
            }
            tracing::warn!(slug = %slug, "Generated slug already taken, drawing again");
        }

        Err(BlockError::SlugExhausted)
    }

    async fn upsert(pool: &PgPool, data: &NewBlock, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO blocks (type, title, content, author, slug, parent, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (slug) DO UPDATE
                SET title = EXCLUDED.title,
                    content = EXCLUDED.content,
                    modified_at = NOW()
                WHERE blocks.status = $7
            RETURNING {}
            "#,
            RETURNING_COLUMNS
        );

        sqlx::query_as::<_, Block>(&sql)
            .bind(&data.kind)
            .bind(&data.title)
            .bind(&data.content)
            .bind(data.author)
            .bind(slug)
            .bind(data.parent)
            .bind(status::LIVE)
            .fetch_optional(pool)
            .await
    }

    async fn insert_fresh(pool: &PgPool, data: &NewBlock, slug: &str) -> Result<Option<Self>, sqlx::Error> {
        let sql = format!(
            r#"
            INSERT INTO blocks (type, title, content, author, slug, parent, status)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (slug) DO NOTHING
            RETURNING {}
            "#,
            RETURNING_COLUMNS
        );

        sqlx::query_as::<_, Block>(&sql)
            .bind(&data.kind)
            .bind(&data.title)
            .bind(&data.content)
            .bind(data.author)
            .bind(slug)
            .bind(data.parent)
            .bind(status::LIVE)
            .fetch_optional(pool)
            .await
    }

    /// Finds one visible live block, with children and metas
    pub async fn get(pool: &PgPool, lookup: BlockLookup) -> Result<Option<BlockDetail>, sqlx::Error> {
        let Some(block) = Self::find(pool, &lookup).await? else {
            return Ok(None);
        };

        let children = match lookup.child_kind {
            Some(child_kind) => {
                let mut qb = BlockQuery::new()
                    .filter(BlockFilter::Kind(child_kind))
                    .filter(BlockFilter::Parent(block.id))
                    .filter(BlockFilter::VisibleTo(lookup.viewer))
                    .build();
                qb.build_query_as::<Block>().fetch_all(pool).await?
            }
            None => Vec::new(),
        };

        let metas = Meta::get_many(pool, &MetaOwner::new(block.kind.clone(), block.id), &[]).await?;

        Ok(Some(BlockDetail {
            block,
            children,
            metas,
        }))
    }

    /// Finds one visible live block matching `lookup`, without enrichment
    pub async fn find(pool: &PgPool, lookup: &BlockLookup) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = lookup.query().page(Page::new(1, 1)).build();
        qb.build_query_as::<Block>().fetch_optional(pool).await
    }

    /// Finds a visible live block of `kind` by slug
    pub async fn find_by_slug(
        pool: &PgPool,
        viewer: i64,
        kind: &str,
        slug: &str,
    ) -> Result<Option<Self>, sqlx::Error> {
        Self::find(pool, &BlockLookup::for_viewer(viewer).kind(kind).slug(slug)).await
    }

    /// Finds a live block by id, ignoring visibility
    pub async fn find_by_id(pool: &PgPool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        let mut qb = BlockQuery::new().filter(BlockFilter::Id(id)).build();
        qb.build_query_as::<Block>().fetch_optional(pool).await
    }

    /// Lists visible live blocks of `kind`, newest first
    pub async fn list(
        pool: &PgPool,
        viewer: i64,
        kind: &str,
        page: Page,
        parent: Option<i64>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut qb = BlockQuery::new()
            .filter(BlockFilter::VisibleTo(viewer))
            .filter(BlockFilter::Kind(kind.to_string()))
            .filter_opt(parent, BlockFilter::Parent)
            .page(page)
            .build();

        qb.build_query_as::<Block>().fetch_all(pool).await
    }

    /// Soft-deletes a block; children and metas are left as they are
    ///
    /// Returns false if no live block had this id.
    pub async fn delete(pool: &PgPool, id: i64) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            r#"
            UPDATE blocks SET status = $2, modified_at = NOW()
            WHERE id = $1 AND status = $3
            "#,
        )
        .bind(id)
        .bind(status::DELETED)
        .bind(status::LIVE)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Counts live `child_kind` blocks under live `parent_kind` blocks authored by `author`
    pub async fn count_children_of_author(
        pool: &PgPool,
        author: i64,
        parent_kind: &str,
        child_kind: &str,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(
            r#"
            SELECT COUNT(c.id)
            FROM blocks c
            INNER JOIN blocks p ON c.parent = p.id
            WHERE c.type = $1 AND c.status = $4
              AND p.type = $2 AND p.status = $4
              AND p.author = $3
            "#,
        )
        .bind(child_kind)
        .bind(parent_kind)
        .bind(author)
        .bind(status::LIVE)
        .fetch_one(pool)
        .await
    }
}
