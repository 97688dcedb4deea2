/// Typed predicates for block queries
///
/// Block reads combine a variable set of filters (type, id, slug, parent)
/// with the visibility rule and pagination. Filters are values of
/// [`BlockFilter`]; [`BlockQuery`] renders them onto a `sqlx::QueryBuilder`,
/// so column names come from a closed enum and every value is a bind
/// parameter.
///
/// # Example
///
/// ```
/// use vuedoo_shared::models::query::{BlockFilter, BlockQuery, Page};
///
/// let query = BlockQuery::new()
///     .filter(BlockFilter::Kind("workspace".into()))
///     .filter(BlockFilter::VisibleTo(7))
///     .page(Page::new(2, 20));
///
/// let sql = query.build().into_sql();
/// assert!(sql.contains("b.type = $"));
/// assert!(sql.contains("LIMIT $"));
/// ```

use sqlx::{Postgres, QueryBuilder};

use super::status;
use crate::auth::privilege::PrivilegeKey;

/// Columns selected for every block row
pub const BLOCK_COLUMNS: &str =
    "b.id, b.type, b.title, b.content, b.author, b.slug, b.parent, b.created_at, b.modified_at, b.status";

/// One predicate over the `blocks` table (aliased `b`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockFilter {
    /// `b.type = ?`
    Kind(String),

    /// `b.id = ?`
    Id(i64),

    /// `b.slug = ?`
    Slug(String),

    /// `b.parent = ?`
    Parent(i64),

    /// Authored by the user, or the user holds a privilege meta on the block
    VisibleTo(i64),
}

/// 1-based page of a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub per_page: i64,
}

impl Page {
    /// Builds a page, clamping `number` and `per_page` to at least 1
    pub fn new(number: i64, per_page: i64) -> Self {
        Self {
            number: number.max(1),
            per_page: per_page.max(1),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1).saturating_mul(self.per_page)
    }
}

/// A block `SELECT` assembled from filters
///
/// Live rows only; ordered newest id first.
#[derive(Debug, Clone, Default)]
pub struct BlockQuery {
    filters: Vec<BlockFilter>,
    page: Option<Page>,
}

impl BlockQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: BlockFilter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Adds `filter` when `value` is present
    pub fn filter_opt<T>(self, value: Option<T>, filter: impl FnOnce(T) -> BlockFilter) -> Self {
        match value {
            Some(v) => self.filter(filter(v)),
            None => self,
        }
    }

    pub fn page(mut self, page: Page) -> Self {
        self.page = Some(page);
        self
    }

    pub fn filters(&self) -> &[BlockFilter] {
        &self.filters
    }

    /// Renders the query; bind values are carried by the builder
    pub fn build(&self) -> QueryBuilder<'static, Postgres> {
        let mut qb = QueryBuilder::new("SELECT ");
        qb.push(BLOCK_COLUMNS);
        qb.push(" FROM blocks b WHERE b.status = ");
        qb.push_bind(status::LIVE);

        for filter in &self.filters {
            qb.push(" AND ");
            push_filter(&mut qb, filter);
        }

        qb.push(" ORDER BY b.id DESC");

        if let Some(page) = self.page {
            qb.push(" LIMIT ");
            qb.push_bind(page.per_page);
            qb.push(" OFFSET ");
            qb.push_bind(page.offset());
        }

        qb
    }
}

fn push_filter(qb: &mut QueryBuilder<'static, Postgres>, filter: &BlockFilter) {
    match filter {
        BlockFilter::Kind(kind) => {
            qb.push("b.type = ");
            qb.push_bind(kind.clone());
        }
        BlockFilter::Id(id) => {
            qb.push("b.id = ");
            qb.push_bind(*id);
        }
        BlockFilter::Slug(slug) => {
            qb.push("b.slug = ");
            qb.push_bind(slug.clone());
        }
        BlockFilter::Parent(parent) => {
            qb.push("b.parent = ");
            qb.push_bind(*parent);
        }
        BlockFilter::VisibleTo(user_id) => {
            // Existence of any live privilege row is enough to see the block
            qb.push("(b.author = ");
            qb.push_bind(*user_id);
            qb.push(
                " OR EXISTS (SELECT 1 FROM metas m \
                 WHERE m.owner_kind = b.type AND m.owner_id = b.id AND m.meta_key = ",
            );
            qb.push_bind(PrivilegeKey::for_user(*user_id).to_string());
            qb.push(" AND m.status = ");
            qb.push_bind(status::LIVE);
            qb.push("))");
        }
    }
}
