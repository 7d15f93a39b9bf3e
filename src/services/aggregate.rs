//! Read pipelines for list endpoints.
//!
//! A [`Pipeline`] compiles to a single `SELECT` over one resource table:
//!
//! 1. filters (`WHERE`): column equality, text search, membership through a
//!    link table;
//! 2. owner profile (`LEFT JOIN users`), restricted to username, full name
//!    and avatar;
//! 3. derived scalars: `COUNT(*)` and `EXISTS` sub-selects over link tables;
//! 4. ordering and 1-based skip/limit pagination.
//!
//! Rows decode into [`Enriched<R>`], which flattens the joined fields next to
//! the row's own columns when serialized.

use crate::{
    models::user::OwnerProfile,
    services::{
        ServiceError, ServiceResult,
        repository::{FieldValue, Resource},
    },
};
use serde::Serialize;
use sqlx::{Column, FromRow, QueryBuilder, Row, Sqlite, SqlitePool, sqlite::SqliteRow};
use std::collections::BTreeMap;
use uuid::Uuid;

const COUNT_PREFIX: &str = "count_";
const FLAG_PREFIX: &str = "flag_";
const OWNER_USERNAME: &str = "owner_username";
const OWNER_FULL_NAME: &str = "owner_full_name";
const OWNER_AVATAR: &str = "owner_avatar";

/// A directed edge stored in a link table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Link {
    pub table: &'static str,
    /// Column that references the base row (`t.id`).
    pub member_column: &'static str,
    /// Column holding the other end of the edge.
    pub key_column: &'static str,
    /// Extra `column = value` restriction, such as the like target kind.
    pub discriminator: Option<(&'static str, &'static str)>,
}

impl Link {
    /// Push `l.member_column = t.id [AND l.disc = ?]` (no leading keyword).
    fn push_member_match(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        builder
            .push("l.")
            .push(self.member_column)
            .push(" = t.id");
        self.push_discriminator(builder);
    }

    fn push_discriminator(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        if let Some((column, value)) = self.discriminator {
            builder.push(" AND l.").push(column).push(" = ").push_bind(value);
        }
    }
}

#[derive(Debug, Clone)]
pub enum Filter {
    /// `t.column = value`
    Eq(&'static str, FieldValue),
    /// Case-insensitive substring match over any of the columns.
    Search(&'static [&'static str], String),
    /// Rows linked to `key` through `link`.
    Linked { link: Link, key: Uuid },
}

#[derive(Debug, Clone)]
pub enum Enrichment {
    /// Embed the public profile of the user referenced by `column`.
    Owner { column: &'static str },
    /// Number of link rows pointing at the base row, exposed as `field`.
    Count { field: &'static str, link: Link },
    /// Whether a link row from `key` to the base row exists. No key → false.
    Flag {
        field: &'static str,
        link: Link,
        key: Option<Uuid>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    fn keyword(self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Order {
    Newest,
    Column(&'static str, SortDirection),
    /// Random sample order.
    Random,
    /// Order by `link.column` of the link row owned by `key`.
    LinkPosition {
        link: Link,
        key: Uuid,
        column: &'static str,
    },
}

/// 1-based page number and page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSpec {
    pub page: u32,
    pub limit: u32,
}

impl PageSpec {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    /// Missing values default to page 1 of 10; page 0 reads as page 1.
    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit
                .unwrap_or(Self::DEFAULT_LIMIT)
                .clamp(1, Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

impl Default for PageSpec {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// A resource row plus the fields joined in by the pipeline.
#[derive(Debug, Serialize)]
pub struct Enriched<R> {
    #[serde(flatten)]
    pub item: R,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub owner: Option<OwnerProfile>,
    #[serde(flatten)]
    pub counts: BTreeMap<String, i64>,
    #[serde(flatten)]
    pub flags: BTreeMap<String, bool>,
}

impl<R> Enriched<R> {
    pub fn count(&self, field: &str) -> i64 {
        self.counts.get(field).copied().unwrap_or(0)
    }

    pub fn flag(&self, field: &str) -> bool {
        self.flags.get(field).copied().unwrap_or(false)
    }
}

impl<'r, R> FromRow<'r, SqliteRow> for Enriched<R>
where
    R: FromRow<'r, SqliteRow>,
{
    fn from_row(row: &'r SqliteRow) -> Result<Self, sqlx::Error> {
        let item = R::from_row(row)?;

        let mut counts = BTreeMap::new();
        let mut flags = BTreeMap::new();
        for column in row.columns() {
            let name = column.name();
            if let Some(field) = name.strip_prefix(COUNT_PREFIX) {
                counts.insert(field.to_string(), row.try_get::<i64, _>(column.ordinal())?);
            } else if let Some(field) = name.strip_prefix(FLAG_PREFIX) {
                flags.insert(
                    field.to_string(),
                    row.try_get::<i64, _>(column.ordinal())? != 0,
                );
            }
        }

        let owner = if row.try_column(OWNER_USERNAME).is_ok() {
            match row.try_get::<Option<String>, _>(OWNER_USERNAME)? {
                Some(username) => Some(OwnerProfile {
                    username,
                    full_name: row
                        .try_get::<Option<String>, _>(OWNER_FULL_NAME)?
                        .unwrap_or_default(),
                    avatar: row
                        .try_get::<Option<String>, _>(OWNER_AVATAR)?
                        .unwrap_or_default(),
                }),
                // dangling owner reference
                None => None,
            }
        } else {
            None
        };

        Ok(Self {
            item,
            owner,
            counts,
            flags,
        })
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    filters: Vec<Filter>,
    enrichments: Vec<Enrichment>,
    order: Order,
    page: Option<PageSpec>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self {
            filters: Vec::new(),
            enrichments: Vec::new(),
            order: Order::Newest,
            page: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn enrich(mut self, enrichment: Enrichment) -> Self {
        self.enrichments.push(enrichment);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order = order;
        self
    }

    pub fn paginate(mut self, page: PageSpec) -> Self {
        self.page = Some(page);
        self
    }

    fn build<R: Resource>(&self) -> QueryBuilder<'static, Sqlite> {
        let mut builder = QueryBuilder::<Sqlite>::new("SELECT ");

        let mut first = true;
        for column in R::COLUMNS {
            if !first {
                builder.push(", ");
            }
            first = false;
            builder.push("t.").push(column).push(" AS ").push(column);
        }

        let mut owner_column = None;
        for enrichment in &self.enrichments {
            match enrichment {
                Enrichment::Owner { column } => {
                    if owner_column.is_none() {
                        owner_column = Some(*column);
                        builder.push(format!(
                            ", o.username AS {OWNER_USERNAME}, o.full_name AS {OWNER_FULL_NAME}, o.avatar AS {OWNER_AVATAR}"
                        ));
                    }
                }
                Enrichment::Count { field, link } => {
                    builder
                        .push(", (SELECT COUNT(*) FROM ")
                        .push(link.table)
                        .push(" l WHERE ");
                    link.push_member_match(&mut builder);
                    builder.push(") AS ").push(COUNT_PREFIX).push(field);
                }
                Enrichment::Flag { field, link, key } => match key {
                    Some(key) => {
                        builder
                            .push(", EXISTS(SELECT 1 FROM ")
                            .push(link.table)
                            .push(" l WHERE ");
                        link.push_member_match(&mut builder);
                        builder
                            .push(" AND l.")
                            .push(link.key_column)
                            .push(" = ")
                            .push_bind(*key);
                        builder.push(") AS ").push(FLAG_PREFIX).push(field);
                    }
                    None => {
                        builder.push(", 0 AS ").push(FLAG_PREFIX).push(field);
                    }
                },
            }
        }

        builder.push(" FROM ").push(R::TABLE).push(" t");
        if let Some(column) = owner_column {
            builder.push(" LEFT JOIN users o ON o.id = t.").push(column);
        }

        builder.push(" WHERE 1 = 1");
        for filter in &self.filters {
            match filter {
                Filter::Eq(column, value) => {
                    builder.push(" AND t.").push(column).push(" = ");
                    value.bind_into(&mut builder);
                }
                Filter::Search(columns, term) => {
                    let pattern = format!("%{}%", escape_like(term));
                    builder.push(" AND (");
                    for (i, column) in columns.iter().enumerate() {
                        if i > 0 {
                            builder.push(" OR ");
                        }
                        builder
                            .push("t.")
                            .push(column)
                            .push(" LIKE ")
                            .push_bind(pattern.clone())
                            .push(" ESCAPE '\\'");
                    }
                    if columns.is_empty() {
                        builder.push("1 = 1");
                    }
                    builder.push(")");
                }
                Filter::Linked { link, key } => {
                    builder
                        .push(" AND t.id IN (SELECT l.")
                        .push(link.member_column)
                        .push(" FROM ")
                        .push(link.table)
                        .push(" l WHERE l.")
                        .push(link.key_column)
                        .push(" = ")
                        .push_bind(*key);
                    link.push_discriminator(&mut builder);
                    builder.push(")");
                }
            }
        }

        match &self.order {
            Order::Newest => {
                builder.push(" ORDER BY t.created_at DESC, t.id");
            }
            Order::Column(column, direction) => {
                builder
                    .push(" ORDER BY t.")
                    .push(column)
                    .push(" ")
                    .push(direction.keyword())
                    .push(", t.id");
            }
            Order::Random => {
                builder.push(" ORDER BY RANDOM()");
            }
            Order::LinkPosition { link, key, column } => {
                builder
                    .push(" ORDER BY (SELECT l.")
                    .push(column)
                    .push(" FROM ")
                    .push(link.table)
                    .push(" l WHERE ");
                link.push_member_match(&mut builder);
                builder
                    .push(" AND l.")
                    .push(link.key_column)
                    .push(" = ")
                    .push_bind(*key)
                    .push(") ASC");
            }
        }

        if let Some(page) = self.page {
            builder
                .push(" LIMIT ")
                .push_bind(i64::from(page.limit))
                .push(" OFFSET ")
                .push_bind(page.offset());
        }

        builder
    }

    /// Run the pipeline and return every matching row of the page.
    ///
    /// An empty page is a normal, successful result.
    pub async fn fetch<R: Resource>(&self, db: &SqlitePool) -> ServiceResult<Vec<Enriched<R>>> {
        let mut builder = self.build::<R>();
        tracing::debug!(table = R::TABLE, sql = builder.sql(), "running aggregation");
        Ok(builder
            .build_query_as::<Enriched<R>>()
            .fetch_all(db)
            .await?)
    }

    /// Run the pipeline expecting a single row.
    pub async fn fetch_one<R: Resource>(&self, db: &SqlitePool) -> ServiceResult<Enriched<R>> {
        let mut builder = self.build::<R>();
        builder
            .build_query_as::<Enriched<R>>()
            .fetch_optional(db)
            .await?
            .ok_or_else(|| ServiceError::not_found(format!("{} not found", R::LABEL)))
    }
}

fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
