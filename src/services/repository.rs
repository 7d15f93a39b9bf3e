//! Generic CRUD over a single entity table.
//!
//! Each entity implements [`Resource`] to describe its table and column
//! list; the repository builds the statements with `QueryBuilder` so values
//! are always bound, never interpolated. Table and column names come only
//! from `'static` constants.

use crate::services::{ServiceError, ServiceResult, is_unique_violation};
use chrono::Utc;
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool, sqlite::SqliteRow};
use std::sync::Arc;
use uuid::Uuid;

/// A row type stored in its own table with `id`, `created_at` and
/// `updated_at` columns.
pub trait Resource: for<'r> FromRow<'r, SqliteRow> + Send + Unpin + 'static {
    const TABLE: &'static str;
    /// Human-readable name used in error messages.
    const LABEL: &'static str;
    /// Columns selected (and returned) for this row type.
    const COLUMNS: &'static [&'static str];
}

/// A resource carrying an owner reference used for authorization.
pub trait Owned: Resource {
    fn owner_id(&self) -> Uuid;
}

/// A bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i64),
    Real(f64),
    Bool(bool),
    Id(Uuid),
    Null,
}

impl FieldValue {
    pub(crate) fn bind_into(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self.clone() {
            FieldValue::Text(v) => builder.push_bind(v),
            FieldValue::Int(v) => builder.push_bind(v),
            FieldValue::Real(v) => builder.push_bind(v),
            FieldValue::Bool(v) => builder.push_bind(v),
            FieldValue::Id(v) => builder.push_bind(v),
            FieldValue::Null => builder.push_bind(Option::<String>::None),
        };
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::Text(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::Text(v.to_string())
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::Int(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Real(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Bool(v)
    }
}

impl From<Uuid> for FieldValue {
    fn from(v: Uuid) -> Self {
        FieldValue::Id(v)
    }
}

/// Ordered set of column assignments for an insert or update.
#[derive(Debug, Default, Clone)]
pub struct Patch {
    fields: Vec<(&'static str, FieldValue)>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, column: &'static str, value: impl Into<FieldValue>) -> Self {
        self.fields.push((column, value.into()));
        self
    }

    /// Set `column` only when `value` is present and not blank. Stored trimmed.
    pub fn text(self, column: &'static str, value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            Some(v) if !v.is_empty() => {
                let v = v.to_string();
                self.set(column, v)
            }
            _ => self,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[(&'static str, FieldValue)] {
        &self.fields
    }
}

fn not_found<R: Resource>() -> ServiceError {
    ServiceError::not_found(format!("{} not found", R::LABEL))
}

fn write_error<R: Resource>(err: sqlx::Error) -> ServiceError {
    if is_unique_violation(&err) {
        ServiceError::Conflict(format!("{} already exists", R::LABEL))
    } else {
        ServiceError::Storage(err)
    }
}

fn select_list<R: Resource>() -> String {
    R::COLUMNS.join(", ")
}

#[derive(Clone)]
pub struct Repository {
    /// Shared SQLite connection pool.
    pub db: Arc<SqlitePool>,
}

impl Repository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Insert a new row with a fresh id and timestamps, returning it.
    pub async fn create<R: Resource>(&self, fields: Patch) -> ServiceResult<R> {
        if fields.is_empty() {
            return Err(ServiceError::invalid(format!(
                "{} requires at least one field",
                R::LABEL
            )));
        }

        let now = Utc::now();
        let mut builder =
            QueryBuilder::<Sqlite>::new(format!("INSERT INTO {} (id, created_at, updated_at", R::TABLE));
        for (column, _) in fields.fields() {
            builder.push(", ").push(column);
        }
        builder.push(") VALUES (");
        builder.push_bind(Uuid::new_v4());
        builder.push(", ").push_bind(now);
        builder.push(", ").push_bind(now);
        for (_, value) in fields.fields() {
            builder.push(", ");
            value.bind_into(&mut builder);
        }
        builder.push(") RETURNING ").push(select_list::<R>());

        builder
            .build_query_as::<R>()
            .fetch_one(&*self.db)
            .await
            .map_err(write_error::<R>)
    }

    pub async fn get_by_id<R: Resource>(&self, id: Uuid) -> ServiceResult<R> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM {} WHERE id = ",
            select_list::<R>(),
            R::TABLE
        ));
        builder.push_bind(id);

        builder
            .build_query_as::<R>()
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(not_found::<R>)
    }

    /// First row whose `column` equals `value`, if any.
    pub async fn find_by<R: Resource>(
        &self,
        column: &'static str,
        value: impl Into<FieldValue>,
    ) -> ServiceResult<Option<R>> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {} FROM {} WHERE {} = ",
            select_list::<R>(),
            R::TABLE,
            column
        ));
        value.into().bind_into(&mut builder);
        builder.push(" LIMIT 1");

        Ok(builder.build_query_as::<R>().fetch_optional(&*self.db).await?)
    }

    /// Apply `patch` to the row and return the updated row.
    ///
    /// An empty patch is rejected before touching the database.
    pub async fn update_fields<R: Resource>(&self, id: Uuid, patch: Patch) -> ServiceResult<R> {
        if patch.is_empty() {
            return Err(ServiceError::invalid("At least one non-empty field is required"));
        }

        let mut builder = QueryBuilder::<Sqlite>::new(format!("UPDATE {} SET ", R::TABLE));
        for (column, value) in patch.fields() {
            builder.push(column).push(" = ");
            value.bind_into(&mut builder);
            builder.push(", ");
        }
        builder.push("updated_at = ").push_bind(Utc::now());
        builder.push(" WHERE id = ").push_bind(id);
        builder.push(" RETURNING ").push(select_list::<R>());

        builder
            .build_query_as::<R>()
            .fetch_optional(&*self.db)
            .await
            .map_err(write_error::<R>)?
            .ok_or_else(not_found::<R>)
    }

    /// Add `by` to an integer column without stamping `updated_at`.
    pub async fn increment<R: Resource>(
        &self,
        id: Uuid,
        column: &'static str,
        by: i64,
    ) -> ServiceResult<()> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!(
            "UPDATE {} SET {} = {} + ",
            R::TABLE,
            column,
            column
        ));
        builder.push_bind(by).push(" WHERE id = ").push_bind(id);

        let affected = builder.build().execute(&*self.db).await?.rows_affected();
        if affected == 0 {
            return Err(not_found::<R>());
        }
        Ok(())
    }

    /// Delete the row and return what was removed.
    pub async fn delete_by_id<R: Resource>(&self, id: Uuid) -> ServiceResult<R> {
        let mut builder = QueryBuilder::<Sqlite>::new(format!("DELETE FROM {} WHERE id = ", R::TABLE));
        builder.push_bind(id);
        builder.push(" RETURNING ").push(select_list::<R>());

        builder
            .build_query_as::<R>()
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(not_found::<R>)
    }

    /// Fetch a row and require that `actor` owns it.
    pub async fn get_owned<R: Owned>(&self, id: Uuid, actor: Uuid) -> ServiceResult<R> {
        let row = self.get_by_id::<R>(id).await?;
        if row.owner_id() != actor {
            return Err(ServiceError::unauthorized(format!(
                "You are not the owner of this {}",
                R::LABEL.to_lowercase()
            )));
        }
        Ok(row)
    }
}
