//! Typed query builder for the `form_process_mapper` table.
//!
//! A [`MapperQuery`] is a list of [`Condition`]s plus an optional [`Sort`].
//! It renders into a `sqlx::QueryBuilder` with every value bound, never
//! interpolated. Column names only ever come from the enums in this module.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite};

use crate::models::MapperStatus;

pub const TABLE: &str = "form_process_mapper";

/// Unicode lowercase form stored in the `*_folded` search columns.
///
/// SQLite's `LOWER()` only folds ASCII, so contains-filters compare a needle
/// folded here against a column folded here at write time.
pub fn fold(value: &str) -> String {
    value.to_lowercase()
}

// ---------------------------------------------------------------------------
// caller context
// ---------------------------------------------------------------------------

/// Identity of the caller, as resolved by the authentication layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContext {
    /// `None` for a caller that is not bound to a tenant.
    pub tenant_key: Option<String>,
    pub user_name: Option<String>,
}

impl UserContext {
    /// A caller without a tenant.
    pub fn global() -> Self {
        Self::default()
    }

    pub fn for_tenant(tenant_key: impl Into<String>) -> Self {
        Self {
            tenant_key: Some(tenant_key.into()),
            user_name: None,
        }
    }

    pub fn tenant_key(&self) -> Option<&str> {
        self.tenant_key.as_deref()
    }
}

// ---------------------------------------------------------------------------
// filters
// ---------------------------------------------------------------------------

/// Caller-supplied listing filter. Each kind owns its column and comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum MapperFilter {
    Id(i64),
    FormId(String),
    /// Case-insensitive substring match, Unicode-aware.
    FormName(String),
    FormType(String),
    ProcessKey(String),
    /// Case-insensitive substring match.
    ProcessName(String),
    /// Case-insensitive substring match.
    Description(String),
    /// Case-insensitive substring match.
    CreatedBy(String),
    CreatedFrom(DateTime<Utc>),
    CreatedTo(DateTime<Utc>),
    ModifiedFrom(DateTime<Utc>),
    ModifiedTo(DateTime<Utc>),
}

impl MapperFilter {
    pub const fn column(&self) -> &'static str {
        match self {
            Self::Id(_) => "id",
            Self::FormId(_) => "form_id",
            Self::FormName(_) => "form_name",
            Self::FormType(_) => "form_type",
            Self::ProcessKey(_) => "process_key",
            Self::ProcessName(_) => "process_name",
            Self::Description(_) => "description",
            Self::CreatedBy(_) => "created_by",
            Self::CreatedFrom(_) | Self::CreatedTo(_) => "created",
            Self::ModifiedFrom(_) | Self::ModifiedTo(_) => "modified",
        }
    }

    /// Whether the filter constrains anything.
    ///
    /// An empty string or an id of `0` counts as "not provided", the same as
    /// an absent filter. A legitimate zero or empty value can't be filtered on.
    pub fn is_active(&self) -> bool {
        match self {
            Self::Id(id) => *id != 0,
            Self::FormId(v)
            | Self::FormName(v)
            | Self::FormType(v)
            | Self::ProcessKey(v)
            | Self::ProcessName(v)
            | Self::Description(v)
            | Self::CreatedBy(v) => !v.is_empty(),
            Self::CreatedFrom(_)
            | Self::CreatedTo(_)
            | Self::ModifiedFrom(_)
            | Self::ModifiedTo(_) => true,
        }
    }

    fn push_predicate(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        let column = self.column();
        match self {
            Self::Id(id) => {
                qb.push(column).push(" = ").push_bind(*id);
            }
            Self::FormId(v) | Self::FormType(v) | Self::ProcessKey(v) => {
                qb.push(column).push(" = ").push_bind(v.clone());
            }
            Self::FormName(v) | Self::ProcessName(v) | Self::Description(v) | Self::CreatedBy(v) => {
                qb.push(column)
                    .push("_folded LIKE ")
                    .push_bind(format!("%{}%", fold(v)));
            }
            Self::CreatedFrom(at) | Self::ModifiedFrom(at) => {
                qb.push(column).push(" >= ").push_bind(*at);
            }
            Self::CreatedTo(at) | Self::ModifiedTo(at) => {
                qb.push(column).push(" <= ").push_bind(*at);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// conditions
// ---------------------------------------------------------------------------

/// One `AND`-ed predicate of a [`MapperQuery`].
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Filter(MapperFilter),
    /// An empty list matches nothing.
    IdIn(Vec<i64>),
    NotDeleted,
    FormTypeIn(Vec<String>),
    ProcessKeyIn(Vec<String>),
    Status(MapperStatus),
    Tenant(String),
}

impl Condition {
    fn push_predicate(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            Self::Filter(filter) => filter.push_predicate(qb),
            Self::IdIn(ids) => push_in(qb, "id", ids.iter().copied()),
            Self::NotDeleted => {
                qb.push("deleted = ").push_bind(false);
            }
            Self::FormTypeIn(types) => push_in(qb, "form_type", types.iter().cloned()),
            Self::ProcessKeyIn(keys) => push_in(qb, "process_key", keys.iter().cloned()),
            Self::Status(status) => {
                qb.push("status = ").push_bind(*status);
            }
            Self::Tenant(tenant) => {
                qb.push("tenant = ").push_bind(tenant.clone());
            }
        }
    }
}

fn push_in<T, I>(qb: &mut QueryBuilder<'_, Sqlite>, column: &str, values: I)
where
    I: ExactSizeIterator<Item = T>,
    T: 'static + for<'q> sqlx::Encode<'q, Sqlite> + sqlx::Type<Sqlite> + Send,
{
    if values.len() == 0 {
        qb.push("1 = 0");
        return;
    }
    qb.push(column).push(" IN (");
    let mut list = qb.separated(", ");
    for value in values {
        list.push_bind(value);
    }
    list.push_unseparated(")");
}

// ---------------------------------------------------------------------------
// sorting
// ---------------------------------------------------------------------------

/// Columns a caller may sort by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Id,
    FormName,
    ProcessName,
    FormType,
    Version,
    Created,
    Modified,
    Status,
}

impl SortField {
    pub const fn column(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::FormName => "form_name",
            Self::ProcessName => "process_name",
            Self::FormType => "form_type",
            Self::Version => "version",
            Self::Created => "created",
            Self::Modified => "modified",
            Self::Status => "status",
        }
    }

    /// Accepts both the column name and its camelCase spelling.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim() {
            "id" => Some(Self::Id),
            "form_name" | "formName" => Some(Self::FormName),
            "process_name" | "processName" => Some(Self::ProcessName),
            "form_type" | "formType" => Some(Self::FormType),
            "version" => Some(Self::Version),
            "created" => Some(Self::Created),
            "modified" => Some(Self::Modified),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(order: &str) -> Option<Self> {
        match order.trim().to_ascii_lowercase().as_str() {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }

    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// A vetted `(column, direction)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub order: SortOrder,
}

impl Sort {
    pub const fn new(field: SortField, order: SortOrder) -> Self {
        Self { field, order }
    }

    /// Validate raw caller input. Both parts must be present and recognised,
    /// otherwise the request is treated as unsorted.
    pub fn validate(sort_by: Option<&str>, sort_order: Option<&str>) -> Option<Self> {
        let field = SortField::parse(sort_by?)?;
        let order = SortOrder::parse(sort_order?)?;
        Some(Self::new(field, order))
    }
}

// ---------------------------------------------------------------------------
// pagination
// ---------------------------------------------------------------------------

/// Which slice of a listing to return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Pagination {
    /// One page holding every match.
    #[default]
    All,
    /// 1-based page `number` of `size` rows.
    Page { number: u32, size: u32 },
}

impl Pagination {
    pub fn page(number: u32, size: u32) -> Self {
        Self::Page {
            number: number.max(1),
            size,
        }
    }

    /// Map `(page_number, limit)` request parameters. No limit means everything.
    pub fn from_params(page_number: Option<u32>, limit: Option<u32>) -> Self {
        match limit {
            Some(size) => Self::page(page_number.unwrap_or(1), size),
            None => Self::All,
        }
    }

    fn limit_offset(self) -> Option<(i64, i64)> {
        match self {
            Self::All => None,
            Self::Page { number, size } => {
                let skipped = i64::from(number.max(1) - 1);
                let size = i64::from(size);
                Some((size, skipped.saturating_mul(size)))
            }
        }
    }
}

// ---------------------------------------------------------------------------
// query
// ---------------------------------------------------------------------------

/// Conditions and ordering for one read against `form_process_mapper`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapperQuery {
    conditions: Vec<Condition>,
    sort: Option<Sort>,
}

impl MapperQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a query from caller filters, dropping the ones that aren't active.
    pub fn filter_conditions<I>(filters: I) -> Self
    where
        I: IntoIterator<Item = MapperFilter>,
    {
        let conditions = filters
            .into_iter()
            .filter(MapperFilter::is_active)
            .map(Condition::Filter)
            .collect();
        Self {
            conditions,
            sort: None,
        }
    }

    #[must_use]
    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Restrict to active rows of the caller's tenant.
    #[must_use]
    pub fn access_filter(self, ctx: &UserContext) -> Self {
        self.and(Condition::Status(MapperStatus::Active))
            .tenant_authorization(ctx)
    }

    /// Restrict to the caller's tenant. A caller without a tenant sees all rows.
    #[must_use]
    pub fn tenant_authorization(self, ctx: &UserContext) -> Self {
        match ctx.tenant_key() {
            Some(tenant) => self.and(Condition::Tenant(tenant.to_string())),
            None => self,
        }
    }

    #[must_use]
    pub fn order_by(mut self, sort: Option<Sort>) -> Self {
        self.sort = sort;
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    /// `SELECT COUNT(*)` over every match, ignoring order and pagination.
    pub fn count_builder(&self) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(format!("SELECT COUNT(*) FROM {TABLE}"));
        self.push_where(&mut qb);
        qb
    }

    /// `SELECT <columns>` with ordering and the requested page applied.
    pub fn select_builder(
        &self,
        columns: &str,
        pagination: Pagination,
    ) -> QueryBuilder<'static, Sqlite> {
        let mut qb = QueryBuilder::new(format!("SELECT {columns} FROM {TABLE}"));
        self.push_where(&mut qb);

        qb.push(" ORDER BY ");
        match self.sort {
            Some(Sort { field: SortField::Id, order }) => {
                qb.push("id ").push(order.as_sql());
            }
            Some(Sort { field, order }) => {
                qb.push(field.column())
                    .push(" ")
                    .push(order.as_sql())
                    .push(", id ASC");
            }
            None => {
                qb.push("id ASC");
            }
        }

        if let Some((limit, offset)) = pagination.limit_offset() {
            qb.push(" LIMIT ")
                .push_bind(limit)
                .push(" OFFSET ")
                .push_bind(offset);
        }
        qb
    }

    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        for (i, condition) in self.conditions.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            condition.push_predicate(qb);
        }
    }
}
