//! Form process mapper operations.
//!
//! Mutations work on a single row and commit immediately. Listings follow one
//! pipeline: restrict, filter, authorize, sort, count, project, paginate.

use std::collections::HashSet;

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, error};

use crate::{
    models::{
        ActiveFormItem, ActiveMapperItem, FormListItem, FormProcessMapperPatch,
        FormProcessMapperRow, LatestMapperId, MapperStatus, NewFormProcessMapper, Paged,
        Projection, DEFAULT_PROCESS_KEY, DEFAULT_PROCESS_NAME,
    },
    query::{
        fold, Condition, MapperFilter, MapperQuery, Pagination, Sort, SortField, SortOrder,
        UserContext, TABLE,
    },
    BadRequest, DbError,
};

// ---------------------------------------------------------------------------
// listing parameters
// ---------------------------------------------------------------------------

/// Parameters of [`find_all_forms`].
#[derive(Debug, Clone, Default)]
pub struct FormListing {
    pub pagination: Pagination,
    pub sort: Option<Sort>,
    /// Lineages (`parent_form_id`) the caller is allowed to see.
    pub form_ids: Vec<String>,
    /// `Some(true)` for active rows only, `Some(false)` for inactive only.
    pub is_active: Option<bool>,
    /// Restrict to these form types when non-empty.
    pub form_types: Vec<String>,
    pub filters: Vec<MapperFilter>,
}

/// Parameters of [`find_all_active_by_formid`].
#[derive(Debug, Clone, Default)]
pub struct ActiveFormListing {
    pub pagination: Pagination,
    pub sort: Option<Sort>,
    pub form_ids: Vec<String>,
    pub filters: Vec<MapperFilter>,
}

/// Parameters of [`find_all_active`].
#[derive(Debug, Clone, Default)]
pub struct ActiveMapperListing {
    pub pagination: Pagination,
    pub sort: Option<Sort>,
    /// Restrict to these process keys when set.
    pub process_keys: Option<Vec<String>>,
    pub filters: Vec<MapperFilter>,
}

// ---------------------------------------------------------------------------
// mutations
// ---------------------------------------------------------------------------

/// Insert a new mapper row, applying defaults for the optional fields.
pub async fn create(
    pool: &SqlitePool,
    new: NewFormProcessMapper,
) -> Result<FormProcessMapperRow, DbError> {
    new.validate().map_err(DbError::Validation)?;

    let mut qb = QueryBuilder::<Sqlite>::new(format!(
        "INSERT INTO {TABLE} (form_id, form_name, form_type, parent_form_id, process_key, \
         process_name, status, comments, tenant, process_tenant, is_anonymous, deleted, \
         task_variable, version, description, created, created_by, form_name_folded, \
         process_name_folded, description_folded, created_by_folded) "
    ));
    qb.push_values([new], |mut row, new| {
        let process_name = new
            .process_name
            .unwrap_or_else(|| DEFAULT_PROCESS_NAME.to_string());
        let form_name_folded = fold(&new.form_name);
        let process_name_folded = fold(&process_name);
        let description_folded = new.description.as_deref().map(fold);
        let created_by_folded = fold(&new.created_by);

        row.push_bind(new.form_id)
            .push_bind(new.form_name)
            .push_bind(new.form_type)
            .push_bind(new.parent_form_id)
            .push_bind(new.process_key.unwrap_or_else(|| DEFAULT_PROCESS_KEY.to_string()))
            .push_bind(process_name)
            .push_bind(new.status.unwrap_or_default())
            .push_bind(new.comments)
            .push_bind(new.tenant)
            .push_bind(new.process_tenant)
            .push_bind(new.is_anonymous)
            .push_bind(false)
            .push_bind(new.task_variable)
            .push_bind(new.version.unwrap_or(1))
            .push_bind(new.description)
            .push_bind(Utc::now())
            .push_bind(new.created_by)
            .push_bind(form_name_folded)
            .push_bind(process_name_folded)
            .push_bind(description_folded)
            .push_bind(created_by_folded);
    });
    qb.push(" RETURNING ").push(FormProcessMapperRow::COLUMNS);

    let row = qb
        .build_query_as::<FormProcessMapperRow>()
        .fetch_one(pool)
        .await?;

    debug!(
        id = row.id,
        form_id = %row.form_id,
        version = row.version,
        "created form process mapper"
    );
    Ok(row)
}

/// Create a mapper from an untyped field bag.
///
/// Every failure is logged and collapsed into the same [`BadRequest`],
/// whether the input was malformed or the insert was rejected.
pub async fn create_from_dict(
    pool: &SqlitePool,
    fields: &serde_json::Value,
) -> Result<FormProcessMapperRow, BadRequest> {
    let result = match serde_json::from_value::<NewFormProcessMapper>(fields.clone()) {
        Ok(new) => create(pool, new).await,
        Err(err) => Err(DbError::Validation(err.to_string())),
    };

    result.map_err(|err| {
        error!(error = %err, "failed to create form process mapper");
        BadRequest::invalid_request()
    })
}

/// Apply `patch` to the mutable columns of mapper `id` and return the new row.
///
/// A patch that sets `status` only applies to rows that are not soft-deleted;
/// on a deleted row it fails with [`DbError::NotFound`] and changes nothing.
pub async fn update(
    pool: &SqlitePool,
    id: i64,
    patch: FormProcessMapperPatch,
) -> Result<FormProcessMapperRow, DbError> {
    patch.validate().map_err(DbError::Validation)?;

    let sets_status = patch.status.is_some();
    let folded = [
        ("form_name_folded = ", patch.form_name.as_deref().map(fold)),
        ("process_name_folded = ", patch.process_name.as_deref().map(fold)),
        ("description_folded = ", patch.description.as_deref().map(fold)),
    ];

    let mut qb = QueryBuilder::<Sqlite>::new(format!("UPDATE {TABLE} SET "));
    let mut set = qb.separated(", ");

    macro_rules! set_if_present {
        ($($field:ident),+ $(,)?) => {
            $(
                if let Some(value) = patch.$field {
                    set.push(concat!(stringify!($field), " = ")).push_bind_unseparated(value);
                }
            )+
        };
    }
    set_if_present!(
        form_id,
        form_name,
        form_type,
        process_key,
        process_name,
        status,
        comments,
        modified_by,
        is_anonymous,
        task_variable,
        process_tenant,
        description,
    );
    for (assignment, value) in folded {
        if let Some(value) = value {
            set.push(assignment).push_bind_unseparated(value);
        }
    }
    set.push("modified = ").push_bind_unseparated(Utc::now());

    qb.push(" WHERE id = ").push_bind(id);
    if sets_status {
        qb.push(" AND deleted = ").push_bind(false);
    }
    qb.push(" RETURNING ").push(FormProcessMapperRow::COLUMNS);

    let row = qb
        .build_query_as::<FormProcessMapperRow>()
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)?;

    debug!(id, "updated form process mapper");
    Ok(row)
}

/// Set the mapper inactive and soft-delete it. There is no way back.
pub async fn mark_inactive(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE form_process_mapper SET status = ?, deleted = ?, modified = ? WHERE id = ?",
    )
    .bind(MapperStatus::Inactive)
    .bind(true)
    .bind(Utc::now())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    debug!(id, "marked form process mapper inactive");
    Ok(())
}

/// Set the mapper inactive. It stays visible to listings that don't filter on status.
pub async fn mark_unpublished(pool: &SqlitePool, id: i64) -> Result<(), DbError> {
    let result =
        sqlx::query("UPDATE form_process_mapper SET status = ?, modified = ? WHERE id = ?")
            .bind(MapperStatus::Inactive)
            .bind(Utc::now())
            .bind(id)
            .execute(pool)
            .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }

    debug!(id, "unpublished form process mapper");
    Ok(())
}

// ---------------------------------------------------------------------------
// listings
// ---------------------------------------------------------------------------

/// Highest row id of every lineage.
pub async fn get_latest_form_mapper_ids(pool: &SqlitePool) -> Result<Vec<LatestMapperId>, DbError> {
    let rows = sqlx::query_as::<_, LatestMapperId>(
        "SELECT MAX(id) AS id, parent_form_id FROM form_process_mapper GROUP BY parent_form_id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Ids of the latest row of each lineage in `form_ids`.
async fn latest_ids_within(pool: &SqlitePool, form_ids: &[String]) -> Result<Vec<i64>, DbError> {
    let allowed: HashSet<&str> = form_ids.iter().map(String::as_str).collect();
    Ok(get_latest_form_mapper_ids(pool)
        .await?
        .into_iter()
        .filter(|latest| allowed.contains(latest.parent_form_id.as_str()))
        .map(|latest| latest.id)
        .collect())
}

/// Count every match of `query`, then fetch the requested page of `T`.
async fn fetch_page<T: Projection>(
    pool: &SqlitePool,
    query: &MapperQuery,
    pagination: Pagination,
) -> Result<Paged<T>, DbError> {
    let total_count: i64 = query
        .count_builder()
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    let items = query
        .select_builder(T::COLUMNS, pagination)
        .build_query_as::<T>()
        .fetch_all(pool)
        .await?;

    Ok(Paged { items, total_count })
}

/// Latest, non-deleted forms of the given lineages, active or not.
pub async fn find_all_forms(
    pool: &SqlitePool,
    ctx: &UserContext,
    listing: FormListing,
) -> Result<Paged<FormListItem>, DbError> {
    let latest = latest_ids_within(pool, &listing.form_ids).await?;

    let mut query = MapperQuery::filter_conditions(listing.filters)
        .and(Condition::NotDeleted)
        .and(Condition::IdIn(latest));
    if !listing.form_types.is_empty() {
        query = query.and(Condition::FormTypeIn(listing.form_types));
    }
    if let Some(is_active) = listing.is_active {
        let status = if is_active { MapperStatus::Active } else { MapperStatus::Inactive };
        query = query.and(Condition::Status(status));
    }
    let query = query.tenant_authorization(ctx).order_by(listing.sort);

    fetch_page(pool, &query, listing.pagination).await
}

/// Latest active forms of the given lineages visible to the caller.
pub async fn find_all_active_by_formid(
    pool: &SqlitePool,
    ctx: &UserContext,
    listing: ActiveFormListing,
) -> Result<Paged<ActiveFormItem>, DbError> {
    let latest = latest_ids_within(pool, &listing.form_ids).await?;

    let query = MapperQuery::filter_conditions(listing.filters)
        .and(Condition::IdIn(latest))
        .access_filter(ctx)
        .order_by(listing.sort);

    fetch_page(pool, &query, listing.pagination).await
}

/// Every active mapper visible to the caller.
pub async fn find_all_active(
    pool: &SqlitePool,
    ctx: &UserContext,
    listing: ActiveMapperListing,
) -> Result<Paged<ActiveMapperItem>, DbError> {
    let mut query = MapperQuery::filter_conditions(listing.filters);
    if let Some(keys) = listing.process_keys {
        query = query.and(Condition::ProcessKeyIn(keys));
    }
    let query = query.access_filter(ctx).order_by(listing.sort);

    fetch_page(pool, &query, listing.pagination).await
}

/// Every row, newest first, without any scoping.
pub async fn find_all(
    pool: &SqlitePool,
    pagination: Pagination,
) -> Result<Vec<FormProcessMapperRow>, DbError> {
    let query = MapperQuery::new().order_by(Some(Sort::new(SortField::Id, SortOrder::Desc)));
    let rows = query
        .select_builder(FormProcessMapperRow::COLUMNS, pagination)
        .build_query_as::<FormProcessMapperRow>()
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Number of active rows, regardless of tenant or soft-delete.
pub async fn find_all_count(pool: &SqlitePool) -> Result<i64, DbError> {
    let count = MapperQuery::new()
        .and(Condition::Status(MapperStatus::Active))
        .count_builder()
        .build_query_scalar::<i64>()
        .fetch_one(pool)
        .await?;

    Ok(count)
}

// ---------------------------------------------------------------------------
// point lookups
// ---------------------------------------------------------------------------

pub async fn find_form_by_id(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<FormProcessMapperRow>, DbError> {
    let row = sqlx::query_as::<_, FormProcessMapperRow>(&format!(
        "SELECT {} FROM {TABLE} WHERE id = ?",
        FormProcessMapperRow::COLUMNS
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

pub async fn find_form_by_id_active_status(
    pool: &SqlitePool,
    id: i64,
) -> Result<Option<FormProcessMapperRow>, DbError> {
    let row = sqlx::query_as::<_, FormProcessMapperRow>(&format!(
        "SELECT {} FROM {TABLE} WHERE id = ? AND status = ?",
        FormProcessMapperRow::COLUMNS
    ))
    .bind(id)
    .bind(MapperStatus::Active)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// The highest-version row for `form_id`.
pub async fn find_form_by_form_id(
    pool: &SqlitePool,
    form_id: &str,
) -> Result<Option<FormProcessMapperRow>, DbError> {
    let row = sqlx::query_as::<_, FormProcessMapperRow>(&format!(
        "SELECT {} FROM {TABLE} WHERE form_id = ? ORDER BY version DESC LIMIT 1",
        FormProcessMapperRow::COLUMNS
    ))
    .bind(form_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// The `(form_id, version)` row owned by the caller's tenant.
///
/// The tenant must match exactly: a caller without a tenant only sees global
/// rows, and a tenant caller never sees global ones.
pub async fn find_mapper_by_form_id_and_version(
    pool: &SqlitePool,
    ctx: &UserContext,
    form_id: &str,
    version: i32,
) -> Result<Option<FormProcessMapperRow>, DbError> {
    let row = sqlx::query_as::<_, FormProcessMapperRow>(&format!(
        "SELECT {} FROM {TABLE} WHERE form_id = ? AND version = ? AND tenant IS ?",
        FormProcessMapperRow::COLUMNS
    ))
    .bind(form_id)
    .bind(version)
    .bind(ctx.tenant_key())
    .fetch_optional(pool)
    .await?;

    Ok(row)
}
