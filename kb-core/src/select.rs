//! `select`, `selectFromList`, `selectByKeyword` (spec §4.8): execute the
//! query builder's SQL through the session pool, trim neighbours the
//! caller cannot see, and enforce an expected result count.

use indexmap::IndexMap;
use kb_connector::{check_class_permissions, with_session, DomainError, DomainResult, Operation, SessionPool, User};
use kb_query::{build_keyword_search, KeywordSearchOptions, Subquery, Target, QueryCore, WrapperQuery};
use kb_schema::registry::SchemaRegistry;
use kb_schema::{Record, RecordId};
use serde_json::Value;

use crate::query_error;
use crate::record_io::parse_record;
use crate::trim::trim_field;

#[derive(Debug, Clone)]
pub struct SelectOptions {
    /// `select(..., {exactlyN})`: fail unless the result count matches.
    pub exactly_n: Option<usize>,
    /// Drop neighbours whose `deletedAt` is non-null from the returned
    /// field tree (the top-level selected records are never dropped here
    /// — that's governed by the query's own `history` flag).
    pub active_only: bool,
    /// Bypasses the caller's read-permission gate. Only for internal
    /// integrity pre-checks (e.g. `create`/`update`'s active-index
    /// collision query) that must run regardless of the acting user's
    /// own read access — they never return rows to the caller.
    pub skip_permission: bool,
}

impl Default for SelectOptions {
    fn default() -> Self {
        SelectOptions { exactly_n: None, active_only: true, skip_permission: false }
    }
}

/// Walks a selected row's field tree (skipping bookkeeping keys, which
/// are scalars/RIDs rather than nested records) applying neighbour
/// trimming to every nested value.
fn trim_row(row: &mut Value, user: &User, active_only: bool) {
    let Value::Object(map) = row else { return };
    for (key, value) in map.iter_mut() {
        if key.starts_with('@') {
            continue;
        }
        trim_field(value, user, active_only);
    }
}

/// `select(session, query, {exactlyN?, user})` (spec §4.8).
#[tracing::instrument(skip(pool, registry, query, user, opts), fields(user = %user.id, class = query.target_class().unwrap_or("")))]
pub async fn select(
    pool: &dyn SessionPool,
    registry: &SchemaRegistry,
    query: &WrapperQuery,
    user: &User,
    opts: &SelectOptions,
) -> DomainResult<Vec<Record>> {
    let (sql, params) = query.build(registry).map_err(query_error)?;

    if !opts.skip_permission {
        if let Some(class) = query.target_class() {
            if !class.is_empty() && !check_class_permissions(user, class, Operation::Read) {
                tracing::warn!(class, "read permission denied");
                return Err(DomainError::permission(format!("user lacks read permission on '{class}'")));
            }
        }
    }

    let rows = with_session(pool, |session| {
        let sql = sql.clone();
        let params = params.clone();
        Box::pin(async move { session.execute(&sql, &params).await })
    })
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for mut row in rows {
        trim_row(&mut row, user, opts.active_only);
        records.push(parse_record(&row)?);
    }

    if let Some(n) = opts.exactly_n {
        if records.len() < n {
            tracing::debug!(expected = n, found = records.len(), "select returned too few records");
            return Err(DomainError::no_record_found(format!(
                "expected {n} record(s), found {}",
                records.len()
            )));
        }
        if records.len() > n {
            tracing::debug!(expected = n, found = records.len(), "select returned too many records");
            return Err(DomainError::multiple_records_found(format!(
                "expected {n} record(s), found {}",
                records.len()
            )));
        }
    }

    tracing::debug!(count = records.len(), "select completed");
    Ok(records)
}

/// `selectFromList(session, recordIds, opts)`: requires exactly
/// `recordIds.len()` results.
#[tracing::instrument(skip(pool, registry, user, opts), fields(user = %user.id, count = record_ids.len()))]
pub async fn select_from_list(
    pool: &dyn SessionPool,
    registry: &SchemaRegistry,
    record_ids: &[RecordId],
    user: &User,
    opts: &SelectOptions,
) -> DomainResult<Vec<Record>> {
    let sub = Subquery::new(Target::RecordIds(record_ids.to_vec()));
    let wrapper = WrapperQuery::new(QueryCore::Flat(sub));
    let mut scoped = opts.clone();
    scoped.exactly_n = Some(record_ids.len());
    select(pool, registry, &wrapper, user, &scoped).await
}

/// `selectByKeyword` (spec §4.7/§4.8): thin wrapper over the keyword
/// search builder.
#[tracing::instrument(skip(pool, registry, opts, user), fields(user = %user.id))]
pub async fn select_by_keyword(
    pool: &dyn SessionPool,
    registry: &SchemaRegistry,
    opts: &KeywordSearchOptions,
    user: &User,
    active_only: bool,
) -> DomainResult<Vec<Record>> {
    if !check_class_permissions(user, "Statement", Operation::Read) {
        tracing::warn!("read permission denied on 'Statement'");
        return Err(DomainError::permission("user lacks read permission on 'Statement'"));
    }

    let (sql, params) = build_keyword_search(registry, opts).map_err(query_error)?;
    let rows = with_session(pool, |session| {
        let sql = sql.clone();
        let params = params.clone();
        Box::pin(async move { session.execute(&sql, &params).await })
    })
    .await?;

    let mut records = Vec::with_capacity(rows.len());
    for mut row in rows {
        trim_row(&mut row, user, active_only);
        records.push(parse_record(&row)?);
    }
    tracing::debug!(count = records.len(), "keyword search completed");
    Ok(records)
}
