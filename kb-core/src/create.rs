//! `create`, `createEdge` (spec §4.8).

use indexmap::IndexMap;
use kb_connector::{check_class_permissions, with_session, DomainError, DomainResult, Operation, SessionPool, User};
use kb_query::{Comparison, FilterNode, FilterValue, QueryCore, Subquery, Target, TraversalPath, WrapperQuery};
use kb_schema::registry::{FormatOptions, SchemaRegistry};
use kb_schema::{Record, RecordId};
use serde_json::Value;

use crate::record_io::{parse_record, render_create_edge, render_insert};
use crate::select::{select, SelectOptions};

/// `create(session, {class, content, user})` (spec §4.8).
#[tracing::instrument(skip(pool, registry, content, user), fields(user = %user.id))]
pub async fn create(
    pool: &dyn SessionPool,
    registry: &SchemaRegistry,
    class: &str,
    content: IndexMap<String, Value>,
    user: &User,
) -> DomainResult<Record> {
    if !check_class_permissions(user, class, Operation::Create) {
        tracing::warn!(class, "create permission denied");
        return Err(DomainError::permission(format!("user lacks create permission on '{class}'")));
    }

    let schema_class = registry.get(class)?;
    let active_properties = schema_class.active_properties.clone();

    let mut formatted =
        registry.format_record(class, &content, FormatOptions { add_defaults: true, ..Default::default() })?;

    if let Some(display_name) = derive_display_name(registry, class, &formatted, true)? {
        formatted.insert("displayName".to_string(), display_name);
    }

    if !active_properties.is_empty() {
        if let Some(filters) = active_filter(&active_properties, &formatted) {
            let sub = Subquery::new(Target::Class(class.to_string())).with_filters(filters);
            let wrapper = WrapperQuery::new(QueryCore::Flat(sub));
            let collisions = select(
                pool,
                registry,
                &wrapper,
                user,
                &SelectOptions { exactly_n: None, active_only: true, skip_permission: true },
            )
            .await?;
            if !collisions.is_empty() {
                tracing::debug!(class, "active-index collision rejected insert");
                return Err(DomainError::record_exists(format!(
                    "an active '{class}' record already matches the active-index tuple"
                )));
            }
        }
    }

    let (sql, params) = render_insert(class, &formatted);
    let rows = with_session(pool, |session| {
        let sql = sql.clone();
        let params = params.clone();
        Box::pin(async move { session.execute(&sql, &params).await })
    })
    .await?;
    let row = rows.into_iter().next().ok_or_else(|| DomainError::no_record_found("insert returned no row"))?;
    let record = parse_record(&row)?;
    tracing::info!(class, record_id = %record.meta.record_id, "record created");
    Ok(record)
}

/// `createEdge(session, {class, out, in, content, user})` (spec §4.8):
/// `class` is implied by the model (the caller already resolved it), `out
/// == in` is rejected up front.
#[tracing::instrument(skip(pool, registry, content, user), fields(user = %user.id))]
pub async fn create_edge(
    pool: &dyn SessionPool,
    registry: &SchemaRegistry,
    class: &str,
    out: RecordId,
    in_: RecordId,
    content: IndexMap<String, Value>,
    user: &User,
) -> DomainResult<Record> {
    if out == in_ {
        return Err(DomainError::validation("an edge's 'out' and 'in' endpoints must differ"));
    }
    if !check_class_permissions(user, class, Operation::Create) {
        tracing::warn!(class, "create permission denied");
        return Err(DomainError::permission(format!("user lacks create permission on '{class}'")));
    }
    let schema_class = registry.get(class)?;
    if !schema_class.is_edge {
        return Err(DomainError::validation(format!("'{class}' is not an edge class")));
    }

    let formatted =
        registry.format_record(class, &content, FormatOptions { add_defaults: true, ..Default::default() })?;

    let (sql, params) = render_create_edge(class, out, in_, &formatted);
    let rows = with_session(pool, |session| {
        let sql = sql.clone();
        let params = params.clone();
        Box::pin(async move { session.execute(&sql, &params).await })
    })
    .await?;
    let row = rows.into_iter().next().ok_or_else(|| DomainError::no_record_found("edge insert returned no row"))?;
    let record = parse_record(&row)?;
    tracing::info!(class, record_id = %record.meta.record_id, "edge created");
    Ok(record)
}

/// Builds the AND-of-equalities filter over a class's active properties,
/// used by both `create`'s collision pre-check and `update`'s (§4.8).
/// Returns `None` when any component is null — the active-index tuple is
/// only unique among its *non-null* values (spec §3 Invariants), so a
/// record with a null component carries no collision risk to pre-check.
pub(crate) fn active_filter(active_properties: &[String], fields: &IndexMap<String, Value>) -> Option<FilterNode> {
    let mut children = Vec::with_capacity(active_properties.len());
    for prop in active_properties {
        let value = fields.get(prop).cloned().unwrap_or(Value::Null);
        if value.is_null() {
            return None;
        }
        children.push(FilterNode::Comparison(Comparison::new(
            TraversalPath::direct(prop.clone()),
            FilterValue::Scalar(value),
        )));
    }
    match children.len() {
        0 => None,
        1 => Some(children.into_iter().next().unwrap()),
        _ => Some(FilterNode::and(children)),
    }
}

/// Resolves a declared-but-missing `displayName` (spec §4.8 "resolve
/// `displayName` when declared but missing"). This scoped-down
/// implementation falls back to the record's own `name` field; deriving a
/// full per-class notation (e.g. a variant's HGVS-style string from its
/// resolved links) would require dereferencing linked records through the
/// store and is left to the excluded higher-level service that already
/// has those records in hand.
///
/// `only_if_missing=false` is used by `update`, which recomputes the
/// derived field whenever the underlying content changes rather than only
/// filling a gap.
pub(crate) fn derive_display_name(
    registry: &SchemaRegistry,
    class: &str,
    fields: &IndexMap<String, Value>,
    only_if_missing: bool,
) -> DomainResult<Option<Value>> {
    let properties = registry.query_properties(class)?;
    if !properties.contains_key("displayName") {
        return Ok(None);
    }
    if only_if_missing && fields.get("displayName").map(|v| !v.is_null()).unwrap_or(false) {
        return Ok(None);
    }
    Ok(fields.get("name").cloned())
}
