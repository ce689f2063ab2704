//! `update` (spec §4.8): copy-on-write record mutation.

use chrono::Utc;
use indexmap::IndexMap;
use kb_connector::{check_class_permissions, with_session, DomainError, DomainResult, Operation, SessionPool, User};
use kb_query::{QueryCore, Subquery, Target, WrapperQuery};
use kb_schema::registry::SchemaRegistry;
use kb_schema::Record;
use serde_json::Value;

use crate::create::{active_filter, derive_display_name};
use crate::record_io::{parse_record, render_insert, render_update};
use crate::select::{select, SelectOptions};

/// `update(session, {class, query, changes, user})` (spec §4.8):
/// 1. select the unique record, 2. reject edges (immutable), 3. duplicate
/// it as a deleted historical copy, 4. apply `changes` to the original in
/// place and point its `history` at the copy.
#[tracing::instrument(skip(pool, registry, query, changes, user), fields(user = %user.id, class))]
pub async fn update(
    pool: &dyn SessionPool,
    registry: &SchemaRegistry,
    class: &str,
    query: &WrapperQuery,
    changes: IndexMap<String, Value>,
    user: &User,
) -> DomainResult<Record> {
    let schema_class = registry.get(class)?;
    if schema_class.is_edge {
        return Err(DomainError::not_implemented(format!(
            "'{class}' is an edge class; edges are immutable and must be deleted and recreated"
        )));
    }
    if !check_class_permissions(user, class, Operation::Update) {
        tracing::warn!(class, "update permission denied");
        return Err(DomainError::permission(format!("user lacks update permission on '{class}'")));
    }

    let mut originals = select(
        pool,
        registry,
        query,
        user,
        &SelectOptions { exactly_n: Some(1), active_only: true, skip_permission: false },
    )
    .await?;
    let original = originals.pop().expect("exactly_n=1 guarantees exactly one record");

    let formatted_changes = registry.format_changes(class, &changes)?;

    let active_properties = schema_class.active_properties.clone();
    if !active_properties.is_empty() {
        let mut merged_preview = original.fields.clone();
        for (k, v) in &formatted_changes {
            merged_preview.insert(k.clone(), v.clone());
        }
        if let Some(filters) = active_filter(&active_properties, &merged_preview) {
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
            if collisions.iter().any(|r| r.meta.record_id != original.meta.record_id) {
                tracing::debug!(class, "active-index collision rejected update");
                return Err(DomainError::record_exists(format!(
                    "an active '{class}' record already matches the active-index tuple"
                )));
            }
        }
    }

    // 1. Duplicate the current record, unmodified, as a deleted historical copy.
    let now = Utc::now();
    let mut copy_fields = original.fields.clone();
    copy_fields.insert("createdAt".to_string(), Value::String(original.meta.created_at.to_rfc3339()));
    copy_fields.insert("createdBy".to_string(), Value::String(original.meta.created_by.to_string()));
    copy_fields.insert("deletedAt".to_string(), Value::String(now.to_rfc3339()));
    copy_fields.insert("deletedBy".to_string(), Value::String(user.id.to_string()));
    if let Some(history) = original.meta.history {
        copy_fields.insert("history".to_string(), Value::String(history.to_string()));
    }
    if !original.meta.group_restrictions.is_empty() {
        copy_fields.insert(
            "groupRestrictions".to_string(),
            Value::Array(original.meta.group_restrictions.iter().map(|r| Value::String(r.to_string())).collect()),
        );
    }

    let (copy_sql, copy_params) = render_insert(class, &copy_fields);
    let copy_rows = with_session(pool, |session| {
        let sql = copy_sql.clone();
        let params = copy_params.clone();
        Box::pin(async move { session.execute(&sql, &params).await })
    })
    .await?;
    let copy_row =
        copy_rows.into_iter().next().ok_or_else(|| DomainError::no_record_found("history copy insert returned no row"))?;
    let copy = parse_record(&copy_row)?;

    // 2. Apply `changes` to the original in place; `createdBy`/`createdAt`
    // are left untouched since they aren't part of `updated_fields`.
    let mut updated_fields = original.fields.clone();
    for (k, v) in &formatted_changes {
        updated_fields.insert(k.clone(), v.clone());
    }
    if let Some(display_name) = derive_display_name(registry, class, &updated_fields, false)? {
        updated_fields.insert("displayName".to_string(), display_name);
    }
    updated_fields.insert("history".to_string(), Value::String(copy.meta.record_id.to_string()));

    let (sql, params) = render_update(class, original.meta.record_id, &updated_fields);
    let rows = with_session(pool, |session| {
        let sql = sql.clone();
        let params = params.clone();
        Box::pin(async move { session.execute(&sql, &params).await })
    })
    .await?;
    let row = rows.into_iter().next().ok_or_else(|| DomainError::no_record_found("update returned no row"))?;
    let record = parse_record(&row)?;
    tracing::info!(class, record_id = %record.meta.record_id, history = %copy.meta.record_id, "record updated");
    Ok(record)
}
