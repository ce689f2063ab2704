//! `remove` (spec §4.8): soft delete, with endpoint snapshotting for edges.

use chrono::Utc;
use kb_connector::{check_class_permissions, with_session, DomainError, DomainResult, Operation, SessionPool, User};
use kb_query::WrapperQuery;
use kb_schema::registry::SchemaRegistry;
use kb_schema::{Record, RecordId};
use serde_json::Value;

use crate::record_io::{parse_record, render_insert, render_update};
use crate::select::{select_from_list, SelectOptions};

/// `remove(session, {class, query, user})` (spec §4.8): set
/// `deletedAt`/`deletedBy` on the record; for edges, snapshot both
/// endpoint vertices first and repoint the edge to the snapshots so the
/// deleted edge stays bound to its historical vertex state.
#[tracing::instrument(skip(pool, registry, query, user), fields(user = %user.id, class))]
pub async fn remove(
    pool: &dyn SessionPool,
    registry: &SchemaRegistry,
    class: &str,
    query: &WrapperQuery,
    user: &User,
) -> DomainResult<Record> {
    if !check_class_permissions(user, class, Operation::Delete) {
        tracing::warn!(class, "delete permission denied");
        return Err(DomainError::permission(format!("user lacks delete permission on '{class}'")));
    }

    let mut records = crate::select::select(
        pool,
        registry,
        query,
        user,
        &SelectOptions { exactly_n: Some(1), active_only: true, skip_permission: false },
    )
    .await?;
    let record = records.pop().expect("exactly_n=1 guarantees exactly one record");

    let schema_class = registry.get(class)?;
    let now = Utc::now();
    let mut fields = record.fields.clone();
    fields.insert("deletedAt".to_string(), Value::String(now.to_rfc3339()));
    fields.insert("deletedBy".to_string(), Value::String(user.id.to_string()));

    if schema_class.is_edge {
        let out_rid = rid_field(&record.fields, "out")?;
        let in_rid = rid_field(&record.fields, "in")?;
        let out_snapshot = snapshot_vertex(pool, registry, out_rid, user).await?;
        let in_snapshot = snapshot_vertex(pool, registry, in_rid, user).await?;
        fields.insert("out".to_string(), Value::String(out_snapshot.to_string()));
        fields.insert("in".to_string(), Value::String(in_snapshot.to_string()));
    }

    let (sql, params) = render_update(class, record.meta.record_id, &fields);
    let rows = with_session(pool, |session| {
        let sql = sql.clone();
        let params = params.clone();
        Box::pin(async move { session.execute(&sql, &params).await })
    })
    .await?;
    let row = rows.into_iter().next().ok_or_else(|| DomainError::no_record_found("delete returned no row"))?;
    let record = parse_record(&row)?;
    tracing::info!(class, record_id = %record.meta.record_id, "record soft-deleted");
    Ok(record)
}

fn rid_field(fields: &indexmap::IndexMap<String, Value>, name: &str) -> DomainResult<RecordId> {
    fields
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| DomainError::validation(format!("edge is missing '{name}' endpoint")))?
        .parse()
        .map_err(DomainError::from)
}

/// Duplicates a vertex unmodified, as an inactive historical snapshot, and
/// returns the copy's new `recordId`. Mirrors `update`'s history-copy step
/// but without marking the original itself; the caller (here, the edge
/// being deleted) is what actually changes state.
#[tracing::instrument(skip(pool, registry, user), fields(user = %user.id, rid = %rid))]
async fn snapshot_vertex(
    pool: &dyn SessionPool,
    registry: &SchemaRegistry,
    rid: RecordId,
    user: &User,
) -> DomainResult<RecordId> {
    let mut originals = select_from_list(
        pool,
        registry,
        &[rid],
        user,
        &SelectOptions { exactly_n: None, active_only: false, skip_permission: false },
    )
    .await?;
    let original = originals.pop().ok_or_else(|| DomainError::no_record_found(format!("endpoint '{rid}' not found")))?;

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

    let (sql, params) = render_insert(&original.meta.class, &copy_fields);
    let rows = with_session(pool, |session| {
        let sql = sql.clone();
        let params = params.clone();
        Box::pin(async move { session.execute(&sql, &params).await })
    })
    .await?;
    let row = rows.into_iter().next().ok_or_else(|| DomainError::no_record_found("endpoint snapshot insert returned no row"))?;
    Ok(parse_record(&row)?.meta.record_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{user_with, ScriptedPool};
    use kb_query::{QueryCore, Subquery, Target};
    use kb_schema::class::Class;
    use kb_schema::property::PropertyType;
    use kb_schema::Property;
    use serde_json::json;

    fn vertex_registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(Class::new("Disease").with_property(Property::new("name", PropertyType::String)));
        reg.register(
            Class::new("AliasOf")
                .edge()
                .with_property(Property::new("out", PropertyType::Link))
                .with_property(Property::new("in", PropertyType::Link)),
        );
        reg
    }

    fn vertex_row(id: &str) -> Value {
        json!({
            "@rid": id,
            "@class": "Disease",
            "createdAt": "2020-01-01T00:00:00Z",
            "createdBy": "#1:1",
            "name": "cancer",
        })
    }

    #[tokio::test]
    async fn remove_sets_deleted_fields_on_vertex() {
        let reg = vertex_registry();
        let user = user_with("Disease", Operation::Delete.into());
        let pool = ScriptedPool::new(vec![vec![vertex_row("#10:1")], vec![vertex_row("#10:1")]]);
        let sub = Subquery::new(Target::Class("Disease".into()));
        let query = WrapperQuery::new(QueryCore::Flat(sub));
        let record = remove(&pool, &reg, "Disease", &query, &user).await.unwrap();
        assert_eq!(record.meta.class, "Disease");
    }

    #[tokio::test]
    async fn remove_rejects_without_delete_permission() {
        let reg = vertex_registry();
        let user = user_with("Disease", Operation::Read.into());
        let pool = ScriptedPool::new(vec![]);
        let sub = Subquery::new(Target::Class("Disease".into()));
        let query = WrapperQuery::new(QueryCore::Flat(sub));
        let err = remove(&pool, &reg, "Disease", &query, &user).await.unwrap_err();
        assert!(matches!(err, DomainError::Permission { .. }));
    }

    #[tokio::test]
    async fn remove_snapshots_edge_endpoints() {
        let reg = vertex_registry();
        let user = user_with("AliasOf", Operation::Delete.into());
        let edge_row = json!({
            "@rid": "#20:1",
            "@class": "AliasOf",
            "createdAt": "2020-01-01T00:00:00Z",
            "createdBy": "#1:1",
            "out": "#10:1",
            "in": "#10:2",
        });
        let pool = ScriptedPool::new(vec![
            vec![edge_row],
            vec![vertex_row("#10:1")],
            vec![vertex_row("#10:3")],
            vec![vertex_row("#10:2")],
            vec![vertex_row("#10:4")],
            vec![json!({
                "@rid": "#20:1",
                "@class": "AliasOf",
                "createdAt": "2020-01-01T00:00:00Z",
                "createdBy": "#1:1",
                "out": "#10:3",
                "in": "#10:4",
                "deletedAt": "2020-06-01T00:00:00Z",
                "deletedBy": "#1:1",
            })],
        ]);
        let sub = Subquery::new(Target::Class("AliasOf".into()));
        let query = WrapperQuery::new(QueryCore::Flat(sub));
        let record = remove(&pool, &reg, "AliasOf", &query, &user).await.unwrap();
        assert_eq!(record.fields.get("out"), Some(&json!("#10:3")));
        assert_eq!(record.fields.get("in"), Some(&json!("#10:4")));
    }
}
