//! Converts between a store row (`serde_json::Value`) and `kb_schema::Record`,
//! and renders the INSERT/CREATE EDGE/UPDATE statements the record
//! operations issue. Every scalar reaches the SQL text through
//! `kb_query::ParamBinder`, matching the query builder's no-interpolation
//! discipline (spec §9 Design Notes).

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use kb_connector::{DomainError, DomainResult};
use kb_query::ParamBinder;
use kb_schema::record::{Record, RecordMeta};
use kb_schema::RecordId;
use serde_json::Value;

const META_KEYS: &[&str] = &[
    "@rid",
    "@class",
    "createdAt",
    "createdBy",
    "deletedAt",
    "deletedBy",
    "history",
    "groupRestrictions",
];

/// Parses one raw store row into a `Record`, splitting bookkeeping fields
/// (spec §3 "Record") from the domain field map.
pub fn parse_record(row: &Value) -> DomainResult<Record> {
    let Value::Object(map) = row else {
        return Err(DomainError::validation("expected a record object from the store"));
    };

    let record_id = parse_rid_field(map.get("@rid"), "@rid")?
        .ok_or_else(|| DomainError::validation("row is missing '@rid'"))?;
    let class = map
        .get("@class")
        .and_then(Value::as_str)
        .ok_or_else(|| DomainError::validation("row is missing '@class'"))?
        .to_string();
    let created_at = parse_datetime(map.get("createdAt"))?
        .ok_or_else(|| DomainError::validation("row is missing 'createdAt'"))?;
    let created_by = parse_rid_field(map.get("createdBy"), "createdBy")?
        .ok_or_else(|| DomainError::validation("row is missing 'createdBy'"))?;
    let deleted_at = parse_datetime(map.get("deletedAt"))?;
    let deleted_by = parse_rid_field(map.get("deletedBy"), "deletedBy")?;
    let history = parse_rid_field(map.get("history"), "history")?;
    let group_restrictions = match map.get("groupRestrictions") {
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .ok_or_else(|| DomainError::validation("groupRestrictions entry is not a string"))
                    .and_then(|s| s.parse::<RecordId>().map_err(DomainError::from))
            })
            .collect::<DomainResult<Vec<_>>>()?,
        _ => Vec::new(),
    };

    let mut fields = IndexMap::new();
    for (key, value) in map {
        if key.starts_with('@') || META_KEYS.contains(&key.as_str()) {
            continue;
        }
        fields.insert(key.clone(), value.clone());
    }

    Ok(Record {
        meta: RecordMeta {
            record_id,
            class,
            created_at,
            created_by,
            deleted_at,
            deleted_by,
            history,
            group_restrictions,
        },
        fields,
    })
}

fn parse_rid_field(value: Option<&Value>, field: &str) -> DomainResult<Option<RecordId>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => s.parse().map(Some).map_err(DomainError::from),
        Some(other) => Err(DomainError::validation(format!(
            "expected '{field}' to be a record-id string, got {other}"
        ))),
    }
}

fn parse_datetime(value: Option<&Value>) -> DomainResult<Option<DateTime<Utc>>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => DateTime::parse_from_rfc3339(s)
            .map(|dt| Some(dt.with_timezone(&Utc)))
            .map_err(|e| DomainError::validation(format!("invalid timestamp '{s}': {e}"))),
        Some(other) => Err(DomainError::validation(format!(
            "expected a timestamp string, got {other}"
        ))),
    }
}

/// `INSERT INTO <class> SET k = :pN, ... RETURN AFTER @this`.
pub fn render_insert(class: &str, fields: &IndexMap<String, Value>) -> (String, IndexMap<String, Value>) {
    let mut binder = ParamBinder::new();
    let assignments: Vec<String> =
        fields.iter().map(|(k, v)| format!("{k} = {}", binder.bind(v.clone()))).collect();
    let sql = if assignments.is_empty() {
        format!("INSERT INTO {class} RETURN AFTER @this")
    } else {
        format!("INSERT INTO {class} SET {} RETURN AFTER @this", assignments.join(", "))
    };
    (sql, binder.into_params())
}

/// `CREATE EDGE <class> FROM :pOut TO :pIn SET k = :pN, ... RETURN AFTER @this`.
pub fn render_create_edge(
    class: &str,
    out: RecordId,
    in_: RecordId,
    fields: &IndexMap<String, Value>,
) -> (String, IndexMap<String, Value>) {
    let mut binder = ParamBinder::new();
    let out_ph = binder.bind(Value::String(out.to_string()));
    let in_ph = binder.bind(Value::String(in_.to_string()));
    let assignments: Vec<String> =
        fields.iter().map(|(k, v)| format!("{k} = {}", binder.bind(v.clone()))).collect();
    let sql = if assignments.is_empty() {
        format!("CREATE EDGE {class} FROM {out_ph} TO {in_ph} RETURN AFTER @this")
    } else {
        format!(
            "CREATE EDGE {class} FROM {out_ph} TO {in_ph} SET {} RETURN AFTER @this",
            assignments.join(", ")
        )
    };
    (sql, binder.into_params())
}

/// `UPDATE <class> SET k = :pN, ... WHERE @rid = :pRid RETURN AFTER @this`.
pub fn render_update(
    class: &str,
    rid: RecordId,
    fields: &IndexMap<String, Value>,
) -> (String, IndexMap<String, Value>) {
    let mut binder = ParamBinder::new();
    let assignments: Vec<String> =
        fields.iter().map(|(k, v)| format!("{k} = {}", binder.bind(v.clone()))).collect();
    let rid_ph = binder.bind(Value::String(rid.to_string()));
    let sql = format!(
        "UPDATE {class} SET {} WHERE @rid = {rid_ph} RETURN AFTER @this",
        assignments.join(", ")
    );
    (sql, binder.into_params())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parse_record_splits_meta_from_fields() {
        let row = json!({
            "@rid": "#10:1",
            "@class": "Disease",
            "createdAt": "2020-01-01T00:00:00Z",
            "createdBy": "#1:1",
            "name": "cancer",
        });
        let record = parse_record(&row).unwrap();
        assert_eq!(record.meta.record_id, RecordId::new(10, 1));
        assert_eq!(record.meta.class, "Disease");
        assert!(record.meta.deleted_at.is_none());
        assert_eq!(record.fields.get("name"), Some(&json!("cancer")));
        assert!(!record.fields.contains_key("@rid"));
        assert!(!record.fields.contains_key("createdAt"));
    }

    #[test]
    fn parse_record_rejects_missing_rid() {
        let row = json!({"@class": "Disease", "createdAt": "2020-01-01T00:00:00Z", "createdBy": "#1:1"});
        assert!(parse_record(&row).is_err());
    }

    #[test]
    fn render_insert_binds_every_field() {
        let mut fields = IndexMap::new();
        fields.insert("name".to_string(), json!("cancer"));
        fields.insert("sourceId".to_string(), json!("1234"));
        let (sql, params) = render_insert("Disease", &fields);
        assert_eq!(sql, "INSERT INTO Disease SET name = :p0, sourceId = :p1 RETURN AFTER @this");
        assert_eq!(params.get("p0"), Some(&json!("cancer")));
    }

    #[test]
    fn render_update_binds_rid_last() {
        let mut fields = IndexMap::new();
        fields.insert("name".to_string(), json!("new name"));
        let (sql, params) = render_update("Disease", RecordId::new(1, 2), &fields);
        assert_eq!(sql, "UPDATE Disease SET name = :p0 WHERE @rid = :p1 RETURN AFTER @this");
        assert_eq!(params.get("p1"), Some(&json!("#1:2")));
    }
}
