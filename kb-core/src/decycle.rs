//! Cycle-free JSON result trees (spec §6 wire format, §9 Design Notes
//! "Cycles"): before serialisation, replace an already-seen record with a
//! `{"$ref": recordId}` stub instead of re-emitting its full content.

use serde_json::{Map, Value};
use std::collections::HashSet;

/// Walks `value`, keyed on `@rid` (a recordId is globally unique, so it
/// alone is enough to dedupe regardless of `@class`), replacing any
/// repeated record object with a reference stub.
pub fn decycle(value: &Value) -> Value {
    let mut seen = HashSet::new();
    decycle_inner(value, &mut seen)
}

fn decycle_inner(value: &Value, seen: &mut HashSet<String>) -> Value {
    match value {
        Value::Object(map) => {
            if let Some(rid) = map.get("@rid").and_then(Value::as_str) {
                if !seen.insert(rid.to_string()) {
                    return Value::Object(Map::from_iter([(
                        "$ref".to_string(),
                        Value::String(rid.to_string()),
                    )]));
                }
            }
            let mut out = Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), decycle_inner(v, seen));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(|v| decycle_inner(v, seen)).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn leaves_the_first_occurrence_untouched() {
        let value = json!({"@rid": "#1:1", "@class": "Disease", "name": "cancer"});
        assert_eq!(decycle(&value), value);
    }

    #[test]
    fn replaces_a_repeated_record_with_a_ref() {
        let neighbour = json!({"@rid": "#1:2", "@class": "Disease", "name": "other"});
        let value = json!({
            "@rid": "#1:1",
            "@class": "Disease",
            "alias": neighbour,
            "aliases": [neighbour],
        });
        let out = decycle(&value);
        assert_eq!(out["alias"], json!({"$ref": "#1:2"}));
        assert_eq!(out["aliases"][0], json!({"$ref": "#1:2"}));
    }

    #[test]
    fn is_a_no_op_on_acyclic_values() {
        let value = json!({"a": [1, 2, {"b": "c"}], "d": null});
        assert_eq!(decycle(&value), value);
    }
}
