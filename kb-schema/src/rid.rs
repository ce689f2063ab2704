use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;

static RID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#?(\d+):(\d+)$").unwrap());

/// A record identifier, `cluster:position`, printed as `#cluster:position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RecordId {
    pub cluster: u32,
    pub position: u64,
}

impl RecordId {
    pub fn new(cluster: u32, position: u64) -> Self {
        Self { cluster, position }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}:{}", self.cluster, self.position)
    }
}

impl FromStr for RecordId {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let caps = RID_RE.captures(s).ok_or_else(|| SchemaError::CastFailure {
            property: "recordId".into(),
            value: Value::String(s.to_string()),
            reason: "expected '#cluster:position'".into(),
        })?;
        let cluster: u32 = caps[1].parse().map_err(|_| SchemaError::CastFailure {
            property: "recordId".into(),
            value: Value::String(s.to_string()),
            reason: "cluster is not a valid integer".into(),
        })?;
        let position: u64 = caps[2].parse().map_err(|_| SchemaError::CastFailure {
            property: "recordId".into(),
            value: Value::String(s.to_string()),
            reason: "position is not a valid integer".into(),
        })?;
        Ok(RecordId { cluster, position })
    }
}

impl TryFrom<String> for RecordId {
    type Error = SchemaError;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RecordId> for String {
    fn from(rid: RecordId) -> Self {
        rid.to_string()
    }
}

/// Implements `castToRID`: accepts a `#c:p` / `c:p` string, or an object
/// carrying a `recordId` field of the same shape.
pub fn cast_to_rid(value: &Value) -> Result<RecordId, SchemaError> {
    match value {
        Value::String(s) => s.parse(),
        Value::Object(map) => {
            let rid = map.get("recordId").ok_or_else(|| SchemaError::CastFailure {
                property: "recordId".into(),
                value: value.clone(),
                reason: "object has no 'recordId' field".into(),
            })?;
            match rid {
                Value::String(s) => s.parse(),
                other => Err(SchemaError::CastFailure {
                    property: "recordId".into(),
                    value: other.clone(),
                    reason: "recordId field is not a string".into(),
                }),
            }
        }
        other => Err(SchemaError::CastFailure {
            property: "recordId".into(),
            value: other.clone(),
            reason: "expected a string or an object with a recordId field".into(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_with_and_without_hash() {
        assert_eq!("12:34".parse::<RecordId>().unwrap(), RecordId::new(12, 34));
        assert_eq!("#12:34".parse::<RecordId>().unwrap(), RecordId::new(12, 34));
    }

    #[test]
    fn rejects_malformed() {
        assert!("12-34".parse::<RecordId>().is_err());
        assert!("abc:34".parse::<RecordId>().is_err());
    }

    #[test]
    fn cast_from_object() {
        let v = serde_json::json!({"recordId": "#5:6"});
        assert_eq!(cast_to_rid(&v).unwrap(), RecordId::new(5, 6));
    }

    #[test]
    fn display_round_trips() {
        let rid = RecordId::new(1, 2);
        assert_eq!(rid.to_string(), "#1:2");
        assert_eq!(rid.to_string().parse::<RecordId>().unwrap(), rid);
    }
}
