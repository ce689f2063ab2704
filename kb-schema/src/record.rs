use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde_json::Value;

use crate::rid::RecordId;

/// Bookkeeping fields every persisted record carries, per spec.md §3.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMeta {
    pub record_id: RecordId,
    pub class: String,
    pub created_at: DateTime<Utc>,
    pub created_by: RecordId,
    pub deleted_at: Option<DateTime<Utc>>,
    pub deleted_by: Option<RecordId>,
    pub history: Option<RecordId>,
    pub group_restrictions: Vec<RecordId>,
}

impl RecordMeta {
    pub fn is_active(&self) -> bool {
        self.deleted_at.is_none()
    }
}

/// A full record: bookkeeping plus a flat map of domain fields.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub meta: RecordMeta,
    pub fields: IndexMap<String, Value>,
}

impl Record {
    pub fn get(&self, property: &str) -> Option<&Value> {
        self.fields.get(property)
    }
}
