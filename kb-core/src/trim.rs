//! Neighbour trimming applied to a selected record's field tree (spec
//! §4.8 `select`): drop neighbours whose `deletedAt` is set (when
//! `activeOnly`), drop neighbours the caller cannot read, and prune
//! backref arrays for group-restricted records.

use kb_connector::{check_class_permissions, has_record_access, Operation, User};
use kb_schema::RecordId;
use serde_json::Value;

/// Walks a field value in place, dropping (nulling out, or removing from
/// an array) any nested record object the user should not see.
pub fn trim_field(value: &mut Value, user: &User, active_only: bool) {
    match value {
        Value::Array(items) => {
            items.retain(|item| !should_drop(item, user, active_only));
            for item in items.iter_mut() {
                trim_field(item, user, active_only);
            }
        }
        Value::Object(_) => {
            if should_drop(value, user, active_only) {
                *value = Value::Null;
                return;
            }
            if let Value::Object(map) = value {
                for nested in map.values_mut() {
                    trim_field(nested, user, active_only);
                }
            }
        }
        _ => {}
    }
}

fn should_drop(item: &Value, user: &User, active_only: bool) -> bool {
    let Value::Object(map) = item else { return false };
    let Some(class) = map.get("@class").and_then(Value::as_str) else {
        return false;
    };

    if active_only {
        if let Some(deleted_at) = map.get("deletedAt") {
            if !deleted_at.is_null() {
                return true;
            }
        }
    }

    if !check_class_permissions(user, class, Operation::Read) {
        return true;
    }

    if let Some(Value::Array(restrictions)) = map.get("groupRestrictions") {
        let rids: Vec<RecordId> =
            restrictions.iter().filter_map(|v| v.as_str()).filter_map(|s| s.parse().ok()).collect();
        if !has_record_access(user, &rids) {
            return true;
        }
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_connector::Group;
    use serde_json::json;

    fn rid(pos: u64) -> RecordId {
        RecordId::new(1, pos)
    }

    #[test]
    fn drops_deleted_neighbour_when_active_only() {
        let user = User::new(rid(1), vec![]);
        let mut value = json!({"@class": "Disease", "@rid": "#1:2", "deletedAt": "2020-01-01T00:00:00Z"});
        trim_field(&mut value, &user, true);
        assert!(value.is_null());
    }

    #[test]
    fn keeps_deleted_neighbour_when_not_active_only() {
        let reader = Group::new(rid(9)).allow("Disease", Operation::Read.into());
        let user = User::new(rid(1), vec![reader]);
        let mut value = json!({"@class": "Disease", "@rid": "#1:2", "deletedAt": "2020-01-01T00:00:00Z"});
        trim_field(&mut value, &user, false);
        assert!(!value.is_null());
    }

    #[test]
    fn drops_neighbour_without_read_permission() {
        let user = User::new(rid(1), vec![]);
        let mut value = json!({"@class": "Disease", "@rid": "#1:2"});
        trim_field(&mut value, &user, true);
        assert!(value.is_null());
    }

    #[test]
    fn drops_neighbour_outside_group_restriction() {
        let reader = Group::new(rid(9)).allow("Disease", Operation::Read.into());
        let user = User::new(rid(1), vec![reader]);
        let mut value =
            json!({"@class": "Disease", "@rid": "#1:2", "groupRestrictions": ["#1:99"]});
        trim_field(&mut value, &user, true);
        assert!(value.is_null());
    }

    #[test]
    fn prunes_array_elements_independently() {
        let reader = Group::new(rid(9)).allow("Disease", Operation::Read.into());
        let user = User::new(rid(1), vec![reader]);
        let mut value = Value::Array(vec![
            json!({"@class": "Disease", "@rid": "#1:2"}),
            json!({"@class": "Disease", "@rid": "#1:3", "deletedAt": "2020-01-01T00:00:00Z"}),
        ]);
        trim_field(&mut value, &user, true);
        assert_eq!(value.as_array().unwrap().len(), 1);
    }
}
