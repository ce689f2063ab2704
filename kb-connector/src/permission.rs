//! Permission Gate (spec §4.10): per-class CRUD bitmasks and per-record
//! group restrictions.

use std::collections::HashMap;

use enumflags2::{bitflags, BitFlags};
use kb_schema::RecordId;

#[bitflags]
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Read = 1,
    Update = 2,
    Delete = 4,
    Create = 8,
}

#[derive(Debug, Clone)]
pub struct Group {
    pub id: RecordId,
    /// Per-class permission bitmask (`R=1,U=2,D=4,C=8`).
    pub permissions: HashMap<String, BitFlags<Operation>>,
}

impl Group {
    pub fn new(id: RecordId) -> Self {
        Group { id, permissions: HashMap::new() }
    }

    pub fn allow(mut self, class: impl Into<String>, ops: BitFlags<Operation>) -> Self {
        self.permissions.insert(class.into(), ops);
        self
    }

    fn allows(&self, class: &str, op: Operation) -> bool {
        self.permissions.get(class).map(|mask| mask.contains(op)).unwrap_or(false)
    }
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: RecordId,
    pub groups: Vec<Group>,
}

impl User {
    pub fn new(id: RecordId, groups: Vec<Group>) -> Self {
        User { id, groups }
    }

    pub fn group_ids(&self) -> Vec<RecordId> {
        self.groups.iter().map(|g| g.id).collect()
    }
}

/// `checkClassPermissions(user, class, op)`: allowed if any of the user's
/// groups sets the matching bit for `class`.
pub fn check_class_permissions(user: &User, class: &str, op: Operation) -> bool {
    user.groups.iter().any(|g| g.allows(class, op))
}

/// `hasRecordAccess(user, record)`: true unless the record declares group
/// restrictions disjoint from the user's groups.
pub fn has_record_access(user: &User, group_restrictions: &[RecordId]) -> bool {
    if group_restrictions.is_empty() {
        return true;
    }
    let user_groups = user.group_ids();
    group_restrictions.iter().any(|g| user_groups.contains(g))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rid(pos: u64) -> RecordId {
        RecordId::new(1, pos)
    }

    #[test]
    fn class_permission_allowed_if_any_group_sets_the_bit() {
        let reader = Group::new(rid(1)).allow("Disease", Operation::Read.into());
        let user = User::new(rid(100), vec![reader]);
        assert!(check_class_permissions(&user, "Disease", Operation::Read));
        assert!(!check_class_permissions(&user, "Disease", Operation::Delete));
    }

    #[test]
    fn record_access_true_when_no_restrictions() {
        let user = User::new(rid(100), vec![]);
        assert!(has_record_access(&user, &[]));
    }

    #[test]
    fn record_access_true_iff_groups_intersect() {
        let group = Group::new(rid(5));
        let user = User::new(rid(100), vec![group]);
        assert!(has_record_access(&user, &[rid(5)]));
        assert!(!has_record_access(&user, &[rid(6)]));
    }
}
