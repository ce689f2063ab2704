//! `selectCounts` (spec §4.8): aggregate row counts per class, optionally
//! split by `source` and filtered to active rows.

use indexmap::IndexMap;
use kb_connector::{check_class_permissions, with_session, DomainError, DomainResult, Operation, SessionPool, User};
use kb_schema::registry::SchemaRegistry;
use serde_json::Value;

#[derive(Debug, Clone)]
pub struct CountsOptions {
    pub class_list: Vec<String>,
    pub active_only: bool,
    pub group_by_source: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassCount {
    pub class: String,
    pub source: Option<String>,
    pub count: u64,
}

/// `selectCounts({classList, activeOnly, groupBySource})`: one `SELECT
/// count(*) ... [GROUP BY source]` per class (spec §4.8). Class names come
/// from the schema-validated `classList`, not user-supplied scalars, so
/// they're interpolated directly into the statement text — the same
/// pattern `Target::Class` already uses in the query builder.
#[tracing::instrument(skip(pool, registry, opts, user), fields(user = %user.id, classes = opts.class_list.len()))]
pub async fn select_counts(
    pool: &dyn SessionPool,
    registry: &SchemaRegistry,
    opts: &CountsOptions,
    user: &User,
) -> DomainResult<Vec<ClassCount>> {
    let mut results = Vec::new();
    for class in &opts.class_list {
        registry.get(class)?;
        if !check_class_permissions(user, class, Operation::Read) {
            tracing::warn!(class, "read permission denied");
            return Err(DomainError::permission(format!("user lacks read permission on '{class}'")));
        }

        let mut sql = if opts.group_by_source {
            format!("SELECT count(*) AS count, source FROM {class}")
        } else {
            format!("SELECT count(*) AS count FROM {class}")
        };
        if opts.active_only {
            sql.push_str(" WHERE deletedAt IS NULL");
        }
        if opts.group_by_source {
            sql.push_str(" GROUP BY source");
        }

        let rows = with_session(pool, |session| {
            let sql = sql.clone();
            Box::pin(async move { session.execute(&sql, &IndexMap::new()).await })
        })
        .await?;

        if rows.is_empty() {
            results.push(ClassCount { class: class.clone(), source: None, count: 0 });
            continue;
        }
        for row in rows {
            let count = row.get("count").and_then(Value::as_u64).unwrap_or(0);
            let source = row.get("source").and_then(Value::as_str).map(str::to_string);
            results.push(ClassCount { class: class.clone(), source, count });
        }
    }
    tracing::debug!(rows = results.len(), "select_counts completed");
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests_support::{user_with, user_with_read, FakePool};
    use kb_schema::class::Class;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(Class::new("Disease"));
        reg
    }

    #[tokio::test]
    async fn select_counts_returns_one_row_per_class() {
        let reg = registry();
        let user = user_with_read("Disease");
        let pool = FakePool::new(vec![json!({"count": 42})]);
        let opts = CountsOptions { class_list: vec!["Disease".into()], active_only: true, group_by_source: false };
        let counts = select_counts(&pool, &reg, &opts, &user).await.unwrap();
        assert_eq!(counts, vec![ClassCount { class: "Disease".into(), source: None, count: 42 }]);
    }

    #[tokio::test]
    async fn select_counts_splits_by_source_when_requested() {
        let reg = registry();
        let user = user_with_read("Disease");
        let pool = FakePool::new(vec![json!({"count": 10, "source": "a"}), json!({"count": 5, "source": "b"})]);
        let opts = CountsOptions { class_list: vec!["Disease".into()], active_only: false, group_by_source: true };
        let counts = select_counts(&pool, &reg, &opts, &user).await.unwrap();
        assert_eq!(counts.len(), 2);
        assert!(counts.iter().any(|c| c.source.as_deref() == Some("a") && c.count == 10));
    }

    #[tokio::test]
    async fn select_counts_rejects_without_read_permission() {
        let reg = registry();
        let user = user_with("Disease", enumflags2::BitFlags::empty());
        let pool = FakePool::new(vec![json!({"count": 1})]);
        let opts = CountsOptions { class_list: vec!["Disease".into()], active_only: true, group_by_source: false };
        let err = select_counts(&pool, &reg, &opts, &user).await.unwrap_err();
        assert!(matches!(err, DomainError::Permission { .. }));
    }
}
