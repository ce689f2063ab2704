//! Wrapper Query (spec §4.6): projection, ordering, skip/limit, count.

use indexmap::IndexMap;
use kb_schema::registry::SchemaRegistry;
use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::params::ParamBinder;
use crate::subquery::{FixedSubquery, Subquery, MAX_NEIGHBORS};
use crate::traversal::parse_traversal_string;

pub const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    Asc,
    Desc,
}

impl OrderDirection {
    fn sql(self) -> &'static str {
        match self {
            OrderDirection::Asc => "ASC",
            OrderDirection::Desc => "DESC",
        }
    }
}

/// What the wrapper is wrapping: a flat filter subquery, or one of the
/// fixed algorithmic traversals.
#[derive(Debug, Clone)]
pub enum QueryCore {
    Flat(Subquery),
    Fixed(FixedSubquery),
}

impl QueryCore {
    fn render(&self, registry: &SchemaRegistry, binder: &mut ParamBinder) -> QueryResult<String> {
        match self {
            QueryCore::Flat(sub) => sub.render(registry, binder),
            QueryCore::Fixed(fixed) => fixed.render(registry, binder),
        }
    }

    fn start_class(&self) -> &str {
        match self {
            QueryCore::Flat(sub) => sub.start_class(),
            QueryCore::Fixed(fixed) => match fixed {
                FixedSubquery::Ancestors { base, .. }
                | FixedSubquery::Descendants { base, .. }
                | FixedSubquery::Neighborhood { base, .. }
                | FixedSubquery::SimilarTo { base } => base.start_class(),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct WrapperQuery {
    pub core: Option<QueryCore>,
    pub return_properties: Option<Vec<String>>,
    pub neighbors: Option<i64>,
    pub history: bool,
    pub order_by: Option<Vec<String>>,
    pub order_by_direction: OrderDirection,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub count: bool,
}

impl Default for OrderDirection {
    fn default() -> Self {
        OrderDirection::Asc
    }
}

impl WrapperQuery {
    pub fn new(core: QueryCore) -> Self {
        WrapperQuery { core: Some(core), ..Default::default() }
    }

    pub fn with_return_properties(mut self, props: Vec<String>) -> Self {
        self.return_properties = Some(props);
        self
    }

    pub fn with_neighbors(mut self, depth: i64) -> Self {
        self.neighbors = Some(depth);
        self
    }

    pub fn with_history(mut self, history: bool) -> Self {
        self.history = history;
        self
    }

    pub fn with_order_by(mut self, attrs: Vec<String>, direction: OrderDirection) -> Self {
        self.order_by = Some(attrs);
        self.order_by_direction = direction;
        self
    }

    pub fn with_skip(mut self, skip: i64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn with_limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_count(mut self, count: bool) -> Self {
        self.count = count;
        self
    }

    /// The class a query ultimately selects from. Empty when the core
    /// targets a heterogeneous `RecordIds` list rather than a single class
    /// (used by callers that need the class to run a permission check).
    pub fn target_class(&self) -> Option<&str> {
        self.core.as_ref().map(|c| c.start_class())
    }

    fn validate_attr_paths(&self, registry: &SchemaRegistry, attrs: &[String]) -> QueryResult<()> {
        let Some(core) = &self.core else {
            return Err(QueryError::Validation("wrapper query has no target".into()));
        };
        let start_class = core.start_class();
        for attr in attrs {
            let path = parse_traversal_string(attr)?;
            let resolved = path.resolve_terminal(registry, start_class)?;
            if resolved.is_none() && !attr.ends_with("size()") {
                return Err(QueryError::InvalidPath(attr.clone()));
            }
        }
        Ok(())
    }

    fn neighbor_projection(depth: i64, history: bool) -> String {
        let fields = if history {
            "*, @rid, @class".to_string()
        } else {
            "*, @rid, @class EXCEPT history".to_string()
        };
        if depth == 0 {
            fields
        } else {
            format!("{fields}, *:{{{}}}", Self::neighbor_projection(depth - 1, history))
        }
    }

    /// Compile to `(sqlText, params)`.
    pub fn build(&self, registry: &SchemaRegistry) -> QueryResult<(String, IndexMap<String, Value>)> {
        let core = self
            .core
            .as_ref()
            .ok_or_else(|| QueryError::Validation("wrapper query has no target".into()))?;

        let mut binder = ParamBinder::new();
        let core_sql = core.render(registry, &mut binder)?;

        if self.count {
            let sql = format!("SELECT count(*) AS count FROM ({core_sql})");
            return Ok((sql, binder.into_params()));
        }

        let needs_wrapper = self.return_properties.is_some()
            || self.neighbors.is_some()
            || self.order_by.is_some()
            || self.skip.is_some()
            || self.limit.is_some();

        if !needs_wrapper {
            return Ok((core_sql, binder.into_params()));
        }

        let projection = if let Some(props) = &self.return_properties {
            self.validate_attr_paths(registry, props)?;
            props.join(", ")
        } else if let Some(depth) = self.neighbors {
            if !(0..=MAX_NEIGHBORS).contains(&depth) {
                return Err(QueryError::OutOfRange {
                    field: "neighbors".into(),
                    min: 0,
                    max: MAX_NEIGHBORS,
                    got: depth,
                });
            }
            Self::neighbor_projection(depth, self.history)
        } else {
            "*".to_string()
        };

        let mut sql = format!("SELECT {projection} FROM ({core_sql})");

        if let Some(order_by) = &self.order_by {
            self.validate_attr_paths(registry, order_by)?;
            let direction = self.order_by_direction.sql();
            let items: Vec<String> = order_by.iter().map(|a| format!("{a} {direction}")).collect();
            sql.push_str(&format!(" ORDER BY {}", items.join(", ")));
        }

        let skip = self.skip.unwrap_or(0);
        if skip < 0 {
            return Err(QueryError::OutOfRange { field: "skip".into(), min: 0, max: i64::MAX, got: skip });
        }
        let limit = self.limit.unwrap_or(MAX_LIMIT);
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(QueryError::OutOfRange { field: "limit".into(), min: 1, max: MAX_LIMIT, got: limit });
        }
        sql.push_str(&format!(" SKIP {skip} LIMIT {limit}"));

        Ok((sql, binder.into_params()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Comparison, FilterNode, FilterValue};
    use crate::subquery::Target;
    use crate::traversal::TraversalPath;
    use kb_schema::class::Class;
    use kb_schema::property::PropertyType;
    use kb_schema::Property as SchemaProperty;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(
            Class::new("Disease")
                .with_property(SchemaProperty::new("name", PropertyType::String))
                .with_property(SchemaProperty::new("sourceId", PropertyType::String)),
        );
        reg
    }

    #[test]
    fn no_wrapping_fields_means_no_wrapper() {
        let reg = registry();
        let sub = Subquery::new(Target::Class("Disease".into())).with_filters(FilterNode::Comparison(
            Comparison::new(TraversalPath::direct("name"), FilterValue::Scalar(json!("thing"))),
        ));
        let wq = WrapperQuery::new(QueryCore::Flat(sub));
        let (sql, _) = wq.build(&reg).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT * FROM Disease WHERE name = :p0) WHERE deletedAt IS NULL"
        );
    }

    #[test]
    fn count_ignores_order_and_paging() {
        let reg = registry();
        let sub = Subquery::new(Target::Class("Disease".into()));
        let wq = WrapperQuery::new(QueryCore::Flat(sub))
            .with_count(true)
            .with_limit(5)
            .with_order_by(vec!["name".into()], OrderDirection::Asc);
        let (sql, _) = wq.build(&reg).unwrap();
        assert!(sql.starts_with("SELECT count(*) AS count FROM ("));
    }

    #[test]
    fn limit_out_of_range_rejected() {
        let reg = registry();
        let sub = Subquery::new(Target::Class("Disease".into()));
        let wq = WrapperQuery::new(QueryCore::Flat(sub)).with_limit(0);
        assert!(wq.build(&reg).is_err());
    }

    #[test]
    fn return_properties_must_be_valid_paths() {
        let reg = registry();
        let sub = Subquery::new(Target::Class("Disease".into()));
        let wq = WrapperQuery::new(QueryCore::Flat(sub)).with_return_properties(vec!["nonexistent".into()]);
        assert!(wq.build(&reg).is_err());
    }

    #[test]
    fn order_by_renders_direction() {
        let reg = registry();
        let sub = Subquery::new(Target::Class("Disease".into()));
        let wq = WrapperQuery::new(QueryCore::Flat(sub))
            .with_order_by(vec!["name".into()], OrderDirection::Desc)
            .with_limit(10);
        let (sql, _) = wq.build(&reg).unwrap();
        assert!(sql.contains("ORDER BY name DESC"));
        assert!(sql.contains("SKIP 0 LIMIT 10"));
    }
}
