//! Subquery Core (spec §4.5): `Subquery` and the `FixedSubquery` variants
//! (`ancestors`, `descendants`, `neighborhood`, `similarTo`).

use kb_schema::registry::SchemaRegistry;
use kb_schema::RecordId;

use crate::error::{QueryError, QueryResult};
use crate::filter::FilterNode;
use crate::params::ParamBinder;

pub const MAX_TRAVEL_DEPTH: i64 = 50;
pub const MAX_NEIGHBORS: i64 = 3;

/// The fixed disambiguation edge set used by `similarTo` (§4.5).
pub const SIMILARITY_EDGES: &[&str] =
    &["AliasOf", "ElementOf", "CrossReferenceOf", "DeprecatedBy", "GeneralizationOf", "Infers"];

pub const DEFAULT_TREE_EDGE: &str = "SubClassOf";

#[derive(Debug, Clone)]
pub enum Target {
    Class(String),
    RecordIds(Vec<RecordId>),
    Sub(Box<Subquery>),
    /// Not part of the §4.5 table directly, but required to compose the
    /// keyword search builder's `$ont ∪ $variants` set (§4.7) out of the
    /// same `Target`/`Subquery` primitives rather than ad hoc SQL text.
    Union(Vec<Subquery>),
}

impl Target {
    fn render(&self, registry: &SchemaRegistry, binder: &mut ParamBinder) -> QueryResult<String> {
        match self {
            Target::Class(name) => {
                registry.get(name)?;
                Ok(name.clone())
            }
            Target::RecordIds(ids) => {
                let rendered: Vec<String> = ids.iter().map(|r| r.to_string()).collect();
                Ok(format!("[{}]", rendered.join(", ")))
            }
            Target::Sub(sub) => Ok(format!("({})", sub.render(registry, binder)?)),
            Target::Union(subs) => {
                let mut parts = Vec::with_capacity(subs.len());
                for sub in subs {
                    parts.push(format!("({})", sub.render(registry, binder)?));
                }
                Ok(format!("({})", parts.join(" UNION ")))
            }
        }
    }

    fn start_class(&self) -> &str {
        match self {
            Target::Class(name) => name.as_str(),
            Target::RecordIds(_) => "",
            Target::Sub(sub) => sub.start_class(),
            Target::Union(subs) => subs.first().map(|s| s.start_class()).unwrap_or(""),
        }
    }
}

/// `Subquery{target, history, filters}`.
#[derive(Debug, Clone)]
pub struct Subquery {
    pub target: Target,
    pub history: bool,
    pub filters: Option<FilterNode>,
}

impl Subquery {
    pub fn new(target: Target) -> Self {
        Subquery { target, history: false, filters: None }
    }

    pub fn with_history(mut self, history: bool) -> Self {
        self.history = history;
        self
    }

    pub fn with_filters(mut self, filters: FilterNode) -> Self {
        self.filters = Some(filters);
        self
    }

    pub(crate) fn start_class(&self) -> &str {
        self.target.start_class()
    }

    fn render_inner(&self, registry: &SchemaRegistry, binder: &mut ParamBinder) -> QueryResult<String> {
        let target_sql = self.target.render(registry, binder)?;
        match &self.filters {
            Some(filters) => {
                let filters_sql = filters.render(registry, self.start_class(), binder)?;
                Ok(format!("SELECT * FROM {target_sql} WHERE {filters_sql}"))
            }
            None => Ok(format!("SELECT * FROM {target_sql}")),
        }
    }

    pub fn render(&self, registry: &SchemaRegistry, binder: &mut ParamBinder) -> QueryResult<String> {
        let inner = self.render_inner(registry, binder)?;
        if self.history {
            Ok(inner)
        } else {
            Ok(format!("SELECT * FROM ({inner}) WHERE deletedAt IS NULL"))
        }
    }
}

fn render_edges(edges: &[String]) -> String {
    edges.iter().map(|e| format!("'{e}'")).collect::<Vec<_>>().join(", ")
}

fn validate_edges(registry: &SchemaRegistry, edges: &[String]) -> QueryResult<()> {
    if edges.is_empty() {
        return Err(QueryError::Validation("at least one edge class is required".into()));
    }
    for edge in edges {
        let class = registry.get(edge)?;
        if !class.is_edge {
            return Err(QueryError::UnknownEdge(edge.clone()));
        }
    }
    Ok(())
}

fn validate_depth(depth: i64, min: i64, max: i64) -> QueryResult<()> {
    if depth < min || depth > max {
        return Err(QueryError::OutOfRange { field: "depth".into(), min, max, got: depth });
    }
    Ok(())
}

#[derive(Debug, Clone)]
pub enum FixedSubquery {
    Ancestors { base: Subquery, edges: Vec<String>, depth: i64 },
    Descendants { base: Subquery, edges: Vec<String>, depth: i64 },
    Neighborhood { base: Subquery, edges: Vec<String>, depth: i64 },
    SimilarTo { base: Subquery },
}

impl FixedSubquery {
    pub fn ancestors(base: Subquery, edges: Vec<String>, depth: i64) -> Self {
        FixedSubquery::Ancestors { base, edges, depth }
    }

    pub fn descendants(base: Subquery, edges: Vec<String>, depth: i64) -> Self {
        FixedSubquery::Descendants { base, edges, depth }
    }

    pub fn neighborhood(base: Subquery, edges: Vec<String>, depth: i64) -> Self {
        FixedSubquery::Neighborhood { base, edges, depth }
    }

    pub fn similar_to(base: Subquery) -> Self {
        FixedSubquery::SimilarTo { base }
    }

    pub fn history(&self) -> bool {
        match self {
            FixedSubquery::Ancestors { base, .. }
            | FixedSubquery::Descendants { base, .. }
            | FixedSubquery::Neighborhood { base, .. }
            | FixedSubquery::SimilarTo { base } => base.history,
        }
    }

    pub fn render(&self, registry: &SchemaRegistry, binder: &mut ParamBinder) -> QueryResult<String> {
        match self {
            FixedSubquery::Ancestors { base, edges, depth } => {
                validate_edges(registry, edges)?;
                validate_depth(*depth, 1, MAX_TRAVEL_DEPTH)?;
                let inner = base.render_inner(registry, binder)?;
                let traverse =
                    format!("TRAVERSE in({}) FROM ({inner}) MAXDEPTH {depth}", render_edges(edges));
                Ok(wrap_unless_history(traverse, base.history))
            }
            FixedSubquery::Descendants { base, edges, depth } => {
                validate_edges(registry, edges)?;
                validate_depth(*depth, 1, MAX_TRAVEL_DEPTH)?;
                let inner = base.render_inner(registry, binder)?;
                let traverse =
                    format!("TRAVERSE out({}) FROM ({inner}) MAXDEPTH {depth}", render_edges(edges));
                Ok(wrap_unless_history(traverse, base.history))
            }
            FixedSubquery::Neighborhood { base, edges, depth } => {
                validate_edges(registry, edges)?;
                validate_depth(*depth, 0, MAX_NEIGHBORS)?;
                let inner = base.render_inner(registry, binder)?;
                let traverse = format!(
                    "SELECT DISTINCT * FROM (TRAVERSE both({}) FROM ({inner}) MAXDEPTH {depth})",
                    render_edges(edges)
                );
                Ok(wrap_unless_history(traverse, base.history))
            }
            FixedSubquery::SimilarTo { base } => {
                let edges: Vec<String> = SIMILARITY_EDGES.iter().map(|s| s.to_string()).collect();
                let tree_edge = vec![DEFAULT_TREE_EDGE.to_string()];
                let inner = base.render_inner(registry, binder)?;
                let seed = format!("SELECT * FROM ({inner})");
                let pass1 =
                    format!("SELECT expand(both({})) FROM ({seed})", render_edges(&edges));
                let closure = format!(
                    "SELECT expand(both({})) FROM ({pass1}) WHILE $depth < {MAX_TRAVEL_DEPTH}",
                    render_edges(&tree_edge)
                );
                let pass2 =
                    format!("SELECT expand(both({})) FROM ({closure})", render_edges(&edges));
                let unioned = format!(
                    "SELECT DISTINCT * FROM (SELECT expand(unionall($a,$b,$c,$d))) LET $a = ({seed}), $b = ({pass1}), $c = ({closure}), $d = ({pass2})"
                );
                Ok(wrap_unless_history(unioned, base.history))
            }
        }
    }
}

fn wrap_unless_history(inner: String, history: bool) -> String {
    if history {
        inner
    } else {
        format!("SELECT * FROM ({inner}) WHERE deletedAt IS NULL")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{Comparison, FilterValue};
    use crate::traversal::TraversalPath;
    use kb_schema::class::Class;
    use kb_schema::property::PropertyType;
    use kb_schema::Property as SchemaProperty;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(Class::new("Disease").with_property(SchemaProperty::new("name", PropertyType::String)));
        reg.register(Class::new("AliasOf").edge());
        reg.register(Class::new("SubClassOf").edge());
        reg.register(Class::new("ElementOf").edge());
        reg.register(Class::new("CrossReferenceOf").edge());
        reg.register(Class::new("DeprecatedBy").edge());
        reg.register(Class::new("GeneralizationOf").edge());
        reg.register(Class::new("Infers").edge());
        reg
    }

    #[test]
    fn flat_filter_matches_scenario_1() {
        let reg = registry();
        let mut binder = ParamBinder::new();
        let sub = Subquery::new(Target::Class("Disease".into())).with_filters(FilterNode::Comparison(
            Comparison::new(TraversalPath::direct("name"), FilterValue::Scalar(json!("thing"))),
        ));
        let sql = sub.render(&reg, &mut binder).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM (SELECT * FROM Disease WHERE name = :p0) WHERE deletedAt IS NULL"
        );
        assert_eq!(binder.params().get("p0"), Some(&json!("thing")));
    }

    #[test]
    fn ancestors_matches_scenario_3() {
        let reg = registry();
        let mut binder = ParamBinder::new();
        let base = Subquery::new(Target::Class("Disease".into()))
            .with_filters(FilterNode::Comparison(Comparison::new(
                TraversalPath::direct("name"),
                FilterValue::Scalar(json!("blargh")),
            )));
        let fixed = FixedSubquery::ancestors(base, vec!["AliasOf".into()], MAX_TRAVEL_DEPTH);
        let sql = fixed.render(&reg, &mut binder).unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM (TRAVERSE in('AliasOf') FROM (SELECT * FROM Disease WHERE name = :p0) MAXDEPTH 50) WHERE deletedAt IS NULL"
        );
    }

    #[test]
    fn ancestors_depth_out_of_range_rejected() {
        let reg = registry();
        let mut binder = ParamBinder::new();
        let base = Subquery::new(Target::Class("Disease".into())).with_history(true);
        let fixed = FixedSubquery::ancestors(base, vec!["AliasOf".into()], 0);
        assert!(fixed.render(&reg, &mut binder).is_err());
    }

    #[test]
    fn similar_to_is_reflexive_by_construction() {
        // The seed selection `$a` is always part of the unioned result set.
        let reg = registry();
        let mut binder = ParamBinder::new();
        let base = Subquery::new(Target::Class("Disease".into())).with_history(true);
        let fixed = FixedSubquery::similar_to(base);
        let sql = fixed.render(&reg, &mut binder).unwrap();
        assert!(sql.contains("$a = (SELECT * FROM (SELECT * FROM Disease))"));
    }
}
