//! Keyword Search Builder (spec §4.7): specialised multi-class text search
//! over Ontology/Variant/Statement with implied-by graph expansion.
//!
//! Reproduces the "single-pass projection with CONTAINSANY/IN over
//! precomputed sets" form, per the Open Question in spec.md §9 preferring
//! the latest generation's semantics over the older per-class text-match
//! form.

use indexmap::IndexMap;
use kb_schema::registry::SchemaRegistry;
use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::filter::{Comparison, FilterNode, FilterValue, Operator};
use crate::subquery::{Subquery, Target};
use crate::traversal::TraversalPath;
use crate::wrapper::{QueryCore, WrapperQuery};

pub const MIN_WORD_SIZE: usize = 3;

/// Lowercases, deduplicates and drops any keyword shorter than
/// `MIN_WORD_SIZE`.
pub fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for kw in keywords {
        let lower = kw.to_ascii_lowercase();
        if lower.chars().count() < MIN_WORD_SIZE {
            continue;
        }
        if seen.insert(lower.clone()) {
            out.push(lower);
        }
    }
    out
}

fn keyword_match_clause(fields: &[&str], keyword: &str) -> FilterNode {
    let children = fields
        .iter()
        .map(|field| {
            FilterNode::Comparison(
                Comparison::new(
                    TraversalPath::direct(*field),
                    FilterValue::Scalar(Value::String(keyword.to_string())),
                )
                .with_operator(Operator::ContainsText),
            )
        })
        .collect();
    FilterNode::or(children)
}

/// Builds the `$ont` set: `Ontology WHERE each keyword matches (sourceId ∨ name)`.
fn ontology_subquery(keywords: &[String]) -> Subquery {
    let clauses = keywords
        .iter()
        .map(|kw| keyword_match_clause(&["sourceId", "name"], kw))
        .collect::<Vec<_>>();
    let filters = if clauses.len() == 1 {
        clauses.into_iter().next().unwrap()
    } else {
        FilterNode::and(clauses)
    };
    Subquery::new(Target::Class("Ontology".into())).with_filters(filters)
}

/// Builds the `$variants` set: `Variant WHERE type ∈ $ont ∨ reference1 ∈ $ont ∨ reference2 ∈ $ont`.
fn variants_subquery(ont: &Subquery) -> Subquery {
    let in_ont = |field: &str| {
        FilterNode::Comparison(
            Comparison::new(
                TraversalPath::direct(field),
                FilterValue::Sub(Box::new(ont.clone())),
            )
            .with_operator(Operator::In),
        )
    };
    let filters = FilterNode::or(vec![in_ont("type"), in_ont("reference1"), in_ont("reference2")]);
    Subquery::new(Target::Class("Variant".into())).with_filters(filters)
}

/// Standard wrapper options layered on top of the keyword search core,
/// shared with the general wrapper query surface (§4.6).
#[derive(Debug, Clone, Default)]
pub struct KeywordSearchOptions {
    pub keywords: Vec<String>,
    pub active_only: Option<bool>,
    pub return_properties: Option<Vec<String>>,
    pub neighbors: Option<i64>,
    pub order_by: Option<Vec<String>>,
    pub order_by_direction: crate::wrapper::OrderDirection,
    pub skip: Option<i64>,
    pub limit: Option<i64>,
    pub count: bool,
}

/// `selectByKeyword` core: builds the statement search and applies the
/// standard wrapper. Defaults `activeOnly=true`.
pub fn build_keyword_search(
    registry: &SchemaRegistry,
    opts: &KeywordSearchOptions,
) -> QueryResult<(String, IndexMap<String, Value>)> {
    let keywords = normalize_keywords(&opts.keywords);
    if keywords.is_empty() {
        return Err(QueryError::Validation(
            "keyword search requires at least one keyword of minimum length".into(),
        ));
    }

    let ont = ontology_subquery(&keywords);
    let variants = variants_subquery(&ont);
    let implicable = Subquery::new(Target::Union(vec![ont.clone(), variants.clone()])).with_history(true);

    let filters = FilterNode::or(vec![
        FilterNode::Comparison(
            Comparison::new(
                TraversalPath::direct("impliedBy"),
                FilterValue::Sub(Box::new(implicable.clone())),
            )
            .with_operator(Operator::ContainsAny),
        ),
        FilterNode::Comparison(
            Comparison::new(TraversalPath::direct("supportedBy"), FilterValue::Sub(Box::new(ont.clone())))
                .with_operator(Operator::ContainsAny),
        ),
        FilterNode::Comparison(
            Comparison::new(TraversalPath::direct("appliesTo"), FilterValue::Sub(Box::new(implicable)))
                .with_operator(Operator::In),
        ),
        FilterNode::Comparison(
            Comparison::new(TraversalPath::direct("relevance"), FilterValue::Sub(Box::new(ont)))
                .with_operator(Operator::In),
        ),
    ]);

    let active_only = opts.active_only.unwrap_or(true);
    let statements =
        Subquery::new(Target::Class("Statement".into())).with_history(!active_only).with_filters(filters);

    let mut wrapper = WrapperQuery::new(QueryCore::Flat(statements)).with_history(!active_only);
    if let Some(props) = opts.return_properties.clone() {
        wrapper = wrapper.with_return_properties(props);
    }
    if let Some(depth) = opts.neighbors {
        wrapper = wrapper.with_neighbors(depth);
    }
    if let Some(order_by) = opts.order_by.clone() {
        wrapper = wrapper.with_order_by(order_by, opts.order_by_direction);
    }
    if let Some(skip) = opts.skip {
        wrapper = wrapper.with_skip(skip);
    }
    if let Some(limit) = opts.limit {
        wrapper = wrapper.with_limit(limit);
    }
    wrapper = wrapper.with_count(opts.count);

    wrapper.build(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_schema::class::Class;
    use kb_schema::property::PropertyType;
    use kb_schema::Property as SchemaProperty;

    fn registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(
            Class::new("Ontology")
                .with_property(SchemaProperty::new("sourceId", PropertyType::String))
                .with_property(SchemaProperty::new("name", PropertyType::String)),
        );
        reg.register(
            Class::new("Variant")
                .with_property(SchemaProperty::new("type", PropertyType::Link).with_linked_class("Ontology"))
                .with_property(SchemaProperty::new("reference1", PropertyType::Link).with_linked_class("Ontology"))
                .with_property(SchemaProperty::new("reference2", PropertyType::Link).with_linked_class("Ontology")),
        );
        reg.register(
            Class::new("Statement")
                .with_property(SchemaProperty::new("impliedBy", PropertyType::LinkSet))
                .with_property(SchemaProperty::new("supportedBy", PropertyType::LinkSet))
                .with_property(SchemaProperty::new("appliesTo", PropertyType::Link).with_linked_class("Ontology"))
                .with_property(SchemaProperty::new("relevance", PropertyType::Link).with_linked_class("Ontology")),
        );
        reg
    }

    #[test]
    fn normalize_drops_short_and_dedupes() {
        let out = normalize_keywords(&["AB".into(), "abc".into(), "ABC".into(), "cancer".into()]);
        assert_eq!(out, vec!["abc".to_string(), "cancer".to_string()]);
    }

    #[test]
    fn builds_a_statement_search_over_precomputed_sets() {
        let reg = registry();
        let opts = KeywordSearchOptions { keywords: vec!["vocab".into()], ..Default::default() };
        let (sql, params) = build_keyword_search(&reg, &opts).unwrap();
        assert!(sql.contains("Statement"));
        assert!(sql.contains("impliedBy CONTAINSANY"));
        assert!(sql.contains("relevance IN"));
        assert!(!params.is_empty());
    }

    #[test]
    fn rejects_all_short_keywords() {
        let reg = registry();
        let opts = KeywordSearchOptions { keywords: vec!["ab".into()], ..Default::default() };
        assert!(build_keyword_search(&reg, &opts).is_err());
    }
}
