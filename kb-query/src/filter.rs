//! Filter Tree (spec §4.4): `Comparison` and `Clause` nodes rendering
//! themselves to SQL with bound parameters.

use kb_schema::registry::SchemaRegistry;
use kb_schema::Property;
use serde_json::Value;

use crate::error::{QueryError, QueryResult};
use crate::params::ParamBinder;
use crate::subquery::Subquery;
use crate::traversal::TraversalPath;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    In,
    Contains,
    ContainsAny,
    ContainsAll,
    ContainsText,
    Is,
}

impl Operator {
    pub fn parse(token: &str) -> QueryResult<Operator> {
        Ok(match token {
            "=" => Operator::Eq,
            "!=" => Operator::Ne,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            "IN" => Operator::In,
            "CONTAINS" => Operator::Contains,
            "CONTAINSANY" => Operator::ContainsAny,
            "CONTAINSALL" => Operator::ContainsAll,
            "CONTAINSTEXT" | "~" => Operator::ContainsText,
            "IS" => Operator::Is,
            other => {
                return Err(QueryError::Validation(format!("unknown operator '{other}'")))
            }
        })
    }

    pub fn sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::In => "IN",
            Operator::Contains => "CONTAINS",
            Operator::ContainsAny => "CONTAINSANY",
            Operator::ContainsAll => "CONTAINSALL",
            Operator::ContainsText => "CONTAINSTEXT",
            Operator::Is => "IS",
        }
    }

    fn is_inequality(self) -> bool {
        matches!(self, Operator::Gt | Operator::Ge | Operator::Lt | Operator::Le)
    }
}

/// The right-hand operand of a `Comparison`.
#[derive(Debug, Clone)]
pub enum FilterValue {
    Scalar(Value),
    List(Vec<Value>),
    Sub(Box<Subquery>),
}

impl FilterValue {
    fn is_list_like(&self) -> bool {
        matches!(self, FilterValue::List(_) | FilterValue::Sub(_))
    }

    fn is_scalar(&self) -> bool {
        matches!(self, FilterValue::Scalar(_))
    }

    fn is_null_scalar(&self) -> bool {
        matches!(self, FilterValue::Scalar(Value::Null))
    }
}

#[derive(Debug, Clone)]
pub struct Comparison {
    pub attr: TraversalPath,
    pub operator: Option<Operator>,
    pub value: FilterValue,
    pub negate: bool,
}

impl Comparison {
    pub fn new(attr: TraversalPath, value: FilterValue) -> Self {
        Comparison { attr, operator: None, value, negate: false }
    }

    pub fn with_operator(mut self, op: Operator) -> Self {
        self.operator = Some(op);
        self
    }

    pub fn negated(mut self) -> Self {
        self.negate = true;
        self
    }

    /// Resolve the default operator per the rules in §4.4, given whether
    /// the target property is iterable.
    fn effective_operator(&self, iterable: bool) -> Operator {
        if let Some(op) = self.operator {
            return op;
        }
        match (iterable, &self.value) {
            (true, FilterValue::Scalar(Value::Null)) => Operator::Is,
            (true, FilterValue::Scalar(_)) => Operator::Contains,
            (true, FilterValue::List(_)) => Operator::ContainsAll,
            (true, FilterValue::Sub(_)) => Operator::ContainsAny,
            (false, FilterValue::Scalar(Value::Null)) => Operator::Is,
            (false, FilterValue::Scalar(_)) => Operator::Eq,
            (false, FilterValue::List(_)) | (false, FilterValue::Sub(_)) => Operator::In,
        }
    }

    fn validate(&self, op: Operator, property: Option<&Property>) -> QueryResult<()> {
        let iterable = property.map(|p| p.iterable()).unwrap_or(false);
        let attr_name = self.attr.render();

        if op.is_inequality() && iterable {
            return Err(QueryError::InvalidOperator {
                property: attr_name,
                operator: op.sql().to_string(),
                reason: "inequality operators are forbidden on iterable properties".into(),
            });
        }
        if op == Operator::Contains && !iterable {
            return Err(QueryError::InvalidOperator {
                property: attr_name,
                operator: op.sql().to_string(),
                reason: "CONTAINS is forbidden on non-iterable properties".into(),
            });
        }
        if op == Operator::In && !self.value.is_list_like() {
            return Err(QueryError::InvalidOperator {
                property: attr_name,
                operator: op.sql().to_string(),
                reason: "IN requires an iterable value (list or subquery)".into(),
            });
        }
        if op == Operator::Eq {
            if iterable && !self.value.is_list_like() {
                return Err(QueryError::InvalidOperator {
                    property: attr_name,
                    operator: op.sql().to_string(),
                    reason: "= against an iterable property requires an iterable value".into(),
                });
            }
            if !iterable && !self.value.is_scalar() {
                return Err(QueryError::InvalidOperator {
                    property: attr_name,
                    operator: op.sql().to_string(),
                    reason: "= against a scalar property requires a scalar value".into(),
                });
            }
        }
        if op == Operator::Is && !self.value.is_null_scalar() {
            return Err(QueryError::InvalidOperator {
                property: attr_name,
                operator: op.sql().to_string(),
                reason: "IS is only allowed when the value is null".into(),
            });
        }

        if let Some(property) = property {
            if let Some(choices) = &property.choices {
                let check_one = |v: &Value| -> bool {
                    choices.contains(v) || (v.is_null() && property.nullable)
                };
                let ok = match &self.value {
                    FilterValue::Scalar(v) => check_one(v),
                    FilterValue::List(vs) => vs.iter().all(check_one),
                    FilterValue::Sub(_) => true,
                };
                if !ok {
                    return Err(QueryError::InvalidValue {
                        property: attr_name,
                        value: self.value_as_json(),
                        reason: "value is not among the property's declared choices".into(),
                    });
                }
            }
        }

        Ok(())
    }

    fn value_as_json(&self) -> Value {
        match &self.value {
            FilterValue::Scalar(v) => v.clone(),
            FilterValue::List(vs) => Value::Array(vs.clone()),
            FilterValue::Sub(_) => Value::String("<subquery>".into()),
        }
    }

    fn cast_value(&self, property: Option<&Property>) -> QueryResult<FilterValue> {
        let Some(property) = property else {
            return Ok(self.value.clone());
        };
        let Some(cast) = property.cast else {
            return Ok(self.value.clone());
        };
        match &self.value {
            FilterValue::Scalar(v) if !v.is_null() => {
                Ok(FilterValue::Scalar(cast(&property.name, v)?))
            }
            FilterValue::List(vs) => {
                let mut out = Vec::with_capacity(vs.len());
                for v in vs {
                    out.push(cast(&property.name, v)?);
                }
                Ok(FilterValue::List(out))
            }
            other => Ok(other.clone()),
        }
    }

    pub(crate) fn render(
        &self,
        registry: &SchemaRegistry,
        start_class: &str,
        binder: &mut ParamBinder,
    ) -> QueryResult<String> {
        let property = self.attr.resolve_terminal(registry, start_class)?;
        let op = self.effective_operator(property.as_ref().map(|p| p.iterable()).unwrap_or(false));
        self.validate(op, property.as_ref())?;
        let value = self.cast_value(property.as_ref())?;

        let attr_sql = self.attr.render();
        let body = match (op, &value) {
            (Operator::Is, _) => format!("{attr_sql} IS NULL"),
            (Operator::In, FilterValue::List(vs)) | (Operator::ContainsAll, FilterValue::List(vs))
            | (Operator::ContainsAny, FilterValue::List(vs)) => {
                let placeholders: Vec<String> =
                    vs.iter().map(|v| binder.bind(v.clone())).collect();
                format!("{attr_sql} {} [{}]", op.sql(), placeholders.join(", "))
            }
            (Operator::In, FilterValue::Sub(sub)) | (Operator::ContainsAny, FilterValue::Sub(sub)) => {
                let inner = sub.render(registry, binder)?;
                format!("{attr_sql} {} ({inner})", op.sql())
            }
            (_, FilterValue::Scalar(v)) => {
                let placeholder = binder.bind(v.clone());
                format!("{attr_sql} {} {placeholder}", op.sql())
            }
            (_, FilterValue::List(vs)) => {
                let placeholders: Vec<String> =
                    vs.iter().map(|v| binder.bind(v.clone())).collect();
                format!("{attr_sql} {} [{}]", op.sql(), placeholders.join(", "))
            }
            (_, FilterValue::Sub(sub)) => {
                let inner = sub.render(registry, binder)?;
                format!("{attr_sql} {} ({inner})", op.sql())
            }
        };

        Ok(if self.negate { format!("NOT ({body})") } else { body })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseKind {
    And,
    Or,
}

impl ClauseKind {
    fn sql(self) -> &'static str {
        match self {
            ClauseKind::And => "AND",
            ClauseKind::Or => "OR",
        }
    }
}

#[derive(Debug, Clone)]
pub enum FilterNode {
    Comparison(Comparison),
    Clause(ClauseKind, Vec<FilterNode>),
}

impl FilterNode {
    pub fn and(children: Vec<FilterNode>) -> Self {
        FilterNode::Clause(ClauseKind::And, children)
    }

    pub fn or(children: Vec<FilterNode>) -> Self {
        FilterNode::Clause(ClauseKind::Or, children)
    }

    pub(crate) fn render(
        &self,
        registry: &SchemaRegistry,
        start_class: &str,
        binder: &mut ParamBinder,
    ) -> QueryResult<String> {
        match self {
            FilterNode::Comparison(cmp) => cmp.render(registry, start_class, binder),
            FilterNode::Clause(kind, children) => {
                let mut rendered = Vec::with_capacity(children.len());
                for child in children {
                    let child_sql = child.render(registry, start_class, binder)?;
                    let needs_parens = matches!(child, FilterNode::Clause(child_kind, grandchildren)
                        if grandchildren.len() >= 2 && *child_kind != *kind);
                    rendered.push(if needs_parens { format!("({child_sql})") } else { child_sql });
                }
                Ok(rendered.join(&format!(" {} ", kind.sql())))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kb_schema::class::Class;
    use kb_schema::property::PropertyType;
    use kb_schema::Property as SchemaProperty;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        let mut reg = SchemaRegistry::new();
        reg.register(
            Class::new("Disease")
                .with_property(SchemaProperty::new("name", PropertyType::String))
                .with_property(SchemaProperty::new("sourceId", PropertyType::String))
                .with_property(SchemaProperty::new("aliases", PropertyType::EmbeddedList)),
        );
        reg
    }

    #[test]
    fn default_operator_is_eq_for_scalar() {
        let reg = registry();
        let mut binder = ParamBinder::new();
        let cmp = Comparison::new(TraversalPath::direct("name"), FilterValue::Scalar(json!("thing")));
        let sql = cmp.render(&reg, "Disease", &mut binder).unwrap();
        assert_eq!(sql, "name = :p0");
    }

    #[test]
    fn default_operator_is_contains_for_iterable_scalar() {
        let reg = registry();
        let mut binder = ParamBinder::new();
        let cmp = Comparison::new(TraversalPath::direct("aliases"), FilterValue::Scalar(json!("x")));
        let sql = cmp.render(&reg, "Disease", &mut binder).unwrap();
        assert_eq!(sql, "aliases CONTAINS :p0");
    }

    #[test]
    fn inequality_forbidden_on_iterable() {
        let reg = registry();
        let mut binder = ParamBinder::new();
        let cmp = Comparison::new(TraversalPath::direct("aliases"), FilterValue::Scalar(json!("x")))
            .with_operator(Operator::Gt);
        assert!(cmp.render(&reg, "Disease", &mut binder).is_err());
    }

    #[test]
    fn and_or_composition_renders_skeleton() {
        let reg = registry();
        let mut binder = ParamBinder::new();
        let node = FilterNode::and(vec![
            FilterNode::Comparison(Comparison::new(TraversalPath::direct("name"), FilterValue::Scalar(json!("thing")))),
            FilterNode::or(vec![
                FilterNode::Comparison(Comparison::new(TraversalPath::direct("sourceId"), FilterValue::Scalar(json!("1234")))),
                FilterNode::Comparison(Comparison::new(TraversalPath::direct("sourceId"), FilterValue::Scalar(json!("12345")))),
            ]),
        ]);
        let sql = node.render(&reg, "Disease", &mut binder).unwrap();
        assert_eq!(sql, "name = :p0 AND (sourceId = :p1 OR sourceId = :p2)");
    }

    #[test]
    fn is_operator_requires_null_value() {
        let reg = registry();
        let mut binder = ParamBinder::new();
        let cmp = Comparison::new(TraversalPath::direct("name"), FilterValue::Scalar(json!("thing")))
            .with_operator(Operator::Is);
        assert!(cmp.render(&reg, "Disease", &mut binder).is_err());
    }
}
