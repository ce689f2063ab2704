//! Traversal / Attribute Path Parser (spec §4.3).

use kb_schema::registry::SchemaRegistry;
use kb_schema::Property;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{QueryError, QueryResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
    Both,
}

impl Direction {
    /// The direction you land in after following an edge step the other
    /// way — used by `vertex` steps, which resolve to the far-side vertex.
    pub fn inverse(self) -> Direction {
        match self {
            Direction::In => Direction::Out,
            Direction::Out => Direction::In,
            Direction::Both => Direction::Both,
        }
    }

    pub fn sql_fn(self) -> &'static str {
        match self {
            Direction::In => "in",
            Direction::Out => "out",
            Direction::Both => "both",
        }
    }

    fn parse(s: &str) -> QueryResult<Direction> {
        match s {
            "in" | "inE" => Ok(Direction::In),
            "out" | "outE" => Ok(Direction::Out),
            "both" | "bothE" => Ok(Direction::Both),
            other => Err(QueryError::UnknownDirection(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PathStep {
    /// Direct property access, or a LINK hop when the resolved property is
    /// itself a link/embedded type and more steps follow.
    Direct(String),
    /// `in(...)/out(...)/both(...)`, edges empty meaning "all edges".
    Edge { direction: Direction, edges: Vec<String> },
    /// Following an edge step resolves to the far-side vertex.
    Vertex,
    /// `size()` — cardinality of the current iterable.
    Size,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TraversalPath {
    pub steps: Vec<PathStep>,
}

impl TraversalPath {
    pub fn direct(name: impl Into<String>) -> Self {
        TraversalPath {
            steps: vec![PathStep::Direct(name.into())],
        }
    }

    /// Render as OrientDB-style dotted/functional notation, e.g.
    /// `outE('ImpliedBy').inV().reference1.name`.
    pub fn render(&self) -> String {
        let mut parts = Vec::new();
        for step in &self.steps {
            match step {
                PathStep::Direct(name) => parts.push(name.clone()),
                PathStep::Edge { direction, edges } => {
                    let args = edges
                        .iter()
                        .map(|e| format!("'{e}'"))
                        .collect::<Vec<_>>()
                        .join(", ");
                    parts.push(format!("{}({args})", direction.sql_fn()));
                }
                PathStep::Vertex => parts.push("vertex()".to_string()),
                PathStep::Size => parts.push("size()".to_string()),
            }
        }
        parts.join(".")
    }

    /// Resolve the terminal property this path refers to, walking LINK
    /// hops through the schema. Returns `None` for a path ending in
    /// `size()`, whose value is always an integer.
    pub fn resolve_terminal<'a>(
        &self,
        registry: &'a SchemaRegistry,
        start_class: &str,
    ) -> QueryResult<Option<Property>> {
        let mut current_class = start_class.to_string();
        let mut result: Option<Property> = None;

        for step in &self.steps {
            match step {
                PathStep::Direct(name) => {
                    let props = registry.query_properties(&current_class)?;
                    let prop = props
                        .get(name)
                        .ok_or_else(|| QueryError::InvalidPath(format!("{current_class}.{name}")))?
                        .clone();
                    if let Some(linked) = &prop.linked_class {
                        current_class = linked.clone();
                    }
                    result = Some(prop);
                }
                PathStep::Edge { edges, .. } => {
                    for edge in edges {
                        let class = registry.get(edge)?;
                        if !class.is_edge {
                            return Err(QueryError::UnknownEdge(edge.clone()));
                        }
                    }
                    result = None;
                }
                PathStep::Vertex => {
                    result = None;
                }
                PathStep::Size => {
                    return Ok(None);
                }
            }
        }
        Ok(result)
    }
}

/// Parses the dotted string grammar: `attr`, `in(E1,E2)`, `inE`, `vertex`,
/// `size()`, joined with `.`.
pub fn parse_traversal_string(input: &str) -> QueryResult<TraversalPath> {
    let segments = split_dotted(input)?;
    let mut steps = Vec::with_capacity(segments.len());
    for segment in segments {
        steps.push(parse_segment(&segment)?);
    }
    Ok(TraversalPath { steps })
}

fn split_dotted(input: &str) -> QueryResult<Vec<String>> {
    let mut segments = Vec::new();
    let mut depth = 0i32;
    let mut current = String::new();
    for c in input.chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return Err(QueryError::InvalidPath(input.to_string()));
                }
                current.push(c);
            }
            '.' if depth == 0 => {
                if current.is_empty() {
                    return Err(QueryError::InvalidPath(input.to_string()));
                }
                segments.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if depth != 0 {
        return Err(QueryError::InvalidPath(input.to_string()));
    }
    if current.is_empty() {
        return Err(QueryError::InvalidPath(input.to_string()));
    }
    segments.push(current);
    Ok(segments)
}

/// `inV`/`outV`/`bothV`, with or without trailing `()` — the far-side
/// vertex step following an edge hop.
fn parse_vertex_segment(segment: &str) -> Option<PathStep> {
    let head = segment.strip_suffix("()").unwrap_or(segment);
    match head {
        "vertex" | "inV" | "outV" | "bothV" => Some(PathStep::Vertex),
        _ => None,
    }
}

fn parse_segment(segment: &str) -> QueryResult<PathStep> {
    if let Some(step) = parse_vertex_segment(segment) {
        return Ok(step);
    }
    if segment == "size()" {
        return Ok(PathStep::Size);
    }
    if let Some(open) = segment.find('(') {
        if !segment.ends_with(')') {
            return Err(QueryError::InvalidPath(segment.to_string()));
        }
        let head = &segment[..open];
        let args = &segment[open + 1..segment.len() - 1];
        let direction = Direction::parse(head)?;
        let edges = if args.trim().is_empty() {
            Vec::new()
        } else {
            args.split(',').map(|s| s.trim().trim_matches('\'').to_string()).collect()
        };
        return Ok(PathStep::Edge { direction, edges });
    }
    match segment {
        "in" | "inE" => Ok(PathStep::Edge { direction: Direction::In, edges: Vec::new() }),
        "out" | "outE" => Ok(PathStep::Edge { direction: Direction::Out, edges: Vec::new() }),
        "both" | "bothE" => Ok(PathStep::Edge { direction: Direction::Both, edges: Vec::new() }),
        _ => Ok(PathStep::Direct(segment.to_string())),
    }
}

/// The object form: `{type: LINK|EDGE|DIRECT, attr, edges, direction, child}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraversalNode {
    #[serde(rename = "type")]
    pub node_type: NodeType,
    pub attr: Option<String>,
    #[serde(default)]
    pub edges: Vec<String>,
    pub direction: Option<String>,
    pub child: Option<Box<TraversalNode>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeType {
    Link,
    Edge,
    Direct,
}

pub fn parse_traversal_object(node: &TraversalNode) -> QueryResult<TraversalPath> {
    let mut steps = Vec::new();
    parse_object_into(node, &mut steps)?;
    Ok(TraversalPath { steps })
}

fn parse_object_into(node: &TraversalNode, steps: &mut Vec<PathStep>) -> QueryResult<()> {
    match node.node_type {
        NodeType::Direct => {
            let attr = node
                .attr
                .clone()
                .ok_or_else(|| QueryError::Validation("DIRECT node requires 'attr'".into()))?;
            steps.push(PathStep::Direct(attr));
        }
        NodeType::Link => {
            let attr = node
                .attr
                .clone()
                .ok_or_else(|| QueryError::Validation("LINK node requires 'attr'".into()))?;
            steps.push(PathStep::Direct(attr));
            let child = node
                .child
                .as_ref()
                .ok_or_else(|| QueryError::Validation("LINK node requires a 'child'".into()))?;
            parse_object_into(child, steps)?;
            return Ok(());
        }
        NodeType::Edge => {
            if node.attr.is_some() {
                return Err(QueryError::Validation("EDGE node must not set 'attr'".into()));
            }
            let direction = match &node.direction {
                Some(d) => Direction::parse(d)?,
                None => Direction::Both,
            };
            steps.push(PathStep::Edge {
                direction,
                edges: node.edges.clone(),
            });
            steps.push(PathStep::Vertex);
        }
    }
    if let Some(child) = &node.child {
        if node.node_type != NodeType::Link {
            parse_object_into(child, steps)?;
        }
    }
    Ok(())
}

/// Compiles either a dotted string or an object-form JSON value into a
/// `TraversalPath`.
pub fn parse_traversal_value(value: &Value) -> QueryResult<TraversalPath> {
    match value {
        Value::String(s) => parse_traversal_string(s),
        Value::Object(_) => {
            let node: TraversalNode = serde_json::from_value(value.clone())
                .map_err(|e| QueryError::Validation(format!("invalid traversal object: {e}")))?;
            parse_traversal_object(&node)
        }
        other => Err(QueryError::Validation(format!(
            "expected a traversal string or object, got {other}"
        ))),
    }
}
