use std::collections::{HashMap, HashSet};

use indexmap::IndexMap;
use petgraph::algo::toposort;
use petgraph::graph::{DiGraph, NodeIndex};
use serde_json::Value;

use crate::class::Class;
use crate::error::{SchemaError, SchemaResult};
use crate::property::{Property, PropertyType};

/// In-memory catalogue of classes. Immutable after startup (§5 Concurrency
/// & Resource Model: "Schema Registry — read-only at steady state").
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    classes: IndexMap<String, Class>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct FormatOptions {
    pub add_defaults: bool,
    pub drop_extra: bool,
    pub ignore_extra: bool,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class: Class) {
        self.classes.insert(class.name.clone(), class);
    }

    /// `get(name)`.
    pub fn get(&self, name: &str) -> SchemaResult<&Class> {
        self.classes
            .get(name)
            .ok_or_else(|| SchemaError::UnknownClass(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// `queryProperties(class)`: union of own + inherited properties,
    /// own properties winning on name collision.
    pub fn query_properties(&self, class: &str) -> SchemaResult<IndexMap<String, Property>> {
        let mut seen = HashSet::new();
        self.query_properties_inner(class, &mut seen)
    }

    fn query_properties_inner(
        &self,
        class: &str,
        seen: &mut HashSet<String>,
    ) -> SchemaResult<IndexMap<String, Property>> {
        if !seen.insert(class.to_string()) {
            return Ok(IndexMap::new());
        }
        let c = self.get(class)?;
        let mut props = IndexMap::new();
        for parent in &c.inherits_from {
            let parent_props = self.query_properties_inner(parent, seen)?;
            for (name, prop) in parent_props {
                props.insert(name, prop);
            }
        }
        for (name, prop) in &c.properties {
            props.insert(name.clone(), prop.clone());
        }
        Ok(props)
    }

    /// `getActiveProperties`.
    pub fn get_active_properties(&self, class: &str) -> SchemaResult<Vec<String>> {
        Ok(self.get(class)?.active_properties.clone())
    }

    /// `subClassModel(name)`: the class plus the transitive closure of its
    /// subclasses' names, in declaration order, deduplicated.
    pub fn sub_class_model(&self, class: &str) -> SchemaResult<Vec<String>> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![class.to_string()];
        while let Some(name) = stack.pop() {
            if !seen.insert(name.clone()) {
                continue;
            }
            let c = self.get(&name)?;
            result.push(name.clone());
            for sub in &c.subclasses {
                stack.push(sub.clone());
            }
        }
        Ok(result)
    }

    /// `routeName`: pluralisation rules from §4.1.
    pub fn route_name(&self, class: &str) -> SchemaResult<String> {
        let c = self.get(class)?;
        if let Some(explicit) = &c.route_name {
            return Ok(explicit.clone());
        }
        if c.is_edge {
            return Ok(class.to_string());
        }
        let lower = class.to_ascii_lowercase();
        if lower.ends_with('s') {
            return Ok(lower);
        }
        if let Some(stem) = lower.strip_suffix('y') {
            let last = stem.chars().last();
            let vowel = matches!(last, Some('a' | 'e' | 'i' | 'o' | 'u'));
            if !vowel {
                return Ok(format!("{stem}ies"));
            }
        }
        Ok(format!("{lower}s"))
    }

    /// `formatRecord(raw, opts)` — §4.1.
    pub fn format_record(
        &self,
        class: &str,
        raw: &IndexMap<String, Value>,
        opts: FormatOptions,
    ) -> SchemaResult<IndexMap<String, Value>> {
        let properties = self.query_properties(class)?;
        let mut out = IndexMap::new();

        for (name, value) in raw {
            if !properties.contains_key(name) {
                if opts.ignore_extra {
                    continue;
                }
                if opts.drop_extra {
                    continue;
                }
                return Err(SchemaError::UnexpectedProperty(name.clone()));
            }
        }

        for (name, prop) in &properties {
            let provided = raw.get(name);
            let value = match provided {
                Some(v) => Some(v.clone()),
                None if opts.add_defaults => prop.default.as_ref().map(|d| d.resolve()),
                None => None,
            };

            let value = match value {
                Some(v) => Some(self.format_value(class, prop, &v)?),
                None => None,
            };

            match &value {
                None if prop.mandatory => return Err(SchemaError::MissingMandatory(name.clone())),
                None => continue,
                Some(Value::Null) if prop.mandatory && !prop.nullable => {
                    return Err(SchemaError::MissingMandatory(name.clone()))
                }
                Some(_) => {}
            }

            if let Some(v) = value {
                out.insert(name.clone(), v);
            }
        }

        Ok(out)
    }

    /// Formats a partial property map for an `update`'s `changes` (spec
    /// §4.8 `update`): unlike `formatRecord`, only the properties actually
    /// present in `raw` are validated and cast — properties the record
    /// already carries but that this patch doesn't touch are left alone,
    /// so a patch never fails mandatory checks for fields it isn't
    /// setting.
    pub fn format_changes(
        &self,
        class: &str,
        raw: &IndexMap<String, Value>,
    ) -> SchemaResult<IndexMap<String, Value>> {
        let properties = self.query_properties(class)?;
        let mut out = IndexMap::new();
        for (name, value) in raw {
            let prop = properties
                .get(name)
                .ok_or_else(|| SchemaError::UnexpectedProperty(name.clone()))?;
            let formatted = self.format_value(class, prop, value)?;
            if matches!(formatted, Value::Null) && prop.mandatory && !prop.nullable {
                return Err(SchemaError::MissingMandatory(name.clone()));
            }
            out.insert(name.clone(), formatted);
        }
        Ok(out)
    }

    fn format_value(&self, class: &str, prop: &Property, value: &Value) -> SchemaResult<Value> {
        if value.is_null() {
            if prop.nullable {
                return Ok(Value::Null);
            }
            return Err(SchemaError::MissingMandatory(prop.name.clone()));
        }

        if prop.property_type == PropertyType::EmbeddedMap {
            let Value::Object(entries) = value else {
                return Err(SchemaError::CastFailure {
                    property: prop.name.clone(),
                    value: value.clone(),
                    reason: "expected an object for an embeddedmap property".into(),
                });
            };
            if prop.non_empty && entries.is_empty() {
                return Err(SchemaError::EmptyNotAllowed(prop.name.clone()));
            }
            let mut casted = serde_json::Map::with_capacity(entries.len());
            for (key, item) in entries {
                casted.insert(key.clone(), self.format_scalar(class, prop, item)?);
            }
            return Ok(Value::Object(casted));
        }

        if prop.iterable() {
            let Value::Array(items) = value else {
                return Err(SchemaError::CastFailure {
                    property: prop.name.clone(),
                    value: value.clone(),
                    reason: "expected an array for an iterable property".into(),
                });
            };
            if prop.non_empty && items.is_empty() {
                return Err(SchemaError::EmptyNotAllowed(prop.name.clone()));
            }
            let mut casted = Vec::with_capacity(items.len());
            for item in items {
                casted.push(self.format_scalar(class, prop, item)?);
            }
            return Ok(Value::Array(casted));
        }

        if prop.non_empty {
            let empty = matches!(value, Value::String(s) if s.is_empty());
            if empty {
                return Err(SchemaError::EmptyNotAllowed(prop.name.clone()));
            }
        }

        self.format_scalar(class, prop, value)
    }

    fn format_scalar(&self, class: &str, prop: &Property, value: &Value) -> SchemaResult<Value> {
        if prop.property_type.is_embedded() && matches!(prop.property_type, PropertyType::Embedded) {
            let Value::Object(map) = value else {
                return Err(SchemaError::CastFailure {
                    property: prop.name.clone(),
                    value: value.clone(),
                    reason: "expected an embedded object".into(),
                });
            };
            let embedded_class = map
                .get("class")
                .and_then(Value::as_str)
                .ok_or_else(|| SchemaError::MissingEmbeddedClass(prop.name.clone()))?;
            let raw: IndexMap<String, Value> = map
                .iter()
                .filter(|(k, _)| *k != "class")
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let formatted = self.format_record(embedded_class, &raw, FormatOptions::default())?;
            let mut result: IndexMap<String, Value> = formatted;
            result.insert("class".to_string(), Value::String(embedded_class.to_string()));
            return Ok(Value::Object(result.into_iter().collect()));
        }

        let casted = if let Some(cast) = prop.cast {
            cast(&prop.name, value)?
        } else {
            value.clone()
        };

        if let Some(choices) = &prop.choices {
            let ok = choices.iter().any(|c| c == &casted) || (casted.is_null() && prop.nullable);
            if !ok {
                return Err(SchemaError::InvalidChoice {
                    property: prop.name.clone(),
                    value: casted,
                });
            }
        }

        let _ = class;
        Ok(casted)
    }

    /// `compareToDbClass`: verify a live store description matches the
    /// registry's view of a class.
    pub fn compare_to_db_class(&self, class: &str, db: &DbClassDescription) -> SchemaResult<()> {
        let c = self.get(class)?;
        if c.is_abstract != db.is_abstract {
            return Err(SchemaError::SchemaMismatch {
                class: class.to_string(),
                reason: format!(
                    "abstractness mismatch: registry={}, store={}",
                    c.is_abstract, db.is_abstract
                ),
            });
        }
        let own_props = &c.properties;
        for (name, prop) in own_props {
            match db.properties.get(name) {
                None => {
                    return Err(SchemaError::SchemaMismatch {
                        class: class.to_string(),
                        reason: format!("property '{name}' missing from store description"),
                    })
                }
                Some(db_type) if *db_type != prop.property_type => {
                    return Err(SchemaError::SchemaMismatch {
                        class: class.to_string(),
                        reason: format!(
                            "property '{name}' type mismatch: registry={:?}, store={:?}",
                            prop.property_type, db_type
                        ),
                    })
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// `splitSchemaClassLevels`: topologically sort classes so that a
    /// class's `inheritsFrom` targets and any property `linkedClass`
    /// appear in an earlier level. Returns the levels in creation order.
    pub fn split_schema_class_levels(&self) -> SchemaResult<Vec<Vec<String>>> {
        let mut graph = DiGraph::<String, ()>::new();
        let mut indices: HashMap<String, NodeIndex> = HashMap::new();

        for name in self.classes.keys() {
            let idx = graph.add_node(name.clone());
            indices.insert(name.clone(), idx);
        }

        for (name, class) in &self.classes {
            let &to = indices.get(name).unwrap();
            for parent in &class.inherits_from {
                if let Some(&from) = indices.get(parent) {
                    graph.add_edge(from, to, ());
                }
            }
            for prop in class.properties.values() {
                if let Some(linked) = &prop.linked_class {
                    if let Some(&from) = indices.get(linked) {
                        if from != to {
                            graph.add_edge(from, to, ());
                        }
                    }
                }
            }
        }

        let order = toposort(&graph, None).map_err(|cycle| {
            SchemaError::Cycle(vec![graph[cycle.node_id()].clone()])
        })?;

        // Group into levels: a node's level is 1 + max(level of predecessors).
        let mut level_of: HashMap<NodeIndex, usize> = HashMap::new();
        for &node in &order {
            let mut level = 0usize;
            for pred in graph.neighbors_directed(node, petgraph::Direction::Incoming) {
                level = level.max(level_of.get(&pred).copied().unwrap_or(0) + 1);
            }
            level_of.insert(node, level);
        }

        let max_level = level_of.values().copied().max().unwrap_or(0);
        let mut levels = vec![Vec::new(); max_level + 1];
        for &node in &order {
            levels[level_of[&node]].push(graph[node].clone());
        }
        Ok(levels)
    }
}

#[derive(Debug, Clone, Default)]
pub struct DbClassDescription {
    pub is_abstract: bool,
    pub properties: HashMap<String, PropertyType>,
}
