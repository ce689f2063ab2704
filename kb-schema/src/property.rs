use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One of the property types named in spec.md §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Integer,
    Long,
    Boolean,
    Embedded,
    EmbeddedSet,
    EmbeddedList,
    EmbeddedMap,
    Link,
    LinkSet,
    LinkList,
    LinkBag,
}

impl PropertyType {
    /// Whether this type is a collection (derived, not stored — §3 Property).
    pub fn is_iterable(self) -> bool {
        matches!(
            self,
            PropertyType::EmbeddedSet
                | PropertyType::EmbeddedList
                | PropertyType::EmbeddedMap
                | PropertyType::LinkSet
                | PropertyType::LinkList
                | PropertyType::LinkBag
        )
    }

    pub fn is_embedded(self) -> bool {
        matches!(
            self,
            PropertyType::Embedded
                | PropertyType::EmbeddedSet
                | PropertyType::EmbeddedList
                | PropertyType::EmbeddedMap
        )
    }

    pub fn is_link(self) -> bool {
        matches!(
            self,
            PropertyType::Link | PropertyType::LinkSet | PropertyType::LinkList | PropertyType::LinkBag
        )
    }
}

/// A default value: either a fixed literal, or a named generator invoked
/// at format time (e.g. `uuid`, `now`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyDefault {
    Literal(Value),
    Generator(String),
}

impl PropertyDefault {
    pub fn resolve(&self) -> Value {
        match self {
            PropertyDefault::Literal(v) => v.clone(),
            PropertyDefault::Generator(name) => match name.as_str() {
                "uuid" => Value::String(uuid::Uuid::new_v4().to_string()),
                "now" => Value::String(chrono::Utc::now().to_rfc3339()),
                _ => Value::Null,
            },
        }
    }
}

/// A named, typed cast function as referenced by `Property::cast`.
pub type CastFn = fn(&str, &Value) -> Result<Value, crate::error::SchemaError>;

#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub property_type: PropertyType,
    pub linked_class: Option<String>,
    pub mandatory: bool,
    pub nullable: bool,
    pub non_empty: bool,
    pub default: Option<PropertyDefault>,
    pub choices: Option<Vec<Value>>,
    pub cast: Option<CastFn>,
    pub description: Option<String>,
}

impl Property {
    pub fn new(name: impl Into<String>, property_type: PropertyType) -> Self {
        Property {
            name: name.into(),
            property_type,
            linked_class: None,
            mandatory: false,
            nullable: false,
            non_empty: false,
            default: None,
            choices: None,
            cast: None,
            description: None,
        }
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn non_empty(mut self) -> Self {
        self.non_empty = true;
        self
    }

    pub fn with_default(mut self, default: PropertyDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_choices(mut self, choices: Vec<Value>) -> Self {
        self.choices = Some(choices);
        self
    }

    pub fn with_cast(mut self, cast: CastFn) -> Self {
        self.cast = Some(cast);
        self
    }

    pub fn with_linked_class(mut self, class: impl Into<String>) -> Self {
        self.linked_class = Some(class.into());
        self
    }

    pub fn iterable(&self) -> bool {
        self.property_type.is_iterable()
    }
}
