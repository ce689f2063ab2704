use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::property::Property;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpOp {
    Get,
    Post,
    Patch,
    Delete,
}

#[derive(Debug, Clone)]
pub struct Class {
    pub name: String,
    pub is_abstract: bool,
    pub is_edge: bool,
    pub is_embedded: bool,
    pub inherits_from: Vec<String>,
    pub subclasses: Vec<String>,
    pub properties: IndexMap<String, Property>,
    pub indexes: Vec<String>,
    pub exposed_operations: Vec<HttpOp>,
    pub route_name: Option<String>,
    pub active_properties: Vec<String>,
}

impl Class {
    pub fn new(name: impl Into<String>) -> Self {
        Class {
            name: name.into(),
            is_abstract: false,
            is_edge: false,
            is_embedded: false,
            inherits_from: Vec::new(),
            subclasses: Vec::new(),
            properties: IndexMap::new(),
            indexes: Vec::new(),
            exposed_operations: Vec::new(),
            route_name: None,
            active_properties: Vec::new(),
        }
    }

    pub fn abstract_(mut self) -> Self {
        self.is_abstract = true;
        self
    }

    pub fn edge(mut self) -> Self {
        self.is_edge = true;
        self
    }

    pub fn embedded(mut self) -> Self {
        self.is_embedded = true;
        self
    }

    pub fn inherits(mut self, parent: impl Into<String>) -> Self {
        self.inherits_from.push(parent.into());
        self
    }

    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.insert(property.name.clone(), property);
        self
    }

    pub fn with_active_properties(mut self, props: Vec<String>) -> Self {
        self.active_properties = props;
        self
    }
}
