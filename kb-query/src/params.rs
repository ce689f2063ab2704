use indexmap::IndexMap;
use serde_json::Value;

/// Accumulates bound parameters while an AST node renders itself to SQL
/// text, handing back a `:pN` placeholder for every scalar. No renderer in
/// this crate is permitted to format a user-supplied scalar directly into
/// the SQL string; every one must go through `ParamBinder::bind`.
#[derive(Debug, Default)]
pub struct ParamBinder {
    params: IndexMap<String, Value>,
}

impl ParamBinder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bind(&mut self, value: Value) -> String {
        let name = format!("p{}", self.params.len());
        self.params.insert(name.clone(), value);
        format!(":{name}")
    }

    pub fn into_params(self) -> IndexMap<String, Value> {
        self.params
    }

    pub fn params(&self) -> &IndexMap<String, Value> {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn binds_sequential_placeholders() {
        let mut b = ParamBinder::new();
        assert_eq!(b.bind(json!("a")), ":p0");
        assert_eq!(b.bind(json!("b")), ":p1");
        assert_eq!(b.params().get("p0"), Some(&json!("a")));
    }
}
