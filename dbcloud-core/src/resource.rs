//! Resource - Representing resources and their state

use std::collections::HashMap;

/// Unique identifier for a resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceId {
    /// Resource type (e.g., "cluster", "sql_user")
    pub resource_type: String,
    /// Resource name (label given in the configuration)
    pub name: String,
}

impl ResourceId {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ResourceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.resource_type, self.name)
    }
}

/// Attribute value of a resource
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Bool(bool),
    List(Vec<Value>),
    Map(HashMap<String, Value>),
}

impl Value {
    /// Convert a JSON value into an attribute value.
    ///
    /// `null` and non-integral numbers have no attribute representation and
    /// yield `None`; inside lists and maps such entries are dropped.
    pub fn from_json(value: &serde_json::Value) -> Option<Value> {
        match value {
            serde_json::Value::String(s) => Some(Value::String(s.clone())),
            serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Some(Value::Int(i))
                } else {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0)
                        .map(|f| Value::Int(f as i64))
                }
            }
            serde_json::Value::Array(arr) => {
                Some(Value::List(arr.iter().filter_map(Value::from_json).collect()))
            }
            serde_json::Value::Object(obj) => Some(Value::Map(
                obj.iter()
                    .filter_map(|(k, v)| Value::from_json(v).map(|v| (k.clone(), v)))
                    .collect(),
            )),
            serde_json::Value::Null => None,
        }
    }

    /// Convert an attribute value into JSON
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Int(i) => serde_json::Value::from(*i),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::List(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            Value::Map(map) => serde_json::Value::Object(
                map.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&HashMap<String, Value>> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }
}

/// Desired state declared in configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Resource {
    pub id: ResourceId,
    pub attributes: HashMap<String, Value>,
}

impl Resource {
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: ResourceId::new(resource_type, name),
            attributes: HashMap::new(),
        }
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }
}

/// Current state fetched from the service
#[derive(Debug, Clone, PartialEq)]
pub struct State {
    pub id: ResourceId,
    /// Service-side identifier (e.g., "project_id,cluster_id")
    pub identifier: Option<String>,
    pub attributes: HashMap<String, Value>,
    /// Whether this state exists
    pub exists: bool,
}

impl State {
    pub fn not_found(id: ResourceId) -> Self {
        Self {
            id,
            identifier: None,
            attributes: HashMap::new(),
            exists: false,
        }
    }

    pub fn existing(id: ResourceId, attributes: HashMap<String, Value>) -> Self {
        Self {
            id,
            identifier: None,
            attributes,
            exists: true,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Copy attributes the service never returns from the desired configuration
    pub fn carry_over(mut self, from: &Resource, keys: &[&str]) -> Self {
        for key in keys {
            if let Some(value) = from.attributes.get(*key) {
                self.attributes.insert(key.to_string(), value.clone());
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn from_json_converts_nested_objects() {
        let value = Value::from_json(&json!({
            "tidb": {"node_size": "8C16G", "node_quantity": 2},
            "tags": ["a", null, "b"],
        }))
        .unwrap();

        let map = value.as_map().unwrap();
        let tidb = map["tidb"].as_map().unwrap();
        assert_eq!(tidb["node_size"], Value::String("8C16G".to_string()));
        assert_eq!(tidb["node_quantity"], Value::Int(2));
        assert_eq!(
            map["tags"],
            Value::List(vec![
                Value::String("a".to_string()),
                Value::String("b".to_string())
            ])
        );
    }

    #[test]
    fn from_json_rejects_fractional_numbers() {
        assert_eq!(Value::from_json(&json!(4000.0)), Some(Value::Int(4000)));
        assert_eq!(Value::from_json(&json!(1.5)), None);
        assert_eq!(Value::from_json(&json!(null)), None);
    }

    #[test]
    fn to_json_preserves_structure() {
        let value = Value::Map(
            [("port".to_string(), Value::Int(4000))]
                .into_iter()
                .collect(),
        );
        assert_eq!(value.to_json(), json!({"port": 4000}));
    }

    #[test]
    fn carry_over_copies_write_only_attributes() {
        let desired = Resource::new("sql_user", "app")
            .with_attribute("password", Value::String("s3cret".to_string()));
        let state = State::existing(ResourceId::new("sql_user", "app"), HashMap::new())
            .carry_over(&desired, &["password", "missing"]);

        assert_eq!(
            state.attributes.get("password"),
            Some(&Value::String("s3cret".to_string()))
        );
        assert!(!state.attributes.contains_key("missing"));
    }
}
