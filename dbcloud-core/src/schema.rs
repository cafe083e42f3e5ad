//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type, enabling validation of
//! configuration before any API call is made.

use std::collections::HashMap;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::duration::parse_duration;
use crate::resource::Value;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// List
    List(Box<AttributeType>),
    /// Map
    Map(Box<AttributeType>),
    /// Nested block with its own attribute schemas
    Object(Vec<AttributeSchema>),
}

impl AttributeType {
    /// Check if a value conforms to this type
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v.eq_ignore_ascii_case(s)) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { base, validate, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Object(fields), Value::Map(map)) => {
                for field in fields {
                    match map.get(&field.name) {
                        Some(v) => field.attr_type.validate(v).map_err(|e| {
                            TypeError::MapValueError {
                                key: field.name.clone(),
                                inner: Box::new(e),
                            }
                        })?,
                        None if field.required => {
                            return Err(TypeError::MissingRequired {
                                name: field.name.clone(),
                            });
                        }
                        None => {}
                    }
                }
                if let Some(unknown) = map.keys().find(|k| !fields.iter().any(|f| &f.name == *k))
                {
                    return Err(TypeError::UnknownAttribute {
                        name: unknown.clone(),
                    });
                }
                Ok(())
            }

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Object(_) => "Object".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", .expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Required attribute '{name}' is missing")]
    MissingRequired { name: String },

    #[error("Unknown attribute '{name}'")]
    UnknownAttribute { name: String },

    #[error("Attribute '{name}' is computed by the service and cannot be set")]
    ComputedAttribute { name: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

impl Value {
    fn type_name(&self) -> String {
        match self {
            Value::String(_) => "String".to_string(),
            Value::Int(_) => "Int".to_string(),
            Value::Bool(_) => "Bool".to_string(),
            Value::List(_) => "List".to_string(),
            Value::Map(_) => "Map".to_string(),
        }
    }
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub required: bool,
    /// Set by the service; not configurable
    pub computed: bool,
    /// Never printed or logged
    pub sensitive: bool,
    /// Accepted by the service but never returned on read
    pub write_only: bool,
    /// Changing the value requires replacing the resource
    pub force_new: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            required: false,
            computed: false,
            sensitive: false,
            write_only: false,
            force_new: false,
            default: None,
            description: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn write_only(mut self) -> Self {
        self.write_only = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    /// Validate resource attributes, collecting every error
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Result<(), Vec<TypeError>> {
        let mut errors = Vec::new();

        // Check required attributes
        for (name, schema) in &self.attributes {
            if schema.required && !attributes.contains_key(name) && schema.default.is_none() {
                errors.push(TypeError::MissingRequired { name: name.clone() });
            }
        }

        // Type check each attribute
        for (name, value) in attributes {
            match self.attributes.get(name) {
                Some(schema) if schema.computed => {
                    errors.push(TypeError::ComputedAttribute { name: name.clone() });
                }
                Some(schema) => {
                    if let Err(e) = schema.attr_type.validate(value) {
                        errors.push(e);
                    }
                }
                None => errors.push(TypeError::UnknownAttribute { name: name.clone() }),
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Fill in defaults for attributes the configuration leaves out
    pub fn apply_defaults(&self, attributes: &mut HashMap<String, Value>) {
        for (name, schema) in &self.attributes {
            if let Some(default) = &schema.default
                && !attributes.contains_key(name)
            {
                attributes.insert(name.clone(), default.clone());
            }
        }
    }

    /// Rewrite enum values to their canonical spelling
    pub fn normalize(&self, attributes: &mut HashMap<String, Value>) {
        for (name, value) in attributes.iter_mut() {
            if let Some(AttributeSchema {
                attr_type: AttributeType::Enum(variants),
                ..
            }) = self.attributes.get(name)
                && let Value::String(s) = value
                && let Some(canonical) = variants.iter().find(|v| v.eq_ignore_ascii_case(s.as_str()))
            {
                *s = canonical.clone();
            }
        }
    }

    /// Whether an attribute must be hidden from output
    pub fn is_sensitive(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.sensitive)
    }

    pub fn is_write_only(&self, name: &str) -> bool {
        self.attributes.get(name).is_some_and(|a| a.write_only)
    }

    /// Attributes to copy from the configuration into state after a write
    pub fn write_only_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .attributes
            .values()
            .filter(|a| a.write_only)
            .map(|a| a.name.as_str())
            .collect();
        names.sort();
        names
    }

    /// Names of computed attributes, sorted
    pub fn computed_attributes(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .attributes
            .values()
            .filter(|a| a.computed)
            .map(|a| a.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"^[A-Za-z0-9][A-Za-z0-9-]{2,62}[A-Za-z0-9]$").expect("valid name pattern")
    });

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if *n > 0 => Ok(()),
                Value::Int(_) => Err("Value must be positive".to_string()),
                _ => Err("Expected integer".to_string()),
            },
        }
    }

    /// TCP port (1-65535)
    pub fn port() -> AttributeType {
        AttributeType::Custom {
            name: "Port".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if (1..=65535).contains(n) => Ok(()),
                Value::Int(n) => Err(format!("Port {} is out of range 1-65535", n)),
                _ => Err("Expected integer".to_string()),
            },
        }
    }

    /// Duration string (e.g., "30m", "1h30m")
    pub fn duration() -> AttributeType {
        AttributeType::Custom {
            name: "Duration".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) => parse_duration(s).map(|_| ()).map_err(|e| e.to_string()),
                _ => Err("Expected string".to_string()),
            },
        }
    }

    /// Service resource name: 4-64 characters, letters, digits and hyphens,
    /// not starting or ending with a hyphen
    pub fn name() -> AttributeType {
        AttributeType::Custom {
            name: "Name".to_string(),
            base: Box::new(AttributeType::String),
            validate: |value| match value {
                Value::String(s) if NAME_PATTERN.is_match(s) => Ok(()),
                Value::String(s) => Err(format!(
                    "Invalid name '{}': use 4-64 letters, digits or hyphens, \
                     not starting or ending with a hyphen",
                    s
                )),
                _ => Err("Expected string".to_string()),
            },
        }
    }

    /// Per-resource `timeouts` block (create/update/delete durations)
    pub fn timeouts() -> AttributeType {
        AttributeType::Object(vec![
            AttributeSchema::new("create", duration()),
            AttributeSchema::new("update", duration()),
            AttributeSchema::new("delete", duration()),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
    }

    #[test]
    fn validate_enum_type() {
        let t = AttributeType::Enum(vec!["AWS".to_string(), "GCP".to_string()]);
        assert!(t.validate(&Value::String("AWS".to_string())).is_ok());
        assert!(t.validate(&Value::String("gcp".to_string())).is_ok());
        assert!(t.validate(&Value::String("AZURE".to_string())).is_err());
    }

    #[test]
    fn validate_positive_int() {
        let t = types::positive_int();
        assert!(t.validate(&Value::Int(1)).is_ok());
        assert!(t.validate(&Value::Int(100)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
        assert!(t.validate(&Value::Int(-1)).is_err());
        assert!(t.validate(&Value::String("1".to_string())).is_err());
    }

    #[test]
    fn validate_port() {
        let t = types::port();
        assert!(t.validate(&Value::Int(4000)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
        assert!(t.validate(&Value::Int(70000)).is_err());
    }

    #[test]
    fn validate_name() {
        let t = types::name();
        assert!(t.validate(&Value::String("prod-cluster-1".to_string())).is_ok());
        assert!(t.validate(&Value::String("ab".to_string())).is_err());
        assert!(t.validate(&Value::String("-leading".to_string())).is_err());
        assert!(t.validate(&Value::String("has_underscore".to_string())).is_err());
    }

    #[test]
    fn validate_timeouts_block() {
        let t = types::timeouts();
        let ok = Value::Map(
            [("create".to_string(), Value::String("45m".to_string()))]
                .into_iter()
                .collect(),
        );
        assert!(t.validate(&ok).is_ok());

        let bad_duration = Value::Map(
            [("delete".to_string(), Value::String("soon".to_string()))]
                .into_iter()
                .collect(),
        );
        assert!(t.validate(&bad_duration).is_err());

        let unknown_key = Value::Map(
            [("read".to_string(), Value::String("5m".to_string()))]
                .into_iter()
                .collect(),
        );
        assert!(matches!(
            t.validate(&unknown_key),
            Err(TypeError::UnknownAttribute { .. })
        ));
    }

    #[test]
    fn validate_resource_schema() {
        let schema = ResourceSchema::new("resource")
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("count", types::positive_int()))
            .attribute(AttributeSchema::new("enabled", AttributeType::Bool));

        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::String("my-resource".to_string()));
        attrs.insert("count".to_string(), Value::Int(5));
        attrs.insert("enabled".to_string(), Value::Bool(true));

        assert!(schema.validate(&attrs).is_ok());
    }

    #[test]
    fn missing_required_attribute() {
        let schema = ResourceSchema::new("cluster")
            .attribute(AttributeSchema::new("name", AttributeType::String).required());

        let attrs = HashMap::new();
        let errors = schema.validate(&attrs).unwrap_err();
        assert!(matches!(errors[0], TypeError::MissingRequired { .. }));
    }

    #[test]
    fn computed_and_unknown_attributes_are_rejected() {
        let schema = ResourceSchema::new("cluster")
            .attribute(AttributeSchema::new("status", AttributeType::String).computed());

        let mut attrs = HashMap::new();
        attrs.insert("status".to_string(), Value::String("ACTIVE".to_string()));
        attrs.insert("colour".to_string(), Value::String("blue".to_string()));

        let errors = schema.validate(&attrs).unwrap_err();
        assert_eq!(errors.len(), 2);
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, TypeError::ComputedAttribute { name } if name == "status"))
        );
        assert!(
            errors
                .iter()
                .any(|e| matches!(e, TypeError::UnknownAttribute { name } if name == "colour"))
        );
    }

    #[test]
    fn normalize_uses_canonical_enum_spelling() {
        let schema = ResourceSchema::new("cluster").attribute(AttributeSchema::new(
            "cloud_provider",
            AttributeType::Enum(vec!["AWS".to_string(), "GCP".to_string()]),
        ));

        let mut attrs = HashMap::new();
        attrs.insert("cloud_provider".to_string(), Value::String("gcp".to_string()));
        attrs.insert("region".to_string(), Value::String("us-west1".to_string()));
        schema.normalize(&mut attrs);

        assert_eq!(attrs["cloud_provider"], Value::String("GCP".to_string()));
        assert_eq!(attrs["region"], Value::String("us-west1".to_string()));
    }

    #[test]
    fn write_only_attributes_are_sorted() {
        let schema = ResourceSchema::new("cluster")
            .attribute(AttributeSchema::new("root_password", AttributeType::String).write_only())
            .attribute(AttributeSchema::new("ip_access_list", AttributeType::String).write_only())
            .attribute(AttributeSchema::new("region", AttributeType::String));

        assert_eq!(schema.write_only_attributes(), vec!["ip_access_list", "root_password"]);
        assert!(!schema.is_write_only("region"));
    }

    #[test]
    fn apply_defaults_fills_missing_values() {
        let schema = ResourceSchema::new("cluster")
            .attribute(AttributeSchema::new("port", types::port()).with_default(Value::Int(4000)));

        let mut attrs = HashMap::new();
        schema.apply_defaults(&mut attrs);
        assert_eq!(attrs.get("port"), Some(&Value::Int(4000)));

        attrs.insert("port".to_string(), Value::Int(5000));
        schema.apply_defaults(&mut attrs);
        assert_eq!(attrs.get("port"), Some(&Value::Int(5000)));
    }
}
