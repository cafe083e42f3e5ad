//! Helpers shared by the resource handlers

use std::collections::HashMap;

use dbcloud_core::provider::{ProviderError, ProviderResult};
use dbcloud_core::resource::Value;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::client::ApiError;

/// Build a composite identifier (e.g., "project_id,cluster_id")
pub fn join_identifier(parent: &str, child: &str) -> String {
    format!("{},{}", parent, child)
}

/// Split a composite identifier into its parent and child ids
pub fn split_identifier(identifier: &str) -> ProviderResult<(&str, &str)> {
    match identifier.split_once(',') {
        Some((parent, child)) if !parent.is_empty() && !child.is_empty() && !child.contains(',') => {
            Ok((parent, child))
        }
        _ => Err(ProviderError::new(format!(
            "Invalid identifier '{}', expected '<parent_id>,<id>'",
            identifier
        ))),
    }
}

/// Map an API failure to a provider error naming the attempted action
pub fn api_err(action: &str) -> impl FnOnce(ApiError) -> ProviderError + '_ {
    move |err| ProviderError::new(format!("Failed to {}: {}", action, err)).with_cause(err)
}

pub fn require_str<'a>(attributes: &'a HashMap<String, Value>, key: &str) -> ProviderResult<&'a str> {
    optional_str(attributes, key)?
        .ok_or_else(|| ProviderError::new(format!("Attribute '{}' is required", key)))
}

pub fn optional_str<'a>(
    attributes: &'a HashMap<String, Value>,
    key: &str,
) -> ProviderResult<Option<&'a str>> {
    match attributes.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.as_str())),
        Some(_) => Err(type_error(key, "a string")),
    }
}

pub fn require_int(attributes: &HashMap<String, Value>, key: &str) -> ProviderResult<i64> {
    optional_int(attributes, key)?
        .ok_or_else(|| ProviderError::new(format!("Attribute '{}' is required", key)))
}

pub fn optional_int(attributes: &HashMap<String, Value>, key: &str) -> ProviderResult<Option<i64>> {
    match attributes.get(key) {
        None => Ok(None),
        Some(Value::Int(i)) => Ok(Some(*i)),
        Some(_) => Err(type_error(key, "an integer")),
    }
}

pub fn optional_bool(attributes: &HashMap<String, Value>, key: &str) -> ProviderResult<Option<bool>> {
    match attributes.get(key) {
        None => Ok(None),
        Some(Value::Bool(b)) => Ok(Some(*b)),
        Some(_) => Err(type_error(key, "a boolean")),
    }
}

/// List of strings; a missing attribute is an empty list
pub fn string_list(attributes: &HashMap<String, Value>, key: &str) -> ProviderResult<Vec<String>> {
    match attributes.get(key) {
        None => Ok(Vec::new()),
        Some(Value::List(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(str::to_string)
                    .ok_or_else(|| type_error(key, "a list of strings"))
            })
            .collect(),
        Some(_) => Err(type_error(key, "a list of strings")),
    }
}

pub fn string_list_value(items: &[String]) -> Value {
    Value::List(items.iter().map(|s| Value::String(s.clone())).collect())
}

/// Decode a nested attribute block into an API body type
pub fn decode_block<T: DeserializeOwned>(key: &str, value: &Value) -> ProviderResult<T> {
    serde_json::from_value(value.to_json()).map_err(|e| {
        ProviderError::new(format!("Attribute '{}' is malformed: {}", key, e)).with_cause(e)
    })
}

/// Encode an API body type as a nested attribute block
pub fn encode_block<T: Serialize>(body: &T) -> Option<Value> {
    serde_json::to_value(body)
        .ok()
        .and_then(|json| Value::from_json(&json))
}

fn type_error(key: &str, expected: &str) -> ProviderError {
    ProviderError::new(format!("Attribute '{}' must be {}", key, expected))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::types::ComponentSpec;

    #[test]
    fn identifier_round_trip() {
        let identifier = join_identifier("1372813089189561287", "1379661944646413143");
        assert_eq!(identifier, "1372813089189561287,1379661944646413143");
        assert_eq!(
            split_identifier(&identifier).unwrap(),
            ("1372813089189561287", "1379661944646413143")
        );
    }

    #[test]
    fn malformed_identifiers_are_rejected() {
        for bad in ["", "only-one", ",child", "parent,", "a,b,c"] {
            assert!(split_identifier(bad).is_err(), "accepted '{}'", bad);
        }
    }

    #[test]
    fn getters_check_types() {
        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::String("analytics".to_string()));
        attrs.insert("port".to_string(), Value::Int(4000));
        attrs.insert(
            "roles".to_string(),
            Value::List(vec![Value::String("reader".to_string())]),
        );

        assert_eq!(require_str(&attrs, "name").unwrap(), "analytics");
        assert_eq!(optional_int(&attrs, "port").unwrap(), Some(4000));
        assert_eq!(optional_bool(&attrs, "paused").unwrap(), None);
        assert_eq!(string_list(&attrs, "roles").unwrap(), vec!["reader".to_string()]);
        assert!(string_list(&attrs, "missing").unwrap().is_empty());

        assert!(require_str(&attrs, "port").is_err());
        assert!(require_int(&attrs, "absent").is_err());
    }

    #[test]
    fn blocks_decode_into_api_types() {
        let value = Value::Map(
            [
                ("node_size".to_string(), Value::String("8C16G".to_string())),
                ("node_quantity".to_string(), Value::Int(3)),
            ]
            .into_iter()
            .collect(),
        );
        let spec: ComponentSpec = decode_block("compute", &value).unwrap();
        assert_eq!(spec.node_quantity, 3);
        assert_eq!(spec.storage_size_gib, None);

        assert_eq!(encode_block(&spec), Some(value));

        let err = decode_block::<ComponentSpec>("compute", &Value::Int(1)).unwrap_err();
        assert!(err.to_string().starts_with("Attribute 'compute' is malformed"));
    }

    #[test]
    fn api_errors_keep_their_cause() {
        let err = api_err("create cluster")(ApiError::NotFound);
        assert_eq!(err.to_string(), "Failed to create cluster: resource not found");
        assert!(std::error::Error::source(&err).is_some());
    }
}
