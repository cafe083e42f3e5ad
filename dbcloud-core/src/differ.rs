//! Differ - Compare desired state with current state
//!
//! Compares the desired resource from configuration with the state read
//! from the service, and reports which attributes would change.

use std::collections::HashMap;

use crate::resource::{Resource, ResourceId, State, Value};
use crate::schema::ResourceSchema;

/// Result of a diff operation
#[derive(Debug, Clone, PartialEq)]
pub enum Diff {
    /// Resource does not exist -> needs creation
    Create(Resource),
    /// Resource exists with differences -> needs update
    Update {
        id: ResourceId,
        from: State,
        to: Resource,
        changed_attributes: Vec<String>,
    },
    /// Resource exists with no differences -> no action needed
    NoChange(ResourceId),
}

impl Diff {
    /// Returns whether this Diff involves a change
    pub fn is_change(&self) -> bool {
        !matches!(self, Diff::NoChange(_))
    }
}

/// Compare desired state with current state to compute a Diff
pub fn diff(desired: &Resource, current: &State) -> Diff {
    if !current.exists {
        return Diff::Create(desired.clone());
    }

    let changed = find_changed_attributes(&desired.attributes, &current.attributes);

    if changed.is_empty() {
        Diff::NoChange(desired.id.clone())
    } else {
        Diff::Update {
            id: desired.id.clone(),
            from: current.clone(),
            to: desired.clone(),
            changed_attributes: changed,
        }
    }
}

/// Find changed attributes between desired and current state.
///
/// Only attributes present in the desired configuration are compared, so
/// values filled in by the service never show up as changes. `timeouts`
/// only tunes waiting and is never sent to the service.
pub fn find_changed_attributes(
    desired: &HashMap<String, Value>,
    current: &HashMap<String, Value>,
) -> Vec<String> {
    let mut changed: Vec<String> = desired
        .iter()
        .filter(|(key, _)| key.as_str() != "timeouts")
        .filter(|(key, value)| {
            !current
                .get(key.as_str())
                .is_some_and(|current| matches_desired(value, current))
        })
        .map(|(key, _)| key.clone())
        .collect();
    changed.sort();
    changed
}

/// Nested blocks follow the same rule as top-level attributes: keys the
/// configuration leaves out are not compared.
fn matches_desired(desired: &Value, current: &Value) -> bool {
    match (desired, current) {
        (Value::Map(desired), Value::Map(current)) => desired.iter().all(|(key, value)| {
            current
                .get(key)
                .is_some_and(|current| matches_desired(value, current))
        }),
        (Value::List(desired), Value::List(current)) => {
            desired.len() == current.len()
                && desired
                    .iter()
                    .zip(current)
                    .all(|(d, c)| matches_desired(d, c))
        }
        _ => desired == current,
    }
}

/// Drop write-only attributes the current state does not know about.
///
/// The service never returns write-only values (passwords, creation-only
/// settings), so a freshly read state cannot tell whether they changed.
pub fn without_unknown_write_only(
    schema: &ResourceSchema,
    current: &HashMap<String, Value>,
    changed: Vec<String>,
) -> Vec<String> {
    changed
        .into_iter()
        .filter(|name| !schema.is_write_only(name) || current.contains_key(name.as_str()))
        .collect()
}

/// Changed attributes that cannot be updated in place
pub fn replacement_attributes(schema: &ResourceSchema, changed: &[String]) -> Vec<String> {
    changed
        .iter()
        .filter(|name| schema.attributes.get(name.as_str()).is_some_and(|a| a.force_new))
        .cloned()
        .collect()
}
