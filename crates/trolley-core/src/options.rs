//! # Item Options
//!
//! Free-form attributes attached to an item (`size`, `color`, `extra`, ...).
//!
//! Options take part in row identity: two items with the same `id` but
//! different options are different rows. Key order never matters, at any
//! nesting level, because [`ItemOptions::canonical`] sorts every map before
//! the hasher sees it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ValidationError;
use crate::validation::ValidationResult;

/// Option map of an item. Values are arbitrary JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemOptions(BTreeMap<String, Value>);

impl ItemOptions {
    pub fn new() -> Self {
        ItemOptions(BTreeMap::new())
    }

    /// Builds options from a JSON value. `null` means no options.
    pub fn from_value(value: Value) -> ValidationResult<Self> {
        match value {
            Value::Null => Ok(ItemOptions::new()),
            Value::Object(map) => Ok(map.into_iter().collect()),
            other => Err(ValidationError::InvalidFormat {
                field: "options".to_string(),
                reason: format!("expected an object, got {}", json_kind(&other)),
            }),
        }
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Merges `other` into these options.
    ///
    /// Keys from `other` win. When both sides hold an object under the same
    /// key the objects are merged recursively, so `{"a": {"b": 1}}` merged
    /// with `{"a": {"c": 2}}` keeps both `b` and `c`.
    pub fn merge(&mut self, other: ItemOptions) {
        for (key, incoming) in other.0 {
            match self.0.get_mut(&key) {
                Some(existing) => merge_value(existing, incoming),
                None => {
                    self.0.insert(key, incoming);
                }
            }
        }
    }

    /// Canonical JSON text of the options: every object, at every depth,
    /// with its keys sorted. This is what row hashing consumes.
    pub fn canonical(&self) -> String {
        let sorted: Map<String, Value> = self
            .0
            .iter()
            .map(|(k, v)| (k.clone(), canonicalize(v)))
            .collect();
        Value::Object(sorted).to_string()
    }

    /// The options as a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(self.0.clone().into_iter().collect())
    }
}

impl FromIterator<(String, Value)> for ItemOptions {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        ItemOptions(iter.into_iter().collect())
    }
}

impl From<BTreeMap<String, Value>> for ItemOptions {
    fn from(map: BTreeMap<String, Value>) -> Self {
        ItemOptions(map)
    }
}

// serde_json may be built with `preserve_order`, so nested objects are
// rebuilt from sorted entries rather than trusting the map's own order.
fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

fn merge_value(existing: &mut Value, incoming: Value) {
    match (existing, incoming) {
        (Value::Object(current), Value::Object(update)) => {
            for (key, value) in update {
                match current.get_mut(&key) {
                    Some(slot) => merge_value(slot, value),
                    None => {
                        current.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
