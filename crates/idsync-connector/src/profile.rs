//! Typed key/value profile store
//!
//! Upstream records carry loosely-typed profile maps. `Profile` keeps every key
//! (unknown keys pass through untouched) while exposing narrow typed accessors
//! so callers never need to downcast values themselves.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A set of profile attributes attached to a resource trait.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(flatten)]
    values: BTreeMap<String, ProfileValue>,
}

impl Profile {
    /// Create an empty profile.
    pub fn new() -> Self {
        Self {
            values: BTreeMap::new(),
        }
    }

    /// Build a profile from a JSON object, keeping every key.
    ///
    /// Non-object values produce an empty profile.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => map
                .iter()
                .map(|(k, v)| (k.clone(), ProfileValue::from(v.clone())))
                .collect(),
            _ => Self::new(),
        }
    }

    /// Set a value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<ProfileValue>) {
        self.values.insert(key.into(), value.into());
    }

    /// Set a value using builder pattern.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ProfileValue>) -> Self {
        self.set(key, value);
        self
    }

    /// Get a raw value.
    pub fn get(&self, key: &str) -> Option<&ProfileValue> {
        self.values.get(key)
    }

    /// Get a string value. `None` when absent or not a string.
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ProfileValue::as_str)
    }

    /// Get an integer value. Integral floats are accepted since JSON
    /// producers do not always distinguish the two.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(ProfileValue::as_int)
    }

    /// Get a boolean value.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(ProfileValue::as_bool)
    }

    /// Check if a key is present (including explicit nulls).
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Remove a key.
    pub fn remove(&mut self, key: &str) -> Option<ProfileValue> {
        self.values.remove(key)
    }

    /// Iterate over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProfileValue)> {
        self.values.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the profile has no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Convert back into a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.to_json()))
                .collect(),
        )
    }
}

impl FromIterator<(String, ProfileValue)> for Profile {
    fn from_iter<T: IntoIterator<Item = (String, ProfileValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// A single profile value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProfileValue {
    /// Explicit null.
    Null,
    /// Boolean value.
    Bool(bool),
    /// Integer value.
    Int(i64),
    /// Floating-point value.
    Float(f64),
    /// String value.
    String(String),
    /// List of values.
    List(Vec<ProfileValue>),
    /// Nested object, kept verbatim.
    Object(serde_json::Map<String, Value>),
}

impl ProfileValue {
    /// Check if this is a null value.
    pub fn is_null(&self) -> bool {
        matches!(self, ProfileValue::Null)
    }

    /// Get as a string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ProfileValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as an integer.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ProfileValue::Int(i) => Some(*i),
            #[allow(clippy::cast_possible_truncation)]
            ProfileValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    /// Get as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ProfileValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Convert to JSON.
    pub fn to_json(&self) -> Value {
        match self {
            ProfileValue::Null => Value::Null,
            ProfileValue::Bool(b) => Value::Bool(*b),
            ProfileValue::Int(i) => Value::from(*i),
            ProfileValue::Float(f) => Value::from(*f),
            ProfileValue::String(s) => Value::String(s.clone()),
            ProfileValue::List(items) => Value::Array(items.iter().map(Self::to_json).collect()),
            ProfileValue::Object(map) => Value::Object(map.clone()),
        }
    }
}

impl From<Value> for ProfileValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => ProfileValue::Null,
            Value::Bool(b) => ProfileValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => ProfileValue::Int(i),
                None => ProfileValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => ProfileValue::String(s),
            Value::Array(items) => {
                ProfileValue::List(items.into_iter().map(ProfileValue::from).collect())
            }
            Value::Object(map) => ProfileValue::Object(map),
        }
    }
}

impl From<String> for ProfileValue {
    fn from(s: String) -> Self {
        ProfileValue::String(s)
    }
}

impl From<&str> for ProfileValue {
    fn from(s: &str) -> Self {
        ProfileValue::String(s.to_string())
    }
}

impl From<i64> for ProfileValue {
    fn from(i: i64) -> Self {
        ProfileValue::Int(i)
    }
}

impl From<bool> for ProfileValue {
    fn from(b: bool) -> Self {
        ProfileValue::Bool(b)
    }
}

impl<T: Into<ProfileValue>> From<Option<T>> for ProfileValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ProfileValue::Null, Into::into)
    }
}
