//! Typed debug extensions carried over `info string ext:<name> <json>`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An extension the engine declares in response to `extensions`.
#[derive(Debug, Clone, PartialEq)]
pub struct Extension {
    /// Extension name, e.g. "searchstats".
    pub name: String,
    /// Human-readable description.
    pub description: String,
}

/// A JSON-like payload value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExtensionValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<ExtensionValue>),
    Object(HashMap<String, ExtensionValue>),
}

impl ExtensionValue {
    /// Builds an object from key-value pairs.
    pub fn object<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<ExtensionValue>,
    {
        ExtensionValue::Object(
            pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Builds an array from values.
    pub fn array<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<ExtensionValue>,
    {
        ExtensionValue::Array(values.into_iter().map(Into::into).collect())
    }
}

impl From<bool> for ExtensionValue {
    fn from(v: bool) -> Self {
        ExtensionValue::Bool(v)
    }
}

impl From<i32> for ExtensionValue {
    fn from(v: i32) -> Self {
        ExtensionValue::Int(v.into())
    }
}

impl From<i64> for ExtensionValue {
    fn from(v: i64) -> Self {
        ExtensionValue::Int(v)
    }
}

impl From<u64> for ExtensionValue {
    fn from(v: u64) -> Self {
        ExtensionValue::Int(v as i64)
    }
}

impl From<f64> for ExtensionValue {
    fn from(v: f64) -> Self {
        ExtensionValue::Float(v)
    }
}

impl From<&str> for ExtensionValue {
    fn from(v: &str) -> Self {
        ExtensionValue::String(v.to_string())
    }
}

impl From<String> for ExtensionValue {
    fn from(v: String) -> Self {
        ExtensionValue::String(v)
    }
}
