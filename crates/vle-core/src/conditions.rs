//! Initialisation conditions handed to a model at construction.
//!
//! A `Conditions` map plays the role of the initial event list: every model
//! reads its parameters (method, time step, quanta, initial values...) from
//! it exactly once. Missing keys fall back to documented defaults through the
//! `*_or` getters, while a key present with the wrong type is always an error.

use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{DevsError, DevsResult};

/// A single condition value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(untagged))]
pub enum ConditionValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    String(String),
    List(Vec<ConditionValue>),
}

impl ConditionValue {
    /// Numeric view: integers are promoted to doubles.
    pub fn as_double(&self) -> Option<f64> {
        match *self {
            ConditionValue::Double(v) => Some(v),
            ConditionValue::Integer(v) => Some(v as f64),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match *self {
            ConditionValue::Integer(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConditionValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ConditionValue::Boolean(b) => Some(b),
            _ => None,
        }
    }
}

impl From<f64> for ConditionValue {
    fn from(v: f64) -> Self {
        ConditionValue::Double(v)
    }
}

impl From<i64> for ConditionValue {
    fn from(v: i64) -> Self {
        ConditionValue::Integer(v)
    }
}

impl From<i32> for ConditionValue {
    fn from(v: i32) -> Self {
        ConditionValue::Integer(v.into())
    }
}

impl From<bool> for ConditionValue {
    fn from(v: bool) -> Self {
        ConditionValue::Boolean(v)
    }
}

impl From<&str> for ConditionValue {
    fn from(v: &str) -> Self {
        ConditionValue::String(v.to_string())
    }
}

impl From<String> for ConditionValue {
    fn from(v: String) -> Self {
        ConditionValue::String(v)
    }
}

impl From<Vec<f64>> for ConditionValue {
    fn from(v: Vec<f64>) -> Self {
        ConditionValue::List(v.into_iter().map(ConditionValue::Double).collect())
    }
}

/// Named initialisation values for one model.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct Conditions(BTreeMap<String, ConditionValue>);

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insertion.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ConditionValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ConditionValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn exists(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ConditionValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConditionValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn require(&self, key: &str) -> DevsResult<&ConditionValue> {
        self.0.get(key).ok_or_else(|| DevsError::MissingCondition {
            key: key.to_string(),
        })
    }

    pub fn get_double(&self, key: &str) -> DevsResult<f64> {
        self.require(key)?
            .as_double()
            .ok_or_else(|| type_error(key, "double"))
    }

    pub fn get_double_or(&self, key: &str, default: f64) -> DevsResult<f64> {
        if self.exists(key) {
            self.get_double(key)
        } else {
            Ok(default)
        }
    }

    pub fn get_integer(&self, key: &str) -> DevsResult<i64> {
        self.require(key)?
            .as_integer()
            .ok_or_else(|| type_error(key, "integer"))
    }

    pub fn get_integer_or(&self, key: &str, default: i64) -> DevsResult<i64> {
        if self.exists(key) {
            self.get_integer(key)
        } else {
            Ok(default)
        }
    }

    pub fn get_string(&self, key: &str) -> DevsResult<&str> {
        self.require(key)?
            .as_str()
            .ok_or_else(|| type_error(key, "string"))
    }

    pub fn get_string_or<'a>(&'a self, key: &str, default: &'a str) -> DevsResult<&'a str> {
        if self.exists(key) {
            self.get_string(key)
        } else {
            Ok(default)
        }
    }

    pub fn get_bool_or(&self, key: &str, default: bool) -> DevsResult<bool> {
        match self.0.get(key) {
            None => Ok(default),
            Some(v) => v.as_bool().ok_or_else(|| type_error(key, "boolean")),
        }
    }

    /// A list of numbers; a single number is accepted as a one-element list.
    pub fn get_double_list(&self, key: &str) -> DevsResult<Vec<f64>> {
        match self.require(key)? {
            ConditionValue::List(items) => items
                .iter()
                .map(|item| item.as_double().ok_or_else(|| type_error(key, "list of doubles")))
                .collect(),
            other => other
                .as_double()
                .map(|v| vec![v])
                .ok_or_else(|| type_error(key, "list of doubles")),
        }
    }
}

fn type_error(key: &str, expected: &'static str) -> DevsError {
    DevsError::ConditionType {
        key: key.to_string(),
        expected,
    }
}
