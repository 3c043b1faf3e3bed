// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Free-form clip parameters.
//!
//! Gesture parameters are opaque to the editor: they are stored, validated
//! for finiteness and forwarded to the score file untouched. Keys keep
//! their insertion order so saved files stay stable across edits.

use std::fmt;

use serde::de::{self, MapAccess, Visitor};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{EditorError, Result};

/// Largest magnitude written as an integer rather than a float
const MAX_EXACT_INTEGER: f64 = 9.0e15;

/// Value kinds a parameter may hold
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Single number
    Number(f64),
    /// Sequence of numbers
    Numbers(Vec<f64>),
    /// Text value
    Text(String),
}

impl ParamValue {
    /// Reject NaN and infinite numbers
    pub fn validate(&self, key: &str) -> Result<()> {
        let finite = match self {
            ParamValue::Number(v) => v.is_finite(),
            ParamValue::Numbers(values) => values.iter().all(|v| v.is_finite()),
            ParamValue::Text(_) => true,
        };
        if finite {
            Ok(())
        } else {
            Err(EditorError::MalformedData(format!(
                "parameter `{}` holds a non-finite number",
                key
            )))
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Number(v) => write!(f, "{}", v),
            ParamValue::Numbers(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(", "))
            }
            ParamValue::Text(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for ParamValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            ParamValue::Number(v) => CompactNumber(*v).serialize(serializer),
            ParamValue::Numbers(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for v in values {
                    seq.serialize_element(&CompactNumber(*v))?;
                }
                seq.end()
            }
            ParamValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

/// Number that serializes as an integer when it has no fractional part
#[derive(Debug, Clone, Copy)]
pub(crate) struct CompactNumber(pub f64);

impl Serialize for CompactNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let v = self.0;
        if v.is_finite() && v.fract() == 0.0 && v.abs() < MAX_EXACT_INTEGER {
            serializer.serialize_i64(v as i64)
        } else {
            serializer.serialize_f64(v)
        }
    }
}

/// Insertion-ordered parameter bag
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamMap {
    entries: Vec<(String, ParamValue)>,
}

impl ParamMap {
    /// Create an empty bag
    pub fn new() -> Self {
        Self::default()
    }

    /// Parameters of a freshly added gesture
    pub fn gesture_defaults() -> Self {
        let mut params = Self::new();
        params.insert("durataArmonica", ParamValue::Number(26.0));
        params.insert("ritmo", ParamValue::Numbers(vec![7.0, 15.0]));
        params.insert("ampiezza", ParamValue::Numbers(vec![-30.0, -0.25]));
        params.insert("frequenza", ParamValue::Numbers(vec![6.0, 1.0]));
        params.insert("posizione", ParamValue::Number(-8.0));
        params
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert or replace a value. A replaced key keeps its position.
    pub fn insert(&mut self, key: impl Into<String>, value: ParamValue) -> Option<ParamValue> {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, slot)) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((key, value));
                None
            }
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        let index = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    /// Get a number parameter with default
    pub fn get_number(&self, key: &str, default: f64) -> f64 {
        match self.get(key) {
            Some(ParamValue::Number(v)) => *v,
            _ => default,
        }
    }

    /// Get a number sequence parameter
    pub fn get_numbers(&self, key: &str) -> Option<&[f64]> {
        match self.get(key) {
            Some(ParamValue::Numbers(values)) => Some(values),
            _ => None,
        }
    }

    /// Validate every value
    pub fn validate(&self) -> Result<()> {
        self.entries.iter().try_for_each(|(k, v)| v.validate(k))
    }
}

impl FromIterator<(String, ParamValue)> for ParamMap {
    fn from_iter<I: IntoIterator<Item = (String, ParamValue)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (key, value) in iter {
            params.insert(key, value);
        }
        params
    }
}

impl Serialize for ParamMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

struct ParamMapVisitor;

impl<'de> Visitor<'de> for ParamMapVisitor {
    type Value = ParamMap;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a mapping of parameter names to numbers, number lists or strings")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<ParamMap, A::Error> {
        let mut params = ParamMap::new();
        while let Some(key) = access.next_key::<String>()? {
            let value: ParamValue = access.next_value().map_err(|e| {
                de::Error::custom(format!(
                    "parameter `{}` must be a number, number list or string ({})",
                    key, e
                ))
            })?;
            value.validate(&key).map_err(de::Error::custom)?;
            params.insert(key, value);
        }
        Ok(params)
    }
}

impl<'de> Deserialize<'de> for ParamMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        deserializer.deserialize_map(ParamMapVisitor)
    }
}
