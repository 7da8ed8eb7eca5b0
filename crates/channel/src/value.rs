//! Values exchanged over the method channel.
//!
//! Mirrors the standard message-codec value space. At the JSON edge, byte
//! buffers travel as `{"$bytes": "<base64>"}` so they stay distinguishable
//! from strings.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Deserializer, Serialize, Serializer, de::Error as _, ser::SerializeMap};
use std::collections::BTreeMap;

const BYTES_KEY: &str = "$bytes";

#[derive(Debug, Clone, Default, PartialEq)]
pub enum EncodableValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    List(Vec<EncodableValue>),
    Map(BTreeMap<String, EncodableValue>),
}

impl EncodableValue {
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        EncodableValue::Bytes(data.into())
    }

    pub fn map<K, I>(entries: I) -> Self
    where
        K: Into<String>,
        I: IntoIterator<Item = (K, EncodableValue)>,
    {
        EncodableValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Looks up `key` when this value is a map.
    pub fn get(&self, key: &str) -> Option<&EncodableValue> {
        match self {
            EncodableValue::Map(entries) => entries.get(key),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            EncodableValue::Bytes(data) => Some(data),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            EncodableValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            EncodableValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric value as `f64`, accepting both integer and float variants.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            EncodableValue::Int(i) => Some(*i as f64),
            EncodableValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[EncodableValue]> {
        match self {
            EncodableValue::List(items) => Some(items),
            _ => None,
        }
    }
}

impl From<bool> for EncodableValue {
    fn from(value: bool) -> Self {
        EncodableValue::Bool(value)
    }
}

impl From<i64> for EncodableValue {
    fn from(value: i64) -> Self {
        EncodableValue::Int(value)
    }
}

impl From<f64> for EncodableValue {
    fn from(value: f64) -> Self {
        EncodableValue::Float(value)
    }
}

impl From<f32> for EncodableValue {
    fn from(value: f32) -> Self {
        EncodableValue::Float(value as f64)
    }
}

impl From<&str> for EncodableValue {
    fn from(value: &str) -> Self {
        EncodableValue::String(value.to_string())
    }
}

impl From<String> for EncodableValue {
    fn from(value: String) -> Self {
        EncodableValue::String(value)
    }
}

impl From<Vec<EncodableValue>> for EncodableValue {
    fn from(value: Vec<EncodableValue>) -> Self {
        EncodableValue::List(value)
    }
}

impl TryFrom<serde_json::Value> for EncodableValue {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        use serde_json::Value;

        Ok(match value {
            Value::Null => EncodableValue::Null,
            Value::Bool(b) => EncodableValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => EncodableValue::Int(i),
                None => EncodableValue::Float(
                    n.as_f64()
                        .ok_or_else(|| format!("Unrepresentable number {n}"))?,
                ),
            },
            Value::String(s) => EncodableValue::String(s),
            Value::Array(items) => EncodableValue::List(
                items
                    .into_iter()
                    .map(EncodableValue::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            Value::Object(entries) => {
                if entries.len() == 1
                    && let Some(Value::String(encoded)) = entries.get(BYTES_KEY)
                {
                    let data = STANDARD
                        .decode(encoded)
                        .map_err(|e| format!("Invalid base64 in `{BYTES_KEY}`: {e}"))?;
                    return Ok(EncodableValue::Bytes(data));
                }
                let mut map = BTreeMap::new();
                for (key, value) in entries {
                    map.insert(key, EncodableValue::try_from(value)?);
                }
                EncodableValue::Map(map)
            }
        })
    }
}

impl Serialize for EncodableValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            EncodableValue::Null => serializer.serialize_unit(),
            EncodableValue::Bool(b) => serializer.serialize_bool(*b),
            EncodableValue::Int(i) => serializer.serialize_i64(*i),
            EncodableValue::Float(f) => serializer.serialize_f64(*f),
            EncodableValue::String(s) => serializer.serialize_str(s),
            EncodableValue::Bytes(data) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(BYTES_KEY, &STANDARD.encode(data))?;
                map.end()
            }
            EncodableValue::List(items) => items.serialize(serializer),
            EncodableValue::Map(entries) => entries.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for EncodableValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        EncodableValue::try_from(value).map_err(D::Error::custom)
    }
}
