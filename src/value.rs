//! Tag keys and values.
//!
//! Tag values form a closed set of variants so that every sink renders a value
//! through exactly one branch.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::ids::SpanId;
use crate::level::Level;

/// A single key/value pair carried by a scope or a payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Tag {
    pub key: String,
    pub value: TagValue,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<TagValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl<K: Into<String>, V: Into<TagValue>> From<(K, V)> for Tag {
    fn from((key, value): (K, V)) -> Self {
        Tag::new(key, value)
    }
}

/// Value of a tag.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Null,
    Bool(bool),
    Int(i64),
    UInt(u64),
    Float(f64),
    Str(String),
    Timestamp(DateTime<Utc>),
    Duration(Duration),
    Id(Uuid),
    Level(Level),
    /// Rendered message of an error.
    Error(String),
    List(Vec<TagValue>),
    /// Nested key/value pairs, kept in insertion order.
    Map(Vec<(String, TagValue)>),
}

impl TagValue {
    /// Capture an error as its display string.
    pub fn error(err: &(dyn std::error::Error + '_)) -> Self {
        Self::Error(err.to_string())
    }

    /// Build a nested map value.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<TagValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) | Self::Error(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(v) => Some(*v),
            Self::UInt(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::UInt(v) => Some(*v),
            Self::Int(v) => u64::try_from(*v).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Int(v) => write!(f, "{}", v),
            Self::UInt(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(v) | Self::Error(v) => f.write_str(v),
            Self::Timestamp(v) => f.write_str(&v.to_rfc3339_opts(SecondsFormat::Micros, true)),
            Self::Duration(v) => write!(f, "{:?}", v),
            Self::Id(v) => write!(f, "{}", v),
            Self::Level(v) => f.write_str(v.as_str()),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

impl Serialize for TagValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_unit(),
            Self::Bool(v) => serializer.serialize_bool(*v),
            Self::Int(v) => serializer.serialize_i64(*v),
            Self::UInt(v) => serializer.serialize_u64(*v),
            Self::Float(v) => serializer.serialize_f64(*v),
            Self::Str(v) | Self::Error(v) => serializer.serialize_str(v),
            Self::Timestamp(v) => {
                serializer.serialize_str(&v.to_rfc3339_opts(SecondsFormat::Micros, true))
            }
            // Nanoseconds, saturating at u64::MAX.
            Self::Duration(v) => {
                serializer.serialize_u64(u64::try_from(v.as_nanos()).unwrap_or(u64::MAX))
            }
            Self::Id(v) => serializer.collect_str(v),
            Self::Level(v) => v.serialize(serializer),
            Self::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (k, v) in entries {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}

/// Serializes a tag list as an ordered JSON-style object.
pub struct TagMap<'a>(pub &'a [Tag]);

impl Serialize for TagMap<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for tag in self.0 {
            map.serialize_entry(&tag.key, &tag.value)?;
        }
        map.end()
    }
}

macro_rules! impl_from {
    ($variant:ident, $target:ty, [$($source:ty),+]) => {
        $(
            impl From<$source> for TagValue {
                fn from(v: $source) -> Self {
                    Self::$variant(v as $target)
                }
            }
        )+
    };
}

impl_from!(Int, i64, [i8, i16, i32, i64, isize]);
impl_from!(UInt, u64, [u8, u16, u32, u64, usize]);
impl_from!(Float, f64, [f32, f64]);

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for TagValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<&String> for TagValue {
    fn from(v: &String) -> Self {
        Self::Str(v.clone())
    }
}

impl From<DateTime<Utc>> for TagValue {
    fn from(v: DateTime<Utc>) -> Self {
        Self::Timestamp(v)
    }
}

impl From<Duration> for TagValue {
    fn from(v: Duration) -> Self {
        Self::Duration(v)
    }
}

impl From<Uuid> for TagValue {
    fn from(v: Uuid) -> Self {
        Self::Id(v)
    }
}

impl From<SpanId> for TagValue {
    fn from(v: SpanId) -> Self {
        Self::Id(v.as_uuid())
    }
}

impl From<Level> for TagValue {
    fn from(v: Level) -> Self {
        Self::Level(v)
    }
}

impl<T: Into<TagValue>> From<Vec<T>> for TagValue {
    fn from(v: Vec<T>) -> Self {
        Self::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<TagValue>> From<Option<T>> for TagValue {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}
