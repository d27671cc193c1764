//! Decoded values.
//!
//! A message body decodes to a list of [`Value`]s. The set of shapes is
//! closed: kernel structures become [`Struct`]s with named fields, names
//! become [`Value::Text`], and anything that could not be interpreted is kept
//! as [`Value::Bytes`].

use std::fmt;

use base64::{prelude::BASE64_STANDARD, Engine};
use bytes::Bytes;
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::protocol::{Header, Meta, Timestamp};

/// One decoded element of a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    Header(Header),
    Timestamp(Timestamp),
    /// Uninterpreted bytes.
    Bytes(Bytes),
    /// A NUL-terminated name, without its terminator.
    Text(Bytes),
    List(Vec<Value>),
    Struct(Struct),
    Unsigned(u64),
    Signed(i64),
}

/// A decoded kernel structure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Struct {
    /// Layout name, e.g. `EntryOut`.
    pub name: &'static str,
    pub fields: Vec<Field>,
}

/// A named structure field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: &'static str,
    pub value: Value,
}

impl Struct {
    /// Look up a field by name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|f| f.name == name)
            .map(|f| &f.value)
    }

    /// Look up an unsigned field by name.
    pub fn unsigned(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            Value::Unsigned(v) => Some(*v),
            _ => None,
        }
    }
}

impl Value {
    /// Wrap for serialization with blobs cut to `limit` bytes.
    ///
    /// A limit of 0 disables truncation.
    pub fn limited(&self, limit: usize) -> Limited<'_> {
        Limited { value: self, limit }
    }

    /// Whether any blob in this value is longer than `limit`.
    ///
    /// Always false for a limit of 0.
    pub fn exceeds(&self, limit: usize) -> bool {
        if limit == 0 {
            return false;
        }
        match self {
            Value::Bytes(data) => data.len() > limit,
            Value::List(items) => items.iter().any(|v| v.exceeds(limit)),
            Value::Struct(s) => s.fields.iter().any(|f| f.value.exceeds(limit)),
            _ => false,
        }
    }

    pub fn as_struct(&self) -> Option<&Struct> {
        match self {
            Value::Struct(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&Meta> for Value {
    fn from(meta: &Meta) -> Self {
        match meta {
            Meta::Timestamp(ts) => Value::Timestamp(*ts),
            Meta::Blob(data) => Value::Bytes(data.clone()),
        }
    }
}

/// Escape arbitrary bytes into printable ASCII, as the text output shows them.
pub fn escape_bytes(data: &[u8]) -> String {
    data.escape_ascii().to_string()
}

/// Serialization view of a [`Value`] with a blob size limit.
///
/// Blobs serialize as standard base64 of their (possibly cut) bytes.
pub struct Limited<'a> {
    value: &'a Value,
    limit: usize,
}

impl Limited<'_> {
    fn nested<'b>(&self, value: &'b Value) -> Limited<'b> {
        value.limited(self.limit)
    }
}

impl Serialize for Limited<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value {
            Value::Header(h) => h.serialize(serializer),
            Value::Timestamp(ts) => serializer.serialize_str(&ts.to_rfc3339()),
            Value::Bytes(data) => {
                let data = if self.limit > 0 && data.len() > self.limit {
                    &data[..self.limit]
                } else {
                    &data[..]
                };
                serializer.serialize_str(&BASE64_STANDARD.encode(data))
            }
            Value::Text(name) => serializer.serialize_str(&String::from_utf8_lossy(name)),
            Value::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&self.nested(item))?;
                }
                seq.end()
            }
            Value::Struct(s) => {
                let mut map = serializer.serialize_map(Some(s.fields.len()))?;
                for field in &s.fields {
                    map.serialize_entry(field.name, &self.nested(&field.value))?;
                }
                map.end()
            }
            Value::Unsigned(v) => serializer.serialize_u64(*v),
            Value::Signed(v) => serializer.serialize_i64(*v),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.limited(0).serialize(serializer)
    }
}

/// Go-style `%+v` rendering: `{Name:value Other:{...}}`.
impl fmt::Display for Struct {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}:{}", field.name, field.value)?;
        }
        f.write_str("}")
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Header(h) => write!(f, "{h}"),
            Value::Timestamp(ts) => write!(f, "{ts}"),
            Value::Bytes(data) => write!(f, "\"{}\"", escape_bytes(data)),
            Value::Text(name) => f.write_str(&String::from_utf8_lossy(name)),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::Struct(s) => write!(f, "{s}"),
            Value::Unsigned(v) => write!(f, "{v}"),
            Value::Signed(v) => write!(f, "{v}"),
        }
    }
}
