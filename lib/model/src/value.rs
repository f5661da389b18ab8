//! The generic tagged value union records are built from.

use crate::record::Record;

/// One field's worth of data in a generic [`Record`].
///
/// Mirrors the Parquet physical type set plus the structural kinds
/// (`Group`, `List`, `Map`) needed to describe nested records before they
/// are shredded into columns.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Boolean(bool),
    Int32(i32),
    Int64(i64),
    Float(f32),
    Double(f64),
    /// Raw bytes. Also the representation used for UTF-8 strings — see [`Value::as_str`].
    Binary(Vec<u8>),
    /// A 12-byte Parquet INT96 timestamp, stored as the raw on-disk bytes.
    Int96([u8; 12]),
    Group(Record),
    List(Vec<Value>),
    Map(Vec<(Value, Value)>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Decodes a `Binary` value as UTF-8. Returns `None` for any other variant
    /// or if the bytes are not valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Binary(bytes) => std::str::from_utf8(bytes).ok(),
            _ => None,
        }
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::Binary(s.into().into_bytes())
    }

    pub fn as_group(&self) -> Option<&Record> {
        match self {
            Value::Group(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_group(self) -> Option<Record> {
        match self {
            Value::Group(record) => Some(record),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int32(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int64(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Boolean(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_round_trips_through_binary() {
        let v = Value::string("hello");
        assert_eq!(v.as_str(), Some("hello"));
        assert!(!v.is_null());
    }

    #[test]
    fn non_binary_has_no_str_view() {
        assert_eq!(Value::Int32(1).as_str(), None);
        assert_eq!(Value::Null.as_str(), None);
    }
}
