//! Tuple values handed to the query engine.

use std::fmt;
use std::ops::Index;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use prost_reflect::DynamicMessage;

/// A single tuple value.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Null,
    Bool(bool),
    Int32(i32),
    Int64(i64),
    UInt32(u32),
    UInt64(u64),
    Float32(f32),
    Float64(f64),
    String(String),
    Bytes(Vec<u8>),
    /// Nanoseconds since the Unix epoch.
    TimestampNanos(i64),
    DurationNanos(i64),
    /// A nested message, or one element of a repeated projected path.
    Tuple(Tuple),
    /// A repeated field, in source order.
    List(Vec<Datum>),
    /// The whole decoded record, produced when no projection was requested.
    Record(DynamicMessage),
}

impl Datum {
    pub fn is_null(&self) -> bool {
        matches!(self, Datum::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Datum::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Datum]> {
        match self {
            Datum::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Datum::Tuple(t) => Some(t),
            _ => None,
        }
    }
}

impl From<&str> for Datum {
    fn from(value: &str) -> Self {
        Datum::String(value.to_string())
    }
}

impl From<String> for Datum {
    fn from(value: String) -> Self {
        Datum::String(value)
    }
}

impl From<Tuple> for Datum {
    fn from(value: Tuple) -> Self {
        Datum::Tuple(value)
    }
}

impl fmt::Display for Datum {
    /// Renders values the way the engine's text dump does: tuples in
    /// parentheses, lists in brackets, nulls as nothing.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Datum::Null => Ok(()),
            Datum::Bool(v) => write!(f, "{v}"),
            Datum::Int32(v) => write!(f, "{v}"),
            Datum::Int64(v) => write!(f, "{v}"),
            Datum::UInt32(v) => write!(f, "{v}"),
            Datum::UInt64(v) => write!(f, "{v}"),
            Datum::Float32(v) => write!(f, "{v}"),
            Datum::Float64(v) => write!(f, "{v}"),
            Datum::String(v) => f.write_str(v),
            Datum::Bytes(v) => f.write_str(&STANDARD.encode(v)),
            Datum::TimestampNanos(v) | Datum::DurationNanos(v) => write!(f, "{v}"),
            Datum::Tuple(t) => write!(f, "{t}"),
            Datum::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Datum::Record(msg) => write!(f, "{}", crate::projection::message_tuple(msg)),
        }
    }
}

/// An ordered sequence of values. Tuples own their data.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tuple(Vec<Datum>);

impl Tuple {
    pub fn new(values: Vec<Datum>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Datum> {
        self.0.get(index)
    }

    pub fn values(&self) -> &[Datum] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Datum> {
        self.0.iter()
    }

    pub fn into_values(self) -> Vec<Datum> {
        self.0
    }
}

impl Index<usize> for Tuple {
    type Output = Datum;

    fn index(&self, index: usize) -> &Datum {
        &self.0[index]
    }
}

impl From<Vec<Datum>> for Tuple {
    fn from(values: Vec<Datum>) -> Self {
        Self(values)
    }
}

impl FromIterator<Datum> for Tuple {
    fn from_iter<I: IntoIterator<Item = Datum>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Tuple {
    type Item = Datum;
    type IntoIter = std::vec::IntoIter<Datum>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Tuple {
    type Item = &'a Datum;
    type IntoIter = std::slice::Iter<'a, Datum>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, value) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{value}")?;
        }
        f.write_str(")")
    }
}
