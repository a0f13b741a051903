//! Dynamic SQL values.

use crate::Result;
use crate::encoding::Encoding;
use crate::error::{Error, TypeError};
use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// The five native storage classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StorageClass {
    Null,
    Integer,
    Float,
    Text,
    Blob,
}

/// A text value: raw bytes plus the encoding they are in.
///
/// `encoding` is `None` when the bytes were tagged with a charset the
/// resolver does not recognise; such text is bound as a blob.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Text {
    bytes: Vec<u8>,
    encoding: Option<Encoding>,
}

impl Text {
    /// UTF-8 text from a Rust string.
    pub fn utf8(s: impl Into<String>) -> Self {
        Self {
            bytes: s.into().into_bytes(),
            encoding: Some(Encoding::Utf8),
        }
    }

    /// Encode a Rust string into `encoding`.
    pub fn encode(s: &str, encoding: Encoding) -> Self {
        Self {
            bytes: encoding.encode(s),
            encoding: Some(encoding),
        }
    }

    /// Wrap bytes already in `encoding`.
    pub fn from_bytes(bytes: Vec<u8>, encoding: Encoding) -> Self {
        Self {
            bytes,
            encoding: Some(encoding),
        }
    }

    /// Wrap bytes tagged with an arbitrary charset name.
    pub fn with_charset(bytes: Vec<u8>, charset: &str) -> Self {
        Self {
            bytes,
            encoding: Encoding::find(charset).ok(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn encoding(&self) -> Option<Encoding> {
        self.encoding
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Borrow as `&str` when the bytes are UTF-8 compatible and well formed.
    pub fn as_str(&self) -> Option<&str> {
        match self.encoding {
            Some(Encoding::Utf8 | Encoding::UsAscii) => std::str::from_utf8(&self.bytes).ok(),
            _ => None,
        }
    }

    /// Decode into a Rust string.
    pub fn decode(&self) -> Result<String> {
        match self.encoding {
            Some(encoding) => encoding.decode(&self.bytes),
            None => Err(Error::Type(TypeError {
                expected: "text in a known encoding",
                actual: "text in an unrecognised charset".to_string(),
                column: None,
            })),
        }
    }

    /// Decode into a Rust string, replacing malformed sequences.
    ///
    /// Bytes in an unrecognised charset are read as UTF-8.
    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        match self.encoding {
            Some(enc @ (Encoding::Utf16Le | Encoding::Utf16Be)) => {
                Cow::Owned(enc.decode_lossy(&self.bytes))
            }
            _ => String::from_utf8_lossy(&self.bytes),
        }
    }

    /// Re-encode into `target`. Text that cannot be decoded is returned unchanged.
    pub fn transcode(&self, target: Encoding) -> Cow<'_, Text> {
        if self.encoding == Some(target) {
            return Cow::Borrowed(self);
        }
        match self.decode() {
            Ok(s) => Cow::Owned(Text::encode(&s, target)),
            Err(_) => Cow::Borrowed(self),
        }
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_string_lossy())
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text::utf8(s)
    }
}

impl From<String> for Text {
    fn from(s: String) -> Self {
        Text::utf8(s)
    }
}

/// A dynamically-typed SQL value.
///
/// The first five variants mirror the native storage classes. The rest are
/// produced by declared-type translation and are bound back in their
/// storage form (booleans as integers, dates and decimals as text).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// NULL value
    #[default]
    Null,

    /// 64-bit signed integer
    Integer(i64),

    /// 64-bit floating point
    Float(f64),

    /// Encoded text
    Text(Text),

    /// Binary data
    Blob(Vec<u8>),

    /// Boolean value
    Bool(bool),

    /// Calendar date
    Date(NaiveDate),

    /// Time of day
    Time(NaiveTime),

    /// Date and time without zone
    DateTime(NaiveDateTime),

    /// Fixed-point decimal (stored as its canonical string)
    Decimal(String),
}

impl Value {
    /// Check if this value is NULL.
    pub const fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Get the type name of this value.
    pub const fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "NULL",
            Value::Integer(_) => "INTEGER",
            Value::Float(_) => "REAL",
            Value::Text(_) => "TEXT",
            Value::Blob(_) => "BLOB",
            Value::Bool(_) => "BOOLEAN",
            Value::Date(_) => "DATE",
            Value::Time(_) => "TIME",
            Value::DateTime(_) => "DATETIME",
            Value::Decimal(_) => "DECIMAL",
        }
    }

    /// The storage class this value is bound as.
    pub const fn storage_class(&self) -> StorageClass {
        match self {
            Value::Null => StorageClass::Null,
            Value::Integer(_) | Value::Bool(_) => StorageClass::Integer,
            Value::Float(_) => StorageClass::Float,
            Value::Text(_)
            | Value::Date(_)
            | Value::Time(_)
            | Value::DateTime(_)
            | Value::Decimal(_) => StorageClass::Text,
            Value::Blob(_) => StorageClass::Blob,
        }
    }

    /// Try to convert this value to a bool.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Integer(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Try to convert this value to an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Integer(v) => Some(*v),
            Value::Bool(v) => Some(i64::from(*v)),
            _ => None,
        }
    }

    /// Try to convert this value to an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Integer(v) => Some(*v as f64),
            Value::Decimal(s) => s.parse().ok(),
            _ => None,
        }
    }

    /// Borrow the text payload.
    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Value::Text(t) => Some(t),
            _ => None,
        }
    }

    /// Try to get this value as a string reference.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(t) => t.as_str(),
            Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get this value as a byte slice.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Blob(b) => Some(b),
            Value::Text(t) => Some(t.as_bytes()),
            _ => None,
        }
    }

    /// The textual form used when binding a translated value.
    pub fn storage_text(&self) -> Option<String> {
        match self {
            Value::Date(d) => Some(d.format("%Y-%m-%d").to_string()),
            Value::Time(t) => Some(t.format("%H:%M:%S%.f").to_string()),
            Value::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S%.f").to_string()),
            Value::Decimal(s) => Some(s.clone()),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(t) => write!(f, "{t}"),
            Value::Blob(b) => write!(f, "[BLOB: {} bytes]", b.len()),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) | Value::Decimal(_) => {
                f.write_str(&self.storage_text().unwrap_or_default())
            }
        }
    }
}

// Conversion implementations
impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<u32> for Value {
    fn from(v: u32) -> Self {
        Value::Integer(i64::from(v))
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(Text::utf8(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(Text::utf8(v))
    }
}

impl From<Text> for Value {
    fn from(v: Text) -> Self {
        Value::Text(v)
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Blob(v)
    }
}

impl From<&[u8]> for Value {
    fn from(v: &[u8]) -> Self {
        Value::Blob(v.to_vec())
    }
}

impl From<NaiveDate> for Value {
    fn from(v: NaiveDate) -> Self {
        Value::Date(v)
    }
}

impl From<NaiveTime> for Value {
    fn from(v: NaiveTime) -> Self {
        Value::Time(v)
    }
}

impl From<NaiveDateTime> for Value {
    fn from(v: NaiveDateTime) -> Self {
        Value::DateTime(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(v) => v.into(),
            None => Value::Null,
        }
    }
}

/// Trait for converting from a `Value` to a typed value.
pub trait FromValue: Sized {
    /// Convert from a Value, returning an error if the conversion fails.
    fn from_value(value: &Value) -> Result<Self>;
}

fn mismatch(expected: &'static str, value: &Value) -> Error {
    Error::Type(TypeError {
        expected,
        actual: value.type_name().to_string(),
        column: None,
    })
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Result<Self> {
        Ok(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_bool().ok_or_else(|| mismatch("bool", value))
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_i64().ok_or_else(|| mismatch("i64", value))
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Result<Self> {
        let v = i64::from_value(value)?;
        i32::try_from(v).map_err(|_| {
            Error::Type(TypeError {
                expected: "i32",
                actual: format!("integer {v} out of range"),
                column: None,
            })
        })
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_f64().ok_or_else(|| mismatch("f64", value))
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Text(t) => t.decode(),
            Value::Decimal(s) => Ok(s.clone()),
            Value::Date(_) | Value::Time(_) | Value::DateTime(_) => {
                Ok(value.storage_text().unwrap_or_default())
            }
            _ => Err(mismatch("String", value)),
        }
    }
}

impl FromValue for Text {
    fn from_value(value: &Value) -> Result<Self> {
        value.as_text().cloned().ok_or_else(|| mismatch("Text", value))
    }
}

impl FromValue for Vec<u8> {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Blob(b) => Ok(b.clone()),
            _ => Err(mismatch("Vec<u8>", value)),
        }
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.date()),
            _ => Err(mismatch("NaiveDate", value)),
        }
    }
}

impl FromValue for NaiveDateTime {
    fn from_value(value: &Value) -> Result<Self> {
        match value {
            Value::DateTime(dt) => Ok(*dt),
            _ => Err(mismatch("NaiveDateTime", value)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: &Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_matches_storage_text() {
        assert_eq!(Value::from(1.22).to_string(), "1.22");
        assert_eq!(Value::from(42).to_string(), "42");
        assert_eq!(Value::from("text1").to_string(), "text1");
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::Blob(vec![1, 2, 3]).to_string(), "[BLOB: 3 bytes]");
        let date = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert_eq!(Value::Date(date).to_string(), "2024-02-29");
    }

    #[test]
    fn storage_classes() {
        assert_eq!(Value::Bool(true).storage_class(), StorageClass::Integer);
        assert_eq!(
            Value::Decimal("1.50".into()).storage_class(),
            StorageClass::Text
        );
        assert_eq!(Value::Blob(vec![]).storage_class(), StorageClass::Blob);
        assert_eq!(Value::Null.storage_class(), StorageClass::Null);
    }

    #[test]
    fn text_tagging() {
        let t = Text::encode("hi", Encoding::Utf16Be);
        assert_eq!(t.as_bytes(), &[0, b'h', 0, b'i']);
        assert_eq!(t.encoding(), Some(Encoding::Utf16Be));
        assert_eq!(t.as_str(), None);
        assert_eq!(t.decode().unwrap(), "hi");
        assert_eq!(t.to_string(), "hi");

        let latin = Text::with_charset(vec![0xe9], "ISO-8859-1");
        assert_eq!(latin.encoding(), None);
        assert!(latin.decode().is_err());
    }

    #[test]
    fn transcode_borrows_when_already_in_target() {
        let t = Text::utf8("abc");
        assert!(matches!(t.transcode(Encoding::Utf8), Cow::Borrowed(_)));
        let le = t.transcode(Encoding::Utf16Le);
        assert_eq!(le.as_bytes(), &[b'a', 0, b'b', 0, b'c', 0]);
    }

    #[test]
    fn from_value_conversions() {
        assert_eq!(i64::from_value(&Value::Integer(7)).unwrap(), 7);
        assert!(i32::from_value(&Value::Integer(i64::MAX)).is_err());
        assert_eq!(String::from_value(&Value::from("x")).unwrap(), "x");
        assert_eq!(Option::<i64>::from_value(&Value::Null).unwrap(), None);
        assert!(matches!(
            Vec::<u8>::from_value(&Value::Integer(1)),
            Err(Error::Type(_))
        ));
        assert!(bool::from_value(&Value::Integer(2)).unwrap());
    }

    #[test]
    fn option_into_value() {
        let none: Option<i64> = None;
        assert!(Value::from(none).is_null());
        assert_eq!(Value::from(Some("a")), Value::from("a"));
    }
}
