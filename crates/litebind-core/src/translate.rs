//! Declared-type translation.
//!
//! After a column is decoded into its storage class, the column's declared
//! SQL type name can be used to produce a richer value: `DATE` text becomes
//! a [`NaiveDate`], `BOOLEAN` integers become `bool`, and so on.
//!
//! Converters are keyed by a case-insensitive regular expression over the
//! normalized declared type (lowercased, trimmed, size arguments such as
//! `(10,2)` removed). They are tried in registration order; the first whose
//! pattern matches decides. A converter that cannot make sense of a value
//! returns `None` and the raw value is kept, so translation never fails a
//! query.

use crate::Result;
use crate::error::Error;
use crate::value::Value;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;
use std::fmt;
use std::sync::Arc;

/// Converter from a raw decoded value to a translated one.
///
/// Receives the normalized declared type and the raw value, which is never
/// [`Value::Null`].
pub type Converter = Arc<dyn Fn(&str, &Value) -> Option<Value> + Send + Sync>;

#[derive(Clone)]
struct Entry {
    pattern: String,
    regex: Regex,
    convert: Converter,
}

/// An ordered table of declared-type converters.
#[derive(Clone)]
pub struct Translator {
    entries: Vec<Entry>,
}

impl Translator {
    /// A translator preloaded with the default converters.
    pub fn new() -> Self {
        let mut t = Self::empty();
        t.install_defaults();
        t
    }

    /// A translator with no converters: every value passes through.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Register a converter for declared types matching `pattern`.
    ///
    /// A pattern that is already registered has its converter replaced in
    /// place, keeping its precedence.
    pub fn add<F>(&mut self, pattern: &str, convert: F) -> Result<&mut Self>
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static,
    {
        let convert: Converter = Arc::new(convert);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.pattern == pattern) {
            entry.convert = convert;
        } else {
            let entry = Self::entry(pattern, convert)?;
            self.entries.push(entry);
        }
        Ok(self)
    }

    /// Register a converter ahead of every existing one.
    ///
    /// Any earlier registration of the same pattern is dropped.
    pub fn prepend<F>(&mut self, pattern: &str, convert: F) -> Result<&mut Self>
    where
        F: Fn(&str, &Value) -> Option<Value> + Send + Sync + 'static,
    {
        let entry = Self::entry(pattern, Arc::new(convert))?;
        self.entries.retain(|e| e.pattern != pattern);
        self.entries.insert(0, entry);
        Ok(self)
    }

    /// Remove the converter registered under `pattern`.
    pub fn remove(&mut self, pattern: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.pattern != pattern);
        self.entries.len() != before
    }

    /// Registered patterns in precedence order.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.pattern.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Translate `value` according to the column's declared type.
    ///
    /// NULL, an absent declared type, an unmatched type, and a converter
    /// that declines all yield the raw value.
    pub fn translate(&self, declared: Option<&str>, value: Value) -> Value {
        let Some(declared) = declared else {
            return value;
        };
        if value.is_null() {
            return value;
        }
        let normalized = normalize(declared);
        let Some(entry) = self.entries.iter().find(|e| e.regex.is_match(&normalized)) else {
            return value;
        };
        match (entry.convert)(&normalized, &value) {
            Some(translated) => translated,
            None => {
                tracing::trace!(
                    declared = %declared,
                    pattern = %entry.pattern,
                    "Converter declined value, keeping raw"
                );
                value
            }
        }
    }

    fn entry(pattern: &str, convert: Converter) -> Result<Entry> {
        let regex = Regex::new(&format!("(?i)^(?:{pattern})$"))
            .map_err(|e| Error::config(format!("invalid type pattern '{pattern}': {e}")))?;
        Ok(Entry {
            pattern: pattern.to_string(),
            regex,
            convert,
        })
    }

    fn install_defaults(&mut self) {
        let defaults: [(&str, fn(&Value) -> Option<Value>); 7] = [
            ("date", to_date),
            ("datetime|timestamp", to_datetime),
            ("time", to_time),
            ("bit|bool|boolean", to_bool),
            ("decimal|numeric", to_decimal),
            (
                "int|integer|tinyint|smallint|mediumint|bigint|int2|int8",
                to_integer,
            ),
            ("real|float|double|double precision", to_float),
        ];
        for (pattern, convert) in defaults {
            let convert: Converter = Arc::new(move |_: &str, v: &Value| convert(v));
            // Default patterns are fixed literals and always compile.
            if let Ok(entry) = Self::entry(pattern, convert) {
                self.entries.push(entry);
            }
        }
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("patterns", &self.patterns().collect::<Vec<_>>())
            .finish()
    }
}

/// Lowercase, trim and strip a trailing size argument: `VARCHAR(10)` -> `varchar`.
pub fn normalize(declared: &str) -> String {
    let head = declared.split('(').next().unwrap_or(declared);
    head.trim().to_ascii_lowercase()
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::Text(t) => t.decode().ok().map(|s| s.trim().to_string()),
        _ => None,
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

fn to_date(value: &Value) -> Option<Value> {
    let s = text_of(value)?;
    if let Ok(d) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return Some(Value::Date(d));
    }
    parse_datetime(&s).map(|dt| Value::Date(dt.date()))
}

fn to_datetime(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(secs) => {
            DateTime::from_timestamp(*secs, 0).map(|dt| Value::DateTime(dt.naive_utc()))
        }
        Value::Text(_) => {
            let s = text_of(value)?;
            if let Some(dt) = parse_datetime(&s) {
                return Some(Value::DateTime(dt));
            }
            NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
                .map(Value::DateTime)
        }
        _ => None,
    }
}

fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_utc()))
}

fn to_time(value: &Value) -> Option<Value> {
    let s = text_of(value)?;
    ["%H:%M:%S%.f", "%H:%M"]
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(&s, fmt).ok())
        .map(Value::Time)
}

fn to_bool(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(i) => Some(Value::Bool(*i != 0)),
        Value::Float(f) => Some(Value::Bool(*f != 0.0)),
        Value::Text(_) => {
            let s = text_of(value)?.to_ascii_lowercase();
            match s.as_str() {
                "" | "f" | "false" | "0" | "no" | "n" | "off" => Some(Value::Bool(false)),
                "t" | "true" | "1" | "yes" | "y" | "on" => Some(Value::Bool(true)),
                _ => None,
            }
        }
        _ => None,
    }
}

fn to_decimal(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(i) => Some(Value::Decimal(i.to_string())),
        Value::Float(f) => Some(Value::Decimal(f.to_string())),
        Value::Text(_) => {
            let s = text_of(value)?;
            s.parse::<f64>().ok().map(|_| Value::Decimal(s))
        }
        _ => None,
    }
}

fn to_integer(value: &Value) -> Option<Value> {
    match value {
        Value::Text(_) => text_of(value)?.parse::<i64>().ok().map(Value::Integer),
        _ => None,
    }
}

fn to_float(value: &Value) -> Option<Value> {
    match value {
        Value::Integer(i) => Some(Value::Float(*i as f64)),
        Value::Text(_) => text_of(value)?.parse::<f64>().ok().map(Value::Float),
        _ => None,
    }
}
