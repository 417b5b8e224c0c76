// ABOUTME: Semantic value kinds and the tagged-union value type
// ABOUTME: Holds the total, side-effect-free conversion primitive between kinds
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! # Value Model
//!
//! A [`Value`] is one of a small fixed set of semantic kinds: integer, float,
//! double, boolean, string, or a multi-value string list. [`convert`] moves a
//! value between kinds and is the only conversion path in the engine.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Semantic kind tag for a property value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    /// 32-bit signed integer.
    Int,
    /// 32-bit floating point.
    Float,
    /// 64-bit floating point.
    Double,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    String,
    /// Multi-value list of strings.
    List,
}

impl Kind {
    /// The kind's zero value: numeric zero, `false`, the empty string or
    /// list.
    #[must_use]
    pub const fn zero_value(self) -> Value {
        match self {
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::Double => Value::Double(0.0),
            Self::Bool => Value::Bool(false),
            Self::String => Value::String(String::new()),
            Self::List => Value::List(Vec::new()),
        }
    }

    /// Fixed storage size in bytes, when the kind has one.
    ///
    /// Strings and lists size with their content and return `None`.
    #[must_use]
    pub const fn fixed_size(self) -> Option<usize> {
        match self {
            Self::Int | Self::Float => Some(4),
            Self::Double => Some(8),
            Self::Bool => Some(1),
            Self::String | Self::List => None,
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Double => "double",
            Self::Bool => "bool",
            Self::String => "string",
            Self::List => "list",
        };
        f.write_str(s)
    }
}

/// A typed configuration value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// 32-bit signed integer.
    Int(i32),
    /// 32-bit floating point.
    Float(f32),
    /// 64-bit floating point.
    Double(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    String(String),
    /// Multi-value list of strings.
    List(Vec<String>),
}

impl Value {
    /// The kind tag of this value.
    #[must_use]
    pub const fn kind(&self) -> Kind {
        match self {
            Self::Int(_) => Kind::Int,
            Self::Float(_) => Kind::Float,
            Self::Double(_) => Kind::Double,
            Self::Bool(_) => Kind::Bool,
            Self::String(_) => Kind::String,
            Self::List(_) => Kind::List,
        }
    }

    /// Bytes of backing storage this value requires.
    ///
    /// Strings count their bytes plus a terminator, matching the capacity
    /// contract of caller-owned slots; lists sum their elements the same way.
    #[must_use]
    pub fn required_capacity(&self) -> usize {
        match self {
            Self::Int(_) | Self::Float(_) => 4,
            Self::Double(_) => 8,
            Self::Bool(_) => 1,
            Self::String(s) => s.len() + 1,
            Self::List(items) => items.iter().map(|s| s.len() + 1).sum(),
        }
    }

    /// Logically-used length: byte length for strings, element count for
    /// lists, fixed size otherwise.
    #[must_use]
    pub fn logical_len(&self) -> usize {
        match self {
            Self::String(s) => s.len(),
            Self::List(items) => items.len(),
            other => other.required_capacity(),
        }
    }

    /// Render as JSON for persistence, telemetry export, and request results.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(f64::from(*f)),
            Self::Double(d) => serde_json::Value::from(*d),
            Self::Bool(b) => serde_json::Value::from(*b),
            Self::String(s) => serde_json::Value::from(s.clone()),
            Self::List(items) => serde_json::Value::from(items.clone()),
        }
    }

    /// Interpret a JSON value as a typed value.
    ///
    /// Integral numbers load as [`Kind::Int`], other numbers as
    /// [`Kind::Double`]; arrays must be arrays of strings. Objects and null
    /// have no value form and return `None`.
    #[must_use]
    pub fn from_json(v: &serde_json::Value) -> Option<Self> {
        match v {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => {
                let d = n.as_f64()?;
                if d.fract() == 0.0 && d >= f64::from(i32::MIN) && d <= f64::from(i32::MAX) {
                    Some(Self::Int(d as i32))
                } else {
                    Some(Self::Double(d))
                }
            }
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Array(items) => {
                let mut out = Vec::with_capacity(items.len());
                for item in items {
                    out.push(item.as_str()?.to_string());
                }
                Some(Self::List(out))
            }
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Bool(b) => f.write_str(if *b { "true" } else { "false" }),
            Self::String(s) => f.write_str(s),
            Self::List(items) => f.write_str(&items.join(",")),
        }
    }
}

/// Parse a boolean the way operator-facing config files spell it: leading
/// whitespace is skipped and a first character of `t`, `y`, or `1` (any case)
/// means true.
fn string_to_bool(s: &str) -> bool {
    matches!(
        s.trim_start().chars().next(),
        Some('t' | 'T' | 'y' | 'Y' | '1')
    )
}

fn string_to_i32(s: &str) -> Result<i32, ConfigError> {
    let t = s.trim();
    if let Ok(i) = t.parse::<i32>() {
        return Ok(i);
    }
    // accept "25.5" for an int property, truncating
    if let Ok(d) = t.parse::<f64>() {
        if d >= f64::from(i32::MIN) && d <= f64::from(i32::MAX) {
            return Ok(d as i32);
        }
    }
    Err(ConfigError::ConversionFailed(format!(
        "cannot parse {t:?} as int"
    )))
}

/// Convert a value to the requested kind.
///
/// Total over the kind set and side-effect free. A failed conversion returns
/// [`ConfigError::ConversionFailed`] and implies no write anywhere.
pub fn convert(dst: Kind, src: &Value) -> Result<Value, ConfigError> {
    if src.kind() == dst {
        return Ok(src.clone());
    }
    let out = match (dst, src) {
        (Kind::Int, Value::Float(f)) => Value::Int(*f as i32),
        (Kind::Int, Value::Double(d)) => Value::Int(*d as i32),
        (Kind::Int, Value::Bool(b)) => Value::Int(i32::from(*b)),
        (Kind::Int, Value::String(s)) => Value::Int(string_to_i32(s)?),

        (Kind::Float, Value::Int(i)) => Value::Float(*i as f32),
        (Kind::Float, Value::Double(d)) => Value::Float(*d as f32),
        (Kind::Float, Value::Bool(b)) => Value::Float(f32::from(u8::from(*b))),
        (Kind::Float, Value::String(s)) => {
            Value::Float(s.trim().parse::<f32>().map_err(|e| {
                ConfigError::ConversionFailed(format!("cannot parse {s:?} as float: {e}"))
            })?)
        }

        (Kind::Double, Value::Int(i)) => Value::Double(f64::from(*i)),
        (Kind::Double, Value::Float(f)) => Value::Double(f64::from(*f)),
        (Kind::Double, Value::Bool(b)) => Value::Double(f64::from(u8::from(*b))),
        (Kind::Double, Value::String(s)) => {
            Value::Double(s.trim().parse::<f64>().map_err(|e| {
                ConfigError::ConversionFailed(format!("cannot parse {s:?} as double: {e}"))
            })?)
        }

        (Kind::Bool, Value::Int(i)) => Value::Bool(*i != 0),
        (Kind::Bool, Value::Float(f)) => Value::Bool(*f != 0.0),
        (Kind::Bool, Value::Double(d)) => Value::Bool(*d != 0.0),
        (Kind::Bool, Value::String(s)) => Value::Bool(string_to_bool(s)),

        (Kind::String, other) => Value::String(other.to_string()),

        (Kind::List, Value::String(s)) => {
            if s.is_empty() {
                Value::List(Vec::new())
            } else {
                Value::List(s.split(',').map(|e| e.trim().to_string()).collect())
            }
        }
        (Kind::List, other) => Value::List(vec![other.to_string()]),

        (dst, src) => {
            return Err(ConfigError::ConversionFailed(format!(
                "no conversion from {} to {dst}",
                src.kind()
            )))
        }
    };
    Ok(out)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;

    #[test]
    fn bool_parsing_accepts_operator_spellings() {
        for s in ["true", "Yes", " 1", "Y", "t"] {
            assert!(string_to_bool(s), "{s}");
        }
        for s in ["false", "no", "0", "", "off"] {
            assert!(!string_to_bool(s), "{s}");
        }
    }

    #[test]
    fn int_from_fractional_string_truncates() {
        assert_eq!(string_to_i32("25.5").unwrap(), 25);
        assert!(string_to_i32("not a number").is_err());
    }

    #[test]
    fn list_round_trips_through_string() {
        let list = Value::List(vec!["a".into(), "b".into(), "c".into()]);
        let s = convert(Kind::String, &list).unwrap();
        assert_eq!(s, Value::String("a,b,c".into()));
        assert_eq!(convert(Kind::List, &s).unwrap(), list);
    }

    #[test]
    fn json_numbers_split_on_integrality() {
        assert_eq!(Value::from_json(&serde_json::json!(42)), Some(Value::Int(42)));
        assert_eq!(
            Value::from_json(&serde_json::json!(42.5)),
            Some(Value::Double(42.5))
        );
    }
}
