//! Field type casting for captured values.

use std::fmt;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// The declared output type of a capture field (`%{NAME:field:TYPE}`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SemanticType {
    #[default]
    String,
    Int,
    Float,
    Boolean,
}

impl SemanticType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SemanticType::String => "string",
            SemanticType::Int => "int",
            SemanticType::Float => "float",
            SemanticType::Boolean => "boolean",
        }
    }

    /// Parse a type name as written in a pattern reference. Case-insensitive;
    /// `str`, `integer` and `bool` are accepted as aliases.
    pub fn from_str(s: &str) -> Option<SemanticType> {
        match s.to_ascii_lowercase().as_str() {
            "string" | "str" => Some(SemanticType::String),
            "int" | "integer" => Some(SemanticType::Int),
            "float" => Some(SemanticType::Float),
            "boolean" | "bool" => Some(SemanticType::Boolean),
            _ => None,
        }
    }
}

impl fmt::Display for SemanticType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed field value extracted from a matched line.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

/// Plain scalar rendering, used for table cells and CSV export. Floats keep a
/// fractional part so `3.0` does not read back as an integer.
impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::Int(n) => write!(f, "{n}"),
            FieldValue::Float(x) => write!(f, "{x:?}"),
            FieldValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Str(s) => serializer.serialize_str(s),
            FieldValue::Int(n) => serializer.serialize_i64(*n),
            FieldValue::Float(x) => serializer.serialize_f64(*x),
            FieldValue::Bool(b) => serializer.serialize_bool(*b),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot cast `{raw}` to {target}")]
pub struct CastError {
    pub raw: String,
    pub target: SemanticType,
}

/// Convert a captured string into a value of the declared type.
pub fn cast(raw: &str, target: SemanticType) -> Result<FieldValue, CastError> {
    let fail = || CastError {
        raw: raw.to_string(),
        target,
    };
    match target {
        SemanticType::String => Ok(FieldValue::Str(raw.to_string())),
        SemanticType::Int => raw.parse::<i64>().map(FieldValue::Int).map_err(|_| fail()),
        SemanticType::Float => {
            // f64's parser also takes "inf" and "NaN"; only plain decimals count.
            let looks_decimal = raw
                .bytes()
                .all(|b| b.is_ascii_digit() || matches!(b, b'+' | b'-' | b'.' | b'e' | b'E'));
            match raw.parse::<f64>() {
                Ok(x) if looks_decimal && x.is_finite() => Ok(FieldValue::Float(x)),
                _ => Err(fail()),
            }
        }
        SemanticType::Boolean => {
            if raw.eq_ignore_ascii_case("true") {
                Ok(FieldValue::Bool(true))
            } else if raw.eq_ignore_ascii_case("false") {
                Ok(FieldValue::Bool(false))
            } else {
                Err(fail())
            }
        }
    }
}
