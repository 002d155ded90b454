//! Attribute values and the canonical text codec used by the change log.
//!
//! Every value written to an entity is recorded in the log as text. Encoding
//! is total; decoding is best-effort. [`decode`] classifies text by trial
//! (number, then boolean, then raw text), which misreads string attributes
//! that merely look numeric. When the attribute's kind is known from the
//! [`AttributeDictionary`](crate::attributes::AttributeDictionary),
//! [`decode_as`] is used instead.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Canonical text format for date values.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Kinds
// ---------------------------------------------------------------------------

/// Scalar kinds an attribute can declare in the dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Text,
    Number,
    Boolean,
    Date,
}

// ---------------------------------------------------------------------------
// AttributeValue
// ---------------------------------------------------------------------------

/// A single non-null attribute value.
///
/// `Raw` is text whose kind is unknown (typically decoded from the log for an
/// attribute the dictionary does not describe). Null is `Option::None` at
/// every use site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "serde_json::Value", into = "serde_json::Value")]
pub enum AttributeValue {
    Text(String),
    Number(serde_json::Number),
    Boolean(bool),
    Date(NaiveDate),
    Raw(String),
}

/// Attribute name -> new value (`None` clears the attribute).
pub type AttributeMap = std::collections::BTreeMap<String, Option<AttributeValue>>;

impl AttributeValue {
    /// Build a numeric value from an integer.
    pub fn integer(n: i64) -> Self {
        Self::Number(serde_json::Number::from(n))
    }

    /// Build a numeric value from a float. Non-finite floats become raw text.
    pub fn float(n: f64) -> Self {
        match serde_json::Number::from_f64(n) {
            Some(num) => Self::Number(num),
            None => Self::Raw(n.to_string()),
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// The declared kind this value carries, if any.
    pub fn kind(&self) -> Option<ValueKind> {
        match self {
            Self::Text(_) => Some(ValueKind::Text),
            Self::Number(_) => Some(ValueKind::Number),
            Self::Boolean(_) => Some(ValueKind::Boolean),
            Self::Date(_) => Some(ValueKind::Date),
            Self::Raw(_) => None,
        }
    }

    /// JSON representation used when writing to the entity store.
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Text(s) | Self::Raw(s) => serde_json::Value::String(s.clone()),
            Self::Number(n) => serde_json::Value::Number(n.clone()),
            Self::Boolean(b) => serde_json::Value::Bool(*b),
            Self::Date(d) => serde_json::Value::String(d.format(DATE_FORMAT).to_string()),
        }
    }

    /// Interpret a JSON value read from the entity store.
    ///
    /// `kind` comes from the attribute dictionary; strings are only promoted
    /// to dates or numbers when the kind asks for it.
    pub fn from_json(value: &serde_json::Value, kind: Option<ValueKind>) -> Option<Self> {
        match value {
            serde_json::Value::Null => None,
            serde_json::Value::Bool(b) => Some(Self::Boolean(*b)),
            serde_json::Value::Number(n) => Some(Self::Number(n.clone())),
            serde_json::Value::String(s) => match kind {
                Some(kind) => decode_as(Some(s), kind),
                None => Some(Self::Text(s.clone())),
            },
            other => Some(Self::Raw(other.to_string())),
        }
    }
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Raw(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
        }
    }
}

impl TryFrom<serde_json::Value> for AttributeValue {
    type Error = String;

    fn try_from(value: serde_json::Value) -> Result<Self, Self::Error> {
        match value {
            serde_json::Value::String(s) => Ok(Self::Text(s)),
            serde_json::Value::Number(n) => Ok(Self::Number(n)),
            serde_json::Value::Bool(b) => Ok(Self::Boolean(b)),
            serde_json::Value::Null => Err("null is not an attribute value".to_string()),
            serde_json::Value::Array(_) | serde_json::Value::Object(_) => {
                Err("attribute values must be scalars (string, number, boolean)".to_string())
            }
        }
    }
}

impl From<AttributeValue> for serde_json::Value {
    fn from(value: AttributeValue) -> Self {
        value.to_json()
    }
}

// ---------------------------------------------------------------------------
// Codec
// ---------------------------------------------------------------------------

/// Encode a value to its canonical log text. Null stays null.
pub fn encode(value: Option<&AttributeValue>) -> Option<String> {
    value.map(ToString::to_string)
}

/// Heuristic decode of log text: number, then boolean, then the text itself.
pub fn decode(text: Option<&str>) -> Option<AttributeValue> {
    let text = text?;
    if let Some(n) = parse_number(text) {
        return Some(AttributeValue::Number(n));
    }
    if let Some(b) = parse_bool(text) {
        return Some(AttributeValue::Boolean(b));
    }
    Some(AttributeValue::Raw(text.to_string()))
}

/// Decode log text as a known kind, falling back to raw text on mismatch.
pub fn decode_as(text: Option<&str>, kind: ValueKind) -> Option<AttributeValue> {
    let text = text?;
    let decoded = match kind {
        ValueKind::Text => Some(AttributeValue::Text(text.to_string())),
        ValueKind::Number => parse_number(text).map(AttributeValue::Number),
        ValueKind::Boolean => parse_bool(text).map(AttributeValue::Boolean),
        ValueKind::Date => NaiveDate::parse_from_str(text.trim(), DATE_FORMAT)
            .ok()
            .map(AttributeValue::Date),
    };
    Some(decoded.unwrap_or_else(|| AttributeValue::Raw(text.to_string())))
}

/// Parse text that is entirely a finite number. Blank text is not a number.
fn parse_number(text: &str) -> Option<serde_json::Number> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return Some(serde_json::Number::from(i));
    }
    trimmed
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .and_then(serde_json::Number::from_f64)
}

fn parse_bool(text: &str) -> Option<bool> {
    if text.eq_ignore_ascii_case("true") {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") {
        Some(false)
    } else {
        None
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
