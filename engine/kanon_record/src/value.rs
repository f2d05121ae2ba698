use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The kind of a primitive attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum ValueKind {
    Int,
    Decimal,
    Text,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueKind::Int => write!(f, "integer"),
            ValueKind::Decimal => write!(f, "decimal"),
            ValueKind::Text => write!(f, "text"),
        }
    }
}

/// A single attribute value.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    Int(i64),
    Decimal(f64),
    Text(String),
}

impl Value {
    /// Infers a value from a raw text field.
    ///
    /// The field is trimmed first. A number is only inferred when its display
    /// form reproduces the trimmed text, so `"02139"` and `"1.50"` stay text
    /// and never group with `2139` or `1.5`. Integers win over decimals, and
    /// only finite decimals are accepted; anything else is kept as text.
    ///
    /// ```
    /// use kanon_record::Value;
    /// assert_eq!(Value::parse_field(" 39"), Value::Int(39));
    /// assert_eq!(Value::parse_field("2.5"), Value::Decimal(2.5));
    /// assert_eq!(Value::parse_field(" State-gov"), Value::Text("State-gov".into()));
    /// ```
    pub fn parse_field(raw: &str) -> Value {
        let trimmed = raw.trim();
        if let Ok(i) = trimmed.parse::<i64>() {
            if i.to_string() == trimmed {
                return Value::Int(i);
            }
        }
        match trimmed.parse::<f64>() {
            Ok(d) if d.is_finite() && d.to_string() == trimmed => Value::Decimal(d),
            _ => Value::Text(trimmed.to_string()),
        }
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Int(_) => ValueKind::Int,
            Value::Decimal(_) => ValueKind::Decimal,
            Value::Text(_) => ValueKind::Text,
        }
    }

    /// Text used for equality when grouping and counting: the display form
    /// with surrounding whitespace removed.
    pub fn grouping_text(&self) -> String {
        match self {
            Value::Text(s) => s.trim().to_string(),
            other => other.to_string(),
        }
    }

    /// Numeric view of the value. Text is parsed after trimming.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Decimal(d) if d.is_finite() => Some(*d),
            Value::Decimal(_) => None,
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|d| d.is_finite()),
        }
    }

    /// True for integers, finite decimals and text that reads as a number.
    /// Values of one numeric column may mix all three.
    pub fn is_numeric(&self) -> bool {
        self.as_number().is_some()
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(i) => write!(f, "{i}"),
            Value::Decimal(d) => write!(f, "{d}"),
            Value::Text(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Decimal(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}
