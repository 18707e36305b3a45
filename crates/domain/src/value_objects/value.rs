//! Attribute value held by a build.
//!
//! Builds are flat name → value mappings. Values are either integers
//! (levels, counts, scores, signal values) or text (single choices such as
//! `ancestry` or `alignment`).

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single attribute value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    Int(i64),
    Text(String),
}

impl Value {
    /// Create a text value.
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    /// Integer view of the value. Text parses if it holds a number.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            Self::Text(s) => s.trim().parse().ok(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    /// Integer used in arithmetic and ordered comparisons; non-numeric text is 0.
    pub fn numeric(&self) -> i64 {
        self.as_int().unwrap_or(0)
    }

    /// Truthiness used by conditions, guards and bare-path requirements.
    pub fn is_truthy(&self) -> bool {
        match self {
            Self::Int(n) => *n != 0,
            Self::Text(s) => !s.is_empty() && s != "0",
        }
    }

    /// Add two values. Integers sum; text concatenates.
    pub fn add(&self, other: &Value) -> Value {
        match (self, other) {
            (Self::Text(a), Self::Text(b)) => Self::Text(format!("{}{}", a, b)),
            (Self::Text(a), Self::Int(b)) if a.trim().parse::<i64>().is_err() => {
                Self::Text(format!("{}{}", a, b))
            }
            (a, b) => Self::Int(a.numeric().saturating_add(b.numeric())),
        }
    }

    /// Loose equality: numbers compare numerically, otherwise by text.
    pub fn loosely_equals(&self, other: &Value) -> bool {
        match (self.as_int(), other.as_int()) {
            (Some(a), Some(b)) => a == b,
            _ => self.to_string() == other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(n) => write!(f, "{}", n),
            Self::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for Value {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truthiness() {
        assert!(Value::Int(1).is_truthy());
        assert!(!Value::Int(0).is_truthy());
        assert!(Value::text("Elf").is_truthy());
        assert!(!Value::text("").is_truthy());
        assert!(!Value::text("0").is_truthy());
    }

    #[test]
    fn addition_sums_numbers_and_concatenates_text() {
        assert_eq!(Value::Int(2).add(&Value::Int(3)), Value::Int(5));
        assert_eq!(Value::text("a").add(&Value::text("b")), Value::text("ab"));
        assert_eq!(Value::text("4").add(&Value::Int(1)), Value::Int(5));
    }

    #[test]
    fn loose_equality_crosses_representations() {
        assert!(Value::text("12").loosely_equals(&Value::Int(12)));
        assert!(Value::text("Good").loosely_equals(&Value::text("Good")));
        assert!(!Value::text("Good").loosely_equals(&Value::Int(0)));
    }

    #[test]
    fn serializes_untagged() {
        let json = serde_json::to_string(&vec![Value::Int(3), Value::text("Elf")])
            .expect("serialize");
        assert_eq!(json, r#"[3,"Elf"]"#);
    }
}
