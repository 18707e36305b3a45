//! Violation signals - derived attributes that are non-zero while a rule is broken.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a violated signal is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Hard error; the build breaks a prerequisite.
    Validation,
    /// Warning; the build is legal but probably unintended.
    Sanity,
}

impl Severity {
    /// Attribute prefix under which signals of this severity live.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Validation => "validationNotes",
            Self::Sanity => "sanityNotes",
        }
    }

    /// Full attribute name for a signal key (`validationNotes.<key>`).
    pub fn signal_name(&self, key: &str) -> String {
        format!("{}.{}", self.prefix(), key)
    }

    /// Severity of an attribute name, if it names a signal.
    pub fn of(name: &str) -> Option<Self> {
        let (prefix, rest) = name.split_once('.')?;
        if rest.is_empty() {
            return None;
        }
        match prefix {
            "validationNotes" => Some(Self::Validation),
            "sanityNotes" => Some(Self::Sanity),
            _ => None,
        }
    }
}

/// A non-zero signal observed on an evaluated build.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViolationSignal {
    pub name: String,
    pub severity: Severity,
    pub value: i64,
}

impl fmt::Display for ViolationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}
