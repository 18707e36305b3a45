//! Parse errors for the catalog mini-language.

use thiserror::Error;

/// A fragment of catalog text that does not match the mini-language.
///
/// Every variant carries the offending text so diagnostics can quote it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Unbalanced quote or parenthesis in '{0}'")]
    UnbalancedDelimiter(String),

    #[error("Expected Key=Value, found '{0}'")]
    MissingEquals(String),

    #[error("Invalid level '{0}'")]
    InvalidLevel(String),

    #[error("Invalid count '{0}'")]
    InvalidCount(String),

    #[error("Unknown rank '{0}'")]
    UnknownRank(String),

    #[error("Unknown rank group '{0}'")]
    UnknownGroup(String),

    #[error("Empty {0}")]
    Empty(&'static str),

    #[error("Malformed {what}: '{text}'")]
    Malformed { what: &'static str, text: String },
}

impl ParseError {
    pub(crate) fn malformed(what: &'static str, text: impl Into<String>) -> Self {
        Self::Malformed {
            what,
            text: text.into(),
        }
    }
}
