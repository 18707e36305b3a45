//! Error type for the domain layer.
//!
//! Value objects parse from catalog text and settings; every such failure
//! surfaces as a [`DomainError`] so callers never match on strings.

use thiserror::Error;

use crate::value_objects::DiceParseError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A name or keyword that is not part of the vocabulary
    #[error("Parse error: {0}")]
    Parse(String),

    #[error(transparent)]
    Dice(#[from] DiceParseError),
}

impl DomainError {
    /// Creates a parse error for string-to-type conversion failures.
    ///
    /// # Example
    /// ```ignore
    /// impl FromStr for EntityKind {
    ///     type Err = DomainError;
    ///     fn from_str(s: &str) -> Result<Self, Self::Err> {
    ///         match s {
    ///             "Feat" => Ok(Self::Feat),
    ///             _ => Err(DomainError::parse(format!("Unknown entity kind: {}", s))),
    ///         }
    ///     }
    /// }
    /// ```
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_message() {
        let err = DomainError::parse("Unknown ability: Luck");
        assert_eq!(err.to_string(), "Parse error: Unknown ability: Luck");
    }

    #[test]
    fn dice_errors_pass_through() {
        let err: DomainError = DiceParseError::Empty.into();
        assert!(matches!(err, DomainError::Dice(DiceParseError::Empty)));
        assert_eq!(err.to_string(), "Empty dice formula");
    }
}
