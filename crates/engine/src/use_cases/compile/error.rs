//! Compile-time errors and field diagnostics.

use std::fmt;

use buildwright_domain::EntityKind;

use crate::infrastructure::ports::EvaluationError;
use crate::parser::ParseError;

/// A catalog error that aborts one entity's compilation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("{kind} '{name}': cannot parse {field}: {source}")]
    Parse {
        kind: EntityKind,
        name: String,
        field: String,
        #[source]
        source: ParseError,
    },

    #[error("Unknown entity kind: {0}")]
    UnknownKind(String),

    #[error("{entity} references undefined attribute '{path}'")]
    UndefinedAttribute { entity: String, path: String },

    #[error("{entity} declares selectable group '{group}' with no options")]
    EmptySelectableGroup { entity: String, group: String },

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error("{entity}: invalid pattern '{pattern}'")]
    InvalidPattern { entity: String, pattern: String },

    #[error("{kind} '{name}' is not compiled")]
    NotFound { kind: EntityKind, name: String },
}

/// A field-level problem that was logged and skipped.
///
/// The rest of the entity still compiles; the field registers nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: EntityKind,
    pub name: String,
    pub field: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} '{}' field {}: {}",
            self.kind, self.name, self.field, self.message
        )
    }
}
