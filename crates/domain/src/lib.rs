//! Buildwright domain types.
//!
//! Pure data for character builds: attribute values, the build mapping,
//! catalog entity definitions and violation signals. Nothing here knows
//! about parsing, rule evaluation or randomness.

pub mod entities;
pub mod error;
pub mod ids;
pub mod value_objects;

pub use entities::{Build, EntityDefinition, EntityKind, Selection, Severity, ViolationSignal};
pub use error::DomainError;
pub use ids::{AttrId, RuleId};
pub use value_objects::{
    is_alignment, Ability, DiceFormula, DiceParseError, DiceRollResult, ProficiencyRank, Value,
    ALIGNMENTS,
};
