//! Value objects shared by the compiler, randomizer and repair engine.

mod ability;
mod alignment;
mod dice;
mod rank;
mod value;

pub use ability::Ability;
pub use alignment::{is_alignment, ALIGNMENTS};
pub use dice::{DiceFormula, DiceParseError, DiceRollResult};
pub use rank::ProficiencyRank;
pub use value::Value;
