//! Attribute mini-language parser.
//!
//! Catalog entities describe themselves in a small fixed grammar: key/value
//! blocks, conditional feature entries, requirement expressions, rank phrases,
//! effects and slot schedules. Every parser here is pure and total over that
//! grammar; anything else is a [`ParseError`] naming the offending text.

mod effect;
mod error;
mod feature_entry;
mod key_value;
mod lookup;
mod pattern;
mod rank_phrase;
mod requirement;
mod schedule;
mod split;

pub use effect::{Effect, EffectOp, Formula, FormulaOp};
pub use error::ParseError;
pub use feature_entry::FeatureEntry;
pub use key_value::{parse_key_values, KeyValue};
pub use pattern::Pattern;
pub use rank_phrase::{RankGroup, RankItem, RankPhrase, RankStep};
pub use requirement::{
    Alternative, AttributeLookup, ChoiceDomain, CompareOp, Conjunct, Requirement,
};
pub use schedule::{FeatSlotSchedule, SpellSlotSchedule};
pub use split::{split_on, unwrap_item};
