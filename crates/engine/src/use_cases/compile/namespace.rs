//! The attribute vocabulary.
//!
//! Catalog text may only reference attributes in a known namespace. Names
//! below a namespace (feats, skills, features) are forward references and are
//! not checked.

use buildwright_domain::EntityKind;

/// Single-valued input attributes.
const INPUTS: [&str; 14] = [
    "level",
    "strength",
    "dexterity",
    "constitution",
    "intelligence",
    "wisdom",
    "charisma",
    "ancestry",
    "background",
    "class",
    "deity",
    "alignment",
    "armor",
    "shield",
];

/// Multi-choice input prefixes (`feats.Toughness`).
pub const INPUT_PREFIXES: [&str; 7] = [
    "feats",
    "selectableFeatures",
    "skillIncreases",
    "abilityBoosts",
    "languages",
    "spells",
    "weapons",
];

const DERIVED: [&str; 14] = [
    "abilityBoostCount",
    "abilityBoostsAssigned",
    "skillIncreaseCount",
    "skillIncreasesAssigned",
    "perception",
    "hitPoints",
    "armorClass",
    "armorDexCap",
    "speed",
    "spellcastingTradition",
    "languageCount",
    "languagesAssigned",
    "shieldHitPoints",
    "shieldHardness",
];

const DERIVED_PREFIXES: [&str; 22] = [
    "features",
    "featTraits",
    "featsAssigned",
    "featCounts",
    "grantedRank",
    "rank",
    "scores",
    "abilityModifiers",
    "abilityBoostsGranted",
    "abilityBoostLimit",
    "skillModifiers",
    "saves",
    "spellSlots",
    "spellsAssigned",
    "languagesGranted",
    "selectableFeatureCount",
    "selectableFeaturesAssigned",
    "weaponDamage",
    "choices",
    "validationNotes",
    "sanityNotes",
    "levels",
];

/// True if `path` names an attribute in a known namespace.
pub fn is_known_path(path: &str) -> bool {
    if INPUTS.contains(&path) || DERIVED.contains(&path) {
        return true;
    }
    let Some((head, tail)) = path.split_once('.') else {
        return false;
    };
    !tail.is_empty()
        && (INPUT_PREFIXES.contains(&head)
            || DERIVED_PREFIXES.contains(&head)
            || EntityKind::ALL
                .iter()
                .any(|kind| kind.level_prefix() == Some(head)))
}

/// True if `path` is a choice the generators may set directly.
pub fn is_input_path(path: &str) -> bool {
    if INPUTS.contains(&path) {
        return true;
    }
    path.split_once('.')
        .is_some_and(|(head, tail)| !tail.is_empty() && INPUT_PREFIXES.contains(&head))
}
