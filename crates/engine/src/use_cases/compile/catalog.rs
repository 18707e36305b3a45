//! Per-entity metadata kept alongside the compiled rules.

use std::collections::BTreeMap;

use buildwright_domain::{Ability, EntityKind};

/// Feat slot categories, in the precedence a feat's traits are matched.
pub const FEAT_CATEGORIES: [&str; 4] = ["Ancestry", "Class", "Skill", "General"];

/// Slot category for a feat with the given traits.
///
/// Ancestry beats Class (or Archetype), which beats Skill; anything else is
/// a General feat.
pub fn feat_category(traits: &[String]) -> &'static str {
    let has = |name: &str| traits.iter().any(|t| t.eq_ignore_ascii_case(name));
    if has("Ancestry") {
        "Ancestry"
    } else if has("Class") || has("Archetype") {
        "Class"
    } else if has("Skill") {
        "Skill"
    } else {
        "General"
    }
}

/// True if a feat of `category` may fill a slot of `slot`.
///
/// General slots also accept Skill feats.
pub fn fits_slot(category: &str, slot: &str) -> bool {
    category == slot || (slot == "General" && category == "Skill")
}

/// One option of a selectable group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectableOption {
    pub name: String,
    /// Owner source level the option becomes legal at.
    pub level: u32,
}

/// Compiled view of one entity, as the generators need it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub kind: EntityKind,
    pub name: String,
    pub traits: Vec<String>,
    /// Feat slot category (feats only).
    pub slot_category: Option<String>,
    /// Skill subcategory, for `any <Sub>` domains.
    pub subcategory: Option<String>,
    /// Feat or spell level.
    pub level: Option<u32>,
    pub traditions: Vec<String>,
    /// Armor or weapon category.
    pub category: Option<String>,
    /// Key ability of a skill.
    pub ability: Option<Ability>,
    pub selectables: BTreeMap<String, Vec<SelectableOption>>,
}

impl CatalogEntry {
    pub fn new(kind: EntityKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            traits: Vec::new(),
            slot_category: None,
            subcategory: None,
            level: None,
            traditions: Vec::new(),
            category: None,
            ability: None,
            selectables: BTreeMap::new(),
        }
    }

    /// Spell allocation groups (`Arcane1`) this spell counts toward.
    pub fn spell_groups(&self) -> Vec<String> {
        let level = self.level.unwrap_or(0);
        self.traditions
            .iter()
            .map(|tradition| format!("{}{}", tradition, level))
            .collect()
    }

    /// Case-sensitive, like the `featTraits.<Trait>.<feat>` attributes.
    pub fn has_trait(&self, name: &str) -> bool {
        self.traits.iter().any(|t| t == name)
    }
}
