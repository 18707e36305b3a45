//! Entity definitions - the named game objects of the catalog.
//!
//! An entity is defined once from static content: a kind, a name, and a flat
//! attribute string in the catalog mini-language. Definitions are immutable;
//! the compiler turns them into rules.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// The known categories of catalog entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    Ancestry,
    Background,
    Class,
    Deity,
    Feat,
    Feature,
    Skill,
    Language,
    Spell,
    Armor,
    Shield,
    Weapon,
}

/// How the player brings an entity of some kind into a build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// One text-valued input names the chosen entity (e.g. `ancestry = "Elf"`).
    Single(&'static str),
    /// One integer input per entity under a prefix (e.g. `feats.Toughness = 1`).
    Multi(&'static str),
    /// Never chosen directly; granted through derived attributes (e.g. `features.Rage`).
    Granted(&'static str),
    /// Always part of every build (skills).
    Intrinsic,
}

impl Selection {
    /// Name of the input attribute that selects `name`, if the kind is player-chosen.
    pub fn input_attr(&self, name: &str) -> Option<String> {
        match self {
            Self::Single(attr) => Some((*attr).to_string()),
            Self::Multi(prefix) => Some(format!("{}.{}", prefix, name)),
            Self::Granted(_) | Self::Intrinsic => None,
        }
    }

    /// Integer attribute that is truthy while `name` is part of the build.
    pub fn presence_attr(&self, name: &str) -> Option<String> {
        match self {
            Self::Multi(prefix) | Self::Granted(prefix) => Some(format!("{}.{}", prefix, name)),
            Self::Single(_) | Self::Intrinsic => None,
        }
    }
}

impl EntityKind {
    pub const ALL: [EntityKind; 12] = [
        Self::Ancestry,
        Self::Background,
        Self::Class,
        Self::Deity,
        Self::Feat,
        Self::Feature,
        Self::Skill,
        Self::Language,
        Self::Spell,
        Self::Armor,
        Self::Shield,
        Self::Weapon,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ancestry => "Ancestry",
            Self::Background => "Background",
            Self::Class => "Class",
            Self::Deity => "Deity",
            Self::Feat => "Feat",
            Self::Feature => "Feature",
            Self::Skill => "Skill",
            Self::Language => "Language",
            Self::Spell => "Spell",
            Self::Armor => "Armor",
            Self::Shield => "Shield",
            Self::Weapon => "Weapon",
        }
    }

    /// Lower-camel key used in signal names (`validationNotes.feat.Toughness`).
    pub fn signal_key(&self) -> &'static str {
        match self {
            Self::Ancestry => "ancestry",
            Self::Background => "background",
            Self::Class => "class",
            Self::Deity => "deity",
            Self::Feat => "feat",
            Self::Feature => "feature",
            Self::Skill => "skill",
            Self::Language => "language",
            Self::Spell => "spell",
            Self::Armor => "armor",
            Self::Shield => "shield",
            Self::Weapon => "weapon",
        }
    }

    pub fn selection(&self) -> Selection {
        match self {
            Self::Ancestry => Selection::Single("ancestry"),
            Self::Background => Selection::Single("background"),
            Self::Class => Selection::Single("class"),
            Self::Deity => Selection::Single("deity"),
            Self::Armor => Selection::Single("armor"),
            Self::Shield => Selection::Single("shield"),
            Self::Feat => Selection::Multi("feats"),
            Self::Language => Selection::Multi("languages"),
            Self::Spell => Selection::Multi("spells"),
            Self::Weapon => Selection::Multi("weapons"),
            Self::Feature => Selection::Granted("features"),
            Self::Skill => Selection::Intrinsic,
        }
    }

    /// Prefix of the derived "source level" attribute for entities of this kind.
    ///
    /// The source level holds the character level while the entity is part of
    /// the build, and gates the entity's level-dependent features.
    pub fn level_prefix(&self) -> Option<&'static str> {
        match self {
            Self::Class => Some("levels"),
            Self::Ancestry => Some("ancestryLevels"),
            Self::Background => Some("backgroundLevels"),
            Self::Deity => Some("deityLevels"),
            Self::Feat => Some("featLevels"),
            Self::Feature => Some("featureLevels"),
            Self::Language => Some("languageLevels"),
            Self::Spell => Some("spellLevels"),
            Self::Armor => Some("armorLevels"),
            Self::Shield => Some("shieldLevels"),
            Self::Weapon => Some("weaponLevels"),
            Self::Skill => None,
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| DomainError::parse(format!("Unknown entity kind: {}", s)))
    }
}

/// A named game object and its declarative attribute string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityDefinition {
    pub kind: EntityKind,
    pub name: String,
    /// Attribute string in the catalog mini-language.
    #[serde(default)]
    pub attributes: String,
}

impl EntityDefinition {
    pub fn new(kind: EntityKind, name: impl Into<String>, attributes: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
            attributes: attributes.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_from_str_is_case_insensitive() {
        assert_eq!("feat".parse::<EntityKind>(), Ok(EntityKind::Feat));
        assert_eq!("Ancestry".parse::<EntityKind>(), Ok(EntityKind::Ancestry));
        assert!("Monster".parse::<EntityKind>().is_err());
    }

    #[test]
    fn selection_attrs() {
        let feat = EntityKind::Feat.selection();
        assert_eq!(feat.input_attr("Toughness").as_deref(), Some("feats.Toughness"));
        assert_eq!(feat.presence_attr("Toughness").as_deref(), Some("feats.Toughness"));

        let class = EntityKind::Class.selection();
        assert_eq!(class.input_attr("Fighter").as_deref(), Some("class"));
        assert_eq!(class.presence_attr("Fighter"), None);

        let feature = EntityKind::Feature.selection();
        assert_eq!(feature.input_attr("Rage"), None);
        assert_eq!(feature.presence_attr("Rage").as_deref(), Some("features.Rage"));
    }

    #[test]
    fn definition_deserializes_from_catalog_json() {
        let json = r#"{"kind":"Feat","name":"Toughness","attributes":"Traits=General"}"#;
        let def: EntityDefinition = serde_json::from_str(json).expect("deserialize");
        assert_eq!(def, EntityDefinition::new(EntityKind::Feat, "Toughness", "Traits=General"));
    }
}
