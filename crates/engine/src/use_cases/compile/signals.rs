//! What the compiler registered besides plain rules.
//!
//! Every violation signal keeps the structure it was compiled from, so the
//! repair engine can pattern-match on it instead of re-reading catalog text.

use buildwright_domain::{Ability, EntityKind, Severity};

use crate::infrastructure::ports::RuleOwner;
use crate::parser::{ChoiceDomain, Requirement};

/// A counted category of picks.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum AllocationKind {
    /// Feat slots of one category (`Ancestry`, `Class`, `Skill`, `General`).
    Feats(String),
    SkillIncreases,
    AbilityBoosts,
    Languages,
    /// Spells of one tradition and level, e.g. `Arcane1`.
    Spells(String),
    /// Options picked from one entity's selectable group.
    Selectable {
        kind: EntityKind,
        entity: String,
        group: String,
    },
}

impl AllocationKind {
    /// Suffix shared by the assigned, count and signal attributes.
    pub fn key(&self) -> String {
        match self {
            Self::Feats(category) => category.clone(),
            Self::Spells(group) => group.clone(),
            Self::Selectable { entity, group, .. } => format!("{} ({})", entity, group),
            Self::SkillIncreases | Self::AbilityBoosts | Self::Languages => String::new(),
        }
    }

    pub fn signal_name(&self) -> String {
        match self {
            Self::Feats(c) => format!("validationNotes.featAllocation.{}", c),
            Self::SkillIncreases => "validationNotes.skillIncreaseAllocation".to_string(),
            Self::AbilityBoosts => "validationNotes.abilityBoostAllocation".to_string(),
            Self::Languages => "validationNotes.languageAllocation".to_string(),
            Self::Spells(g) => format!("validationNotes.spellAllocation.{}", g),
            Self::Selectable { .. } => {
                format!("validationNotes.selectableAllocation.{}", self.key())
            }
        }
    }

    /// Attribute counting picks already made.
    pub fn assigned_attr(&self) -> String {
        match self {
            Self::Feats(c) => format!("featsAssigned.{}", c),
            Self::SkillIncreases => "skillIncreasesAssigned".to_string(),
            Self::AbilityBoosts => "abilityBoostsAssigned".to_string(),
            Self::Languages => "languagesAssigned".to_string(),
            Self::Spells(g) => format!("spellsAssigned.{}", g),
            Self::Selectable { .. } => format!("selectableFeaturesAssigned.{}", self.key()),
        }
    }

    /// Attribute counting picks owed.
    pub fn count_attr(&self) -> String {
        match self {
            Self::Feats(c) => format!("featCounts.{}", c),
            Self::SkillIncreases => "skillIncreaseCount".to_string(),
            Self::AbilityBoosts => "abilityBoostCount".to_string(),
            Self::Languages => "languageCount".to_string(),
            Self::Spells(g) => format!("spellSlots.{}", g),
            Self::Selectable { .. } => format!("selectableFeatureCount.{}", self.key()),
        }
    }

    /// Input prefix the picks are stored under.
    pub fn member_prefix(&self) -> &'static str {
        match self {
            Self::Feats(_) => "feats",
            Self::SkillIncreases => "skillIncreases",
            Self::AbilityBoosts => "abilityBoosts",
            Self::Languages => "languages",
            Self::Spells(_) => "spells",
            Self::Selectable { .. } => "selectableFeatures",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalKind {
    /// Unmet requirements; each contributes its alternative count.
    Requirement {
        requirements: Vec<Requirement>,
        /// Input whose removal drops the requiring entity, if it was chosen.
        subject: Option<String>,
    },
    /// Assigned minus owed; positive is over-allocation.
    Allocation(AllocationKind),
    /// Base score outside the generation method's range.
    AbilityRange(Ability),
    /// Final score above the boost ceiling.
    AbilityCeiling(Ability),
    /// More boosts on one ability than boost grants that may name it.
    BoostLimit(Ability),
    /// All six modifiers are set and none is positive.
    ModifiersNonPositive,
    /// Skill rank above what the character level allows.
    SkillCeiling(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignalSpec {
    pub name: String,
    pub severity: Severity,
    pub owner: RuleOwner,
    pub kind: SignalKind,
}

impl SignalSpec {
    /// True for signals about ability scores or unspent boosts, which the
    /// ability generator rerolls against.
    pub fn concerns_abilities(&self) -> bool {
        match &self.kind {
            SignalKind::AbilityRange(_)
            | SignalKind::AbilityCeiling(_)
            | SignalKind::BoostLimit(_)
            | SignalKind::ModifiersNonPositive => true,
            SignalKind::Requirement { requirements, .. } => requirements
                .iter()
                .flat_map(|r| r.paths())
                .any(is_ability_path),
            SignalKind::Allocation(kind) => matches!(kind, AllocationKind::AbilityBoosts),
            SignalKind::SkillCeiling(_) => false,
        }
    }
}

fn is_ability_path(path: &str) -> bool {
    path.starts_with("scores.")
        || path.starts_with("abilityModifiers.")
        || Ability::ALL.iter().any(|a| a.attr_name() == path)
}

/// What a choice instruction hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceGroup {
    /// Each pick is one skill increase.
    Skill,
    /// Each pick is one ability boost.
    Ability,
}

/// A `Choose n from ...` embedded in a rank phrase.
///
/// The instruction is active while its gate attribute is set in the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChoiceInstruction {
    pub owner: RuleOwner,
    pub gate: String,
    pub group: ChoiceGroup,
    pub count: u32,
    pub domain: ChoiceDomain,
    /// Rank the phrase grants; picks past it are avoided.
    pub ceiling: Option<i64>,
}

impl ChoiceInstruction {
    /// Abilities a boost instruction may name.
    pub fn abilities(&self) -> Vec<Ability> {
        match &self.domain {
            ChoiceDomain::List(names) => names.iter().filter_map(|n| n.parse().ok()).collect(),
            ChoiceDomain::Any | ChoiceDomain::AnyOf(_) => Ability::ALL.to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocation_names_share_a_key() {
        let kind = AllocationKind::Selectable {
            kind: EntityKind::Class,
            entity: "Barbarian".to_string(),
            group: "Instinct".to_string(),
        };
        assert_eq!(
            kind.signal_name(),
            "validationNotes.selectableAllocation.Barbarian (Instinct)"
        );
        assert_eq!(
            kind.count_attr(),
            "selectableFeatureCount.Barbarian (Instinct)"
        );
        assert_eq!(
            AllocationKind::Feats("Class".into()).assigned_attr(),
            "featsAssigned.Class"
        );
        assert_eq!(AllocationKind::Languages.member_prefix(), "languages");
    }

    #[test]
    fn ability_requirements_are_recognised() {
        let spec = SignalSpec {
            name: "validationNotes.feat.Powerful Leap".into(),
            severity: Severity::Validation,
            owner: RuleOwner::Core,
            kind: SignalKind::Requirement {
                requirements: vec![Requirement::parse("scores.strength >= 14").expect("parses")],
                subject: Some("feats.Powerful Leap".into()),
            },
        };
        assert!(spec.concerns_abilities());
    }

    #[test]
    fn listed_boost_choices_name_only_abilities() {
        let instruction = ChoiceInstruction {
            owner: RuleOwner::Core,
            gate: "choices.ancestry.Dwarf.0".into(),
            group: ChoiceGroup::Ability,
            count: 1,
            domain: ChoiceDomain::List(vec!["Strength".into(), "Luck".into(), "wisdom".into()]),
            ceiling: None,
        };
        assert_eq!(
            instruction.abilities(),
            vec![Ability::Strength, Ability::Wisdom]
        );
    }
}
