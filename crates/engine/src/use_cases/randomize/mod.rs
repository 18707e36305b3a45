//! Allocation randomizer.
//!
//! Completes an under-specified build one category at a time:
//! - evaluates the build to read the outstanding allocation counts,
//! - draws candidates without replacement from the legal pool,
//! - commits each draw provisionally and keeps it only if no signal got worse.
//!
//! The randomizer only ever edits inputs. A category it cannot fill is left
//! short and shows up as a negative allocation signal.

mod abilities;
mod choices;
mod picks;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use buildwright_domain::{Build, DomainError, EntityKind, Value};

use crate::infrastructure::ports::RandomPort;
use crate::infrastructure::settings::EngineSettings;
use crate::use_cases::compile::{AllocationKind, RuleCompiler, SignalKind};
use crate::use_cases::journal::{Journal, Mutation};

/// A category the randomizer can fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RandomCategory {
    Abilities,
    Ancestry,
    Background,
    Class,
    Deity,
    Alignment,
    Feats,
    Skills,
    Languages,
    Spells,
    Equipment,
    SelectableFeatures,
}

impl RandomCategory {
    /// Order used when generating a whole character.
    pub const GENERATION_ORDER: [RandomCategory; 12] = [
        Self::Ancestry,
        Self::Background,
        Self::Class,
        Self::Abilities,
        Self::Skills,
        Self::Alignment,
        Self::Deity,
        Self::SelectableFeatures,
        Self::Feats,
        Self::Languages,
        Self::Spells,
        Self::Equipment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abilities => "abilities",
            Self::Ancestry => "ancestry",
            Self::Background => "background",
            Self::Class => "class",
            Self::Deity => "deity",
            Self::Alignment => "alignment",
            Self::Feats => "feats",
            Self::Skills => "skills",
            Self::Languages => "languages",
            Self::Spells => "spells",
            Self::Equipment => "equipment",
            Self::SelectableFeatures => "selectableFeatures",
        }
    }
}

impl fmt::Display for RandomCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RandomCategory {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace(['_', '-', ' '], "");
        Self::GENERATION_ORDER
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(&wanted))
            .ok_or_else(|| {
                DomainError::parse(format!("Unknown randomizer category: {}", s))
            })
    }
}

/// What one randomizer call did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RandomizeOutcome {
    pub mutations: Vec<Mutation>,
    /// Allocation signals still short afterwards, with the number of missing picks.
    pub shortfall: BTreeMap<String, i64>,
}

pub struct Randomizer<'a> {
    compiler: &'a RuleCompiler,
    random: &'a dyn RandomPort,
}

impl<'a> Randomizer<'a> {
    pub fn new(compiler: &'a RuleCompiler, random: &'a dyn RandomPort) -> Self {
        Self { compiler, random }
    }

    fn settings(&self) -> &EngineSettings {
        self.compiler.settings()
    }

    /// Fill one category of `build`.
    pub fn randomize(&self, build: &mut Build, category: RandomCategory) -> RandomizeOutcome {
        let mut journal = Journal::new();
        self.ensure_level(build, &mut journal);
        self.compiler.evaluate(build);
        self.fill_category(build, &mut journal, category);
        self.outcome(build, journal)
    }

    /// Generate every category in [`RandomCategory::GENERATION_ORDER`].
    pub fn randomize_all(&self, build: &mut Build) -> RandomizeOutcome {
        let mut journal = Journal::new();
        self.ensure_level(build, &mut journal);
        self.compiler.evaluate(build);
        for category in RandomCategory::GENERATION_ORDER {
            self.fill_category(build, &mut journal, category);
        }
        self.outcome(build, journal)
    }

    /// Fill one allocation; used by repair for shortages.
    pub(crate) fn fill_allocation(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        kind: &AllocationKind,
    ) {
        match kind {
            AllocationKind::Feats(category) => self.fill_feat_slots(build, journal, category),
            AllocationKind::SkillIncreases => self.fill_skill_choices(build, journal),
            AllocationKind::AbilityBoosts => self.fill_ability_boosts(build, journal),
            AllocationKind::Languages => self.fill_languages(build, journal),
            AllocationKind::Spells(group) => self.fill_spell_group(build, journal, group),
            AllocationKind::Selectable {
                kind,
                entity,
                group,
            } => self.fill_selectable_group(build, journal, *kind, entity, group),
        }
    }

    fn fill_category(&self, build: &mut Build, journal: &mut Journal, category: RandomCategory) {
        tracing::debug!(%category, "Randomizing category");
        match category {
            RandomCategory::Abilities => self.fill_abilities(build, journal),
            RandomCategory::Ancestry => self.fill_single(build, journal, EntityKind::Ancestry),
            RandomCategory::Background => self.fill_single(build, journal, EntityKind::Background),
            RandomCategory::Class => self.fill_single(build, journal, EntityKind::Class),
            RandomCategory::Deity => self.fill_single(build, journal, EntityKind::Deity),
            RandomCategory::Alignment => self.fill_alignment(build, journal),
            RandomCategory::Feats => self.fill_feats(build, journal),
            RandomCategory::Skills => self.fill_skill_choices(build, journal),
            RandomCategory::Languages => self.fill_languages(build, journal),
            RandomCategory::Spells => self.fill_spells(build, journal),
            RandomCategory::Equipment => self.fill_equipment(build, journal),
            RandomCategory::SelectableFeatures => self.fill_selectables(build, journal),
        }
    }

    fn ensure_level(&self, build: &mut Build, journal: &mut Journal) {
        if !build.has_input("level") {
            let level = self.settings().default_level;
            journal.set(build, "level", Some(Value::Int(level)));
        }
    }

    fn outcome(&self, build: &Build, journal: Journal) -> RandomizeOutcome {
        RandomizeOutcome {
            mutations: journal.into_mutations(),
            shortfall: self.shortfall(build),
        }
    }

    fn shortfall(&self, build: &Build) -> BTreeMap<String, i64> {
        build
            .violations()
            .into_iter()
            .filter(|signal| {
                signal.value < 0
                    && matches!(
                        self.compiler.signal(&signal.name).map(|s| &s.kind),
                        Some(SignalKind::Allocation(_))
                    )
            })
            .map(|signal| (signal.name, -signal.value))
            .collect()
    }

    // =========================================================================
    // Provisional commits
    // =========================================================================

    /// Apply `changes`, re-evaluate, and keep them only if no signal got worse.
    ///
    /// Allocation signals may shrink toward zero from below; any other signal
    /// that grows in magnitude blocks the commit.
    fn try_commit(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        changes: &[(String, Option<Value>)],
    ) -> bool {
        let before = signal_values(build);
        let mark = journal.mark();
        for (attr, value) in changes {
            journal.set(build, attr, value.clone());
        }
        self.compiler.evaluate(build);

        let blocking = build.violations().into_iter().find(|signal| {
            let prior = before.get(&signal.name).copied().unwrap_or(0);
            match self.compiler.signal(&signal.name).map(|s| &s.kind) {
                Some(SignalKind::Allocation(_)) => signal.value > 0 && signal.value > prior,
                _ => signal.value.abs() > prior.abs(),
            }
        });

        match blocking {
            None => true,
            Some(signal) => {
                tracing::debug!(
                    change = ?changes.first().map(|(attr, _)| attr),
                    signal = %signal,
                    "Rejected draw"
                );
                journal.rollback_to(build, mark);
                self.compiler.evaluate(build);
                false
            }
        }
    }

    /// Commit a single `attr = 1` pick.
    fn try_pick(&self, build: &mut Build, journal: &mut Journal, attr: String) -> bool {
        self.try_commit(build, journal, &[(attr, Some(Value::Int(1)))])
    }

    /// Missing picks for an allocation (0 when met or over).
    fn outstanding(&self, build: &Build, kind: &AllocationKind) -> i64 {
        (-build.int(&kind.signal_name())).max(0)
    }
}

fn signal_values(build: &Build) -> BTreeMap<String, i64> {
    build
        .violations()
        .into_iter()
        .map(|signal| (signal.name, signal.value))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::random::SeededRandom;
    use crate::test_fixtures::sample_compiler;
    use buildwright_domain::Ability;

    #[test]
    fn categories_parse_loosely() {
        assert_eq!(
            "selectable_features".parse::<RandomCategory>().expect("parses"),
            RandomCategory::SelectableFeatures
        );
        assert_eq!(
            "Feats".parse::<RandomCategory>().expect("parses"),
            RandomCategory::Feats
        );
        assert!("weather".parse::<RandomCategory>().is_err());
    }

    #[test]
    fn abilities_fill_unset_scores_without_ability_signals() {
        let compiler = sample_compiler();
        let random = SeededRandom::new(11);
        let randomizer = Randomizer::new(&compiler, &random);
        let mut build = Build::new()
            .with_input("level", 5)
            .with_input("feats.Toughness", 1);

        randomizer.randomize(&mut build, RandomCategory::Abilities);

        let (lo, hi) = compiler.settings().ability_generation.score_range();
        for ability in Ability::ALL {
            let score = build.input(ability.attr_name()).and_then(Value::as_int);
            assert!(
                score.is_some_and(|s| (lo..=hi).contains(&s)),
                "{} = {:?}",
                ability, score
            );
        }
        for signal in build.violations() {
            let spec = compiler.signal(&signal.name);
            assert!(
                !spec.is_some_and(|s| s.concerns_abilities()),
                "ability signal left: {}",
                signal
            );
        }
        assert_eq!(build.int("validationNotes.abilityBoostAllocation"), 0);
    }

    #[test]
    fn skill_feats_fill_open_slots_with_legal_picks() {
        let compiler = sample_compiler();
        let random = SeededRandom::new(5);
        let randomizer = Randomizer::new(&compiler, &random);
        let mut build = Build::new()
            .with_input("level", 4)
            .with_input("class", "Scholar")
            .with_input("intelligence", 14)
            .with_input("skillIncreases.Arcana", 1)
            .with_input("skillIncreases.Athletics", 1)
            .with_input("feats.Assurance", 1)
            .with_input("feats.Quick Jump", 1);
        compiler.evaluate(&mut build);
        assert_eq!(build.int("featCounts.Skill"), 3);

        randomizer.randomize(&mut build, RandomCategory::Feats);

        let skill_feats: Vec<&str> = build
            .inputs_with_prefix("feats")
            .filter(|(_, v)| v.is_truthy())
            .map(|(name, _)| name)
            .filter(|name| {
                compiler
                    .entry(EntityKind::Feat, name)
                    .is_some_and(|e| e.slot_category.as_deref() == Some("Skill"))
            })
            .collect();
        assert_eq!(skill_feats.len(), 3);
        for name in skill_feats {
            let signal = format!("validationNotes.feat.{}", name);
            assert_eq!(build.int(&signal), 0, "{}", name);
        }
        assert_eq!(build.int("validationNotes.featAllocation.Skill"), 0);
    }

    #[test]
    fn randomize_all_produces_a_complete_character() {
        let compiler = sample_compiler();
        let random = SeededRandom::new(42);
        let randomizer = Randomizer::new(&compiler, &random);
        let mut build = Build::new();

        let outcome = randomizer.randomize_all(&mut build);

        assert_eq!(build.input("level"), Some(&Value::Int(1)));
        for attr in ["ancestry", "background", "class", "alignment"] {
            assert!(build.has_input(attr), "{} unset", attr);
        }
        assert!(!outcome.mutations.is_empty());
        let validation: Vec<_> = build
            .violations()
            .into_iter()
            .filter(|s| s.severity == buildwright_domain::Severity::Validation)
            .collect();
        assert!(validation.is_empty(), "{:?}", validation);
    }

    #[test]
    fn fixed_single_choices_are_kept() {
        let compiler = sample_compiler();
        let random = SeededRandom::new(3);
        let randomizer = Randomizer::new(&compiler, &random);
        let mut build = Build::new()
            .with_input("level", 1)
            .with_input("class", "Fighter");

        let outcome = randomizer.randomize(&mut build, RandomCategory::Class);
        assert!(outcome.mutations.is_empty());
        assert_eq!(build.input("class"), Some(&Value::text("Fighter")));
    }
}
