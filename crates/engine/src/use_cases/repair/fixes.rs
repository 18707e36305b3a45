//! One fix per violated signal.

use buildwright_domain::{Ability, Build, EntityKind, Selection, Value, ALIGNMENTS};

use super::{RepairEngine, Touched};
use crate::infrastructure::random::{pick, shuffle};
use crate::parser::{ChoiceDomain, CompareOp, Conjunct, Pattern, Requirement};
use crate::use_cases::compile::{
    domain_item_path, fits_slot, is_input_path, AllocationKind, SignalKind, SignalSpec,
};
use crate::use_cases::journal::Journal;
use crate::use_cases::randomize::Randomizer;

/// Floor a rescued ability base is raised to.
const RESCUE_SCORE: i64 = 12;

impl RepairEngine<'_> {
    pub(super) fn fix(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        spec: &SignalSpec,
        touched: &mut Touched,
    ) {
        let value = build.int(&spec.name);
        tracing::debug!(signal = %spec.name, value, "Repairing signal");
        match &spec.kind {
            SignalKind::Requirement {
                requirements,
                subject,
            } => self.fix_requirements(build, journal, requirements, subject.as_deref(), touched),
            SignalKind::Allocation(kind) if value > 0 => {
                self.trim_allocation(build, journal, kind, value, touched)
            }
            SignalKind::Allocation(kind) => {
                Randomizer::new(self.compiler, self.random).fill_allocation(build, journal, kind);
            }
            SignalKind::AbilityRange(ability) => self.clamp_base(build, journal, *ability, touched),
            SignalKind::AbilityCeiling(ability) => {
                self.lower_score(build, journal, *ability, value, touched)
            }
            SignalKind::BoostLimit(ability) => {
                let attr = format!("abilityBoosts.{}", ability.attr_name());
                if !touched.contains(&attr) {
                    self.write(build, journal, touched, &attr, |b| {
                        let next = b.input_int(&attr) - value;
                        (next > 0).then_some(Value::Int(next))
                    });
                }
            }
            SignalKind::ModifiersNonPositive => self.rescue_modifiers(build, journal, touched),
            SignalKind::SkillCeiling(skill) => {
                let attr = format!("skillIncreases.{}", skill);
                if build.input_int(&attr) > 0 {
                    self.write(build, journal, touched, &attr, |b| step_down(b, &attr));
                }
            }
        }
    }

    /// Record a write and mark the input touched for the rest of the pass.
    fn write<F>(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        touched: &mut Touched,
        attr: &str,
        value: F,
    ) where
        F: FnOnce(&Build) -> Option<Value>,
    {
        let next = value(build);
        journal.set(build, attr, next);
        touched.insert(attr.to_string());
    }

    // =========================================================================
    // Requirements
    // =========================================================================

    fn fix_requirements(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        requirements: &[Requirement],
        subject: Option<&str>,
        touched: &mut Touched,
    ) {
        for requirement in requirements {
            if requirement.is_satisfied(&*build) {
                continue;
            }
            let fixed = self.fix_requirement(build, journal, requirement, touched);
            self.compiler.evaluate(build);
            if fixed && requirement.is_satisfied(&*build) {
                continue;
            }
            // No direct fix: drop whatever brought the requirement in.
            if let Some(subject) = subject.filter(|s| build.has_input(s) && !touched.contains(*s)) {
                tracing::debug!(
                    requirement = %requirement,
                    subject,
                    "Dropping unsatisfiable choice"
                );
                self.write(build, journal, touched, subject, |_| None);
            }
            return;
        }
    }

    /// Try one failing conjunct of one failing alternative, both picked at random.
    fn fix_requirement(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        requirement: &Requirement,
        touched: &mut Touched,
    ) -> bool {
        let mut alternatives: Vec<_> = requirement.alternatives.iter().collect();
        shuffle(self.random, &mut alternatives);
        for alternative in alternatives {
            let failing = alternative.failing(&*build);
            if let Some(conjunct) = pick(self.random, &failing) {
                if self.fix_conjunct(build, journal, conjunct, touched) {
                    return true;
                }
            }
        }
        false
    }

    fn fix_conjunct(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        conjunct: &Conjunct,
        touched: &mut Touched,
    ) -> bool {
        match conjunct {
            Conjunct::Compare { path, op, literal } => {
                if let Some(ability) = ability_score_path(path) {
                    return *op == CompareOp::Ge
                        && self.raise_score(build, journal, ability, literal.numeric(), touched);
                }
                if !self.may_set(path, touched) {
                    return false;
                }
                let next = match op {
                    CompareOp::Ne => None,
                    CompareOp::Ge | CompareOp::Le | CompareOp::Eq => Some(literal.clone()),
                };
                self.write(build, journal, touched, path, |_| next);
                true
            }
            Conjunct::Matches {
                path,
                pattern,
                negated,
            } => {
                if !self.may_set(path, touched) {
                    return false;
                }
                let options = self.matching_values(path, pattern, *negated);
                match pick(self.random, &options) {
                    Some(choice) => {
                        let choice = choice.clone();
                        self.write(build, journal, touched, path, |_| Some(Value::text(choice)));
                        true
                    }
                    None => false,
                }
            }
            Conjunct::Truthy { path, negated } => {
                if !self.may_set(path, touched) {
                    return false;
                }
                let next = (!*negated).then_some(Value::Int(1));
                self.write(build, journal, touched, path, |_| next);
                true
            }
            Conjunct::Choose { domain, .. } => self.choose_from(build, journal, domain, touched),
        }
    }

    /// Inputs the repair may set directly. `level` is never changed.
    fn may_set(&self, path: &str, touched: &Touched) -> bool {
        path != "level" && is_input_path(path) && !touched.contains(path)
    }

    /// Values of a single-choice input that satisfy a pattern test.
    fn matching_values(&self, path: &str, pattern: &Pattern, negated: bool) -> Vec<String> {
        let pool: Vec<String> = if path == "alignment" {
            ALIGNMENTS.iter().map(|a| a.to_string()).collect()
        } else {
            EntityKind::ALL
                .into_iter()
                .find(|kind| matches!(kind.selection(), Selection::Single(attr) if attr == path))
                .map(|kind| {
                    self.compiler
                        .entries_of(kind)
                        .map(|e| e.name.clone())
                        .collect()
                })
                .unwrap_or_default()
        };
        pool.into_iter()
            .filter(|value| pattern.is_match(value) != negated)
            .collect()
    }

    /// Add one unchosen feat from a `Choose` domain.
    ///
    /// `any <Trait>` matches the trait name exactly, as the requirement
    /// counts `featTraits.<Trait>.*`.
    fn choose_from(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        domain: &ChoiceDomain,
        touched: &mut Touched,
    ) -> bool {
        let paths: Vec<String> = match domain {
            ChoiceDomain::List(items) => items.iter().map(|item| domain_item_path(item)).collect(),
            ChoiceDomain::Any => self
                .compiler
                .entries_of(EntityKind::Feat)
                .map(|e| domain_item_path(&e.name))
                .collect(),
            ChoiceDomain::AnyOf(sub) => self
                .compiler
                .entries_of(EntityKind::Feat)
                .filter(|e| e.has_trait(sub))
                .map(|e| domain_item_path(&e.name))
                .collect(),
        };
        let open: Vec<String> = paths
            .into_iter()
            .filter(|p| self.may_set(p, touched) && !build.input(p).is_some_and(Value::is_truthy))
            .collect();
        match pick(self.random, &open) {
            Some(path) => {
                let path = path.clone();
                self.write(build, journal, touched, &path, |_| Some(Value::Int(1)));
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Allocations
    // =========================================================================

    /// Remove `excess` random untouched members of an over-allocated category.
    fn trim_allocation(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        kind: &AllocationKind,
        excess: i64,
        touched: &mut Touched,
    ) {
        for _ in 0..excess {
            let members = self.members(build, kind, touched);
            let Some(attr) = pick(self.random, &members).cloned() else {
                tracing::debug!(
                    allocation = %kind.signal_name(),
                    "No untouched member left to remove"
                );
                return;
            };
            self.write(build, journal, touched, &attr, |b| step_down(b, &attr));
            self.compiler.evaluate(build);
            if build.int(&kind.signal_name()) <= 0 {
                return;
            }
        }
    }

    /// Chosen inputs that count toward an allocation.
    fn members(&self, build: &Build, kind: &AllocationKind, touched: &Touched) -> Vec<String> {
        let prefix = kind.member_prefix();
        build
            .inputs_with_prefix(prefix)
            .filter(|(_, value)| value.is_truthy())
            .filter(|(name, _)| self.counts_toward(kind, name))
            .map(|(name, _)| format!("{}.{}", prefix, name))
            .filter(|attr| !touched.contains(attr))
            .collect()
    }

    fn counts_toward(&self, kind: &AllocationKind, name: &str) -> bool {
        match kind {
            AllocationKind::Feats(slot) => self
                .compiler
                .entry(EntityKind::Feat, name)
                .and_then(|e| e.slot_category.as_deref())
                .is_some_and(|category| fits_slot(category, slot)),
            AllocationKind::Spells(group) => self
                .compiler
                .entry(EntityKind::Spell, name)
                .is_some_and(|e| e.spell_groups().iter().any(|g| g == group)),
            AllocationKind::Selectable {
                kind,
                entity,
                group,
            } => self
                .compiler
                .entry(*kind, entity)
                .and_then(|e| e.selectables.get(group))
                .is_some_and(|options| options.iter().any(|o| o.name == name)),
            AllocationKind::SkillIncreases
            | AllocationKind::AbilityBoosts
            | AllocationKind::Languages => true,
        }
    }

    // =========================================================================
    // Abilities
    // =========================================================================

    fn clamp_base(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        ability: Ability,
        touched: &mut Touched,
    ) {
        let attr = ability.attr_name();
        if touched.contains(attr) {
            return;
        }
        let (lo, hi) = self.compiler.settings().ability_generation.score_range();
        self.write(build, journal, touched, attr, |b| {
            Some(Value::Int(b.input_int(attr).clamp(lo, hi)))
        });
    }

    /// Raise the base score so the final score reaches `target`.
    ///
    /// Fails when the base would leave the generation range or the score
    /// would pass the ceiling.
    fn raise_score(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        ability: Ability,
        target: i64,
        touched: &mut Touched,
    ) -> bool {
        let attr = ability.attr_name();
        if touched.contains(attr) {
            return false;
        }
        let missing = target - build.int(&format!("scores.{}", attr));
        if missing <= 0 {
            return false;
        }
        let (_, hi) = self.compiler.settings().ability_generation.score_range();
        let base = build.input_int(attr) + missing;
        if base > hi || target > self.compiler.settings().max_ability_score {
            tracing::debug!(ability = attr, target, "Score out of reach");
            return false;
        }
        self.write(build, journal, touched, attr, |_| Some(Value::Int(base)));
        true
    }

    /// Take back a boost, or failing that lower the base, until the score fits.
    fn lower_score(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        ability: Ability,
        excess: i64,
        touched: &mut Touched,
    ) {
        let boost = format!("abilityBoosts.{}", ability.attr_name());
        if build.input_int(&boost) > 0 && !touched.contains(&boost) {
            self.write(build, journal, touched, &boost, |b| step_down(b, &boost));
            return;
        }
        let (lo, _) = self.compiler.settings().ability_generation.score_range();
        let attr = ability.attr_name();
        self.write(build, journal, touched, attr, |b| {
            Some(Value::Int((b.input_int(attr) - excess).max(lo)))
        });
    }

    /// Lift one random ability to a positive modifier.
    fn rescue_modifiers(&self, build: &mut Build, journal: &mut Journal, touched: &mut Touched) {
        let (_, hi) = self.compiler.settings().ability_generation.score_range();
        let candidates: Vec<Ability> = Ability::ALL
            .into_iter()
            .filter(|a| !touched.contains(a.attr_name()))
            .collect();
        if let Some(ability) = pick(self.random, &candidates) {
            let attr = ability.attr_name();
            let floor = RESCUE_SCORE.min(hi);
            self.write(build, journal, touched, attr, |b| {
                Some(Value::Int(b.input_int(attr).max(floor)))
            });
        }
    }
}

/// `scores.<ability>` paths, fixed through the base score.
fn ability_score_path(path: &str) -> Option<Ability> {
    path.strip_prefix("scores.")
        .and_then(|name| name.parse().ok())
}

/// One less of an integer input, removing it at zero.
fn step_down(build: &Build, attr: &str) -> Option<Value> {
    let next = build.input_int(attr) - 1;
    (next > 0).then_some(Value::Int(next))
}
