//! Single-valued choices and skill increases.

use buildwright_domain::{Build, EntityKind, ProficiencyRank, Selection, Value, ALIGNMENTS};

use super::Randomizer;
use crate::infrastructure::random::shuffle;
use crate::parser::ChoiceDomain;
use crate::use_cases::compile::{AllocationKind, CatalogEntry, ChoiceGroup, ChoiceInstruction};
use crate::use_cases::journal::Journal;

impl Randomizer<'_> {
    /// Pick one entity for a single-valued input (`ancestry`, `class`, ...).
    ///
    /// An input that is already set is left alone.
    pub(super) fn fill_single(&self, build: &mut Build, journal: &mut Journal, kind: EntityKind) {
        let Selection::Single(attr) = kind.selection() else {
            return;
        };
        if build.has_input(attr) {
            return;
        }
        let names: Vec<String> = self
            .compiler
            .entries_of(kind)
            .map(|e| e.name.clone())
            .collect();
        self.commit_first(build, journal, attr, names);
    }

    pub(super) fn fill_alignment(&self, build: &mut Build, journal: &mut Journal) {
        if build.has_input("alignment") {
            return;
        }
        let names = ALIGNMENTS.iter().map(|a| a.to_string()).collect();
        self.commit_first(build, journal, "alignment", names);
    }

    /// Shuffle `names` and keep the first one that commits as `attr`.
    fn commit_first(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        attr: &str,
        mut names: Vec<String>,
    ) {
        shuffle(self.random, &mut names);
        let attempts = self.settings().max_draw_attempts as usize;
        for name in names.into_iter().take(attempts) {
            let change = [(attr.to_string(), Some(Value::text(name)))];
            if self.try_commit(build, journal, &change) {
                return;
            }
        }
        tracing::debug!(attr, "No legal choice found");
    }

    // =========================================================================
    // Skill increases
    // =========================================================================

    /// Spend outstanding skill increases across the active skill instructions.
    ///
    /// Increases already assigned are credited against the earliest
    /// instructions first. An instruction with a ceiling only raises skills
    /// still below it; free increases stop at the rank the level allows.
    pub(crate) fn fill_skill_choices(&self, build: &mut Build, journal: &mut Journal) {
        let kind = AllocationKind::SkillIncreases;
        let mut credited = build.int(&kind.assigned_attr());
        let instructions: Vec<ChoiceInstruction> = self
            .compiler
            .choices()
            .iter()
            .filter(|c| {
                c.group == ChoiceGroup::Skill && build.value(&c.gate).is_some()
            })
            .cloned()
            .collect();

        for instruction in instructions {
            let count = build.int(&instruction.gate);
            let used = credited.min(count);
            credited -= used;
            let mut remaining = count - used;
            if remaining == 0 {
                continue;
            }

            let mut candidates = self.skill_domain(&instruction.domain);
            shuffle(self.random, &mut candidates);
            let attempts = self.settings().max_draw_attempts as usize;
            for skill in candidates.into_iter().take(attempts) {
                if remaining == 0 || self.outstanding(build, &kind) == 0 {
                    break;
                }
                if !self.below_ceiling(build, &skill, instruction.ceiling) {
                    continue;
                }
                let attr = format!("{}.{}", kind.member_prefix(), skill);
                let next = build.input_int(&attr) + 1;
                if self.try_commit(build, journal, &[(attr, Some(Value::Int(next)))]) {
                    remaining -= 1;
                }
            }
        }
    }

    fn skill_domain(&self, domain: &ChoiceDomain) -> Vec<String> {
        let skills = self.compiler.entries_of(EntityKind::Skill);
        match domain {
            ChoiceDomain::List(names) => names
                .iter()
                .filter(|n| self.compiler.entry(EntityKind::Skill, n).is_some())
                .cloned()
                .collect(),
            ChoiceDomain::Any => skills.map(|e| e.name.clone()).collect(),
            ChoiceDomain::AnyOf(sub) => skills
                .filter(|e| in_subcategory(e, sub))
                .map(|e| e.name.clone())
                .collect(),
        }
    }

    fn below_ceiling(&self, build: &Build, skill: &str, ceiling: Option<i64>) -> bool {
        let rank = build.int(&format!("rank.{}", skill));
        match ceiling {
            Some(granted) => rank < granted,
            None => rank < ProficiencyRank::max_for_level(build.int("level")).value(),
        }
    }
}

fn in_subcategory(entry: &CatalogEntry, sub: &str) -> bool {
    entry
        .subcategory
        .as_deref()
        .is_some_and(|s| s.eq_ignore_ascii_case(sub))
}
