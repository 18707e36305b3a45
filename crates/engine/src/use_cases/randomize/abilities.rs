//! Base ability scores and ability boosts.

use std::collections::BTreeMap;

use buildwright_domain::{Ability, Build, DiceFormula, DiceRollResult, Value};

use super::Randomizer;
use crate::infrastructure::random::shuffle;
use crate::infrastructure::settings::{AbilityGeneration, STANDARD_ARRAY};
use crate::use_cases::compile::{AllocationKind, ChoiceGroup};
use crate::use_cases::journal::Journal;

/// Score used when a roll cannot be made.
const FALLBACK_SCORE: i64 = 10;

impl Randomizer<'_> {
    /// Roll the unset base scores, then spend outstanding boosts.
    ///
    /// The whole roll is redone while any ability signal stays non-zero, up
    /// to `max_ability_rerolls` times.
    pub(super) fn fill_abilities(&self, build: &mut Build, journal: &mut Journal) {
        let mark = journal.mark();
        let rerolls = self.settings().max_ability_rerolls;

        for attempt in 0..=rerolls {
            self.roll_base_scores(build, journal);
            self.compiler.evaluate(build);
            self.fill_ability_boosts(build, journal);

            if !self.has_ability_signals(build) {
                return;
            }
            // Nothing was rolled, so a retry would repeat the same result.
            if journal.mark() == mark || attempt == rerolls {
                break;
            }
            tracing::debug!(attempt, "Rerolling ability scores");
            journal.rollback_to(build, mark);
            self.compiler.evaluate(build);
        }
    }

    fn roll_base_scores(&self, build: &mut Build, journal: &mut Journal) {
        let unset: Vec<Ability> = Ability::ALL
            .into_iter()
            .filter(|a| !build.has_input(a.attr_name()))
            .collect();
        if unset.is_empty() {
            return;
        }

        let scores: Vec<i64> = match self.settings().ability_generation {
            AbilityGeneration::FourD6DropLowest => unset
                .iter()
                .map(|_| self.roll(4, |f, r| f.roll_keep_highest(3, r)))
                .collect(),
            AbilityGeneration::ThreeD6 => unset
                .iter()
                .map(|_| self.roll(3, |f, r| f.roll_with(r)))
                .collect(),
            AbilityGeneration::StandardArray => {
                let mut array = STANDARD_ARRAY;
                shuffle(self.random, &mut array);
                array.to_vec()
            }
            AbilityGeneration::AllTens => vec![FALLBACK_SCORE; unset.len()],
        };

        for (ability, score) in unset.into_iter().zip(scores) {
            journal.set(build, ability.attr_name(), Some(Value::Int(score)));
        }
    }

    fn roll<F>(&self, dice: u8, roll: F) -> i64
    where
        F: Fn(&DiceFormula, &mut dyn FnMut(i32, i32) -> i32) -> DiceRollResult,
    {
        match DiceFormula::new(dice, 6, 0) {
            Ok(formula) => {
                let mut die = |min: i32, max: i32| self.random.gen_range(min, max);
                i64::from(roll(&formula, &mut die).total)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not build ability dice, using flat score");
                FALLBACK_SCORE
            }
        }
    }

    /// Spend outstanding ability boosts across the active boost instructions.
    ///
    /// Boosts already assigned are credited to the earliest instructions that
    /// may name their ability. Within one instruction every boost, credited or
    /// new, goes to a different ability.
    pub(crate) fn fill_ability_boosts(&self, build: &mut Build, journal: &mut Journal) {
        let kind = AllocationKind::AbilityBoosts;
        let boost_attr =
            |ability: Ability| format!("{}.{}", kind.member_prefix(), ability.attr_name());
        let mut uncredited: BTreeMap<Ability, i64> = Ability::ALL
            .into_iter()
            .map(|ability| (ability, build.input_int(&boost_attr(ability))))
            .collect();
        let instructions: Vec<_> = self
            .compiler
            .choices()
            .iter()
            .filter(|c| {
                c.group == ChoiceGroup::Ability && build.value(&c.gate).is_some()
            })
            .cloned()
            .collect();

        for instruction in instructions {
            let mut remaining = build.int(&instruction.gate);
            let mut candidates = instruction.abilities();
            candidates.retain(|ability| match uncredited.get_mut(ability) {
                Some(left) if *left > 0 && remaining > 0 => {
                    *left -= 1;
                    remaining -= 1;
                    false
                }
                _ => true,
            });

            shuffle(self.random, &mut candidates);
            for ability in candidates {
                if remaining == 0 || self.outstanding(build, &kind) == 0 {
                    break;
                }
                let score = build.int(&format!("scores.{}", ability.attr_name()));
                if score + 2 > self.settings().max_ability_score {
                    continue;
                }
                let attr = boost_attr(ability);
                let next = build.input_int(&attr) + 1;
                if self.try_commit(build, journal, &[(attr, Some(Value::Int(next)))]) {
                    remaining -= 1;
                }
            }
        }
    }

    fn has_ability_signals(&self, build: &Build) -> bool {
        build.violations().iter().any(|signal| {
            self.compiler
                .signal(&signal.name)
                .is_some_and(|spec| spec.concerns_abilities())
        })
    }
}
