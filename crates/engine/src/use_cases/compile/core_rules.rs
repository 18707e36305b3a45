//! Rules every build carries, registered once when the compiler is created.

use buildwright_domain::{Ability, Severity};

use super::catalog::FEAT_CATEGORIES;
use super::lowering::proficiency_expr;
use super::signals::{AllocationKind, ChoiceGroup, ChoiceInstruction, SignalKind, SignalSpec};
use super::{CompileError, RuleCompiler};
use crate::infrastructure::ports::{BinaryOp, CombineOp, Expr, RuleOwner};
use crate::parser::ChoiceDomain;

const SAVES: [(&str, Ability); 3] = [
    ("Fortitude", Ability::Constitution),
    ("Reflex", Ability::Dexterity),
    ("Will", Ability::Wisdom),
];

/// Levels granting four free ability boosts.
const BOOST_LEVELS: [u32; 5] = [1, 5, 10, 15, 20];

/// Levels granting one free skill increase.
const SKILL_INCREASE_LEVELS: [u32; 9] = [3, 5, 7, 9, 11, 13, 15, 17, 19];

/// Stand-in for "no dex cap" when no armor sets one.
const UNCAPPED_DEX: i64 = 99;

impl RuleCompiler {
    pub(super) fn register_core_rules(&mut self) -> Result<(), CompileError> {
        self.register_abilities()?;
        self.register_defenses()?;
        self.register_allocations()?;
        self.register_free_choices()
    }

    fn core_rule(
        &mut self,
        target: &str,
        source: &str,
        op: CombineOp,
        expr: Expr,
    ) -> Result<(), CompileError> {
        self.define(target, source, op, expr, &RuleOwner::Core)
    }

    fn core_signal(&mut self, name: String, severity: Severity, kind: SignalKind) {
        self.signals.insert(
            name.clone(),
            SignalSpec {
                name,
                severity,
                owner: RuleOwner::Core,
                kind,
            },
        );
    }

    fn attr_expr(&mut self, name: &str) -> Expr {
        Expr::attr(self.engine.intern(name))
    }

    // =========================================================================
    // Abilities
    // =========================================================================

    fn register_abilities(&mut self) -> Result<(), CompileError> {
        let (lo, hi) = self.settings.ability_generation.score_range();
        let ceiling = self.settings.max_ability_score;

        for ability in Ability::ALL {
            let base = ability.attr_name();
            let score = format!("scores.{}", base);
            let doubled = Expr::binary(BinaryOp::Mul, Expr::Source, Expr::int(2));

            self.core_rule(&score, base, CombineOp::Add, Expr::Source)?;
            for boosts in ["abilityBoosts", "abilityBoostsGranted"] {
                let source = format!("{}.{}", boosts, base);
                self.core_rule(&score, &source, CombineOp::Add, doubled.clone())?;
            }
            self.core_rule(
                &format!("abilityModifiers.{}", base),
                &score,
                CombineOp::Set,
                Expr::binary(
                    BinaryOp::Div,
                    Expr::binary(BinaryOp::Sub, Expr::Source, Expr::int(10)),
                    Expr::int(2),
                ),
            )?;

            let range = Severity::Validation.signal_name(&format!("abilityScore.{}", base));
            let outside = Expr::binary(
                BinaryOp::Add,
                Expr::binary(
                    BinaryOp::Max,
                    Expr::int(0),
                    Expr::binary(BinaryOp::Sub, Expr::int(lo), Expr::Source),
                ),
                Expr::binary(
                    BinaryOp::Max,
                    Expr::int(0),
                    Expr::binary(BinaryOp::Sub, Expr::Source, Expr::int(hi)),
                ),
            );
            self.core_rule(&range, base, CombineOp::Add, outside)?;
            self.core_signal(
                range,
                Severity::Validation,
                SignalKind::AbilityRange(ability),
            );

            let over = Severity::Validation.signal_name(&format!("abilityCeiling.{}", base));
            let excess = Expr::binary(
                BinaryOp::Max,
                Expr::int(0),
                Expr::binary(BinaryOp::Sub, Expr::Source, Expr::int(ceiling)),
            );
            self.core_rule(&over, &score, CombineOp::Add, excess)?;
            self.core_signal(
                over,
                Severity::Validation,
                SignalKind::AbilityCeiling(ability),
            );

            // One boost per ability per grant.
            let limit = self.attr_expr(&format!("abilityBoostLimit.{}", base));
            let repeated = Severity::Validation.signal_name(&format!("abilityBoostLimit.{}", base));
            self.core_rule(
                &repeated,
                &format!("abilityBoosts.{}", base),
                CombineOp::Add,
                Expr::binary(
                    BinaryOp::Max,
                    Expr::int(0),
                    Expr::binary(BinaryOp::Sub, Expr::Source, limit),
                ),
            )?;
            self.core_signal(
                repeated,
                Severity::Validation,
                SignalKind::BoostLimit(ability),
            );
        }

        // Fires only once all six modifiers exist.
        let mut all_weak = Expr::int(1);
        for ability in Ability::ALL {
            let modifier = self.attr_expr(&format!("abilityModifiers.{}", ability.attr_name()));
            let weak = Expr::and(
                Expr::IsSet(Box::new(modifier.clone())),
                Expr::binary(BinaryOp::Le, modifier, Expr::int(0)),
            );
            all_weak = Expr::and(all_weak, weak);
        }
        let name = Severity::Sanity.signal_name("abilityModifiers");
        self.core_rule(
            &name,
            "abilityModifiers.strength",
            CombineOp::Add,
            Expr::if_then(all_weak, Expr::int(1), Expr::int(0)),
        )?;
        self.core_signal(name, Severity::Sanity, SignalKind::ModifiersNonPositive);
        Ok(())
    }

    // =========================================================================
    // Saves, perception, armor class
    // =========================================================================

    fn register_defenses(&mut self) -> Result<(), CompileError> {
        for (save, ability) in SAVES {
            self.ensure_rank_slot(save)?;
            let modifier = self.proficient_modifier(save, ability);
            let target = format!("saves.{}", save);
            self.core_rule(&target, "level", CombineOp::Set, modifier)?;
        }

        self.ensure_rank_slot("Perception")?;
        let perception = self.proficient_modifier("Perception", Ability::Wisdom);
        self.core_rule("perception", "level", CombineOp::Set, perception)?;

        let dex = self.attr_expr("abilityModifiers.dexterity");
        let cap = self.attr_expr("armorDexCap");
        let has_cap = Expr::IsSet(Box::new(cap.clone()));
        let capped = Expr::binary(
            BinaryOp::Min,
            dex,
            Expr::if_then(has_cap, cap, Expr::int(UNCAPPED_DEX)),
        );
        self.core_rule(
            "armorClass",
            "level",
            CombineOp::Add,
            Expr::binary(BinaryOp::Add, Expr::int(10), capped),
        )?;

        self.ensure_rank_slot("Unarmored")?;
        let armor = self.attr_expr("armor");
        let unarmored = self.attr_expr("rank.Unarmored");
        self.core_rule(
            "armorClass",
            "level",
            CombineOp::Add,
            Expr::if_then(
                Expr::IsSet(Box::new(armor)),
                Expr::int(0),
                proficiency_expr(unarmored, Expr::Source),
            ),
        )
    }

    /// Proficiency on `rank.<slot>` plus the ability modifier; fires from `level`.
    fn proficient_modifier(&mut self, slot: &str, ability: Ability) -> Expr {
        let rank = self.attr_expr(&format!("rank.{}", slot));
        let modifier = self.attr_expr(&format!("abilityModifiers.{}", ability.attr_name()));
        let proficiency = proficiency_expr(rank, Expr::Source);
        Expr::binary(BinaryOp::Add, proficiency, modifier)
    }

    // =========================================================================
    // Allocations
    // =========================================================================

    fn register_allocations(&mut self) -> Result<(), CompileError> {
        for category in FEAT_CATEGORIES {
            self.ensure_allocation(AllocationKind::Feats(category.to_string()), RuleOwner::Core)?;
        }
        // Skill feats past the Skill slots fill General slots.
        let skill_slots = self.attr_expr(&AllocationKind::Feats("Skill".into()).count_attr());
        self.core_rule(
            &AllocationKind::Feats("General".into()).assigned_attr(),
            &AllocationKind::Feats("Skill".into()).assigned_attr(),
            CombineOp::Add,
            Expr::binary(
                BinaryOp::Max,
                Expr::int(0),
                Expr::binary(BinaryOp::Sub, Expr::Source, skill_slots),
            ),
        )?;

        for kind in [AllocationKind::SkillIncreases, AllocationKind::AbilityBoosts] {
            let prefix = kind.member_prefix().to_string();
            let sum = Expr::SumPrefix { prefix };
            self.core_rule(&kind.assigned_attr(), "level", CombineOp::Set, sum)?;
            self.ensure_allocation(kind, RuleOwner::Core)?;
        }

        let languages = AllocationKind::Languages;
        self.core_rule(
            &languages.assigned_attr(),
            "level",
            CombineOp::Set,
            Expr::CountTruthy {
                prefix: languages.member_prefix().to_string(),
            },
        )?;
        self.core_rule(
            &languages.count_attr(),
            "abilityModifiers.intelligence",
            CombineOp::Add,
            Expr::binary(BinaryOp::Max, Expr::int(0), Expr::Source),
        )?;
        self.ensure_allocation(languages, RuleOwner::Core)
    }

    /// Boosts and skill increases every character earns by level.
    fn register_free_choices(&mut self) -> Result<(), CompileError> {
        let boosts = BOOST_LEVELS.map(|level| (level, 4, ChoiceGroup::Ability));
        let increases = SKILL_INCREASE_LEVELS.map(|level| (level, 1, ChoiceGroup::Skill));
        for (level, count, group) in boosts.into_iter().chain(increases) {
            let (key, counter) = match group {
                ChoiceGroup::Ability => ("abilityBoost", "abilityBoostCount"),
                ChoiceGroup::Skill => ("skillIncrease", "skillIncreaseCount"),
            };
            let gate = format!("choices.core.{}.{}", key, level);
            self.core_rule(
                &gate,
                "level",
                CombineOp::Set,
                Expr::if_then(
                    Expr::binary(BinaryOp::Ge, Expr::Source, Expr::int(i64::from(level))),
                    Expr::int(i64::from(count)),
                    Expr::Unset,
                ),
            )?;
            self.core_rule(counter, &gate, CombineOp::Add, Expr::Source)?;
            let instruction = ChoiceInstruction {
                owner: RuleOwner::Core,
                gate,
                group,
                count,
                domain: ChoiceDomain::Any,
                ceiling: None,
            };
            self.register_boost_limits(&instruction)?;
            self.choices.push(instruction);
        }
        Ok(())
    }

    /// Every active boost instruction lets each ability it names take one
    /// more boost. Skill instructions add nothing.
    pub(super) fn register_boost_limits(
        &mut self,
        instruction: &ChoiceInstruction,
    ) -> Result<(), CompileError> {
        if instruction.group != ChoiceGroup::Ability {
            return Ok(());
        }
        for ability in instruction.abilities() {
            self.define(
                &format!("abilityBoostLimit.{}", ability.attr_name()),
                &instruction.gate,
                CombineOp::Add,
                Expr::int(1),
                &instruction.owner,
            )?;
        }
        Ok(())
    }

    /// Register the signal `assigned - count` for an allocation, once.
    pub(super) fn ensure_allocation(
        &mut self,
        kind: AllocationKind,
        owner: RuleOwner,
    ) -> Result<(), CompileError> {
        let name = kind.signal_name();
        if self.signals.contains_key(&name) {
            return Ok(());
        }

        let count = kind.count_attr();
        let assigned_expr = match &kind {
            AllocationKind::Feats(category) if category == "Skill" => {
                let slots = self.attr_expr(&count);
                Expr::binary(BinaryOp::Min, Expr::Source, slots)
            }
            _ => Expr::Source,
        };
        let assigned = kind.assigned_attr();
        self.define(&name, &assigned, CombineOp::Add, assigned_expr, &owner)?;
        let owed = Expr::neg(Expr::Source);
        self.define(&name, &count, CombineOp::Add, owed, &owner)?;

        self.signals.insert(
            name.clone(),
            SignalSpec {
                name,
                severity: Severity::Validation,
                owner,
                kind: SignalKind::Allocation(kind),
            },
        );
        Ok(())
    }

    /// `rank.<target>` follows `grantedRank.<target>`; registered once per target.
    pub(super) fn ensure_rank_slot(&mut self, target: &str) -> Result<(), CompileError> {
        if !self.rank_slots.insert(target.to_string()) {
            return Ok(());
        }
        let result = self.define(
            &format!("rank.{}", target),
            &format!("grantedRank.{}", target),
            CombineOp::Set,
            Expr::Source,
            &RuleOwner::Core,
        );
        if result.is_err() {
            self.rank_slots.remove(target);
        }
        result
    }
}
