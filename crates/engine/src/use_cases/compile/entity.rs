//! Compilation of one entity definition.
//!
//! Every rule an entity registers hangs off its *source level*: the attribute
//! `<levelPrefix>.<name>`, which holds the character level while the entity is
//! part of the build and is unset otherwise. Skills are intrinsic and hang off
//! `level` directly.
//!
//! Fields are compiled independently. A field that fails to parse is logged as
//! a [`Diagnostic`] and registers nothing; undefined attributes, cycles and
//! empty selectable groups abort the whole entity.

use buildwright_domain::{is_alignment, Ability, DiceFormula, EntityKind, Selection, Severity};

use super::catalog::{feat_category, CatalogEntry, SelectableOption};
use super::lowering::{formula_expr, proficiency_expr, requirement_holds, requirement_penalty};
use super::namespace::is_known_path;
use super::signals::{AllocationKind, ChoiceGroup, ChoiceInstruction, SignalKind, SignalSpec};
use super::{CompileError, RuleCompiler};
use crate::infrastructure::ports::{BinaryOp, CombineOp, Expr, RuleOwner};
use crate::parser::{
    parse_key_values, Conjunct, Effect, EffectOp, FeatSlotSchedule, FeatureEntry, KeyValue,
    ParseError, Pattern, RankGroup, RankItem, RankPhrase, RankStep, Requirement, SpellSlotSchedule,
};

enum FieldError {
    /// Logged and skipped; the rest of the entity still compiles.
    Skipped(String),
    Fatal(CompileError),
}

impl From<ParseError> for FieldError {
    fn from(error: ParseError) -> Self {
        Self::Skipped(error.to_string())
    }
}

impl From<CompileError> for FieldError {
    fn from(error: CompileError) -> Self {
        Self::Fatal(error)
    }
}

type FieldResult = Result<(), FieldError>;

pub(super) struct EntityScope<'c> {
    compiler: &'c mut RuleCompiler,
    kind: EntityKind,
    name: String,
    owner: RuleOwner,
    source: String,
    entry: CatalogEntry,
    require: Vec<Requirement>,
    imply: Vec<Requirement>,
    armor_class: Option<i64>,
    choice_count: usize,
}

impl<'c> EntityScope<'c> {
    pub(super) fn new(compiler: &'c mut RuleCompiler, kind: EntityKind, name: &str) -> Self {
        let source = match kind.level_prefix() {
            Some(prefix) => format!("{}.{}", prefix, name),
            None => "level".to_string(),
        };
        Self {
            compiler,
            kind,
            name: name.to_string(),
            owner: RuleOwner::entity(kind, name),
            source,
            entry: CatalogEntry::new(kind, name),
            require: Vec::new(),
            imply: Vec::new(),
            armor_class: None,
            choice_count: 0,
        }
    }

    pub(super) fn compile(mut self, attributes: &str) -> Result<CatalogEntry, CompileError> {
        let fields = parse_key_values(attributes).map_err(|source| CompileError::Parse {
            kind: self.kind,
            name: self.name.clone(),
            field: "attributes".to_string(),
            source,
        })?;

        self.register_source_level()?;

        // Selectable schedules need every option declared first.
        let (schedules, rest): (Vec<&KeyValue>, Vec<&KeyValue>) =
            fields.iter().partition(|field| field.key == "Selectables");
        for field in rest.into_iter().chain(schedules) {
            match self.compile_field(field) {
                Ok(()) => {}
                Err(FieldError::Skipped(message)) => {
                    self.compiler
                        .diagnose(self.kind, &self.name, &field.key, message)
                }
                Err(FieldError::Fatal(error)) => return Err(error),
            }
        }

        self.finish()?;
        Ok(self.entry)
    }

    // =========================================================================
    // Plumbing
    // =========================================================================

    fn rule(
        &mut self,
        target: &str,
        source: &str,
        op: CombineOp,
        expr: Expr,
    ) -> Result<(), CompileError> {
        self.compiler.define(target, source, op, expr, &self.owner)
    }

    fn attr(&mut self, name: &str) -> Expr {
        Expr::attr(self.compiler.engine.intern(name))
    }

    fn entity_label(&self) -> String {
        format!("{} '{}'", self.kind, self.name)
    }

    fn check_path(&self, path: &str) -> Result<(), CompileError> {
        if is_known_path(path) {
            Ok(())
        } else {
            Err(CompileError::UndefinedAttribute {
                entity: self.entity_label(),
                path: path.to_string(),
            })
        }
    }

    fn check_requirement(&self, requirement: &Requirement) -> Result<(), CompileError> {
        requirement
            .paths()
            .try_for_each(|path| self.check_path(path))
    }

    fn pattern(&self, options: &[String]) -> Result<Pattern, CompileError> {
        Pattern::one_of(options).map_err(|_| CompileError::InvalidPattern {
            entity: self.entity_label(),
            pattern: options.join(","),
        })
    }

    /// `Max(level, 1)` while the entity is selected, unset otherwise.
    fn register_source_level(&mut self) -> Result<(), CompileError> {
        let level = Expr::binary(BinaryOp::Max, self.attr("level"), Expr::int(1));
        let selection = self.kind.selection();
        match selection {
            Selection::Intrinsic => Ok(()),
            Selection::Single(input) => {
                let chosen =
                    Expr::binary(BinaryOp::Eq, Expr::Source, Expr::text(self.name.clone()));
                let source = self.source.clone();
                self.rule(
                    &source,
                    input,
                    CombineOp::Set,
                    Expr::if_then(chosen, level, Expr::Unset),
                )
            }
            Selection::Multi(_) | Selection::Granted(_) => {
                let presence = selection.presence_attr(&self.name).unwrap_or_default();
                let source = self.source.clone();
                self.rule(
                    &source,
                    &presence,
                    CombineOp::Set,
                    Expr::if_then(Expr::truthy(Expr::Source), level, Expr::Unset),
                )
            }
        }
    }

    /// One signal accumulating each requirement's penalty while `gate` is set.
    fn add_signal(
        &mut self,
        name: String,
        severity: Severity,
        gate: &str,
        requirements: Vec<Requirement>,
        subject: Option<String>,
    ) -> Result<(), CompileError> {
        for requirement in &requirements {
            self.check_requirement(requirement)?;
            let penalty = requirement_penalty(self.compiler.engine.as_mut(), requirement);
            let expr = Expr::if_then(Expr::truthy(Expr::Source), penalty, Expr::int(0));
            self.rule(&name, gate, CombineOp::Add, expr)?;
        }
        self.compiler.signals.insert(
            name.clone(),
            SignalSpec {
                name,
                severity,
                owner: self.owner.clone(),
                kind: SignalKind::Requirement {
                    requirements,
                    subject,
                },
            },
        );
        Ok(())
    }

    // =========================================================================
    // Fields
    // =========================================================================

    fn compile_field(&mut self, field: &KeyValue) -> FieldResult {
        use EntityKind as K;

        match (field.key.as_str(), self.kind) {
            ("Require", _) => {
                let requirements = parse_requirements(field)?;
                self.require.extend(requirements);
            }
            ("Imply", _) => {
                let requirements = parse_requirements(field)?;
                self.imply.extend(requirements);
            }
            ("Features", _) => {
                let entries = field
                    .entries()?
                    .iter()
                    .map(|entry| FeatureEntry::parse(entry))
                    .collect::<Result<Vec<_>, _>>()?;
                for entry in entries {
                    self.grant_feature(entry)?;
                }
            }
            ("Selectables", _) => {
                let schedules = parse_all(&field.values, FeatSlotSchedule::parse)?;
                for schedule in schedules {
                    self.selectable_group(schedule)?;
                }
            }
            ("Effects", _) => {
                for effect in parse_all(&field.values, Effect::parse)? {
                    self.effect(effect)?;
                }
            }
            ("Ranks", _) => {
                for phrase in parse_all(&field.values, RankPhrase::parse)? {
                    self.rank_phrase(phrase)?;
                }
            }
            ("Traits", K::Ancestry | K::Feat) => self.entry.traits = field.values.clone(),
            ("HitPoints", K::Ancestry) => {
                let hp = int_value(field)?;
                let source = self.source.clone();
                self.rule("hitPoints", &source, CombineOp::Add, Expr::int(hp))?;
            }
            ("HitPoints", K::Class) => {
                let per_level = int_value(field)?;
                let con = self.attr("abilityModifiers.constitution");
                let expr = Expr::binary(
                    BinaryOp::Mul,
                    Expr::Source,
                    Expr::binary(BinaryOp::Add, Expr::int(per_level), con),
                );
                let source = self.source.clone();
                self.rule("hitPoints", &source, CombineOp::Add, expr)?;
            }
            ("HitPoints", K::Shield) => self.set_constant("shieldHitPoints", int_value(field)?)?,
            ("Hardness", K::Shield) => self.set_constant("shieldHardness", int_value(field)?)?,
            ("Speed", K::Ancestry) => self.set_constant("speed", int_value(field)?)?,
            ("Languages", K::Ancestry) => self.languages(field)?,
            ("FeatSlots", K::Class) => {
                for schedule in parse_all(&field.values, FeatSlotSchedule::parse)? {
                    self.feat_slots(schedule)?;
                }
            }
            ("SpellSlots", K::Class) => {
                for schedule in parse_all(&field.values, SpellSlotSchedule::parse)? {
                    self.spell_slots(schedule)?;
                }
            }
            ("Tradition", K::Class) => {
                let tradition = single_value(field)?.to_string();
                let source = self.source.clone();
                self.rule(
                    "spellcastingTradition",
                    &source,
                    CombineOp::Set,
                    Expr::text(tradition),
                )?;
            }
            ("Alignment", K::Deity) => {
                if let Some(unknown) = field.values.iter().find(|a| !is_alignment(a)) {
                    return Err(FieldError::Skipped(format!(
                        "unknown alignment '{}'",
                        unknown
                    )));
                }
                let pattern = self.pattern(&field.values)?;
                self.imply.push(Requirement::matching("alignment", pattern));
            }
            ("Level", K::Feat) => {
                let level = level_value(field)?;
                self.entry.level = Some(level);
                self.require.push(Requirement::min_level(level));
            }
            ("Level", K::Spell) => self.entry.level = Some(level_value(field)?),
            ("Traditions", K::Spell) => self.entry.traditions = field.values.clone(),
            ("Replaces", K::Feature) => {
                let presence = format!("features.{}", self.name);
                for replaced in &field.values {
                    let target = format!("features.{}", replaced);
                    self.rule(
                        &target,
                        &presence,
                        CombineOp::Guard,
                        Expr::not(Expr::Source),
                    )?;
                }
            }
            ("Ability", K::Skill) => {
                let ability = single_value(field)?
                    .parse::<Ability>()
                    .map_err(|e| FieldError::Skipped(e.to_string()))?;
                self.entry.ability = Some(ability);
            }
            ("Subcategory", K::Skill) => {
                self.entry.subcategory = Some(single_value(field)?.to_string())
            }
            ("Category", K::Armor | K::Weapon) => {
                let category = single_value(field)?.to_string();
                self.equipment_category(category)?;
            }
            ("AC", K::Armor) => self.armor_class = Some(int_value(field)?),
            ("MaxDex", K::Armor) => self.set_constant("armorDexCap", int_value(field)?)?,
            ("Damage", K::Weapon) => {
                let text = single_value(field)?;
                let dice = DiceFormula::parse(text)
                    .map_err(|e| FieldError::Skipped(e.to_string()))?;
                let source = self.source.clone();
                let target = format!("weaponDamage.{}", self.name);
                let damage = Expr::text(dice.to_string());
                self.rule(&target, &source, CombineOp::Set, damage)?;
            }
            (key, kind) => {
                return Err(FieldError::Skipped(format!(
                    "unknown field '{}' for {}",
                    key, kind
                )))
            }
        }
        Ok(())
    }

    fn set_constant(&mut self, target: &str, value: i64) -> Result<(), CompileError> {
        let source = self.source.clone();
        self.rule(target, &source, CombineOp::Set, Expr::int(value))
    }

    /// Granted features and selectable options.
    fn grant_feature(&mut self, entry: FeatureEntry) -> Result<(), CompileError> {
        if let Some(condition) = &entry.condition {
            self.check_requirement(condition)?;
        }
        let feature = format!("features.{}", entry.name);

        let Some(group) = entry.group else {
            let mut gate = Expr::binary(
                BinaryOp::Ge,
                Expr::Source,
                Expr::int(i64::from(entry.level)),
            );
            if let Some(condition) = &entry.condition {
                let holds = requirement_holds(self.compiler.engine.as_mut(), condition);
                gate = Expr::and(gate, holds);
            }
            let source = self.source.clone();
            return self.rule(
                &feature,
                &source,
                CombineOp::Set,
                Expr::if_then(gate, Expr::int(1), Expr::Unset),
            );
        };

        self.entry
            .selectables
            .entry(group.clone())
            .or_default()
            .push(SelectableOption {
                name: entry.name.clone(),
                level: entry.level,
            });

        let key = format!("{} ({})", self.name, group);
        let choice = format!("selectableFeatures.{}", entry.name);
        self.rule(
            &feature,
            &choice,
            CombineOp::Set,
            Expr::if_then(Expr::truthy(Expr::Source), Expr::int(1), Expr::Unset),
        )?;
        self.rule(
            &format!("selectableFeaturesAssigned.{}", key),
            &choice,
            CombineOp::Add,
            Expr::truthy(Expr::Source),
        )?;

        let reached = Requirement::at_least(&self.source, i64::from(entry.level));
        let mut requirements = vec![reached];
        requirements.extend(entry.condition);
        self.add_signal(
            format!("validationNotes.selectableFeature.{}.{}", key, entry.name),
            Severity::Validation,
            &choice,
            requirements,
            Some(choice.clone()),
        )
    }

    fn selectable_group(&mut self, schedule: FeatSlotSchedule) -> Result<(), CompileError> {
        let group = schedule.category;
        let declared = self.entry.selectables.get(&group).map_or(0, Vec::len);
        if declared == 0 {
            return Err(CompileError::EmptySelectableGroup {
                entity: self.entity_label(),
                group,
            });
        }
        let kind = AllocationKind::Selectable {
            kind: self.kind,
            entity: self.name.clone(),
            group,
        };
        let source = self.source.clone();
        let slots = levels_reached(&schedule.levels);
        self.rule(&kind.count_attr(), &source, CombineOp::Add, slots)?;
        let owner = self.owner.clone();
        self.compiler.ensure_allocation(kind, owner)
    }

    fn effect(&mut self, effect: Effect) -> Result<(), CompileError> {
        self.check_path(&effect.target)?;
        for path in effect.formula.paths() {
            self.check_path(path)?;
        }
        let expr = formula_expr(self.compiler.engine.as_mut(), &effect.formula);
        let (op, expr) = match effect.op {
            EffectOp::Set => (CombineOp::Set, expr),
            EffectOp::Add => (CombineOp::Add, expr),
            EffectOp::Sub => (CombineOp::Add, Expr::neg(expr)),
            EffectOp::Mul => (CombineOp::Mul, expr),
            EffectOp::AtLeast => (CombineOp::AtLeast, expr),
            EffectOp::AtMost => (CombineOp::AtMost, expr),
        };
        let source = self.source.clone();
        self.rule(&effect.target, &source, op, expr)
    }

    fn rank_phrase(&mut self, phrase: RankPhrase) -> FieldResult {
        let value = match phrase.step {
            RankStep::Rank(rank) => rank.value(),
            RankStep::Boost => 1,
        };
        let items = if phrase.items.is_empty() {
            vec![RankItem::Name(phrase.group.as_str().to_string())]
        } else {
            phrase.items
        };

        // Validate before registering anything.
        for item in &items {
            match (item, phrase.group) {
                (RankItem::Name(name), RankGroup::Ability) => {
                    name.parse::<Ability>()
                        .map_err(|e| FieldError::Skipped(e.to_string()))?;
                }
                (RankItem::Choose { .. }, RankGroup::Skill | RankGroup::Ability) => {}
                (RankItem::Choose { .. }, group) => {
                    return Err(FieldError::Skipped(format!(
                        "choices are not supported for {} phrases",
                        group
                    )))
                }
                (RankItem::Name(_), _) => {}
            }
        }

        let source = self.source.clone();
        for item in items {
            match item {
                RankItem::Name(name) if phrase.group == RankGroup::Ability => {
                    let ability = name
                        .parse::<Ability>()
                        .map_err(|e| FieldError::Skipped(e.to_string()))?;
                    let target = format!("abilityBoostsGranted.{}", ability.attr_name());
                    self.rule(&target, &source, CombineOp::Add, Expr::int(1))?;
                }
                RankItem::Name(name) => {
                    let target = phrase.group.target_name(&name);
                    self.rule(
                        &format!("grantedRank.{}", target),
                        &source,
                        CombineOp::AtLeast,
                        Expr::int(value),
                    )?;
                    if phrase.group != RankGroup::Skill {
                        self.compiler.ensure_rank_slot(&target)?;
                    }
                }
                RankItem::Choose { count, domain } => {
                    let gate = format!(
                        "choices.{}.{}.{}",
                        self.kind.signal_key(),
                        self.name,
                        self.choice_count
                    );
                    self.choice_count += 1;
                    self.rule(&gate, &source, CombineOp::Set, Expr::int(i64::from(count)))?;

                    let (counter, group) = if phrase.group == RankGroup::Skill {
                        ("skillIncreaseCount", ChoiceGroup::Skill)
                    } else {
                        ("abilityBoostCount", ChoiceGroup::Ability)
                    };
                    self.rule(counter, &gate, CombineOp::Add, Expr::Source)?;
                    let instruction = ChoiceInstruction {
                        owner: self.owner.clone(),
                        gate,
                        group,
                        count,
                        domain,
                        ceiling: (group == ChoiceGroup::Skill).then_some(value),
                    };
                    self.compiler.register_boost_limits(&instruction)?;
                    self.compiler.choices.push(instruction);
                }
            }
        }
        Ok(())
    }

    fn languages(&mut self, field: &KeyValue) -> FieldResult {
        let mut granted = Vec::new();
        let mut extra = 0i64;
        for value in &field.values {
            if value.starts_with("Choose ") {
                let requirement = Requirement::parse(value)?;
                match requirement.alternatives.as_slice() {
                    [alt] => match alt.conjuncts.as_slice() {
                        [Conjunct::Choose { count, .. }] => extra += i64::from(*count),
                        _ => return Err(bad_choice(value)),
                    },
                    _ => return Err(bad_choice(value)),
                }
            } else {
                granted.push(value.clone());
            }
        }

        let source = self.source.clone();
        for language in granted {
            let target = format!("languagesGranted.{}", language);
            self.rule(&target, &source, CombineOp::Set, Expr::int(1))?;
        }
        if extra > 0 {
            self.rule("languageCount", &source, CombineOp::Add, Expr::int(extra))?;
        }
        Ok(())
    }

    fn feat_slots(&mut self, schedule: FeatSlotSchedule) -> Result<(), CompileError> {
        let kind = AllocationKind::Feats(schedule.category);
        let source = self.source.clone();
        let slots = levels_reached(&schedule.levels);
        self.rule(&kind.count_attr(), &source, CombineOp::Add, slots)?;
        self.compiler.ensure_allocation(kind, RuleOwner::Core)
    }

    fn spell_slots(&mut self, schedule: SpellSlotSchedule) -> Result<(), CompileError> {
        // Highest step first, so the first step reached wins.
        let ladder = schedule
            .steps
            .iter()
            .fold(Expr::int(0), |otherwise, (level, slots)| {
                Expr::if_then(
                    Expr::binary(BinaryOp::Ge, Expr::Source, Expr::int(i64::from(*level))),
                    Expr::int(*slots),
                    otherwise,
                )
            });
        let kind = AllocationKind::Spells(schedule.group);
        let source = self.source.clone();
        self.rule(&kind.count_attr(), &source, CombineOp::Add, ladder)?;
        self.compiler.ensure_allocation(kind, RuleOwner::Core)
    }

    fn equipment_category(&mut self, category: String) -> Result<(), CompileError> {
        let group = if self.kind == EntityKind::Armor {
            RankGroup::Armor
        } else {
            RankGroup::Attack
        };
        let target = group.target_name(&category);
        self.compiler.ensure_rank_slot(&target)?;
        let rank = format!("rank.{}", target);
        self.imply.push(Requirement::at_least(&rank, 1));
        self.entry.category = Some(category);
        Ok(())
    }

    // =========================================================================
    // Per-kind rules that depend on several fields
    // =========================================================================

    fn finish(&mut self) -> Result<(), CompileError> {
        match self.kind {
            EntityKind::Feat => self.finish_feat()?,
            EntityKind::Skill => self.finish_skill()?,
            EntityKind::Spell => self.finish_spell()?,
            EntityKind::Language => {
                let granted = format!("languagesGranted.{}", self.name);
                self.require.push(Requirement::absent(&granted));
            }
            EntityKind::Armor => self.finish_armor()?,
            _ => {}
        }

        let subject = self.kind.selection().input_attr(&self.name);
        let key = format!("{}.{}", self.kind.signal_key(), self.name);
        let source = self.source.clone();
        let require = std::mem::take(&mut self.require);
        if !require.is_empty() {
            let name = Severity::Validation.signal_name(&key);
            self.add_signal(
                name,
                Severity::Validation,
                &source,
                require,
                subject.clone(),
            )?;
        }
        let imply = std::mem::take(&mut self.imply);
        if !imply.is_empty() {
            let name = Severity::Sanity.signal_name(&key);
            self.add_signal(name, Severity::Sanity, &source, imply, subject)?;
        }
        Ok(())
    }

    fn finish_feat(&mut self) -> Result<(), CompileError> {
        let category = feat_category(&self.entry.traits);
        self.entry.slot_category = Some(category.to_string());

        let choice = format!("feats.{}", self.name);
        for trait_name in self.entry.traits.clone() {
            let target = format!("featTraits.{}.{}", trait_name, self.name);
            self.rule(&target, &choice, CombineOp::Set, Expr::truthy(Expr::Source))?;
        }
        let assigned = AllocationKind::Feats(category.to_string()).assigned_attr();
        self.rule(
            &assigned,
            &choice,
            CombineOp::Add,
            Expr::truthy(Expr::Source),
        )
    }

    fn finish_skill(&mut self) -> Result<(), CompileError> {
        let rank = format!("rank.{}", self.name);
        for input in ["grantedRank", "skillIncreases"] {
            let source = format!("{}.{}", input, self.name);
            self.rule(&rank, &source, CombineOp::Add, Expr::Source)?;
        }
        self.rule(&rank, "level", CombineOp::AtMost, Expr::int(4))?;

        let rank_value = self.attr(&rank);
        let mut modifier = proficiency_expr(rank_value.clone(), Expr::Source);
        if let Some(ability) = self.entry.ability {
            let ability_mod = self.attr(&format!("abilityModifiers.{}", ability.attr_name()));
            modifier = Expr::binary(BinaryOp::Add, modifier, ability_mod);
        }
        let target = format!("skillModifiers.{}", self.name);
        self.rule(&target, "level", CombineOp::Set, modifier)?;

        // Expert below 7, Master below 15, Legendary after.
        let ceiling = Expr::sum([
            Expr::int(2),
            Expr::binary(BinaryOp::Ge, Expr::Source, Expr::int(7)),
            Expr::binary(BinaryOp::Ge, Expr::Source, Expr::int(15)),
        ]);
        let excess = Expr::binary(
            BinaryOp::Max,
            Expr::int(0),
            Expr::binary(BinaryOp::Sub, rank_value, ceiling),
        );
        let name = format!("validationNotes.skillRank.{}", self.name);
        self.rule(&name, "level", CombineOp::Add, excess)?;
        self.compiler.signals.insert(
            name.clone(),
            SignalSpec {
                name,
                severity: Severity::Validation,
                owner: self.owner.clone(),
                kind: SignalKind::SkillCeiling(self.name.clone()),
            },
        );
        Ok(())
    }

    fn finish_spell(&mut self) -> Result<(), CompileError> {
        let traditions = self.entry.traditions.clone();
        if traditions.is_empty() {
            return Ok(());
        }
        let level = self.entry.level.unwrap_or(0);
        let choice = format!("spells.{}", self.name);
        for tradition in &traditions {
            let kind = AllocationKind::Spells(format!("{}{}", tradition, level));
            let casting = Expr::binary(
                BinaryOp::Eq,
                self.attr("spellcastingTradition"),
                Expr::text(tradition.clone()),
            );
            let expr = Expr::and(Expr::truthy(Expr::Source), casting);
            self.rule(&kind.assigned_attr(), &choice, CombineOp::Add, expr)?;
            self.compiler.ensure_allocation(kind, RuleOwner::Core)?;
        }
        let pattern = self.pattern(&traditions)?;
        self.require
            .push(Requirement::matching("spellcastingTradition", pattern));
        Ok(())
    }

    fn finish_armor(&mut self) -> Result<(), CompileError> {
        let Some(ac) = self.armor_class else {
            return Ok(());
        };
        let mut bonus = Expr::int(ac);
        if let Some(category) = self.entry.category.clone() {
            let rank = self.attr(&format!("rank.{}", RankGroup::Armor.target_name(&category)));
            let level = self.attr("level");
            bonus = Expr::binary(BinaryOp::Add, bonus, proficiency_expr(rank, level));
        }
        let source = self.source.clone();
        self.rule("armorClass", &source, CombineOp::Add, bonus)
    }
}

/// Number of schedule levels the source level has reached.
fn levels_reached(levels: &[u32]) -> Expr {
    Expr::sum(
        levels
            .iter()
            .map(|level| Expr::int(i64::from(*level)))
            .map(|level| Expr::binary(BinaryOp::Ge, Expr::Source, level))
            .collect::<Vec<_>>(),
    )
}

fn parse_all<T>(
    values: &[String],
    parse: impl Fn(&str) -> Result<T, ParseError>,
) -> Result<Vec<T>, ParseError> {
    values.iter().map(|value| parse(value)).collect()
}

/// Each list item is one requirement; all of them must hold.
fn parse_requirements(field: &KeyValue) -> Result<Vec<Requirement>, ParseError> {
    parse_all(&field.values, Requirement::parse)
}

fn bad_choice(value: &str) -> FieldError {
    FieldError::Skipped(format!("bad language choice '{}'", value))
}

fn single_value(field: &KeyValue) -> Result<&str, FieldError> {
    match field.values.as_slice() {
        [value] => Ok(value.as_str()),
        _ => Err(FieldError::Skipped(format!(
            "expected one value, got '{}'",
            field.raw
        ))),
    }
}

fn int_value(field: &KeyValue) -> Result<i64, FieldError> {
    let text = single_value(field)?;
    text.parse()
        .map_err(|_| FieldError::Skipped(format!("expected an integer, got '{}'", text)))
}

fn level_value(field: &KeyValue) -> Result<u32, FieldError> {
    let text = single_value(field)?;
    text.parse()
        .map_err(|_| FieldError::from(ParseError::InvalidLevel(text.to_string())))
}
