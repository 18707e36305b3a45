//! Rule compiler - turns catalog entities into evaluator rules and signals.
//!
//! Each entity's rules are registered under its own [`RuleOwner`], so
//! removing an entity is a single retraction. Compiling a name that is
//! already compiled with different text shadows the earlier definition;
//! removing the newer one reinstalls the one underneath.

mod catalog;
mod core_rules;
mod entity;
mod error;
mod lowering;
mod namespace;
mod signals;

use std::collections::{BTreeMap, BTreeSet};

use buildwright_domain::{Build, EntityDefinition, EntityKind};

use crate::infrastructure::ports::{CombineOp, DerivationRule, EvaluationEngine, Expr, RuleOwner};
use crate::infrastructure::settings::EngineSettings;

pub use catalog::{feat_category, fits_slot, CatalogEntry, SelectableOption, FEAT_CATEGORIES};
pub use error::{CompileError, Diagnostic};
pub use lowering::domain_item_path;
pub use namespace::{is_input_path, is_known_path, INPUT_PREFIXES};
pub use signals::{AllocationKind, ChoiceGroup, ChoiceInstruction, SignalKind, SignalSpec};

use entity::EntityScope;

type EntityKey = (EntityKind, String);

pub struct RuleCompiler {
    engine: Box<dyn EvaluationEngine>,
    settings: EngineSettings,
    /// Definitions per name; the last one is installed, the rest are shadowed.
    definitions: BTreeMap<EntityKey, Vec<EntityDefinition>>,
    entries: BTreeMap<EntityKey, CatalogEntry>,
    signals: BTreeMap<String, SignalSpec>,
    choices: Vec<ChoiceInstruction>,
    rank_slots: BTreeSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl RuleCompiler {
    /// Create a compiler over `engine` and register the core rules.
    pub fn new(
        engine: Box<dyn EvaluationEngine>,
        settings: EngineSettings,
    ) -> Result<Self, CompileError> {
        let mut compiler = Self {
            engine,
            settings,
            definitions: BTreeMap::new(),
            entries: BTreeMap::new(),
            signals: BTreeMap::new(),
            choices: Vec::new(),
            rank_slots: BTreeSet::new(),
            diagnostics: Vec::new(),
        };
        compiler.register_core_rules()?;
        tracing::debug!(
            rules = compiler.engine.rule_count(),
            signals = compiler.signals.len(),
            "Registered core rules"
        );
        Ok(compiler)
    }

    // =========================================================================
    // Entry points
    // =========================================================================

    /// Compile one entity and return how many rules it registered.
    ///
    /// Compiling the installed text again is a no-op. On error the entity's
    /// partial rules are retracted and any previous definition is reinstalled.
    pub fn compile_entity(&mut self, definition: &EntityDefinition) -> Result<usize, CompileError> {
        let key = (definition.kind, definition.name.clone());
        let owner = RuleOwner::entity(definition.kind, definition.name.as_str());
        let installed = self
            .definitions
            .get(&key)
            .and_then(|stack| stack.last())
            .cloned();

        if installed.as_ref() == Some(definition) {
            return Ok(self.engine.rules_of(&owner).len());
        }
        if installed.is_some() {
            self.retract(&key);
        }

        match self.install(definition) {
            Ok(rules) => {
                self.definitions
                    .entry(key)
                    .or_default()
                    .push(definition.clone());
                tracing::info!(
                    kind = %definition.kind,
                    name = %definition.name,
                    rules,
                    "Compiled entity"
                );
                Ok(rules)
            }
            Err(error) => {
                self.retract(&key);
                if let Some(previous) = installed {
                    if let Err(reinstall) = self.install(&previous) {
                        tracing::error!(
                            kind = %previous.kind,
                            name = %previous.name,
                            error = %reinstall,
                            "Failed to reinstall previous definition"
                        );
                    }
                }
                tracing::warn!(
                    kind = %definition.kind,
                    name = %definition.name,
                    error = %error,
                    "Entity compilation aborted"
                );
                Err(error)
            }
        }
    }

    /// Retract an entity, reinstalling the definition it shadowed, if any.
    pub fn remove_entity(&mut self, kind: EntityKind, name: &str) -> Result<(), CompileError> {
        let key = (kind, name.to_string());
        let not_found = || CompileError::NotFound {
            kind,
            name: name.to_string(),
        };
        let stack = self.definitions.get_mut(&key).ok_or_else(not_found)?;
        stack.pop().ok_or_else(not_found)?;
        let shadowed = stack.last().cloned();
        if shadowed.is_none() {
            self.definitions.remove(&key);
        }

        let removed = self.retract(&key);
        tracing::info!(kind = %kind, name = %name, rules = removed, "Removed entity");

        if let Some(previous) = shadowed {
            match self.install(&previous) {
                Ok(rules) => {
                    tracing::info!(
                        kind = %kind,
                        name = %name,
                        rules,
                        "Restored shadowed definition"
                    )
                }
                Err(error) => {
                    self.retract(&key);
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    /// Re-evaluate a build against every registered rule.
    pub fn evaluate(&self, build: &mut Build) {
        let derived = self.engine.evaluate(build.inputs());
        build.refresh(derived);
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn engine(&self) -> &dyn EvaluationEngine {
        self.engine.as_ref()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn signal(&self, name: &str) -> Option<&SignalSpec> {
        self.signals.get(name)
    }

    pub fn signals(&self) -> impl Iterator<Item = &SignalSpec> {
        self.signals.values()
    }

    pub fn choices(&self) -> &[ChoiceInstruction] {
        &self.choices
    }

    pub fn entry(&self, kind: EntityKind, name: &str) -> Option<&CatalogEntry> {
        self.entries.get(&(kind, name.to_string()))
    }

    pub fn entries_of(&self, kind: EntityKind) -> impl Iterator<Item = &CatalogEntry> {
        self.entries
            .iter()
            .filter(move |((k, _), _)| *k == kind)
            .map(|(_, entry)| entry)
    }

    /// The installed definition for a name.
    pub fn definition(&self, kind: EntityKind, name: &str) -> Option<&EntityDefinition> {
        self.definitions
            .get(&(kind, name.to_string()))
            .and_then(|stack| stack.last())
    }

    /// Field-level problems that were skipped during compilation.
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn install(&mut self, definition: &EntityDefinition) -> Result<usize, CompileError> {
        let entry = EntityScope::new(self, definition.kind, &definition.name)
            .compile(&definition.attributes)?;
        let owner = RuleOwner::entity(definition.kind, definition.name.as_str());
        self.entries
            .insert((definition.kind, definition.name.clone()), entry);
        Ok(self.engine.rules_of(&owner).len())
    }

    /// Drop everything registered under an entity's owner.
    fn retract(&mut self, key: &EntityKey) -> usize {
        let (kind, name) = key;
        let owner = RuleOwner::entity(*kind, name.as_str());
        let removed = self.engine.remove_rules(&owner);
        self.signals.retain(|_, spec| spec.owner != owner);
        self.choices.retain(|choice| choice.owner != owner);
        self.entries.remove(key);
        self.diagnostics
            .retain(|d| !(d.kind == *kind && d.name == *name));
        removed
    }

    fn define(
        &mut self,
        target: &str,
        source: &str,
        op: CombineOp,
        expr: Expr,
        owner: &RuleOwner,
    ) -> Result<(), CompileError> {
        let target = self.engine.intern(target);
        let source = self.engine.intern(source);
        self.engine.define_rule(DerivationRule {
            target,
            source,
            op,
            expr,
            owner: owner.clone(),
        })?;
        Ok(())
    }

    fn diagnose(&mut self, kind: EntityKind, name: &str, field: &str, message: String) {
        tracing::warn!(
            kind = %kind,
            name = %name,
            field = %field,
            error = %message,
            "Skipped catalog field"
        );
        self.diagnostics.push(Diagnostic {
            kind,
            name: name.to_string(),
            field: field.to_string(),
            message,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::evaluator::SheetEvaluator;
    use buildwright_domain::Value;

    fn compiler() -> RuleCompiler {
        RuleCompiler::new(Box::new(SheetEvaluator::new()), EngineSettings::default())
            .expect("core rules compile")
    }

    fn def(kind: EntityKind, name: &str, attributes: &str) -> EntityDefinition {
        EntityDefinition::new(kind, name, attributes)
    }

    const BARBARIAN: &str = r#"HitPoints=12 Features="1:Rage;1:Animal Instinct:Instinct;1:Fury Instinct:Instinct" Selectables=Instinct:1 FeatSlots=Class:1;2;4 Ranks="Save Expert (Fortitude)","Skill Trained (Athletics; Choose 3 from any)""#;

    #[test]
    fn compiling_twice_is_idempotent() {
        let mut compiler = compiler();
        let barbarian = def(EntityKind::Class, "Barbarian", BARBARIAN);
        let first = compiler.compile_entity(&barbarian).expect("compiles");
        let rules = compiler.engine().rule_count();
        let signals = compiler.signals().count();

        let second = compiler.compile_entity(&barbarian).expect("compiles");
        assert_eq!(first, second);
        assert_eq!(compiler.engine().rule_count(), rules);
        assert_eq!(compiler.signals().count(), signals);
    }

    #[test]
    fn class_rules_gate_on_selection() {
        let mut compiler = compiler();
        compiler
            .compile_entity(&def(EntityKind::Class, "Barbarian", BARBARIAN))
            .expect("compiles");

        let mut build = Build::new()
            .with_input("level", 2)
            .with_input("class", "Barbarian")
            .with_input("constitution", 14);
        compiler.evaluate(&mut build);

        assert_eq!(build.int("levels.Barbarian"), 2);
        assert_eq!(build.int("features.Rage"), 1);
        assert_eq!(build.int("hitPoints"), 2 * (12 + 2));
        assert_eq!(build.int("featCounts.Class"), 2);
        assert_eq!(build.int("rank.Fortitude"), 2);
        assert_eq!(build.int("grantedRank.Athletics"), 1);
        assert_eq!(build.int("skillIncreaseCount"), 3);
        assert_eq!(build.int("selectableFeatureCount.Barbarian (Instinct)"), 1);
        assert_eq!(
            build.int("validationNotes.selectableAllocation.Barbarian (Instinct)"),
            -1
        );

        build.set_input("selectableFeatures.Fury Instinct", 1);
        compiler.evaluate(&mut build);
        assert_eq!(build.int("features.Fury Instinct"), 1);
        assert_eq!(
            build.int("validationNotes.selectableAllocation.Barbarian (Instinct)"),
            0
        );

        build.set_input("class", "Fighter");
        compiler.evaluate(&mut build);
        assert_eq!(build.value("features.Rage"), None);
        assert_eq!(build.value("hitPoints"), None);
    }

    #[test]
    fn removal_restores_dependent_attributes() {
        let mut compiler = compiler();
        let mut before = Build::new()
            .with_input("level", 3)
            .with_input("feats.Toughness", 1);
        compiler.evaluate(&mut before);
        let rules = compiler.engine().rule_count();

        compiler
            .compile_entity(&def(
                EntityKind::Feat,
                "Toughness",
                r#"Traits=General Effects="hitPoints += level""#,
            ))
            .expect("compiles");
        let mut during = before.clone();
        compiler.evaluate(&mut during);
        assert_eq!(during.int("hitPoints"), 3);
        assert_eq!(during.int("featsAssigned.General"), 1);

        compiler
            .remove_entity(EntityKind::Feat, "Toughness")
            .expect("removes");
        let mut after = before.clone();
        compiler.evaluate(&mut after);
        assert_eq!(after.derived(), before.derived());
        assert_eq!(compiler.engine().rule_count(), rules);
        assert!(compiler.entry(EntityKind::Feat, "Toughness").is_none());
    }

    #[test]
    fn shadowing_and_restore() {
        let mut compiler = compiler();
        compiler
            .compile_entity(&def(EntityKind::Ancestry, "Dwarf", "HitPoints=10 Speed=20"))
            .expect("compiles");
        compiler
            .compile_entity(&def(EntityKind::Ancestry, "Dwarf", "HitPoints=12 Speed=25"))
            .expect("compiles");

        let mut build = Build::new()
            .with_input("level", 1)
            .with_input("ancestry", "Dwarf");
        compiler.evaluate(&mut build);
        assert_eq!(build.int("hitPoints"), 12);

        compiler
            .remove_entity(EntityKind::Ancestry, "Dwarf")
            .expect("removes");
        compiler.evaluate(&mut build);
        assert_eq!(build.int("hitPoints"), 10);
        assert_eq!(build.int("speed"), 20);

        compiler
            .remove_entity(EntityKind::Ancestry, "Dwarf")
            .expect("removes");
        assert!(matches!(
            compiler.remove_entity(EntityKind::Ancestry, "Dwarf"),
            Err(CompileError::NotFound { .. })
        ));
    }

    #[test]
    fn guard_suppresses_replaced_feature() {
        let mut compiler = compiler();
        compiler
            .compile_entity(&def(
                EntityKind::Class,
                "Rogue",
                r#"Features="1:Sneak Attack""#,
            ))
            .expect("compiles");
        compiler
            .compile_entity(&def(
                EntityKind::Feature,
                "Precise Strike",
                "Replaces=Sneak Attack",
            ))
            .expect("compiles");

        let mut build = Build::new()
            .with_input("level", 1)
            .with_input("class", "Rogue");
        compiler.evaluate(&mut build);
        assert_eq!(build.int("features.Sneak Attack"), 1);

        build.set_input("features.Precise Strike", 1);
        compiler.evaluate(&mut build);
        assert_eq!(build.value("features.Sneak Attack"), None);
    }

    #[test]
    fn bad_field_does_not_block_the_rest() {
        let mut compiler = compiler();
        compiler
            .compile_entity(&def(
                EntityKind::Ancestry,
                "Elf",
                r#"HitPoints=six Speed=30 Ranks="Lore Trained (Elves)""#,
            ))
            .expect("compiles");

        let fields: Vec<&str> = compiler
            .diagnostics()
            .iter()
            .map(|d| d.field.as_str())
            .collect();
        assert_eq!(fields, vec!["HitPoints", "Ranks"]);

        let mut build = Build::new()
            .with_input("level", 1)
            .with_input("ancestry", "Elf");
        compiler.evaluate(&mut build);
        assert_eq!(build.int("speed"), 30);
        assert_eq!(build.value("hitPoints"), None);
    }

    #[test]
    fn undefined_attribute_aborts_entity() {
        let mut compiler = compiler();
        let rules = compiler.engine().rule_count();
        let result = compiler.compile_entity(&def(
            EntityKind::Feat,
            "Odd",
            r#"Traits=General Require="mana >= 3""#,
        ));
        let Err(CompileError::UndefinedAttribute { path, .. }) = &result else {
            panic!("unexpected result: {:?}", result);
        };
        assert_eq!(path, "mana");
        assert_eq!(compiler.engine().rule_count(), rules);
        assert!(compiler.definition(EntityKind::Feat, "Odd").is_none());
    }

    #[test]
    fn empty_selectable_group_is_an_error() {
        let mut compiler = compiler();
        let result = compiler.compile_entity(&def(
            EntityKind::Class,
            "Sorcerer",
            r#"Features="1:Bloodline Magic" Selectables=Bloodline:1"#,
        ));
        assert!(matches!(
            result,
            Err(CompileError::EmptySelectableGroup { ref group, .. }) if group == "Bloodline"
        ));
    }

    #[test]
    fn cycle_rolls_back_and_keeps_previous_definition() {
        let mut compiler = compiler();
        compiler
            .compile_entity(&def(
                EntityKind::Feat,
                "Loop",
                r#"Traits=General Effects="speed += 5""#,
            ))
            .expect("compiles");
        let rules = compiler.engine().rule_count();

        // speed reads hitPoints and hitPoints reads speed.
        let result = compiler.compile_entity(&def(
            EntityKind::Feat,
            "Loop",
            r#"Traits=General Effects="speed += hitPoints","hitPoints += speed""#,
        ));
        assert!(matches!(result, Err(CompileError::Evaluation(_))));
        assert_eq!(compiler.engine().rule_count(), rules);
        assert_eq!(
            compiler
                .definition(EntityKind::Feat, "Loop")
                .map(|d| d.attributes.as_str()),
            Some(r#"Traits=General Effects="speed += 5""#)
        );

        let mut build = Build::new()
            .with_input("level", 1)
            .with_input("feats.Loop", 1);
        compiler.evaluate(&mut build);
        assert_eq!(build.value("speed"), Some(&Value::Int(5)));
    }

    #[test]
    fn requirement_signals_count_unmet_alternatives() {
        let mut compiler = compiler();
        compiler
            .compile_entity(&def(
                EntityKind::Feat,
                "Sudden Charge",
                r#"Traits=Class,Barbarian Level=1 Require="features.Rage || rank.Athletics >= 2""#,
            ))
            .expect("compiles");

        let mut build = Build::new()
            .with_input("level", 1)
            .with_input("feats.Sudden Charge", 1);
        compiler.evaluate(&mut build);
        assert_eq!(build.int("validationNotes.feat.Sudden Charge"), 2);
        assert_eq!(build.int("featsAssigned.Class"), 1);

        build.set_input("features.Rage", 1);
        compiler.evaluate(&mut build);
        assert_eq!(build.int("validationNotes.feat.Sudden Charge"), 0);

        let spec = compiler
            .signal("validationNotes.feat.Sudden Charge")
            .expect("registered");
        assert!(matches!(
            &spec.kind,
            SignalKind::Requirement { subject: Some(s), .. } if s == "feats.Sudden Charge"
        ));
    }
}
