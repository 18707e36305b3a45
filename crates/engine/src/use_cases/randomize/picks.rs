//! Counted picks: feats, languages, spells, selectable features, equipment.

use buildwright_domain::{Build, EntityKind, Selection};

use super::Randomizer;
use crate::infrastructure::random::{chance, shuffle};
use crate::use_cases::compile::{fits_slot, AllocationKind, SignalKind, FEAT_CATEGORIES};
use crate::use_cases::journal::Journal;

/// Odds of carrying a shield, in percent.
const SHIELD_CHANCE: i32 = 50;

impl Randomizer<'_> {
    /// Draw `attrs` in random order, setting each to 1, until `kind` is met.
    fn fill_from(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        kind: &AllocationKind,
        mut attrs: Vec<String>,
    ) {
        if self.outstanding(build, kind) == 0 {
            return;
        }
        shuffle(self.random, &mut attrs);
        let attempts = self.settings().max_draw_attempts as usize;
        for attr in attrs.into_iter().take(attempts) {
            if self.outstanding(build, kind) == 0 {
                return;
            }
            self.try_pick(build, journal, attr);
        }
        if self.outstanding(build, kind) > 0 {
            tracing::debug!(allocation = %kind.signal_name(), "Candidate pool exhausted");
        }
    }

    /// Open allocations of the kinds `select` accepts, in signal-name order.
    fn open_allocations<F>(&self, build: &Build, select: F) -> Vec<AllocationKind>
    where
        F: Fn(&AllocationKind) -> bool,
    {
        self.compiler
            .signals()
            .filter_map(|spec| match &spec.kind {
                SignalKind::Allocation(kind) if select(kind) => Some(kind.clone()),
                _ => None,
            })
            .filter(|kind| self.outstanding(build, kind) > 0)
            .collect()
    }

    // =========================================================================
    // Feats
    // =========================================================================

    /// Fill the feat slots category by category, most specific first.
    ///
    /// Feats already chosen count toward their slot before anything new is drawn.
    pub(super) fn fill_feats(&self, build: &mut Build, journal: &mut Journal) {
        for category in FEAT_CATEGORIES {
            self.fill_feat_slots(build, journal, category);
        }
    }

    pub(super) fn fill_feat_slots(&self, build: &mut Build, journal: &mut Journal, category: &str) {
        let kind = AllocationKind::Feats(category.to_string());
        let level = build.int("level");
        let candidates = self
            .compiler
            .entries_of(EntityKind::Feat)
            .filter(|e| {
                e.slot_category
                    .as_deref()
                    .is_some_and(|c| fits_slot(c, category))
            })
            .filter(|e| e.level.map_or(true, |l| i64::from(l) <= level))
            .filter(|e| !self.is_chosen(build, EntityKind::Feat, &e.name))
            .filter_map(|e| EntityKind::Feat.selection().input_attr(&e.name))
            .collect();
        self.fill_from(build, journal, &kind, candidates);
    }

    fn is_chosen(&self, build: &Build, kind: EntityKind, name: &str) -> bool {
        kind.selection()
            .input_attr(name)
            .and_then(|attr| build.input(&attr).map(|v| v.is_truthy()))
            .unwrap_or(false)
    }

    // =========================================================================
    // Languages
    // =========================================================================

    pub(crate) fn fill_languages(&self, build: &mut Build, journal: &mut Journal) {
        let candidates = self
            .compiler
            .entries_of(EntityKind::Language)
            .filter(|e| !self.is_chosen(build, EntityKind::Language, &e.name))
            .filter(|e| build.int(&format!("languagesGranted.{}", e.name)) == 0)
            .filter_map(|e| EntityKind::Language.selection().input_attr(&e.name))
            .collect();
        self.fill_from(build, journal, &AllocationKind::Languages, candidates);
    }

    // =========================================================================
    // Spells
    // =========================================================================

    pub(super) fn fill_spells(&self, build: &mut Build, journal: &mut Journal) {
        let groups = self.open_allocations(build, |k| matches!(k, AllocationKind::Spells(_)));
        for kind in groups {
            if let AllocationKind::Spells(group) = kind {
                self.fill_spell_group(build, journal, &group);
            }
        }
    }

    pub(super) fn fill_spell_group(&self, build: &mut Build, journal: &mut Journal, group: &str) {
        let candidates = self
            .compiler
            .entries_of(EntityKind::Spell)
            .filter(|e| e.spell_groups().iter().any(|g| g == group))
            .filter(|e| !self.is_chosen(build, EntityKind::Spell, &e.name))
            .filter_map(|e| EntityKind::Spell.selection().input_attr(&e.name))
            .collect();
        let kind = AllocationKind::Spells(group.to_string());
        self.fill_from(build, journal, &kind, candidates);
    }

    // =========================================================================
    // Selectable features
    // =========================================================================

    pub(super) fn fill_selectables(&self, build: &mut Build, journal: &mut Journal) {
        let groups =
            self.open_allocations(build, |k| matches!(k, AllocationKind::Selectable { .. }));
        for kind in groups {
            if let AllocationKind::Selectable {
                kind,
                entity,
                group,
            } = kind
            {
                self.fill_selectable_group(build, journal, kind, &entity, &group);
            }
        }
    }

    pub(super) fn fill_selectable_group(
        &self,
        build: &mut Build,
        journal: &mut Journal,
        kind: EntityKind,
        entity: &str,
        group: &str,
    ) {
        let Some(options) = self
            .compiler
            .entry(kind, entity)
            .and_then(|e| e.selectables.get(group))
        else {
            return;
        };
        let candidates = options
            .iter()
            .map(|o| format!("selectableFeatures.{}", o.name))
            .filter(|attr| !build.input(attr).is_some_and(|v| v.is_truthy()))
            .collect();
        let allocation = AllocationKind::Selectable {
            kind,
            entity: entity.to_string(),
            group: group.to_string(),
        };
        self.fill_from(build, journal, &allocation, candidates);
    }

    // =========================================================================
    // Equipment
    // =========================================================================

    /// Armor, the configured number of weapons, and sometimes a shield.
    ///
    /// Equipment the character is not proficient with raises a sanity signal
    /// and is rejected like any other worsening draw.
    pub(super) fn fill_equipment(&self, build: &mut Build, journal: &mut Journal) {
        self.fill_single(build, journal, EntityKind::Armor);

        let Selection::Multi(prefix) = EntityKind::Weapon.selection() else {
            return;
        };
        let carried = build
            .inputs_with_prefix(prefix)
            .filter(|(_, v)| v.is_truthy())
            .count();
        let wanted = (self.settings().starting_weapon_count as usize).saturating_sub(carried);
        if wanted > 0 {
            let mut weapons: Vec<String> = self
                .compiler
                .entries_of(EntityKind::Weapon)
                .filter(|e| !self.is_chosen(build, EntityKind::Weapon, &e.name))
                .filter_map(|e| EntityKind::Weapon.selection().input_attr(&e.name))
                .collect();
            shuffle(self.random, &mut weapons);
            let attempts = self.settings().max_draw_attempts as usize;
            let mut added = 0;
            for attr in weapons.into_iter().take(attempts) {
                if added == wanted {
                    break;
                }
                if self.try_pick(build, journal, attr) {
                    added += 1;
                }
            }
        }

        if !build.has_input("shield") && chance(self.random, SHIELD_CHANCE) {
            self.fill_single(build, journal, EntityKind::Shield);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::random::{FixedRandom, SeededRandom};
    use crate::infrastructure::settings::EngineSettings;
    use crate::test_fixtures::compiler_with;
    use buildwright_domain::{EntityDefinition, Value};

    fn feat(name: &str, attributes: &str) -> EntityDefinition {
        EntityDefinition::new(EntityKind::Feat, name, attributes)
    }

    fn spell(name: &str, attributes: &str) -> EntityDefinition {
        EntityDefinition::new(EntityKind::Spell, name, attributes)
    }

    #[test]
    fn feats_skip_unmet_prerequisites() {
        let catalog = [
            EntityDefinition::new(EntityKind::Class, "Fighter", "FeatSlots=Class:1"),
            feat("Power Attack", "Traits=Class,Fighter"),
            feat(
                "Sudden Charge",
                r#"Traits=Class,Fighter Require="scores.strength >= 20""#,
            ),
            feat("Combat Grab", "Traits=Class,Fighter Level=2"),
        ];
        let compiler = compiler_with(EngineSettings::default(), &catalog);
        for seed in 0..6 {
            let random = SeededRandom::new(seed);
            let randomizer = Randomizer::new(&compiler, &random);
            let mut build = Build::new()
                .with_input("level", 1)
                .with_input("class", "Fighter")
                .with_input("strength", 12);
            compiler.evaluate(&mut build);

            randomizer.fill_feats(&mut build, &mut Journal::new());

            assert_eq!(
                build.input("feats.Power Attack"),
                Some(&Value::Int(1)),
                "seed {}",
                seed
            );
            assert!(!build.has_input("feats.Sudden Charge"));
            assert!(!build.has_input("feats.Combat Grab"));
            assert_eq!(build.int("validationNotes.featAllocation.Class"), 0);
        }
    }

    #[test]
    fn granted_languages_are_not_drawn() {
        let catalog = [
            EntityDefinition::new(EntityKind::Ancestry, "Dwarf", "Languages=Common,Dwarven"),
            EntityDefinition::new(EntityKind::Language, "Common", ""),
            EntityDefinition::new(EntityKind::Language, "Dwarven", ""),
            EntityDefinition::new(EntityKind::Language, "Elven", ""),
        ];
        let compiler = compiler_with(EngineSettings::default(), &catalog);
        let random = SeededRandom::new(8);
        let randomizer = Randomizer::new(&compiler, &random);
        let mut build = Build::new()
            .with_input("level", 1)
            .with_input("ancestry", "Dwarf")
            .with_input("intelligence", 14);
        compiler.evaluate(&mut build);
        assert_eq!(build.int("languageCount"), 2);

        randomizer.fill_languages(&mut build, &mut Journal::new());

        // Only Elven is left, so one pick stays open.
        assert_eq!(build.input("languages.Elven"), Some(&Value::Int(1)));
        assert_eq!(build.int("validationNotes.languageAllocation"), -1);
    }

    #[test]
    fn spell_groups_fill_from_matching_tradition() {
        let catalog = [
            EntityDefinition::new(
                EntityKind::Class,
                "Wizard",
                "Tradition=Arcane SpellSlots=Arcane1:1=2",
            ),
            spell("Magic Missile", "Level=1 Traditions=Arcane"),
            spell("Fear", "Level=1 Traditions=Arcane,Occult"),
            spell("Heal", "Level=1 Traditions=Divine"),
        ];
        let compiler = compiler_with(EngineSettings::default(), &catalog);
        let random = SeededRandom::new(13);
        let randomizer = Randomizer::new(&compiler, &random);
        let mut build = Build::new()
            .with_input("level", 1)
            .with_input("class", "Wizard");
        compiler.evaluate(&mut build);
        assert_eq!(build.int("spellSlots.Arcane1"), 2);

        randomizer.fill_spells(&mut build, &mut Journal::new());

        assert!(build.has_input("spells.Magic Missile"));
        assert!(build.has_input("spells.Fear"));
        assert!(!build.has_input("spells.Heal"));
        assert_eq!(build.int("validationNotes.spellAllocation.Arcane1"), 0);
    }

    #[test]
    fn unproficient_armor_is_rejected() {
        let catalog = [
            EntityDefinition::new(
                EntityKind::Class,
                "Wizard",
                r#"Ranks="Armor Trained (Unarmored)""#,
            ),
            EntityDefinition::new(
                EntityKind::Armor,
                "Full Plate",
                "Category=Heavy AC=6 MaxDex=0",
            ),
        ];
        let settings = EngineSettings {
            starting_weapon_count: 0,
            ..EngineSettings::default()
        };
        let compiler = compiler_with(settings, &catalog);
        let random = FixedRandom(100);
        let randomizer = Randomizer::new(&compiler, &random);
        let mut build = Build::new()
            .with_input("level", 1)
            .with_input("class", "Wizard");
        compiler.evaluate(&mut build);

        randomizer.fill_equipment(&mut build, &mut Journal::new());

        assert!(!build.has_input("armor"));
        assert!(!build.has_input("shield"));
    }
}
