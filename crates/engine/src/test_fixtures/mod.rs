//! Test fixtures loader for JSON fixture files and common test helpers.
//!
//! Fixtures live in the `test_data/` directory. `catalog.json` is a small
//! but complete catalog: three ancestries, four classes (one caster, one
//! with a selectable group), feats for every slot category, skills,
//! languages, deities, spells and equipment.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_fixtures::sample_compiler;
//!
//! #[test]
//! fn fighter_gets_hit_points() {
//!     let compiler = sample_compiler();
//!     // ... test logic
//! }
//! ```

use std::path::PathBuf;

use buildwright_domain::EntityDefinition;

use crate::infrastructure::evaluator::SheetEvaluator;
use crate::infrastructure::settings::EngineSettings;
use crate::use_cases::compile::RuleCompiler;

// =============================================================================
// Fixture Loading
// =============================================================================

/// Load a JSON fixture from test_data/ directory.
///
/// # Panics
///
/// Panics if the fixture file cannot be read or parsed.
pub fn load_fixture<T: serde::de::DeserializeOwned>(path: &str) -> T {
    let fixture_path = fixture_path(path);
    let content = std::fs::read_to_string(&fixture_path).unwrap_or_else(|e| {
        panic!("Failed to read fixture '{}': {}", fixture_path.display(), e)
    });
    serde_json::from_str(&content).unwrap_or_else(|e| {
        panic!("Failed to parse fixture '{}': {}", fixture_path.display(), e)
    })
}

fn fixture_path(path: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("test_data")
        .join(path)
}

// =============================================================================
// Catalog Fixtures
// =============================================================================

/// The sample catalog.
pub fn load_catalog() -> Vec<EntityDefinition> {
    load_fixture("catalog.json")
}

/// A compiler with the core rules and `definitions` compiled in order.
///
/// # Panics
///
/// Panics if any definition fails to compile.
pub fn compiler_with(settings: EngineSettings, definitions: &[EntityDefinition]) -> RuleCompiler {
    let mut compiler =
        RuleCompiler::new(Box::new(SheetEvaluator::new()), settings).expect("core rules compile");
    for definition in definitions {
        compiler
            .compile_entity(definition)
            .unwrap_or_else(|e| {
                panic!("{} {} failed to compile: {}", definition.kind, definition.name, e)
            });
    }
    compiler
}

/// Default settings and the whole sample catalog.
pub fn sample_compiler() -> RuleCompiler {
    compiler_with(EngineSettings::default(), &load_catalog())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_catalog_has_every_kind() {
        let catalog = load_catalog();
        for kind in buildwright_domain::EntityKind::ALL {
            assert!(catalog.iter().any(|d| d.kind == kind), "no {} in catalog", kind);
        }
    }
}
