//! Use cases - the operations a host drives.
//!
//! - `compile`: catalog entities into rules and signals
//! - `randomize`: fill the open choices of a build
//! - `repair`: drive a build toward zero violation signals
//!
//! [`BuildUseCases`] bundles them over one compiler and one random source.

pub mod compile;
pub mod journal;
pub mod randomize;
pub mod repair;

use std::sync::Arc;

use buildwright_domain::{Build, EntityDefinition, EntityKind, ViolationSignal};

use crate::infrastructure::evaluator::SheetEvaluator;
use crate::infrastructure::ports::RandomPort;
use crate::infrastructure::random::random_source;
use crate::infrastructure::settings::EngineSettings;

pub use compile::{CompileError, RuleCompiler};
pub use journal::Mutation;
pub use randomize::{RandomCategory, RandomizeOutcome, Randomizer};
pub use repair::{RepairEngine, RepairOutcome};

/// Container for the build operations.
pub struct BuildUseCases {
    compiler: RuleCompiler,
    random: Arc<dyn RandomPort>,
}

impl BuildUseCases {
    pub fn new(compiler: RuleCompiler, random: Arc<dyn RandomPort>) -> Self {
        Self { compiler, random }
    }

    /// In-crate evaluator, and the random source the settings ask for.
    pub fn from_settings(settings: EngineSettings) -> Result<Self, CompileError> {
        let random = random_source(settings.seed);
        let compiler = RuleCompiler::new(Box::new(SheetEvaluator::new()), settings)?;
        Ok(Self::new(compiler, random))
    }

    pub fn compiler(&self) -> &RuleCompiler {
        &self.compiler
    }

    // =========================================================================
    // Catalog
    // =========================================================================

    /// Compile one entity given by kind name; returns the rule count.
    pub fn compile_entity(
        &mut self,
        kind: &str,
        name: &str,
        attributes: &str,
    ) -> Result<usize, CompileError> {
        let kind = parse_kind(kind)?;
        self.compiler
            .compile_entity(&EntityDefinition::new(kind, name, attributes))
    }

    /// Compile a whole catalog, continuing past failing entities.
    ///
    /// Returns the errors of the entities that did not compile.
    pub fn compile_catalog(&mut self, definitions: &[EntityDefinition]) -> Vec<CompileError> {
        let errors: Vec<CompileError> = definitions
            .iter()
            .filter_map(|definition| self.compiler.compile_entity(definition).err())
            .collect();
        tracing::info!(
            entities = definitions.len(),
            failed = errors.len(),
            rules = self.compiler.engine().rule_count(),
            "Compiled catalog"
        );
        errors
    }

    pub fn remove_entity(&mut self, kind: &str, name: &str) -> Result<(), CompileError> {
        let kind = parse_kind(kind)?;
        self.compiler.remove_entity(kind, name)
    }

    // =========================================================================
    // Builds
    // =========================================================================

    pub fn evaluate(&self, build: &mut Build) {
        self.compiler.evaluate(build);
    }

    pub fn randomize_attribute(
        &self,
        build: &mut Build,
        category: RandomCategory,
    ) -> RandomizeOutcome {
        Randomizer::new(&self.compiler, self.random.as_ref()).randomize(build, category)
    }

    pub fn randomize_all(&self, build: &mut Build) -> RandomizeOutcome {
        Randomizer::new(&self.compiler, self.random.as_ref()).randomize_all(build)
    }

    pub fn repair(&self, build: &mut Build) -> RepairOutcome {
        RepairEngine::new(&self.compiler, self.random.as_ref()).repair(build)
    }

    /// Repair and return the signals left over.
    pub fn repair_build(&self, build: &mut Build) -> Vec<ViolationSignal> {
        self.repair(build).residual
    }
}

fn parse_kind(kind: &str) -> Result<EntityKind, CompileError> {
    kind.parse()
        .map_err(|_| CompileError::UnknownKind(kind.to_string()))
}
