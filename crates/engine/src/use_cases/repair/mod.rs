//! Constraint repair.
//!
//! Drives a complete build toward zero violation signals in bounded passes.
//! Each pass scans the non-zero signals in name order, applies one fix per
//! signal and re-evaluates after every fix. An attribute changed during a
//! pass is not changed again until the next pass, so two signals cannot
//! flip the same input back and forth.
//!
//! Running out of passes is not an error: the caller gets the partially
//! repaired build and the residual signals.

mod fixes;

use std::collections::BTreeSet;

use serde::Serialize;

use buildwright_domain::{Build, Severity, ViolationSignal};

use crate::infrastructure::ports::RandomPort;
use crate::use_cases::compile::RuleCompiler;
use crate::use_cases::journal::{Journal, Mutation};

/// Result of one repair run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepairOutcome {
    /// Signals still non-zero after the last pass, ordered by name.
    pub residual: Vec<ViolationSignal>,
    pub passes_used: u32,
    pub mutations: Vec<Mutation>,
}

impl RepairOutcome {
    pub fn is_valid(&self) -> bool {
        self.residual.is_empty()
    }
}

pub struct RepairEngine<'a> {
    compiler: &'a RuleCompiler,
    random: &'a dyn RandomPort,
}

/// Inputs changed in the current pass.
pub(crate) type Touched = BTreeSet<String>;

impl<'a> RepairEngine<'a> {
    pub fn new(compiler: &'a RuleCompiler, random: &'a dyn RandomPort) -> Self {
        Self { compiler, random }
    }

    pub fn repair(&self, build: &mut Build) -> RepairOutcome {
        let mut journal = Journal::new();
        let max_passes = self.compiler.settings().max_repair_passes;
        let mut passes_used = 0;

        self.compiler.evaluate(build);
        for pass in 0..max_passes {
            let targets = self.targets(build);
            if targets.is_empty() {
                break;
            }
            passes_used += 1;
            tracing::debug!(pass, signals = targets.len(), "Repair pass");

            let mark = journal.mark();
            let mut touched = Touched::new();
            for signal in targets {
                // An earlier fix this pass may already have cleared it.
                if build.int(&signal.name) == 0 {
                    continue;
                }
                let Some(spec) = self.compiler.signal(&signal.name) else {
                    continue;
                };
                self.fix(build, &mut journal, spec, &mut touched);
                self.compiler.evaluate(build);
            }

            if journal.mark() == mark {
                tracing::debug!(pass, "Repair pass changed nothing, stopping");
                break;
            }
        }

        let residual = build.violations();
        if residual.is_empty() {
            tracing::debug!(passes_used, "Build repaired");
        } else {
            tracing::info!(
                passes_used,
                residual = residual.len(),
                "Repair finished with violations remaining"
            );
        }
        RepairOutcome {
            residual,
            passes_used,
            mutations: journal.into_mutations(),
        }
    }

    /// Signals this engine is allowed to act on, ordered by name.
    fn targets(&self, build: &Build) -> Vec<ViolationSignal> {
        let sanity = self.compiler.settings().repair_sanity_signals;
        build
            .violations()
            .into_iter()
            .filter(|s| s.severity == Severity::Validation || sanity)
            .filter(|s| self.compiler.signal(&s.name).is_some())
            .collect()
    }
}
