//! The evaluation-engine port.
//!
//! The compiler registers rules through this trait and the generators
//! evaluate builds through it. [`crate::infrastructure::evaluator::SheetEvaluator`]
//! is the in-crate implementation; a host may supply its own.

use std::collections::BTreeMap;

use buildwright_domain::{AttrId, RuleId, Value};

use super::types::{DerivationRule, RuleOwner};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EvaluationError {
    #[error("Rule for '{target}' reading '{dependency}' would create a cycle")]
    Cycle { target: String, dependency: String },

    #[error("Unknown attribute handle {0}")]
    UnknownAttribute(AttrId),
}

pub trait EvaluationEngine: Send + Sync {
    /// Handle for an attribute name, allocating a slot on first use.
    fn intern(&mut self, name: &str) -> AttrId;

    fn lookup(&self, name: &str) -> Option<AttrId>;

    fn name(&self, id: AttrId) -> Option<&str>;

    /// Register a rule. Rejects rules that would close a dependency cycle,
    /// leaving the engine unchanged.
    fn define_rule(&mut self, rule: DerivationRule) -> Result<RuleId, EvaluationError>;

    /// Retract every rule registered by `owner`; returns how many were removed.
    fn remove_rules(&mut self, owner: &RuleOwner) -> usize;

    /// Rules currently registered by `owner`, in registration order.
    fn rules_of(&self, owner: &RuleOwner) -> Vec<DerivationRule>;

    fn rule_count(&self) -> usize;

    /// Evaluate every derived attribute from the given inputs.
    ///
    /// The result holds every set attribute, inputs included.
    fn evaluate(&self, inputs: &BTreeMap<String, Value>) -> BTreeMap<String, Value>;
}
