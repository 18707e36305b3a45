//! Build - the attribute mapping for one character in progress.
//!
//! A build holds two maps:
//! - **inputs**: direct choices made by the player (or the generator)
//! - **derived**: the last snapshot produced by the evaluation engine
//!
//! Generators only ever mutate inputs. The derived snapshot is refreshed
//! after each mutation through [`Build::refresh`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::signal::{Severity, ViolationSignal};
use crate::value_objects::Value;

/// One character build.
///
/// Fields are private: the derived snapshot must only come from the evaluator,
/// and inputs are edited through the setters so callers can track mutations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    inputs: BTreeMap<String, Value>,
    #[serde(default)]
    derived: BTreeMap<String, Value>,
}

impl Build {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style input setter.
    pub fn with_input(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.inputs.insert(name.into(), value.into());
        self
    }

    // =========================================================================
    // Inputs
    // =========================================================================

    pub fn input(&self, name: &str) -> Option<&Value> {
        self.inputs.get(name)
    }

    /// Integer view of an input; unset or non-numeric reads as 0.
    pub fn input_int(&self, name: &str) -> i64 {
        self.inputs.get(name).map(Value::numeric).unwrap_or(0)
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    /// Set an input and return its previous value.
    pub fn set_input(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.inputs.insert(name.into(), value.into())
    }

    /// Remove an input and return its previous value.
    pub fn remove_input(&mut self, name: &str) -> Option<Value> {
        self.inputs.remove(name)
    }

    pub fn inputs(&self) -> &BTreeMap<String, Value> {
        &self.inputs
    }

    /// Inputs under `prefix.`, yielding the suffix after the dot.
    pub fn inputs_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        with_prefix(&self.inputs, prefix)
    }

    // =========================================================================
    // Derived snapshot
    // =========================================================================

    /// Replace the derived snapshot with a fresh evaluation result.
    ///
    /// Inputs are never touched here.
    pub fn refresh(&mut self, derived: BTreeMap<String, Value>) {
        self.derived = derived;
    }

    pub fn derived(&self) -> &BTreeMap<String, Value> {
        &self.derived
    }

    /// Current value of an attribute: derived snapshot first, then inputs.
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.derived.get(name).or_else(|| self.inputs.get(name))
    }

    /// Integer view of [`Build::value`]; unset reads as 0.
    pub fn int(&self, name: &str) -> i64 {
        self.value(name).map(Value::numeric).unwrap_or(0)
    }

    /// Derived attributes under `prefix.`, yielding the suffix after the dot.
    pub fn derived_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
        with_prefix(&self.derived, prefix)
    }

    /// Non-zero violation signals in the derived snapshot, ordered by name.
    pub fn violations(&self) -> Vec<ViolationSignal> {
        self.derived
            .iter()
            .filter_map(|(name, value)| {
                let severity = Severity::of(name)?;
                let value = value.numeric();
                (value != 0).then(|| ViolationSignal {
                    name: name.clone(),
                    severity,
                    value,
                })
            })
            .collect()
    }
}

fn with_prefix<'a>(
    map: &'a BTreeMap<String, Value>,
    prefix: &'a str,
) -> impl Iterator<Item = (&'a str, &'a Value)> + 'a {
    map.iter().filter_map(move |(name, value)| {
        name.strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('.'))
            .map(|suffix| (suffix, value))
    })
}
