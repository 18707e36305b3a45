//! In-crate evaluation engine.
//!
//! A typed arena of attribute slots addressed by [`AttrId`], an explicit rule
//! dependency graph, and a topological scheduler. The order is computed lazily
//! after any change and reused by every evaluation until the next change.

mod expr;
mod graph;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

use buildwright_domain::{AttrId, RuleId, Value};

use crate::infrastructure::ports::{
    CombineOp, DerivationRule, EvaluationEngine, EvaluationError, RuleOwner,
};
use expr::Scope;

#[derive(Debug, Default)]
pub struct SheetEvaluator {
    names: Vec<String>,
    index: BTreeMap<String, AttrId>,
    rules: Vec<Option<DerivationRule>>,
    /// Rules per target slot, in registration order.
    by_target: Vec<Vec<RuleId>>,
    /// Rules reading a slot directly (as source or through `Expr::Attr`).
    readers: Vec<Vec<RuleId>>,
    /// Rules aggregating over a name prefix.
    prefix_readers: BTreeMap<String, Vec<RuleId>>,
    by_owner: BTreeMap<RuleOwner, Vec<RuleId>>,
    live_rules: usize,
    order: OnceLock<Vec<AttrId>>,
}

impl SheetEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn slot_count(&self) -> usize {
        self.names.len()
    }

    fn invalidate(&mut self) {
        self.order = OnceLock::new();
    }

    fn rule(&self, id: RuleId) -> Option<&DerivationRule> {
        self.rules.get(id.index()).and_then(Option::as_ref)
    }

    /// Slots named `<prefix>.*`.
    fn prefix_members<'a>(&'a self, prefix: &str) -> impl Iterator<Item = AttrId> + 'a {
        let start = format!("{}.", prefix);
        self.index
            .range(start.clone()..)
            .take_while(move |(name, _)| name.starts_with(&start))
            .map(|(_, id)| *id)
    }

    /// Every slot a rule reads.
    fn dependencies(&self, rule: &DerivationRule) -> BTreeSet<AttrId> {
        let mut deps: BTreeSet<AttrId> = rule.expr.attrs().into_iter().collect();
        deps.insert(rule.source);
        for prefix in rule.expr.prefixes() {
            deps.extend(self.prefix_members(prefix));
        }
        deps
    }

    /// Targets of every rule that reads `attr`.
    fn dependents(&self, attr: AttrId) -> Vec<AttrId> {
        let mut out: Vec<AttrId> = self.readers[attr.index()]
            .iter()
            .filter_map(|id| self.rule(*id))
            .map(|rule| rule.target)
            .collect();
        let name = &self.names[attr.index()];
        for (prefix, ids) in &self.prefix_readers {
            if name.len() > prefix.len()
                && name.starts_with(prefix.as_str())
                && name.as_bytes()[prefix.len()] == b'.'
            {
                out.extend(ids.iter().filter_map(|id| self.rule(*id)).map(|r| r.target));
            }
        }
        out
    }

    fn slot_name(&self, id: AttrId) -> String {
        self.names
            .get(id.index())
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    fn combine(
        &self,
        rule_ids: &[RuleId],
        base: Option<Value>,
        scope: &Slots<'_>,
    ) -> Option<Value> {
        let mut set = None;
        let mut adds = Vec::new();
        let mut muls = Vec::new();
        let mut floors = Vec::new();
        let mut caps = Vec::new();

        for rule in rule_ids.iter().filter_map(|id| self.rule(*id)) {
            let Some(source) = scope.value(rule.source) else {
                continue;
            };
            let value = expr::eval(&rule.expr, source, scope);
            match (rule.op, value) {
                (CombineOp::Guard, value) => {
                    if !value.as_ref().is_some_and(Value::is_truthy) {
                        return None;
                    }
                }
                (_, None) => {}
                (CombineOp::Set, Some(v)) => set = Some(v),
                (CombineOp::Add, Some(v)) => adds.push(v),
                (CombineOp::Mul, Some(v)) => muls.push(v),
                (CombineOp::AtLeast, Some(v)) => floors.push(v),
                (CombineOp::AtMost, Some(v)) => caps.push(v),
            }
        }

        let mut result = set.or(base);
        for v in adds {
            result = Some(match result {
                Some(r) => r.add(&v),
                None => v,
            });
        }
        for v in muls {
            result = result.map(|r| Value::Int(r.numeric().saturating_mul(v.numeric())));
        }
        for v in floors {
            result = Some(match result {
                Some(r) if r.numeric() >= v.numeric() => r,
                _ => v,
            });
        }
        // A cap never creates a value.
        for v in caps {
            result = result.map(|r| if r.numeric() <= v.numeric() { r } else { v });
        }
        result
    }
}

struct Slots<'a> {
    evaluator: &'a SheetEvaluator,
    values: &'a [Option<Value>],
    /// Raw inputs; members never interned still count toward aggregates.
    inputs: &'a BTreeMap<String, Value>,
}

impl Scope for Slots<'_> {
    fn value(&self, id: AttrId) -> Option<&Value> {
        self.values.get(id.index()).and_then(Option::as_ref)
    }

    fn prefix_values(&self, prefix: &str) -> Vec<&Value> {
        let mut out: Vec<&Value> = self
            .evaluator
            .prefix_members(prefix)
            .filter_map(|id| self.value(id))
            .collect();
        let start = format!("{}.", prefix);
        out.extend(
            self.inputs
                .range(start.clone()..)
                .take_while(|(name, _)| name.starts_with(&start))
                .filter(|(name, _)| !self.evaluator.index.contains_key(*name))
                .map(|(_, value)| value),
        );
        out
    }
}

impl EvaluationEngine for SheetEvaluator {
    fn intern(&mut self, name: &str) -> AttrId {
        if let Some(id) = self.index.get(name) {
            return *id;
        }
        let id = AttrId::new(self.names.len() as u32);
        self.names.push(name.to_string());
        self.index.insert(name.to_string(), id);
        self.by_target.push(Vec::new());
        self.readers.push(Vec::new());
        // A new slot may join a prefix aggregate.
        self.invalidate();
        id
    }

    fn lookup(&self, name: &str) -> Option<AttrId> {
        self.index.get(name).copied()
    }

    fn name(&self, id: AttrId) -> Option<&str> {
        self.names.get(id.index()).map(String::as_str)
    }

    fn define_rule(&mut self, rule: DerivationRule) -> Result<RuleId, EvaluationError> {
        for id in std::iter::once(rule.target)
            .chain(std::iter::once(rule.source))
            .chain(rule.expr.attrs())
        {
            if id.index() >= self.names.len() {
                return Err(EvaluationError::UnknownAttribute(id));
            }
        }

        let deps = self.dependencies(&rule);
        if let Some(dep) = self.first_reachable(rule.target, &deps) {
            return Err(EvaluationError::Cycle {
                target: self.slot_name(rule.target),
                dependency: self.slot_name(dep),
            });
        }

        let id = RuleId::new(self.rules.len() as u32);
        self.by_target[rule.target.index()].push(id);
        let direct: BTreeSet<AttrId> = std::iter::once(rule.source)
            .chain(rule.expr.attrs())
            .collect();
        for attr in direct {
            self.readers[attr.index()].push(id);
        }
        let prefixes: BTreeSet<String> = rule
            .expr
            .prefixes()
            .into_iter()
            .map(str::to_string)
            .collect();
        for prefix in prefixes {
            self.prefix_readers.entry(prefix).or_default().push(id);
        }
        self.by_owner
            .entry(rule.owner.clone())
            .or_default()
            .push(id);
        self.rules.push(Some(rule));
        self.live_rules += 1;
        self.invalidate();
        Ok(id)
    }

    fn remove_rules(&mut self, owner: &RuleOwner) -> usize {
        let Some(ids) = self.by_owner.remove(owner) else {
            return 0;
        };
        let removed: BTreeSet<RuleId> = ids.iter().copied().collect();

        for id in &ids {
            let Some(rule) = self.rules.get_mut(id.index()).and_then(Option::take) else {
                continue;
            };
            self.by_target[rule.target.index()].retain(|r| !removed.contains(r));
            for attr in std::iter::once(rule.source).chain(rule.expr.attrs()) {
                self.readers[attr.index()].retain(|r| !removed.contains(r));
            }
            for prefix in rule.expr.prefixes() {
                if let Some(list) = self.prefix_readers.get_mut(prefix) {
                    list.retain(|r| !removed.contains(r));
                }
            }
            self.live_rules -= 1;
        }
        self.prefix_readers.retain(|_, list| !list.is_empty());
        self.invalidate();
        removed.len()
    }

    fn rules_of(&self, owner: &RuleOwner) -> Vec<DerivationRule> {
        self.by_owner
            .get(owner)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.rule(*id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    fn rule_count(&self) -> usize {
        self.live_rules
    }

    fn evaluate(&self, inputs: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
        let order = self.order.get_or_init(|| self.topological_order());
        let mut values: Vec<Option<Value>> = self
            .names
            .iter()
            .map(|name| inputs.get(name).cloned())
            .collect();

        for &attr in order {
            let rule_ids = &self.by_target[attr.index()];
            if rule_ids.is_empty() {
                continue;
            }
            let base = values[attr.index()].clone();
            let scope = Slots {
                evaluator: self,
                values: &values,
                inputs,
            };
            let value = self.combine(rule_ids, base, &scope);
            values[attr.index()] = value;
        }

        let mut out = inputs.clone();
        for (i, value) in values.into_iter().enumerate() {
            if self.by_target[i].is_empty() {
                continue;
            }
            match value {
                Some(v) => {
                    out.insert(self.names[i].clone(), v);
                }
                None => {
                    out.remove(&self.names[i]);
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::ports::{BinaryOp, Expr};
    use buildwright_domain::EntityKind;

    fn rule(target: AttrId, source: AttrId, op: CombineOp, expr: Expr) -> DerivationRule {
        DerivationRule {
            target,
            source,
            op,
            expr,
            owner: RuleOwner::Core,
        }
    }

    fn inputs(pairs: &[(&str, Value)]) -> BTreeMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn rules_fire_only_when_source_is_set() {
        let mut engine = SheetEvaluator::new();
        let level = engine.intern("level");
        let hp = engine.intern("hitPoints");
        let per_level = Expr::binary(BinaryOp::Mul, Expr::Source, Expr::int(8));
        engine
            .define_rule(rule(hp, level, CombineOp::Add, per_level))
            .expect("no cycle");

        let out = engine.evaluate(&inputs(&[("level", Value::Int(3))]));
        assert_eq!(out.get("hitPoints"), Some(&Value::Int(24)));

        let out = engine.evaluate(&inputs(&[]));
        assert_eq!(out.get("hitPoints"), None);
    }

    #[test]
    fn combination_order() {
        let mut engine = SheetEvaluator::new();
        let one = engine.intern("one");
        let target = engine.intern("target");
        let steps = [
            (CombineOp::Add, 4),
            (CombineOp::Add, 3),
            (CombineOp::Mul, 2),
            (CombineOp::AtMost, 12),
            (CombineOp::AtLeast, 20),
        ];
        for (op, n) in steps {
            engine
                .define_rule(rule(target, one, op, Expr::int(n)))
                .expect("ok");
        }

        // (10 + 4 + 3) * 2 = 34, raised to >= 20, capped at <= 12.
        let out = engine.evaluate(&inputs(&[
            ("one", Value::Int(1)),
            ("target", Value::Int(10)),
        ]));
        assert_eq!(out.get("target"), Some(&Value::Int(12)));

        let capped = engine.intern("capped");
        engine
            .define_rule(rule(capped, one, CombineOp::AtMost, Expr::int(3)))
            .expect("ok");
        let out = engine.evaluate(&inputs(&[("one", Value::Int(1))]));
        assert_eq!(out.get("capped"), None);
    }

    #[test]
    fn set_overrides_input_and_guard_suppresses() {
        let mut engine = SheetEvaluator::new();
        let granted = engine.intern("features.Rage");
        let replacement = engine.intern("features.Bloodrage");
        let level = engine.intern("level");
        let suppressed = Expr::not(Expr::Source);
        engine
            .define_rule(rule(granted, level, CombineOp::Set, Expr::int(1)))
            .expect("ok");
        engine
            .define_rule(rule(granted, replacement, CombineOp::Guard, suppressed))
            .expect("ok");

        let out = engine.evaluate(&inputs(&[("level", Value::Int(1))]));
        assert_eq!(out.get("features.Rage"), Some(&Value::Int(1)));

        let out = engine.evaluate(&inputs(&[
            ("level", Value::Int(1)),
            ("features.Bloodrage", Value::Int(1)),
        ]));
        assert_eq!(out.get("features.Rage"), None);
    }

    #[test]
    fn chains_evaluate_in_dependency_order() {
        let mut engine = SheetEvaluator::new();
        // Register the downstream rule first.
        let c = engine.intern("c");
        let b = engine.intern("b");
        let a = engine.intern("a");
        let plus_one = Expr::binary(BinaryOp::Add, Expr::Source, Expr::int(1));
        let doubled = Expr::binary(BinaryOp::Mul, Expr::Source, Expr::int(2));
        engine
            .define_rule(rule(c, b, CombineOp::Add, plus_one))
            .expect("ok");
        engine
            .define_rule(rule(b, a, CombineOp::Add, doubled))
            .expect("ok");

        let out = engine.evaluate(&inputs(&[("a", Value::Int(5))]));
        assert_eq!(out.get("b"), Some(&Value::Int(10)));
        assert_eq!(out.get("c"), Some(&Value::Int(11)));
    }

    #[test]
    fn cycle_is_rejected_and_engine_unchanged() {
        let mut engine = SheetEvaluator::new();
        let a = engine.intern("a");
        let b = engine.intern("b");
        engine
            .define_rule(rule(b, a, CombineOp::Add, Expr::Source))
            .expect("ok");

        let before = engine.rule_count();
        let err = engine
            .define_rule(rule(a, b, CombineOp::Add, Expr::Source))
            .expect_err("cycle");
        assert_eq!(
            err,
            EvaluationError::Cycle {
                target: "a".to_string(),
                dependency: "b".to_string()
            }
        );
        assert_eq!(engine.rule_count(), before);

        let self_loop = engine.define_rule(rule(a, a, CombineOp::Add, Expr::Source));
        assert!(matches!(self_loop, Err(EvaluationError::Cycle { .. })));
    }

    #[test]
    fn prefix_aggregates_track_new_slots() {
        let mut engine = SheetEvaluator::new();
        let level = engine.intern("level");
        let count = engine.intern("featsAssigned");
        let feats = Expr::CountTruthy {
            prefix: "feats".to_string(),
        };
        engine
            .define_rule(rule(count, level, CombineOp::Set, feats))
            .expect("ok");
        engine.intern("feats.Toughness");
        engine.intern("feats.Fleet");

        let out = engine.evaluate(&inputs(&[
            ("level", Value::Int(1)),
            ("feats.Toughness", Value::Int(1)),
            ("feats.Fleet", Value::Int(1)),
        ]));
        assert_eq!(out.get("featsAssigned"), Some(&Value::Int(2)));

        // A rule feeding a member of the prefix from the aggregate closes a loop.
        let fleet = engine.lookup("feats.Fleet").expect("interned");
        assert!(matches!(
            engine.define_rule(rule(fleet, count, CombineOp::Add, Expr::Source)),
            Err(EvaluationError::Cycle { .. })
        ));
    }

    #[test]
    fn prefix_aggregates_count_uninterned_inputs() {
        let mut engine = SheetEvaluator::new();
        let level = engine.intern("level");
        let count = engine.intern("languagesAssigned");
        let languages = Expr::CountTruthy {
            prefix: "languages".to_string(),
        };
        engine
            .define_rule(rule(count, level, CombineOp::Set, languages))
            .expect("ok");

        let out = engine.evaluate(&inputs(&[
            ("level", Value::Int(1)),
            ("languages.Elven", Value::Int(1)),
            ("languages.Dwarven", Value::Int(0)),
            ("languagesGranted.Common", Value::Int(1)),
        ]));
        assert_eq!(out.get("languagesAssigned"), Some(&Value::Int(1)));
    }

    #[test]
    fn remove_rules_by_owner() {
        let mut engine = SheetEvaluator::new();
        let level = engine.intern("level");
        let hp = engine.intern("hitPoints");
        let owner = RuleOwner::entity(EntityKind::Class, "Fighter");
        engine
            .define_rule(DerivationRule {
                target: hp,
                source: level,
                op: CombineOp::Add,
                expr: Expr::int(10),
                owner: owner.clone(),
            })
            .expect("ok");
        assert_eq!(engine.rules_of(&owner).len(), 1);

        assert_eq!(engine.remove_rules(&owner), 1);
        assert_eq!(engine.rule_count(), 0);
        assert!(engine.rules_of(&owner).is_empty());
        let out = engine.evaluate(&inputs(&[("level", Value::Int(1))]));
        assert_eq!(out.get("hitPoints"), None);
    }

    #[test]
    fn unknown_handles_are_rejected() {
        let mut engine = SheetEvaluator::new();
        let a = engine.intern("a");
        assert_eq!(
            engine.define_rule(rule(AttrId::new(42), a, CombineOp::Set, Expr::Source)),
            Err(EvaluationError::UnknownAttribute(AttrId::new(42)))
        );
    }
}
