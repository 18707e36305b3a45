//! Lowering parsed catalog fragments into evaluator expressions.

use buildwright_domain::Value;

use crate::infrastructure::ports::{BinaryOp, EvaluationEngine, Expr};
use crate::parser::{ChoiceDomain, CompareOp, Conjunct, Formula, FormulaOp, Requirement};

/// 1 while the requirement holds, else 0.
pub fn requirement_holds(engine: &mut dyn EvaluationEngine, requirement: &Requirement) -> Expr {
    requirement
        .alternatives
        .iter()
        .map(|alt| {
            alt.conjuncts
                .iter()
                .map(|c| conjunct_holds(engine, c))
                .reduce(Expr::and)
                .unwrap_or_else(|| Expr::int(1))
        })
        .reduce(|a, b| Expr::binary(BinaryOp::Or, a, b))
        .unwrap_or_else(|| Expr::int(1))
}

/// Signal contribution: 0 when satisfied, else the alternative count.
pub fn requirement_penalty(engine: &mut dyn EvaluationEngine, requirement: &Requirement) -> Expr {
    let alternatives = i64::try_from(requirement.alternatives.len()).unwrap_or(i64::MAX);
    Expr::if_then(
        requirement_holds(engine, requirement),
        Expr::int(0),
        Expr::int(alternatives),
    )
}

fn conjunct_holds(engine: &mut dyn EvaluationEngine, conjunct: &Conjunct) -> Expr {
    match conjunct {
        Conjunct::Compare { path, op, literal } => {
            let op = match op {
                CompareOp::Ge => BinaryOp::Ge,
                CompareOp::Le => BinaryOp::Le,
                CompareOp::Eq => BinaryOp::Eq,
                CompareOp::Ne => BinaryOp::Ne,
            };
            Expr::binary(op, path_expr(engine, path), Expr::Const(literal.clone()))
        }
        Conjunct::Matches {
            path,
            pattern,
            negated,
        } => Expr::Matches {
            operand: Box::new(path_expr(engine, path)),
            pattern: pattern.clone(),
            negated: *negated,
        },
        Conjunct::Truthy { path, negated } => {
            let value = path_expr(engine, path);
            if *negated {
                Expr::not(value)
            } else {
                Expr::truthy(value)
            }
        }
        Conjunct::Choose { count, domain } => Expr::binary(
            BinaryOp::Ge,
            domain_count(engine, domain),
            Expr::int(i64::from(*count)),
        ),
    }
}

/// Number of truthy members of a feat choice domain.
fn domain_count(engine: &mut dyn EvaluationEngine, domain: &ChoiceDomain) -> Expr {
    match domain {
        ChoiceDomain::Any => Expr::CountTruthy {
            prefix: "feats".to_string(),
        },
        ChoiceDomain::AnyOf(sub) => Expr::CountTruthy {
            prefix: format!("featTraits.{}", sub),
        },
        ChoiceDomain::List(items) => Expr::sum(
            items
                .iter()
                .map(|item| path_expr(engine, &domain_item_path(item)))
                .map(Expr::truthy)
                .collect::<Vec<_>>(),
        ),
    }
}

/// Attribute path for one item of a feat choice list.
pub fn domain_item_path(item: &str) -> String {
    if item.contains('.') {
        item.to_string()
    } else {
        format!("feats.{}", item)
    }
}

fn path_expr(engine: &mut dyn EvaluationEngine, path: &str) -> Expr {
    Expr::attr(engine.intern(path))
}

/// Effect formulas; `source` stays the rule's source value.
pub fn formula_expr(engine: &mut dyn EvaluationEngine, formula: &Formula) -> Expr {
    match formula {
        Formula::Int(n) => Expr::Const(Value::Int(*n)),
        Formula::Path(path) => path_expr(engine, path),
        Formula::Source => Expr::Source,
        Formula::Neg(inner) => Expr::neg(formula_expr(engine, inner)),
        Formula::Binary { op, lhs, rhs } => {
            let op = match op {
                FormulaOp::Add => BinaryOp::Add,
                FormulaOp::Sub => BinaryOp::Sub,
                FormulaOp::Mul => BinaryOp::Mul,
                FormulaOp::Div => BinaryOp::Div,
                FormulaOp::Min => BinaryOp::Min,
                FormulaOp::Max => BinaryOp::Max,
            };
            let lhs = formula_expr(engine, lhs);
            let rhs = formula_expr(engine, rhs);
            Expr::binary(op, lhs, rhs)
        }
    }
}

/// `2 * rank + level` once trained, else 0.
pub fn proficiency_expr(rank: Expr, level: Expr) -> Expr {
    Expr::if_then(
        Expr::binary(BinaryOp::Ge, rank.clone(), Expr::int(1)),
        Expr::binary(
            BinaryOp::Add,
            Expr::binary(BinaryOp::Mul, rank, Expr::int(2)),
            level,
        ),
        Expr::int(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::evaluator::SheetEvaluator;
    use crate::infrastructure::ports::{CombineOp, DerivationRule, RuleOwner};
    use std::collections::BTreeMap;

    fn check(requirement: &str, inputs: &[(&str, Value)]) -> Option<Value> {
        let mut engine = SheetEvaluator::new();
        let requirement = Requirement::parse(requirement).expect("parses");
        let expr = requirement_penalty(&mut engine, &requirement);
        let target = engine.intern("validationNotes.test");
        let source = engine.intern("gate");
        engine
            .define_rule(DerivationRule {
                target,
                source,
                op: CombineOp::Add,
                expr,
                owner: RuleOwner::Core,
            })
            .expect("acyclic");
        let mut map: BTreeMap<String, Value> = inputs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        map.insert("gate".to_string(), Value::Int(1));
        engine.evaluate(&map).get("validationNotes.test").cloned()
    }

    #[test]
    fn penalties_count_alternatives() {
        let level = |n| [("level", Value::Int(n))];
        assert_eq!(check("level >= 5", &level(5)), Some(Value::Int(0)));
        assert_eq!(check("level >= 5", &level(4)), Some(Value::Int(1)));

        let either = "features.Rage || rank.Athletics >= 2";
        assert_eq!(check(either, &[]), Some(Value::Int(2)));
        let trained = [("rank.Athletics", Value::Int(2))];
        assert_eq!(check(either, &trained), Some(Value::Int(0)));

        let good = [("alignment", Value::text("Neutral Good"))];
        assert_eq!(check("alignment =~ 'Good'", &good), Some(Value::Int(0)));

        let two = [("feats.A", Value::Int(1)), ("feats.B", Value::Int(1))];
        assert_eq!(check("Choose 2 from any", &two), Some(Value::Int(0)));
        let fleet = "Choose 1 from Fleet, Toughness";
        let unchosen = [("feats.Fleet", Value::Int(0))];
        assert_eq!(check(fleet, &unchosen), Some(Value::Int(1)));
    }

    #[test]
    fn formulas_lower_arithmetic() {
        let mut engine = SheetEvaluator::new();
        let formula = Formula::parse("max(source, 3) + level / 2").expect("parses");
        let expr = formula_expr(&mut engine, &formula);
        let level = engine.lookup("level").expect("interned");
        assert_eq!(expr.attrs(), vec![level]);
    }
}
