//! Expression evaluation.

use buildwright_domain::{AttrId, Value};

use crate::infrastructure::ports::{BinaryOp, Expr};

/// Attribute values visible to an expression.
pub(super) trait Scope {
    fn value(&self, id: AttrId) -> Option<&Value>;

    /// Set values of every attribute named `<prefix>.*`.
    fn prefix_values(&self, prefix: &str) -> Vec<&Value>;
}

pub(super) fn eval(expr: &Expr, source: &Value, scope: &dyn Scope) -> Option<Value> {
    let eval_inner = |inner: &Expr| eval(inner, source, scope);

    match expr {
        Expr::Source => Some(source.clone()),
        Expr::Const(value) => Some(value.clone()),
        Expr::Attr(id) => scope.value(*id).cloned(),
        Expr::Unset => None,
        Expr::Not(inner) => Some(flag(!truthy(&eval_inner(inner)))),
        Expr::Neg(inner) => eval_inner(inner).map(|v| Value::Int(v.numeric().saturating_neg())),
        Expr::Truthy(inner) => Some(flag(truthy(&eval_inner(inner)))),
        Expr::IsSet(inner) => Some(flag(eval_inner(inner).is_some())),
        Expr::Binary { op, lhs, rhs } => binary(*op, eval_inner(lhs), eval_inner(rhs)),
        Expr::Matches {
            operand,
            pattern,
            negated,
        } => {
            let text = eval_inner(operand)
                .map(|v| v.to_string())
                .unwrap_or_default();
            Some(flag(pattern.is_match(&text) != *negated))
        }
        Expr::If {
            cond,
            then,
            otherwise,
        } => {
            if truthy(&eval_inner(cond)) {
                eval_inner(then)
            } else {
                eval_inner(otherwise)
            }
        }
        Expr::CountTruthy { prefix } => {
            let count = scope
                .prefix_values(prefix)
                .into_iter()
                .filter(|v| v.is_truthy())
                .count();
            Some(Value::Int(count as i64))
        }
        Expr::SumPrefix { prefix } => {
            let values = scope.prefix_values(prefix);
            if values.is_empty() {
                None
            } else {
                Some(Value::Int(values.into_iter().map(Value::numeric).sum()))
            }
        }
    }
}

fn binary(op: BinaryOp, lhs: Option<Value>, rhs: Option<Value>) -> Option<Value> {
    let arithmetic = matches!(
        op,
        BinaryOp::Add
            | BinaryOp::Sub
            | BinaryOp::Mul
            | BinaryOp::Div
            | BinaryOp::Min
            | BinaryOp::Max
    );
    if arithmetic && lhs.is_none() && rhs.is_none() {
        return None;
    }

    let zero = Value::Int(0);
    let a = lhs.as_ref().unwrap_or(&zero);
    let b = rhs.as_ref().unwrap_or(&zero);
    let (x, y) = (a.numeric(), b.numeric());

    let value = match op {
        BinaryOp::Add => a.add(b),
        BinaryOp::Sub => Value::Int(x.saturating_sub(y)),
        BinaryOp::Mul => Value::Int(x.saturating_mul(y)),
        BinaryOp::Div => Value::Int(floor_div(x, y)?),
        BinaryOp::Min => Value::Int(x.min(y)),
        BinaryOp::Max => Value::Int(x.max(y)),
        BinaryOp::Eq => flag(a.loosely_equals(b)),
        BinaryOp::Ne => flag(!a.loosely_equals(b)),
        BinaryOp::Ge => flag(x >= y),
        BinaryOp::Le => flag(x <= y),
        BinaryOp::Gt => flag(x > y),
        BinaryOp::Lt => flag(x < y),
        BinaryOp::And => flag(truthy(&lhs) && truthy(&rhs)),
        BinaryOp::Or => flag(truthy(&lhs) || truthy(&rhs)),
    };
    Some(value)
}

fn floor_div(x: i64, y: i64) -> Option<i64> {
    if y == 0 {
        return None;
    }
    let q = x / y;
    if x % y != 0 && ((x < 0) != (y < 0)) {
        Some(q - 1)
    } else {
        Some(q)
    }
}

fn truthy(value: &Option<Value>) -> bool {
    value.as_ref().is_some_and(Value::is_truthy)
}

fn flag(on: bool) -> Value {
    Value::from(on)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Pattern;
    use std::collections::BTreeMap;

    struct Fixed(BTreeMap<u32, Value>, Vec<(String, Value)>);

    impl Scope for Fixed {
        fn value(&self, id: AttrId) -> Option<&Value> {
            self.0.get(&id.to_u32())
        }

        fn prefix_values(&self, prefix: &str) -> Vec<&Value> {
            self.1
                .iter()
                .filter(|(name, _)| name.starts_with(&format!("{}.", prefix)))
                .map(|(_, v)| v)
                .collect()
        }
    }

    fn scope() -> Fixed {
        let mut values = BTreeMap::new();
        values.insert(0, Value::Int(7));
        values.insert(1, Value::text("Neutral Good"));
        Fixed(
            values,
            vec![
                ("feats.A".to_string(), Value::Int(1)),
                ("feats.B".to_string(), Value::Int(0)),
                ("feats.C".to_string(), Value::Int(1)),
                ("featsAssigned".to_string(), Value::Int(9)),
            ],
        )
    }

    fn run(expr: Expr) -> Option<Value> {
        eval(&expr, &Value::Int(5), &scope())
    }

    #[test]
    fn arithmetic_treats_unset_as_zero() {
        let level = Expr::attr(AttrId::new(0));
        let missing = Expr::attr(AttrId::new(9));
        assert_eq!(
            run(Expr::binary(BinaryOp::Add, level.clone(), missing.clone())),
            Some(Value::Int(7))
        );
        let both_missing = Expr::binary(BinaryOp::Add, missing.clone(), missing.clone());
        assert_eq!(run(both_missing), None);
        assert_eq!(
            run(Expr::binary(BinaryOp::Sub, missing, Expr::Source)),
            Some(Value::Int(-5))
        );
    }

    #[test]
    fn division_floors() {
        assert_eq!(floor_div(7, 2), Some(3));
        assert_eq!(floor_div(-1, 2), Some(-1));
        assert_eq!(floor_div(-4, 2), Some(-2));
        assert_eq!(floor_div(1, 0), None);
    }

    #[test]
    fn conditions_and_comparisons() {
        let cond = Expr::binary(BinaryOp::Ge, Expr::Source, Expr::int(3));
        assert_eq!(
            run(Expr::if_then(cond, Expr::int(1), Expr::Unset)),
            Some(Value::Int(1))
        );
        let cond = Expr::binary(BinaryOp::Ge, Expr::Source, Expr::int(6));
        assert_eq!(run(Expr::if_then(cond, Expr::int(1), Expr::Unset)), None);
        assert_eq!(
            run(Expr::not(Expr::attr(AttrId::new(9)))),
            Some(Value::Int(1))
        );
        assert_eq!(
            run(Expr::IsSet(Box::new(Expr::attr(AttrId::new(9))))),
            Some(Value::Int(0))
        );
    }

    #[test]
    fn pattern_matching() {
        let expr = Expr::Matches {
            operand: Box::new(Expr::attr(AttrId::new(1))),
            pattern: Pattern::new("Good").expect("valid"),
            negated: false,
        };
        assert_eq!(run(expr), Some(Value::Int(1)));
    }

    #[test]
    fn prefix_aggregates() {
        assert_eq!(
            run(Expr::CountTruthy {
                prefix: "feats".to_string()
            }),
            Some(Value::Int(2))
        );
        assert_eq!(
            run(Expr::SumPrefix {
                prefix: "feats".to_string()
            }),
            Some(Value::Int(2))
        );
        assert_eq!(
            run(Expr::SumPrefix {
                prefix: "spells".to_string()
            }),
            None
        );
    }
}
