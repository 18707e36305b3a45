//! Rule vocabulary understood by the evaluation engine.

use buildwright_domain::{AttrId, EntityKind, Value};

use crate::parser::Pattern;

/// How a rule's value combines into its target.
///
/// Combination order for one target: any falsy `Guard` suppresses the
/// target; the last `Set` replaces the input value; then `Add` values sum,
/// `Mul` values multiply, `AtLeast` raises and `AtMost` caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CombineOp {
    Set,
    Add,
    Mul,
    AtLeast,
    AtMost,
    Guard,
}

/// Who registered a rule. Removing an owner retracts all of its rules.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RuleOwner {
    /// Rules every build carries, registered once.
    Core,
    Entity { kind: EntityKind, name: String },
}

impl RuleOwner {
    pub fn entity(kind: EntityKind, name: impl Into<String>) -> Self {
        Self::Entity {
            kind,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    /// Floor division; division by zero is unset.
    Div,
    Min,
    Max,
    Eq,
    Ne,
    Ge,
    Le,
    Gt,
    Lt,
    And,
    Or,
}

/// Expression evaluated when a rule fires.
///
/// Unset operands read as 0 in arithmetic and comparisons; arithmetic over
/// two unset operands stays unset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// The rule's source value.
    Source,
    Const(Value),
    Attr(AttrId),
    Unset,
    Not(Box<Expr>),
    Neg(Box<Expr>),
    /// 1 if truthy, else 0.
    Truthy(Box<Expr>),
    /// 1 if set, else 0.
    IsSet(Box<Expr>),
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Matches {
        operand: Box<Expr>,
        pattern: Pattern,
        negated: bool,
    },
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// Number of truthy attributes named `<prefix>.*`.
    CountTruthy { prefix: String },
    /// Sum of set attributes named `<prefix>.*`; unset when none are set.
    SumPrefix { prefix: String },
}

impl Expr {
    pub fn int(value: i64) -> Self {
        Self::Const(Value::Int(value))
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self::Const(Value::Text(value.into()))
    }

    pub fn attr(id: AttrId) -> Self {
        Self::Attr(id)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Self::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn if_then(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        Self::If {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
    }

    pub fn not(inner: Expr) -> Self {
        Self::Not(Box::new(inner))
    }

    pub fn neg(inner: Expr) -> Self {
        Self::Neg(Box::new(inner))
    }

    pub fn truthy(inner: Expr) -> Self {
        Self::Truthy(Box::new(inner))
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Self {
        Self::binary(BinaryOp::And, lhs, rhs)
    }

    /// Sum of expressions; `Const(0)` for an empty list.
    pub fn sum(terms: impl IntoIterator<Item = Expr>) -> Self {
        terms
            .into_iter()
            .reduce(|acc, term| Self::binary(BinaryOp::Add, acc, term))
            .unwrap_or_else(|| Self::int(0))
    }

    /// Attribute handles read by this expression.
    pub fn attrs(&self) -> Vec<AttrId> {
        let mut out = Vec::new();
        self.walk(&mut |expr| {
            if let Self::Attr(id) = expr {
                out.push(*id);
            }
        });
        out
    }

    /// Name prefixes aggregated by this expression.
    pub fn prefixes(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.walk(&mut |expr| match expr {
            Self::CountTruthy { prefix } | Self::SumPrefix { prefix } => out.push(prefix.as_str()),
            _ => {}
        });
        out
    }

    fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Self::Not(inner) | Self::Neg(inner) | Self::Truthy(inner) | Self::IsSet(inner) => {
                inner.walk(visit)
            }
            Self::Matches { operand, .. } => operand.walk(visit),
            Self::Binary { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Self::If {
                cond,
                then,
                otherwise,
            } => {
                cond.walk(visit);
                then.walk(visit);
                otherwise.walk(visit);
            }
            Self::Source
            | Self::Const(_)
            | Self::Attr(_)
            | Self::Unset
            | Self::CountTruthy { .. }
            | Self::SumPrefix { .. } => {}
        }
    }
}

/// `target ← combine(source, op, expr)`. Fires only while `source` is set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivationRule {
    pub target: AttrId,
    pub source: AttrId,
    pub op: CombineOp,
    pub expr: Expr,
    pub owner: RuleOwner,
}
