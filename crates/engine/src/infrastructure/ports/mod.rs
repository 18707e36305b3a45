//! Port traits for infrastructure boundaries.
//!
//! Ports exist for:
//! - Rule evaluation (the host may supply its own spreadsheet engine)
//! - Random (for testing)

mod evaluation;
mod testing;
pub mod types;

pub use evaluation::{EvaluationEngine, EvaluationError};
pub use testing::RandomPort;
#[cfg(test)]
pub use testing::MockRandomPort;
pub use types::{BinaryOp, CombineOp, DerivationRule, Expr, RuleOwner};
