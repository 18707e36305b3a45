//! Buildwright Engine library.
//!
//! Compiles catalog entities into dependency-tracked rules, fills open build
//! choices at random, and repairs builds that break their rules.
//!
//! ## Structure
//!
//! - `parser/` - the catalog mini-language
//! - `infrastructure/` - evaluation engine, ports, randomness and settings
//! - `use_cases/` - compile, randomize and repair

pub mod infrastructure;
pub mod parser;
pub mod use_cases;

/// Test fixtures module for catalog-driven tests.
#[cfg(test)]
pub mod test_fixtures;

pub use use_cases::BuildUseCases;
