//! Infrastructure implementations.
//!
//! Contains the reference evaluation engine, port traits, randomness and
//! configuration.

pub mod evaluator;
pub mod ports;
pub mod random;
pub mod settings;
