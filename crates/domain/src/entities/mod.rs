//! Domain entities - catalog definitions, builds and their signals

mod build;
mod entity_definition;
mod signal;

pub use build::Build;
pub use entity_definition::{EntityDefinition, EntityKind, Selection};
pub use signal::{Severity, ViolationSignal};
