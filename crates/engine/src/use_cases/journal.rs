//! Input edits made by the generators, recorded so they can be undone.

use serde::Serialize;

use buildwright_domain::{Build, Value};

/// One input attribute change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Mutation {
    pub attr: String,
    pub before: Option<Value>,
    pub after: Option<Value>,
}

/// Ordered log of input edits with rollback to any earlier mark.
#[derive(Debug, Default)]
pub struct Journal {
    mutations: Vec<Mutation>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set (or with `None`, remove) an input and record the change.
    ///
    /// Writing the value the input already holds records nothing.
    pub fn set(&mut self, build: &mut Build, attr: &str, value: Option<Value>) {
        let before = match &value {
            Some(v) => build.set_input(attr, v.clone()),
            None => build.remove_input(attr),
        };
        if before != value {
            self.mutations.push(Mutation {
                attr: attr.to_string(),
                before,
                after: value,
            });
        }
    }

    /// Add `delta` to an integer input, removing it when it reaches zero.
    pub fn bump(&mut self, build: &mut Build, attr: &str, delta: i64) {
        let next = build.input_int(attr) + delta;
        let value = (next != 0).then_some(Value::Int(next));
        self.set(build, attr, value);
    }

    pub fn mark(&self) -> usize {
        self.mutations.len()
    }

    /// Undo every change recorded after `mark`, newest first.
    pub fn rollback_to(&mut self, build: &mut Build, mark: usize) {
        while self.mutations.len() > mark {
            let Some(mutation) = self.mutations.pop() else {
                break;
            };
            match mutation.before {
                Some(v) => {
                    build.set_input(mutation.attr, v);
                }
                None => {
                    build.remove_input(&mutation.attr);
                }
            }
        }
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_restores_previous_inputs() {
        let mut build = Build::new().with_input("class", "Fighter");
        let mut journal = Journal::new();

        journal.set(&mut build, "class", Some(Value::text("Wizard")));
        let mark = journal.mark();
        journal.bump(&mut build, "feats.Toughness", 1);
        journal.set(&mut build, "class", None);
        assert_eq!(journal.mutations().len(), 3);

        journal.rollback_to(&mut build, mark);
        assert_eq!(build.input("class"), Some(&Value::text("Wizard")));
        assert!(!build.has_input("feats.Toughness"));
        assert_eq!(journal.mutations().len(), 1);
    }

    #[test]
    fn unchanged_writes_are_not_recorded() {
        let mut build = Build::new().with_input("level", 3);
        let mut journal = Journal::new();
        journal.set(&mut build, "level", Some(Value::Int(3)));
        journal.bump(&mut build, "skillIncreases.Athletics", 0);
        assert!(journal.is_empty());
    }
}
