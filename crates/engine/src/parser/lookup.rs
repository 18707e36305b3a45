//! Direct requirement evaluation against a [`Build`] snapshot.

use buildwright_domain::{Build, Value};

use super::requirement::{AttributeLookup, ChoiceDomain};

impl AttributeLookup for Build {
    fn value(&self, path: &str) -> Option<Value> {
        Build::value(self, path).cloned()
    }

    /// `any` ranges over chosen feats, `any <Sub>` over feats carrying trait
    /// `<Sub>`; bare list items name feats unless they are already paths.
    fn domain_paths(&self, domain: &ChoiceDomain) -> Vec<String> {
        match domain {
            ChoiceDomain::List(items) => items
                .iter()
                .map(|item| {
                    if item.contains('.') {
                        item.clone()
                    } else {
                        format!("feats.{}", item)
                    }
                })
                .collect(),
            ChoiceDomain::Any => self
                .inputs_with_prefix("feats")
                .map(|(name, _)| format!("feats.{}", name))
                .collect(),
            ChoiceDomain::AnyOf(sub) => {
                let prefix = format!("featTraits.{}", sub);
                self.derived_with_prefix(&prefix)
                    .map(|(name, _)| format!("{}.{}", prefix, name))
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Requirement;
    use std::collections::BTreeMap;

    #[test]
    fn build_answers_requirements() {
        let mut build = Build::new()
            .with_input("level", 5)
            .with_input("feats.Toughness", 1)
            .with_input("feats.Assurance", 1);
        let mut derived = BTreeMap::new();
        derived.insert("level".to_string(), Value::Int(5));
        derived.insert("featTraits.Skill.Assurance".to_string(), Value::Int(1));
        build.refresh(derived);

        let req = |text: &str| Requirement::parse(text).expect("parses");
        assert!(req("level >= 5").is_satisfied(&build));
        assert!(req("Choose 2 from any").is_satisfied(&build));
        assert!(req("Choose 1 from any Skill").is_satisfied(&build));
        assert!(!req("Choose 2 from any Skill").is_satisfied(&build));
        assert!(req("Choose 1 from Fleet, Toughness").is_satisfied(&build));
    }
}
