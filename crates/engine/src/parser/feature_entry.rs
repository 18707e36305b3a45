//! Conditional feature entries: `[<cond> ? ]<level>:<name>[:<group>]`.

use super::requirement::Requirement;
use super::split::{find_top_level, unwrap_item};
use super::ParseError;

/// A feature granted at a level, optionally gated by a condition.
///
/// When `group` is set the entry is one option of a selectable group rather
/// than an unconditional grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureEntry {
    pub condition: Option<Requirement>,
    pub level: u32,
    pub name: String,
    pub group: Option<String>,
}

impl FeatureEntry {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let text = unwrap_item(input);
        if text.is_empty() {
            return Err(ParseError::Empty("feature entry"));
        }

        let (condition, rest) = match find_top_level(text, "?")? {
            Some(pos) => (Some(Requirement::parse(&text[..pos])?), text[pos + 1..].trim()),
            None => (None, text),
        };

        let mut parts = rest.splitn(3, ':').map(str::trim);
        let level_text = parts.next().unwrap_or_default();
        let name = parts
            .next()
            .map(unwrap_item)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| ParseError::malformed("feature entry", text))?;
        let group = parts
            .next()
            .map(unwrap_item)
            .filter(|group| !group.is_empty())
            .map(str::to_string);

        let level: u32 = level_text
            .parse()
            .map_err(|_| ParseError::InvalidLevel(level_text.to_string()))?;

        Ok(Self {
            condition,
            level,
            name: name.to_string(),
            group,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_entry() {
        let entry = FeatureEntry::parse("1:Rage").expect("parses");
        assert_eq!(entry.level, 1);
        assert_eq!(entry.name, "Rage");
        assert_eq!(entry.condition, None);
        assert_eq!(entry.group, None);
    }

    #[test]
    fn conditional_entry_with_group() {
        let entry =
            FeatureEntry::parse("features.Rage ? 3:Animal Instinct:Instinct").expect("parses");
        assert_eq!(entry.level, 3);
        assert_eq!(entry.name, "Animal Instinct");
        assert_eq!(entry.group.as_deref(), Some("Instinct"));
        let condition = entry.condition.expect("has condition");
        assert_eq!(condition.source, "features.Rage");
    }

    #[test]
    fn question_mark_inside_quotes_is_not_a_condition() {
        let entry = FeatureEntry::parse("alignment =~ 'Good?' ? 2:Smite").expect("parses");
        assert_eq!(entry.name, "Smite");
        assert!(entry.condition.is_some());
    }

    #[test]
    fn errors() {
        assert_eq!(
            FeatureEntry::parse("one:Rage"),
            Err(ParseError::InvalidLevel("one".to_string()))
        );
        assert!(matches!(
            FeatureEntry::parse("5"),
            Err(ParseError::Malformed { .. })
        ));
        assert_eq!(FeatureEntry::parse(""), Err(ParseError::Empty("feature entry")));
    }
}
