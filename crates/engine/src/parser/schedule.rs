//! Slot schedules on class entities.
//!
//! - Feat slots: `Class:1;2;4` grants one Class feat slot at levels 1, 2 and 4.
//! - Spell slots: `Arcane1:1=2;3=3` gives two Arcane1 slots from level 1 and
//!   three from level 3.

use super::split::split_on;
use super::ParseError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatSlotSchedule {
    pub category: String,
    pub levels: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpellSlotSchedule {
    pub group: String,
    /// `(level, slots)` pairs sorted by level.
    pub steps: Vec<(u32, i64)>,
}

impl FeatSlotSchedule {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let (category, rest) = split_head(input, "feat slots")?;
        let levels = split_on(rest, ";")?
            .into_iter()
            .map(parse_level)
            .collect::<Result<Vec<_>, _>>()?;
        if levels.is_empty() {
            return Err(ParseError::Empty("feat slot schedule"));
        }
        Ok(Self {
            category: category.to_string(),
            levels,
        })
    }
}

impl SpellSlotSchedule {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let (group, rest) = split_head(input, "spell slots")?;
        let mut steps = Vec::new();
        for step in split_on(rest, ";")? {
            let (level, count) = step
                .split_once('=')
                .ok_or_else(|| ParseError::MissingEquals(step.to_string()))?;
            let count = count.trim();
            let count: i64 = count
                .parse()
                .ok()
                .filter(|n| *n >= 0)
                .ok_or_else(|| ParseError::InvalidCount(count.to_string()))?;
            steps.push((parse_level(level)?, count));
        }
        if steps.is_empty() {
            return Err(ParseError::Empty("spell slot schedule"));
        }
        steps.sort_by_key(|(level, _)| *level);
        Ok(Self {
            group: group.to_string(),
            steps,
        })
    }
}

fn split_head<'a>(input: &'a str, what: &'static str) -> Result<(&'a str, &'a str), ParseError> {
    let (head, rest) = input
        .split_once(':')
        .ok_or_else(|| ParseError::malformed(what, input))?;
    let head = head.trim();
    if head.is_empty() {
        return Err(ParseError::malformed(what, input));
    }
    Ok((head, rest))
}

fn parse_level(text: &str) -> Result<u32, ParseError> {
    let text = text.trim();
    text.parse()
        .ok()
        .filter(|level| *level >= 1)
        .ok_or_else(|| ParseError::InvalidLevel(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feat_slots() {
        let schedule = FeatSlotSchedule::parse("Class:1;2;4").expect("parses");
        assert_eq!(schedule.category, "Class");
        assert_eq!(schedule.levels, vec![1, 2, 4]);
    }

    #[test]
    fn spell_slots_are_sorted() {
        let schedule = SpellSlotSchedule::parse("Arcane1:3=3;1=2").expect("parses");
        assert_eq!(schedule.group, "Arcane1");
        assert_eq!(schedule.steps, vec![(1, 2), (3, 3)]);
    }

    #[test]
    fn errors() {
        assert_eq!(
            FeatSlotSchedule::parse("Class:1;x"),
            Err(ParseError::InvalidLevel("x".to_string()))
        );
        assert_eq!(
            FeatSlotSchedule::parse("Class:0"),
            Err(ParseError::InvalidLevel("0".to_string()))
        );
        assert!(matches!(
            FeatSlotSchedule::parse("Class"),
            Err(ParseError::Malformed { .. })
        ));
        assert_eq!(
            SpellSlotSchedule::parse("Arcane1:1"),
            Err(ParseError::MissingEquals("1".to_string()))
        );
        assert_eq!(
            SpellSlotSchedule::parse("Arcane1:1=-2"),
            Err(ParseError::InvalidCount("-2".to_string()))
        );
    }
}
