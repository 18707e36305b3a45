//! Rank and selection phrases: `<Group> <Step>[ (<item>; <item>; ...)]`.
//!
//! Examples:
//! - `Skill Trained (Athletics, Acrobatics; Choose 2 from any)`
//! - `Save Expert (Fortitude)`
//! - `Perception Trained`
//! - `Ability Boost (Strength; Choose 1 from any)`

use std::fmt;
use std::str::FromStr;

use buildwright_domain::ProficiencyRank;

use super::requirement::{strip_keyword, ChoiceDomain};
use super::split::{find_top_level, split_on, split_whitespace, unwrap_item};
use super::ParseError;

/// What a phrase raises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RankGroup {
    Skill,
    Save,
    Perception,
    Armor,
    Attack,
    Ability,
}

impl RankGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skill => "Skill",
            Self::Save => "Save",
            Self::Perception => "Perception",
            Self::Armor => "Armor",
            Self::Attack => "Attack",
            Self::Ability => "Ability",
        }
    }

    /// Rank-slot name for one item of this group (`Light` → `Light Armor`).
    pub fn target_name(&self, item: &str) -> String {
        match self {
            Self::Armor if !item.ends_with(" Armor") && item != "Unarmored" => {
                format!("{} Armor", item)
            }
            Self::Attack if !item.ends_with(" Weapons") && item != "Unarmed" => {
                format!("{} Weapons", item)
            }
            _ => item.to_string(),
        }
    }
}

impl fmt::Display for RankGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RankGroup {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Skill" | "Skills" => Ok(Self::Skill),
            "Save" | "Saves" => Ok(Self::Save),
            "Perception" => Ok(Self::Perception),
            "Armor" => Ok(Self::Armor),
            "Attack" | "Attacks" | "Weapon" | "Weapons" => Ok(Self::Attack),
            "Ability" | "Abilities" => Ok(Self::Ability),
            other => Err(ParseError::UnknownGroup(other.to_string())),
        }
    }
}

/// How far a phrase raises its targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankStep {
    Rank(ProficiencyRank),
    /// Ability boost (+2 to a score); only valid for [`RankGroup::Ability`].
    Boost,
}

/// One target (or set of targets) of a phrase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RankItem {
    Name(String),
    Choose { count: u32, domain: ChoiceDomain },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RankPhrase {
    pub group: RankGroup,
    pub step: RankStep,
    pub items: Vec<RankItem>,
}

impl RankPhrase {
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let text = unwrap_item(input);
        if text.is_empty() {
            return Err(ParseError::Empty("rank phrase"));
        }

        let (head, list) = match text.find('(') {
            Some(pos) if text.ends_with(')') => {
                (&text[..pos], Some(&text[pos + 1..text.len() - 1]))
            }
            Some(_) => return Err(ParseError::malformed("rank phrase", text)),
            None => (text, None),
        };
        // Validates the whole phrase, not just the head.
        find_top_level(text, "(")?;

        let words = split_whitespace(head)?;
        let (group_word, step_word) = match words.as_slice() {
            [group, step] => (*group, *step),
            _ => return Err(ParseError::malformed("rank phrase", text)),
        };
        let group: RankGroup = group_word.parse()?;
        let step = parse_step(group, step_word)?;

        let items = match list {
            Some(list) => parse_items(list)?,
            None => Vec::new(),
        };
        if items.is_empty() && group != RankGroup::Perception {
            return Err(ParseError::Empty("rank phrase item list"));
        }

        Ok(Self { group, step, items })
    }
}

fn parse_step(group: RankGroup, word: &str) -> Result<RankStep, ParseError> {
    if word.eq_ignore_ascii_case("Boost") {
        return match group {
            RankGroup::Ability => Ok(RankStep::Boost),
            _ => Err(ParseError::UnknownRank(word.to_string())),
        };
    }
    if group == RankGroup::Ability {
        return Err(ParseError::UnknownRank(word.to_string()));
    }
    match word.parse::<ProficiencyRank>() {
        Ok(ProficiencyRank::Untrained) | Err(_) => Err(ParseError::UnknownRank(word.to_string())),
        Ok(rank) => Ok(RankStep::Rank(rank)),
    }
}

fn parse_items(list: &str) -> Result<Vec<RankItem>, ParseError> {
    let mut items = Vec::new();
    for entry in split_on(list, ";")? {
        if let Some(rest) = strip_keyword(entry, "Choose") {
            items.push(parse_choose_item(rest, entry)?);
            continue;
        }
        for name in split_on(entry, ",")? {
            let name = unwrap_item(name);
            if !name.is_empty() {
                items.push(RankItem::Name(name.to_string()));
            }
        }
    }
    Ok(items)
}

fn parse_choose_item(rest: &str, whole: &str) -> Result<RankItem, ParseError> {
    let (count_text, after) = rest
        .split_once(char::is_whitespace)
        .ok_or_else(|| ParseError::malformed("choice", whole))?;
    let count: u32 = count_text
        .parse()
        .ok()
        .filter(|n| *n > 0)
        .ok_or_else(|| ParseError::InvalidCount(count_text.to_string()))?;
    let domain = strip_keyword(after.trim_start(), "from")
        .ok_or_else(|| ParseError::malformed("choice", whole))?;
    Ok(RankItem::Choose {
        count,
        domain: ChoiceDomain::parse(domain)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_phrase_with_names_and_choice() {
        let phrase =
            RankPhrase::parse("Skill Trained (Athletics, Acrobatics; Choose 2 from any)")
                .expect("parses");
        assert_eq!(phrase.group, RankGroup::Skill);
        assert_eq!(phrase.step, RankStep::Rank(ProficiencyRank::Trained));
        assert_eq!(
            phrase.items,
            vec![
                RankItem::Name("Athletics".to_string()),
                RankItem::Name("Acrobatics".to_string()),
                RankItem::Choose {
                    count: 2,
                    domain: ChoiceDomain::Any
                },
            ]
        );
    }

    #[test]
    fn perception_needs_no_items() {
        let phrase = RankPhrase::parse("Perception Expert").expect("parses");
        assert_eq!(phrase.step, RankStep::Rank(ProficiencyRank::Expert));
        assert!(phrase.items.is_empty());
    }

    #[test]
    fn ability_boost_phrase() {
        let phrase = RankPhrase::parse("Ability Boost (Strength; Choose 1 from Dexterity, Wisdom)")
            .expect("parses");
        assert_eq!(phrase.step, RankStep::Boost);
        assert_eq!(
            phrase.items[1],
            RankItem::Choose {
                count: 1,
                domain: ChoiceDomain::List(vec!["Dexterity".to_string(), "Wisdom".to_string()])
            }
        );
    }

    #[test]
    fn target_names() {
        assert_eq!(RankGroup::Armor.target_name("Light"), "Light Armor");
        assert_eq!(RankGroup::Armor.target_name("Unarmored"), "Unarmored");
        assert_eq!(RankGroup::Attack.target_name("Martial"), "Martial Weapons");
        assert_eq!(RankGroup::Save.target_name("Will"), "Will");
    }

    #[test]
    fn errors() {
        assert_eq!(
            RankPhrase::parse("Skill Grandmaster (Athletics)"),
            Err(ParseError::UnknownRank("Grandmaster".to_string()))
        );
        assert_eq!(
            RankPhrase::parse("Lore Trained (Warfare)"),
            Err(ParseError::UnknownGroup("Lore".to_string()))
        );
        assert_eq!(
            RankPhrase::parse("Skill Boost (Athletics)"),
            Err(ParseError::UnknownRank("Boost".to_string()))
        );
        assert_eq!(
            RankPhrase::parse("Skill Trained (Choose x from any)"),
            Err(ParseError::InvalidCount("x".to_string()))
        );
        assert_eq!(
            RankPhrase::parse("Skill Trained"),
            Err(ParseError::Empty("rank phrase item list"))
        );
        assert!(matches!(
            RankPhrase::parse("Skill Trained (Athletics"),
            Err(ParseError::Malformed { .. }) | Err(ParseError::UnbalancedDelimiter(_))
        ));
    }
}
