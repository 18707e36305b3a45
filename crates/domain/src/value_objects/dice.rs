//! Dice formulas and rolling.
//!
//! Supports formulas like "4d6", "1d8+1", "3d6". Used for ability score
//! generation and for validating weapon damage fields in the catalog.
//! The random source is injected as a closure so the domain stays free of
//! any RNG dependency.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error when parsing a dice formula
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiceParseError {
    /// The formula string is empty
    #[error("Empty dice formula")]
    Empty,
    /// Invalid format - expected XdY or XdY+Z
    #[error("Invalid dice format: {0}")]
    InvalidFormat(String),
    /// Dice count must be at least 1
    #[error("Dice count must be at least 1")]
    InvalidDiceCount,
    /// Die size must be at least 2
    #[error("Die size must be at least 2")]
    InvalidDieSize,
}

/// A parsed dice formula like "2d6+3"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceFormula {
    /// Number of dice to roll (X in XdY)
    pub dice_count: u8,
    /// Size of each die (Y in XdY)
    pub die_size: u8,
    /// Modifier to add/subtract after rolling (+Z or -Z)
    pub modifier: i32,
}

impl DiceFormula {
    /// Create a new dice formula
    pub fn new(dice_count: u8, die_size: u8, modifier: i32) -> Result<Self, DiceParseError> {
        if dice_count == 0 {
            return Err(DiceParseError::InvalidDiceCount);
        }
        if die_size < 2 {
            return Err(DiceParseError::InvalidDieSize);
        }
        Ok(Self {
            dice_count,
            die_size,
            modifier,
        })
    }

    /// Parse `XdY`, `XdY+Z`, `XdY-Z` or `dY` (one die). Case and surrounding
    /// whitespace are ignored.
    pub fn parse(input: &str) -> Result<Self, DiceParseError> {
        let text = input.trim().to_lowercase();
        if text.is_empty() {
            return Err(DiceParseError::Empty);
        }
        let invalid = |what: &str, part: &str| {
            DiceParseError::InvalidFormat(format!("{} '{}' in '{}'", what, part, text))
        };

        let (count, rest) = text
            .split_once('d')
            .ok_or_else(|| invalid("missing 'd' separator", ""))?;
        let dice_count: u8 = match count {
            "" => 1,
            n => n.parse().map_err(|_| invalid("bad dice count", n))?,
        };

        // The modifier sign can only appear after at least one size digit.
        let sign = rest
            .char_indices()
            .skip(1)
            .find(|(_, c)| matches!(c, '+' | '-'));
        let (size, modifier) = match sign {
            Some((pos, sign)) => {
                let amount: i32 = rest[pos + 1..]
                    .parse()
                    .map_err(|_| invalid("bad modifier", &rest[pos..]))?;
                (&rest[..pos], if sign == '-' { -amount } else { amount })
            }
            None => (rest, 0),
        };
        let die_size: u8 = size.parse().map_err(|_| invalid("bad die size", size))?;

        Self::new(dice_count, die_size, modifier)
    }

    /// Roll every die using `roll_die(min, max)` (inclusive bounds).
    pub fn roll_with<F>(&self, mut roll_die: F) -> DiceRollResult
    where
        F: FnMut(i32, i32) -> i32,
    {
        let individual_rolls: Vec<i32> = (0..self.dice_count)
            .map(|_| roll_die(1, i32::from(self.die_size)))
            .collect();
        let dice_total: i32 = individual_rolls.iter().sum();

        DiceRollResult {
            formula: self.clone(),
            total: dice_total + self.modifier,
            individual_rolls,
            dice_total,
        }
    }

    /// Roll and sum only the `keep` highest dice ("4d6 drop lowest" keeps 3).
    pub fn roll_keep_highest<F>(&self, keep: usize, roll_die: F) -> DiceRollResult
    where
        F: FnMut(i32, i32) -> i32,
    {
        let mut result = self.roll_with(roll_die);
        let mut sorted = result.individual_rolls.clone();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        result.dice_total = sorted.iter().take(keep).sum();
        result.total = result.dice_total + self.modifier;
        result
    }
}

impl fmt::Display for DiceFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifier == 0 {
            write!(f, "{}d{}", self.dice_count, self.die_size)
        } else if self.modifier > 0 {
            write!(f, "{}d{}+{}", self.dice_count, self.die_size, self.modifier)
        } else {
            write!(f, "{}d{}{}", self.dice_count, self.die_size, self.modifier)
        }
    }
}

/// Result of rolling dice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiceRollResult {
    /// The formula that was rolled
    pub formula: DiceFormula,
    /// Individual die results
    pub individual_rolls: Vec<i32>,
    /// Sum of the kept dice before modifier
    pub dice_total: i32,
    /// Final total (dice_total + modifier)
    pub total: i32,
}
