//! Proficiency ranks.
//!
//! Ranks are stored in builds as integers (`rank.Athletics = 2` means Expert)
//! so that requirements such as `rank.Athletics >= 2` compare numerically.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Proficiency ranks, ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProficiencyRank {
    /// Not trained
    Untrained,
    /// Basic training (+2 + level)
    Trained,
    /// Advanced training (+4 + level)
    Expert,
    /// Mastery (+6 + level)
    Master,
    /// Ultimate mastery (+8 + level)
    Legendary,
}

impl ProficiencyRank {
    /// Numeric value stored in `rank.*` attributes.
    pub fn value(&self) -> i64 {
        match self {
            Self::Untrained => 0,
            Self::Trained => 1,
            Self::Expert => 2,
            Self::Master => 3,
            Self::Legendary => 4,
        }
    }

    pub fn from_value(value: i64) -> Self {
        match value {
            i64::MIN..=0 => Self::Untrained,
            1 => Self::Trained,
            2 => Self::Expert,
            3 => Self::Master,
            _ => Self::Legendary,
        }
    }

    /// Get the rank bonus (before adding level).
    pub fn rank_bonus(&self) -> i64 {
        self.value() * 2
    }

    /// Calculate full proficiency bonus including level.
    pub fn proficiency_bonus(&self, level: i64) -> i64 {
        match self {
            Self::Untrained => 0, // Untrained doesn't add level
            _ => self.rank_bonus() + level,
        }
    }

    /// Highest rank a skill may reach at the given character level.
    pub fn max_for_level(level: i64) -> Self {
        if level >= 15 {
            Self::Legendary
        } else if level >= 7 {
            Self::Master
        } else {
            Self::Expert
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Untrained => "Untrained",
            Self::Trained => "Trained",
            Self::Expert => "Expert",
            Self::Master => "Master",
            Self::Legendary => "Legendary",
        }
    }
}

impl fmt::Display for ProficiencyRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ProficiencyRank {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "Untrained" => Ok(Self::Untrained),
            "Trained" => Ok(Self::Trained),
            "Expert" => Ok(Self::Expert),
            "Master" => Ok(Self::Master),
            "Legendary" => Ok(Self::Legendary),
            _ => Err(DomainError::parse(format!("Unknown proficiency rank: {}", s))),
        }
    }
}
