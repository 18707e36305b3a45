//! Engine configuration.
//!
//! Every bound the generators rely on (repair passes, draw attempts, rerolls)
//! lives here rather than as an embedded constant. The library never reads the
//! environment itself; hosts call [`EngineSettings::from_env`] when they want
//! `BUILDWRIGHT_*` overrides.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use buildwright_domain::DomainError;

/// How base ability scores are produced for a fresh build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AbilityGeneration {
    /// Roll 4d6, keep the highest three.
    FourD6DropLowest,
    /// Roll 3d6.
    ThreeD6,
    /// Shuffle [`STANDARD_ARRAY`] across the six abilities.
    StandardArray,
    /// Every score is 10; boosts do all the work.
    AllTens,
}

pub const STANDARD_ARRAY: [i64; 6] = [15, 14, 13, 12, 10, 8];

impl AbilityGeneration {
    /// Legal base-score range for this method (inclusive).
    pub fn score_range(&self) -> (i64, i64) {
        match self {
            Self::FourD6DropLowest | Self::ThreeD6 => (3, 18),
            Self::StandardArray => (8, 15),
            Self::AllTens => (10, 10),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FourD6DropLowest => "four_d6_drop_lowest",
            Self::ThreeD6 => "three_d6",
            Self::StandardArray => "standard_array",
            Self::AllTens => "all_tens",
        }
    }
}

impl Default for AbilityGeneration {
    fn default() -> Self {
        Self::FourD6DropLowest
    }
}

impl fmt::Display for AbilityGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AbilityGeneration {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "four_d6_drop_lowest" | "4d6" => Ok(Self::FourD6DropLowest),
            "three_d6" | "3d6" => Ok(Self::ThreeD6),
            "standard_array" | "array" => Ok(Self::StandardArray),
            "all_tens" => Ok(Self::AllTens),
            other => Err(DomainError::parse(format!(
                "Unknown ability generation method: {}",
                other
            ))),
        }
    }
}

/// Tunables for compilation, randomization and repair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSettings {
    // ============================================================================
    // Repair
    // ============================================================================
    /// Outer passes before repair gives up and reports residual signals.
    #[serde(default = "default_max_repair_passes")]
    pub max_repair_passes: u32,

    /// Whether sanity signals are repaired too, or only reported.
    #[serde(default = "default_true")]
    pub repair_sanity_signals: bool,

    // ============================================================================
    // Randomizer
    // ============================================================================
    /// Candidate cap per category fill.
    #[serde(default = "default_max_draw_attempts")]
    pub max_draw_attempts: u32,

    #[serde(default = "default_max_ability_rerolls")]
    pub max_ability_rerolls: u32,

    #[serde(default)]
    pub ability_generation: AbilityGeneration,

    /// Ceiling for a boosted ability score.
    #[serde(default = "default_max_ability_score")]
    pub max_ability_score: i64,

    #[serde(default = "default_level")]
    pub default_level: i64,

    #[serde(default = "default_starting_weapon_count")]
    pub starting_weapon_count: u32,

    /// Deterministic RNG seed; system randomness when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

fn default_max_repair_passes() -> u32 {
    8
}
fn default_true() -> bool {
    true
}
fn default_max_draw_attempts() -> u32 {
    64
}
fn default_max_ability_rerolls() -> u32 {
    16
}
fn default_max_ability_score() -> i64 {
    18
}
fn default_level() -> i64 {
    1
}
fn default_starting_weapon_count() -> u32 {
    1
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_repair_passes: default_max_repair_passes(),
            repair_sanity_signals: true,
            max_draw_attempts: default_max_draw_attempts(),
            max_ability_rerolls: default_max_ability_rerolls(),
            ability_generation: AbilityGeneration::default(),
            max_ability_score: default_max_ability_score(),
            default_level: default_level(),
            starting_weapon_count: default_starting_weapon_count(),
            seed: None,
        }
    }
}

impl EngineSettings {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_ability_generation(mut self, method: AbilityGeneration) -> Self {
        self.ability_generation = method;
        self
    }

    /// Defaults overlaid with `BUILDWRIGHT_*` environment variables.
    ///
    /// Invalid values are logged and ignored.
    pub fn from_env() -> Self {
        let mut settings = Self::default();

        if let Some(n) = env_parsed::<u32>("BUILDWRIGHT_MAX_REPAIR_PASSES", 1, 64) {
            settings.max_repair_passes = n;
        }
        if let Some(n) = env_parsed::<u32>("BUILDWRIGHT_MAX_DRAW_ATTEMPTS", 1, 4096) {
            settings.max_draw_attempts = n;
        }
        if let Some(n) = env_parsed::<u32>("BUILDWRIGHT_MAX_ABILITY_REROLLS", 0, 1024) {
            settings.max_ability_rerolls = n;
        }
        if let Some(n) = env_parsed::<i64>("BUILDWRIGHT_MAX_ABILITY_SCORE", 10, 30) {
            settings.max_ability_score = n;
        }
        if let Some(n) = env_parsed::<i64>("BUILDWRIGHT_DEFAULT_LEVEL", 1, 20) {
            settings.default_level = n;
        }
        if let Some(n) = env_parsed::<u32>("BUILDWRIGHT_STARTING_WEAPONS", 0, 8) {
            settings.starting_weapon_count = n;
        }
        if let Some(seed) = env_parsed::<u64>("BUILDWRIGHT_SEED", 0, u64::MAX) {
            settings.seed = Some(seed);
        }

        if let Ok(val) = std::env::var("BUILDWRIGHT_ABILITY_GENERATION") {
            match val.parse::<AbilityGeneration>() {
                Ok(method) => {
                    settings.ability_generation = method;
                    tracing::info!(
                        %method,
                        "Applied BUILDWRIGHT_ABILITY_GENERATION environment variable"
                    );
                }
                Err(_) => tracing::warn!(
                    val = %val,
                    "BUILDWRIGHT_ABILITY_GENERATION is not a known method, ignoring"
                ),
            }
        }

        if let Ok(val) = std::env::var("BUILDWRIGHT_REPAIR_SANITY") {
            match val.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => settings.repair_sanity_signals = true,
                "0" | "false" | "no" => settings.repair_sanity_signals = false,
                _ => tracing::warn!(
                    val = %val,
                    "BUILDWRIGHT_REPAIR_SANITY is not a boolean, ignoring"
                ),
            }
        }

        settings
    }
}

fn env_parsed<T>(name: &str, min: T, max: T) -> Option<T>
where
    T: FromStr + PartialOrd + fmt::Display + Copy,
{
    let val = std::env::var(name).ok()?;
    match val.trim().parse::<T>() {
        Ok(n) if n >= min && n <= max => {
            tracing::info!(value = %n, "Applied {} environment variable", name);
            Some(n)
        }
        Ok(n) => {
            tracing::warn!(
                value = %n,
                "{} out of range [{}, {}], ignoring",
                name, min, max
            );
            None
        }
        Err(_) => {
            tracing::warn!(val = %val, "{} is not a valid number, ignoring", name);
            None
        }
    }
}
