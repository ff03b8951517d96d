//! Difficulty profiles and game settings
//!
//! Settings arrive as JSON from the host application. Parsing happens here,
//! at the boundary, so the simulation only ever sees a valid `Difficulty`.

use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::consts::AUTO_ADVANCE_DELAY;
use crate::error::ConfigError;
use crate::sim::catalog::DEFAULT_BALL_ID;
use crate::sim::throw::FallCriterion;

/// Difficulty levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Normal,
    Hard,
}

impl Difficulty {
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Normal, Difficulty::Hard];

    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Normal => "normal",
            Difficulty::Hard => "hard",
        }
    }

    /// Lane and ball tuning for this level
    pub fn profile(&self) -> DifficultyProfile {
        match self {
            Difficulty::Easy => DifficultyProfile {
                lane_friction: 0.08,
                gutter_width_fraction: 0.18,
                ball_stability: 0.9,
            },
            Difficulty::Normal => DifficultyProfile {
                lane_friction: 0.045,
                gutter_width_fraction: 0.30,
                ball_stability: 0.6,
            },
            Difficulty::Hard => DifficultyProfile {
                lane_friction: 0.02,
                gutter_width_fraction: 0.48,
                ball_stability: 0.3,
            },
        }
    }
}

impl FromStr for Difficulty {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "normal" => Ok(Difficulty::Normal),
            "hard" => Ok(Difficulty::Hard),
            _ => Err(ConfigError::UnknownDifficulty { name: s.to_string() }),
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Physical tuning for a difficulty level
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DifficultyProfile {
    /// Ball-lane friction coefficient
    pub lane_friction: f32,
    /// Fraction of the lane width given over to gutters, in [0, 1)
    pub gutter_width_fraction: f32,
    /// How straight the ball holds its line, in [0, 1]
    pub ball_stability: f32,
}

impl Default for DifficultyProfile {
    fn default() -> Self {
        Difficulty::default().profile()
    }
}

/// Look up a difficulty profile by name
pub fn get_difficulty_profile(name: &str) -> Result<DifficultyProfile, ConfigError> {
    Ok(name.parse::<Difficulty>()?.profile())
}

/// Player/game settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Lane difficulty
    pub difficulty: Difficulty,
    /// Ball preset id (unknown ids fall back to "standard")
    pub ball: String,
    /// RNG seed for launch jitter
    pub seed: u64,
    /// Pause between a finished frame and the next rack (seconds)
    pub auto_advance_secs: f32,
    /// How a pin is judged to have fallen
    pub fall_criterion: FallCriterion,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            difficulty: Difficulty::Normal,
            ball: DEFAULT_BALL_ID.to_string(),
            seed: 0x5EED,
            auto_advance_secs: AUTO_ADVANCE_DELAY,
            fall_criterion: FallCriterion::Tilt,
        }
    }
}

impl Settings {
    /// Parse settings from a JSON document (missing fields take defaults)
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut settings: Settings = serde_json::from_str(json)?;
        if !settings.auto_advance_secs.is_finite() || settings.auto_advance_secs < 0.0 {
            log::warn!(
                "Ignoring auto_advance_secs {}, using {}",
                settings.auto_advance_secs,
                AUTO_ADVANCE_DELAY
            );
            settings.auto_advance_secs = AUTO_ADVANCE_DELAY;
        }
        Ok(settings)
    }

    /// Load settings from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let settings = Self::from_json(&json)?;
        log::info!("Loaded settings from {}", path.as_ref().display());
        Ok(settings)
    }

    pub fn to_json(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
