//! Simulator configuration types
//!
//! Both processes are configured independently; they only interoperate when
//! they agree on the seed and the difficulty level.

use crate::types::SimError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// How much of a frame besides the real field is padded or randomized
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum DifficultyLevel {
    /// No extra bytes touched
    #[default]
    None = 0,
    /// Layout lengths extended with zero padding
    Pad = 1,
    /// Padding plus per-send randomization of unused bytes
    RandomizeUnused = 2,
}

impl TryFrom<u8> for DifficultyLevel {
    type Error = SimError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(DifficultyLevel::None),
            1 => Ok(DifficultyLevel::Pad),
            2 => Ok(DifficultyLevel::RandomizeUnused),
            other => Err(SimError::InvalidDifficulty(other)),
        }
    }
}

impl From<DifficultyLevel> for u8 {
    fn from(level: DifficultyLevel) -> Self {
        level as u8
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DifficultyLevel::None => write!(f, "none"),
            DifficultyLevel::Pad => write!(f, "pad"),
            DifficultyLevel::RandomizeUnused => write!(f, "randomize-unused"),
        }
    }
}

/// Configuration shared by the control panel and the instrument cluster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimConfig {
    /// Layout seed (0 = fixed default layout)
    #[serde(default)]
    pub seed: i32,

    /// Obfuscation difficulty
    #[serde(default)]
    pub difficulty: DifficultyLevel,

    /// Control loop poll interval in milliseconds (default: 5ms)
    #[serde(default = "default_poll_ms")]
    pub poll_ms: u64,
}

fn default_poll_ms() -> u64 {
    5
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            difficulty: DifficultyLevel::None,
            poll_ms: default_poll_ms(),
        }
    }
}

impl SimConfig {
    /// Create a configuration with the fixed default layout and no obfuscation
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: set the layout seed
    pub fn with_seed(mut self, seed: i32) -> Self {
        self.seed = seed;
        self
    }

    /// Builder method: set the difficulty level
    pub fn with_difficulty(mut self, difficulty: DifficultyLevel) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Builder method: set the control loop poll interval
    pub fn with_poll_interval(mut self, poll_ms: u64) -> Self {
        self.poll_ms = poll_ms;
        self
    }

    /// Poll interval as a `Duration`
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_ms)
    }

    /// Whether the layout is seed-derived rather than the fixed default
    pub fn is_randomized(&self) -> bool {
        self.seed != 0
    }
}
