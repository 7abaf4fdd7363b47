//! # Generation Module
//!
//! Procedural level generation.
//!
//! Levels are built backwards: boxes start on their goals and are pulled
//! away with randomized reverse moves, then a repair pass fixes any box or
//! player placement the pulls left invalid. Generation is seeded, so the
//! same configuration always yields the same level. Whether the result is
//! solvable is the oracle's call, not the generator's.

pub mod puzzle;

pub use puzzle::*;

use crate::game::{Cell, Point};
use crate::{SokolinkError, SokolinkResult};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Difficulty tier of a generated level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Easy, Tier::Medium, Tier::Hard];

    /// Grid width and height, border included.
    pub fn dimensions(self) -> (usize, usize) {
        match self {
            Tier::Easy => (8, 8),
            Tier::Medium => (10, 10),
            Tier::Hard => (12, 12),
        }
    }

    pub fn box_count(self) -> usize {
        match self {
            Tier::Easy => 2,
            Tier::Medium => 3,
            Tier::Hard => 4,
        }
    }

    /// Successful reverse pulls to aim for.
    pub fn pull_budget(self) -> u32 {
        match self {
            Tier::Easy => 15,
            Tier::Medium => 30,
            Tier::Hard => 50,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Easy => write!(f, "easy"),
            Tier::Medium => write!(f, "medium"),
            Tier::Hard => write!(f, "hard"),
        }
    }
}

impl FromStr for Tier {
    type Err = SokolinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "easy" | "1" => Ok(Tier::Easy),
            "medium" | "2" => Ok(Tier::Medium),
            "hard" | "3" => Ok(Tier::Hard),
            other => Err(SokolinkError::Config(format!("unknown tier '{}'", other))),
        }
    }
}

/// Configuration for procedural generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Random seed for reproducible generation
    pub seed: u64,
    pub tier: Tier,
    pub width: usize,
    pub height: usize,
    pub box_count: usize,
    /// Successful reverse pulls to aim for
    pub pull_budget: u32,
    /// Fraction of all cells to try turning into internal walls
    pub wall_density: f64,
}

impl GenerationConfig {
    /// Creates an easy-tier configuration.
    ///
    /// # Examples
    ///
    /// ```
    /// use sokolink::{GenerationConfig, Tier};
    ///
    /// let config = GenerationConfig::new(42);
    /// assert_eq!(config.tier, Tier::Easy);
    /// assert_eq!(config.box_count, 2);
    /// ```
    pub fn new(seed: u64) -> Self {
        Self::for_tier(seed, Tier::Easy)
    }

    /// Creates the configuration for a difficulty tier.
    pub fn for_tier(seed: u64, tier: Tier) -> Self {
        let (width, height) = tier.dimensions();
        Self {
            seed,
            tier,
            width,
            height,
            box_count: tier.box_count(),
            pull_budget: tier.pull_budget(),
            wall_density: 0.10,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self::new(42)
    }
}

/// Trait for procedural generators.
pub trait Generator<T> {
    /// Generates content using the provided configuration and random number generator.
    fn generate(&self, config: &GenerationConfig, rng: &mut StdRng) -> SokolinkResult<T>;

    /// Validates that the generated content meets requirements.
    fn validate(&self, content: &T, config: &GenerationConfig) -> SokolinkResult<()>;

    /// Gets the generator type name for logging and debugging.
    fn generator_type(&self) -> &'static str;
}

/// Utility functions for generation algorithms.
pub mod utils {
    use super::*;

    /// Creates a seeded random number generator from the config.
    pub fn create_rng(config: &GenerationConfig) -> StdRng {
        StdRng::seed_from_u64(config.seed)
    }

    /// Counts walls among the 8 neighbours of `point`. Off-grid counts as wall.
    pub fn wall_neighbors(cells: &[Vec<Cell>], point: Point) -> usize {
        point
            .neighbors8()
            .iter()
            .filter(|n| cell_at(cells, **n).map_or(true, |cell| cell == Cell::Wall))
            .count()
    }

    /// Cell at `point`, or `None` off the grid.
    pub fn cell_at(cells: &[Vec<Cell>], point: Point) -> Option<Cell> {
        if point.x < 0 || point.y < 0 {
            return None;
        }
        cells
            .get(point.y as usize)
            .and_then(|row| row.get(point.x as usize))
            .copied()
    }
}
