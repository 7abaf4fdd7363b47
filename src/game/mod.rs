//! # Game Module
//!
//! Core puzzle representation: grid primitives, level ingestion, move rules
//! and scripted playback.
//!
//! This module contains the fundamental building blocks of a box-pushing
//! puzzle:
//! - Grid coordinates and movement directions
//! - Level parsing and the cell grid
//! - Puzzle state with move execution and undo history
//! - Auto-solve playback of oracle plans

pub mod autosolve;
pub mod level;
pub mod state;

pub use autosolve::*;
pub use level::*;
pub use state::*;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Represents a 2D coordinate on the puzzle grid.
///
/// `x` grows to the right and `y` grows downward, matching the row-major
/// layout of level text.
///
/// # Examples
///
/// ```
/// use sokolink::{Direction, Point};
///
/// let point = Point::new(2, 1);
/// assert_eq!(point.step(Direction::Right), Point::new(3, 1));
/// assert_eq!(point.neighbors8().len(), 8);
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    /// Creates a new point with the given coordinates.
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Returns the point one cell away in the given direction.
    pub fn step(self, direction: Direction) -> Self {
        self + direction.to_delta()
    }

    /// Returns the point one cell away against the given direction.
    pub fn step_back(self, direction: Direction) -> Self {
        self - direction.to_delta()
    }

    /// Returns the 4 orthogonal neighbors.
    pub fn neighbors4(self) -> [Point; 4] {
        [
            Point::new(self.x, self.y - 1),
            Point::new(self.x - 1, self.y),
            Point::new(self.x + 1, self.y),
            Point::new(self.x, self.y + 1),
        ]
    }

    /// Returns all 8 surrounding points (including diagonals).
    pub fn neighbors8(self) -> [Point; 8] {
        [
            Point::new(self.x - 1, self.y - 1),
            Point::new(self.x, self.y - 1),
            Point::new(self.x + 1, self.y - 1),
            Point::new(self.x - 1, self.y),
            Point::new(self.x + 1, self.y),
            Point::new(self.x - 1, self.y + 1),
            Point::new(self.x, self.y + 1),
            Point::new(self.x + 1, self.y + 1),
        ]
    }
}

impl std::ops::Add for Point {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y)
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// The four movement directions.
///
/// Serialized in lowercase (`"up"`, `"left"`, ...), which is also the move
/// vocabulary of oracle plans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    /// All directions in a fixed order.
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Converts a direction to a point delta.
    ///
    /// # Examples
    ///
    /// ```
    /// use sokolink::{Direction, Point};
    ///
    /// assert_eq!(Direction::Up.to_delta(), Point::new(0, -1));
    /// ```
    pub fn to_delta(self) -> Point {
        match self {
            Direction::Up => Point::new(0, -1),
            Direction::Down => Point::new(0, 1),
            Direction::Left => Point::new(-1, 0),
            Direction::Right => Point::new(1, 0),
        }
    }

    /// Converts a unit delta back to a direction.
    pub fn from_delta(delta: Point) -> Option<Direction> {
        match (delta.x, delta.y) {
            (0, -1) => Some(Direction::Up),
            (0, 1) => Some(Direction::Down),
            (-1, 0) => Some(Direction::Left),
            (1, 0) => Some(Direction::Right),
            _ => None,
        }
    }

    /// Returns the opposite direction.
    pub fn opposite(self) -> Direction {
        match self {
            Direction::Up => Direction::Down,
            Direction::Down => Direction::Up,
            Direction::Left => Direction::Right,
            Direction::Right => Direction::Left,
        }
    }

    /// Lowercase name, as used on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Up => "up",
            Direction::Down => "down",
            Direction::Left => "left",
            Direction::Right => "right",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" | "u" | "north" => Ok(Direction::Up),
            "down" | "d" | "south" => Ok(Direction::Down),
            "left" | "l" | "west" => Ok(Direction::Left),
            "right" | "r" | "east" => Ok(Direction::Right),
            other => Err(format!("unknown direction '{}'", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_creation() {
        let point = Point::new(5, 10);
        assert_eq!(point.x, 5);
        assert_eq!(point.y, 10);
    }

    #[test]
    fn test_point_arithmetic() {
        let a = Point::new(5, 10);
        let b = Point::new(3, 2);
        assert_eq!(a + b, Point::new(8, 12));
        assert_eq!(a - b, Point::new(2, 8));
    }

    #[test]
    fn test_point_steps() {
        let point = Point::new(4, 4);
        assert_eq!(point.step(Direction::Up), Point::new(4, 3));
        assert_eq!(point.step_back(Direction::Up), Point::new(4, 5));
        assert_eq!(point.step(Direction::Left).step(Direction::Right), point);
    }

    #[test]
    fn test_neighbors() {
        let point = Point::new(5, 5);
        let orthogonal = point.neighbors4();
        assert!(orthogonal.contains(&Point::new(5, 4)));
        assert!(!orthogonal.contains(&Point::new(4, 4)));

        let all = point.neighbors8();
        assert!(all.contains(&Point::new(4, 4)));
        assert!(all.contains(&Point::new(6, 6)));
        assert!(!all.contains(&point));
    }

    #[test]
    fn test_direction_round_trip_through_delta() {
        for direction in Direction::ALL {
            assert_eq!(Direction::from_delta(direction.to_delta()), Some(direction));
            assert_eq!(direction.opposite().opposite(), direction);
        }
        assert_eq!(Direction::from_delta(Point::new(1, 1)), None);
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("Right".parse::<Direction>(), Ok(Direction::Right));
        assert_eq!("u".parse::<Direction>(), Ok(Direction::Up));
        assert!("sideways".parse::<Direction>().is_err());
    }

    #[test]
    fn test_direction_wire_format() {
        let json = serde_json::to_string(&vec![Direction::Up, Direction::Left]).unwrap();
        assert_eq!(json, r#"["up","left"]"#);
        let parsed: Vec<Direction> = serde_json::from_str(r#"["down","right"]"#).unwrap();
        assert_eq!(parsed, vec![Direction::Down, Direction::Right]);
    }
}
