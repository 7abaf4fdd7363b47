//! # Level Module
//!
//! Level text ingestion and the static cell grid.
//!
//! Level text is a line-oriented grid in the usual box-pushing alphabet.
//! Blank characters that can be reached from the edge of the grid are
//! exterior decoration and become [`Cell::Void`]; blanks enclosed by walls
//! are interior floor.

use crate::game::Point;
use crate::{SokolinkError, SokolinkResult};
use log::{debug, warn};
use pathfinding::prelude::bfs_reach;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::path::Path;

/// A single grid cell. Entities (player, boxes) are tracked separately.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cell {
    Wall,
    Floor,
    Goal,
    /// Exterior blank space outside the puzzle's interior.
    Void,
}

impl Cell {
    /// Whether the player or a box may stand on this cell.
    pub fn is_passable(self) -> bool {
        matches!(self, Cell::Floor | Cell::Goal)
    }

    /// Symbol used in the grid rows sent to the oracle.
    pub fn oracle_symbol(self) -> char {
        match self {
            Cell::Wall => '#',
            Cell::Floor => ' ',
            Cell::Goal => '.',
            Cell::Void => 'x',
        }
    }
}

/// The symbolic alphabet of level text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LevelSymbols {
    pub wall: char,
    /// Explicit interior floor; never turned into void.
    pub floors: Vec<char>,
    pub goal: char,
    pub player: char,
    pub player_on_goal: char,
    pub box_: char,
    pub box_on_goal: char,
    pub blank: char,
}

impl LevelSymbols {
    /// The common `#@$.*+` alphabet with `-`/`_` as explicit floor.
    pub fn standard() -> Self {
        Self {
            wall: '#',
            floors: vec!['-', '_'],
            goal: '.',
            player: '@',
            player_on_goal: '+',
            box_: '$',
            box_on_goal: '*',
            blank: ' ',
        }
    }
}

impl Default for LevelSymbols {
    fn default() -> Self {
        Self::standard()
    }
}

/// A loaded or generated level: static grid plus initial entity layout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Level {
    /// Optional display name
    pub name: Option<String>,
    pub width: usize,
    pub height: usize,
    /// Row-major cells, `cells[y][x]`
    pub cells: Vec<Vec<Cell>>,
    /// Initial player position
    pub player: Point,
    /// Initial box positions in display order
    pub boxes: Vec<Point>,
    pub goals: BTreeSet<Point>,
}

impl Level {
    /// Parses level text with the standard alphabet.
    ///
    /// # Examples
    ///
    /// ```
    /// use sokolink::{Cell, Level, Point};
    ///
    /// let level = Level::parse("#####\n#@$.#\n#####").unwrap();
    /// assert_eq!(level.player, Point::new(1, 1));
    /// assert_eq!(level.boxes, vec![Point::new(2, 1)]);
    /// assert_eq!(level.cell(Point::new(3, 1)), Some(Cell::Goal));
    /// ```
    pub fn parse(text: &str) -> SokolinkResult<Self> {
        Self::parse_with(text, &LevelSymbols::standard())
    }

    /// Parses level text with a custom alphabet.
    ///
    /// Fails only when no player symbol is present. Unsolvable or
    /// disconnected layouts load fine.
    pub fn parse_with(text: &str, symbols: &LevelSymbols) -> SokolinkResult<Self> {
        let mut lines: Vec<&str> = text.lines().map(|line| line.trim_end_matches('\r')).collect();
        while lines.first().is_some_and(|line| line.trim().is_empty()) {
            lines.remove(0);
        }
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }

        let width = lines.iter().map(|line| line.chars().count()).max().unwrap_or(0);
        let raw: Vec<Vec<char>> = lines
            .iter()
            .map(|line| {
                let mut row: Vec<char> = line.chars().collect();
                row.resize(width, symbols.blank);
                row
            })
            .collect();

        let exterior = exterior_blanks(&raw, symbols.blank);

        let mut cells = Vec::with_capacity(raw.len());
        let mut player = None;
        let mut boxes = Vec::new();
        let mut goals = BTreeSet::new();

        for (y, row) in raw.iter().enumerate() {
            let mut cell_row = Vec::with_capacity(width);
            for (x, &symbol) in row.iter().enumerate() {
                let point = Point::new(x as i32, y as i32);
                let (cell, has_player, has_box) = if symbol == symbols.wall {
                    (Cell::Wall, false, false)
                } else if symbol == symbols.blank {
                    if exterior.contains(&point) {
                        (Cell::Void, false, false)
                    } else {
                        (Cell::Floor, false, false)
                    }
                } else if symbols.floors.contains(&symbol) {
                    (Cell::Floor, false, false)
                } else if symbol == symbols.goal {
                    (Cell::Goal, false, false)
                } else if symbol == symbols.player {
                    (Cell::Floor, true, false)
                } else if symbol == symbols.player_on_goal {
                    (Cell::Goal, true, false)
                } else if symbol == symbols.box_ {
                    (Cell::Floor, false, true)
                } else if symbol == symbols.box_on_goal {
                    (Cell::Goal, false, true)
                } else {
                    debug!("Unknown level symbol {:?} at {}, reading it as wall", symbol, point);
                    (Cell::Wall, false, false)
                };

                if cell == Cell::Goal {
                    goals.insert(point);
                }
                if has_box {
                    boxes.push(point);
                }
                if has_player {
                    if player.is_none() {
                        player = Some(point);
                    } else {
                        warn!("Extra player symbol at {} ignored", point);
                    }
                }
                cell_row.push(cell);
            }
            cells.push(cell_row);
        }

        let player = player.ok_or_else(|| {
            SokolinkError::StructuralLevel("level has no player symbol".to_string())
        })?;

        Ok(Self {
            name: None,
            width,
            height: cells.len(),
            cells,
            player,
            boxes,
            goals,
        })
    }

    /// Sets the display name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Checks whether a point lies inside the grid.
    pub fn is_in_bounds(&self, point: Point) -> bool {
        point.x >= 0
            && point.y >= 0
            && (point.x as usize) < self.width
            && (point.y as usize) < self.height
    }

    /// Returns the cell at a point, or `None` outside the grid.
    pub fn cell(&self, point: Point) -> Option<Cell> {
        if !self.is_in_bounds(point) {
            return None;
        }
        self.cells
            .get(point.y as usize)
            .and_then(|row| row.get(point.x as usize))
            .copied()
    }

    /// Whether an entity may stand at the point. Out-of-bounds is blocked.
    pub fn is_passable(&self, point: Point) -> bool {
        self.cell(point).is_some_and(Cell::is_passable)
    }

    /// Whether the point is a goal.
    pub fn is_goal(&self, point: Point) -> bool {
        self.goals.contains(&point)
    }

    /// Grid rows in the oracle's alphabet (static cells only).
    pub fn oracle_rows(&self) -> Vec<String> {
        self.cells
            .iter()
            .map(|row| row.iter().map(|cell| cell.oracle_symbol()).collect())
            .collect()
    }

    /// Renders the grid with the given entity layout in the standard alphabet.
    ///
    /// Void renders as blank, so the output parses back to the same level.
    pub fn render(&self, player: Point, boxes: &[Point]) -> String {
        let symbols = LevelSymbols::standard();
        let box_set: HashSet<Point> = boxes.iter().copied().collect();
        let mut lines = Vec::with_capacity(self.height);

        for (y, row) in self.cells.iter().enumerate() {
            let line: String = row
                .iter()
                .enumerate()
                .map(|(x, cell)| {
                    let point = Point::new(x as i32, y as i32);
                    let goal = *cell == Cell::Goal;
                    match (point == player, box_set.contains(&point), goal) {
                        (true, _, true) => symbols.player_on_goal,
                        (true, _, false) => symbols.player,
                        (false, true, true) => symbols.box_on_goal,
                        (false, true, false) => symbols.box_,
                        _ => match cell {
                            Cell::Wall => symbols.wall,
                            Cell::Goal => symbols.goal,
                            Cell::Floor => '-',
                            Cell::Void => symbols.blank,
                        },
                    }
                })
                .collect();
            lines.push(line.trim_end().to_string());
        }

        lines.join("\n")
    }

    /// Renders the level in its initial layout.
    pub fn to_text(&self) -> String {
        self.render(self.player, &self.boxes)
    }
}

/// Marks every blank reachable from a blank on the outer boundary.
fn exterior_blanks(raw: &[Vec<char>], blank: char) -> HashSet<Point> {
    let height = raw.len() as i32;
    let width = raw.first().map(|row| row.len()).unwrap_or(0) as i32;
    let is_blank = |point: Point| {
        point.x >= 0
            && point.y >= 0
            && point.x < width
            && point.y < height
            && raw[point.y as usize][point.x as usize] == blank
    };

    let boundary: Vec<Option<Point>> = (0..height)
        .flat_map(|y| (0..width).map(move |x| Point::new(x, y)))
        .filter(|point| {
            point.x == 0 || point.y == 0 || point.x == width - 1 || point.y == height - 1
        })
        .filter(|point| is_blank(*point))
        .map(Some)
        .collect();

    // `None` is a virtual source adjacent to every boundary blank.
    bfs_reach(None, |node: &Option<Point>| match node {
        None => boundary.clone(),
        Some(point) => point
            .neighbors4()
            .into_iter()
            .filter(|next| is_blank(*next))
            .map(Some)
            .collect(),
    })
    .flatten()
    .collect()
}

/// One level of a multi-level text file.
#[derive(Debug)]
pub struct LevelEntry {
    pub id: u32,
    pub title: Option<String>,
    /// Parse result; entries with structural errors are never offered.
    pub level: SokolinkResult<Level>,
}

/// A set of levels read from a `Level N` formatted file.
#[derive(Debug, Default)]
pub struct LevelCollection {
    pub entries: Vec<LevelEntry>,
}

impl LevelCollection {
    /// Parses a collection file.
    ///
    /// The format is a `Level N` header, an optional `'Title'` line, then
    /// the grid. Text without any header is read as a single level with id 1.
    pub fn parse(text: &str) -> Self {
        let mut raw_levels: Vec<(u32, Option<String>, Vec<&str>)> = Vec::new();
        let mut saw_header = false;

        for line in text.lines() {
            let trimmed = line.trim();
            if let Some(id) = trimmed
                .strip_prefix("Level")
                .and_then(|rest| rest.trim().parse::<u32>().ok())
            {
                saw_header = true;
                raw_levels.push((id, None, Vec::new()));
                continue;
            }

            let Some((_, title, grid)) = raw_levels.last_mut() else {
                continue;
            };

            if grid.is_empty() && title.is_none() && trimmed.len() >= 2 {
                if let Some(inner) = trimmed.strip_prefix('\'').and_then(|t| t.strip_suffix('\'')) {
                    *title = Some(inner.to_string());
                    continue;
                }
            }
            if grid.is_empty() && trimmed.is_empty() {
                continue;
            }
            grid.push(line);
        }

        if !saw_header {
            raw_levels.push((1, None, text.lines().collect()));
        }

        let mut entries: Vec<LevelEntry> = raw_levels
            .into_iter()
            .map(|(id, title, grid)| {
                let level = Level::parse(&grid.join("\n")).map(|level| match &title {
                    Some(title) => level.with_name(title.clone()),
                    None => level.with_name(format!("Level {}", id)),
                });
                if let Err(err) = &level {
                    warn!("Level {} blocked: {}", id, err);
                }
                LevelEntry { id, title, level }
            })
            .collect();
        entries.sort_by_key(|entry| entry.id);

        Self { entries }
    }

    /// Reads and parses a collection file.
    pub fn load_from_path(path: impl AsRef<Path>) -> SokolinkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::parse(&text))
    }

    /// Levels that loaded successfully, in id order.
    pub fn playable(&self) -> impl Iterator<Item = (u32, &Level)> {
        self.entries
            .iter()
            .filter_map(|entry| entry.level.as_ref().ok().map(|level| (entry.id, level)))
    }

    /// Looks up a playable level by id.
    pub fn get(&self, id: u32) -> SokolinkResult<&Level> {
        let entry = self
            .entries
            .iter()
            .find(|entry| entry.id == id)
            .ok_or_else(|| SokolinkError::InvalidState(format!("no level with id {}", id)))?;

        entry.level.as_ref().map_err(|err| {
            SokolinkError::StructuralLevel(format!("level {} is blocked: {}", id, err))
        })
    }

    /// Number of entries, blocked ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
