//! # Puzzle State Module
//!
//! Authoritative puzzle state: the player, the boxes, the move counter and
//! the undo history.
//!
//! [`PuzzleState`] owns its [`Level`]; the grid and goals never change after
//! load, only entity positions do. All mutation goes through
//! [`PuzzleState::attempt_move`] and [`PuzzleState::undo`].

use crate::game::{Direction, Level, Point};
use crate::oracle::OracleState;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable record of the mutable part of a puzzle state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub player: Point,
    pub boxes: Vec<Point>,
    pub move_count: u32,
}

/// Identifies a position independent of how it was reached.
///
/// Used to match cached plans against the current position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StateKey {
    pub player: Point,
    pub boxes: Vec<Point>,
}

/// Stack of snapshots taken before each successful move.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoveHistory {
    snapshots: Vec<Snapshot>,
}

impl MoveHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, snapshot: Snapshot) {
        self.snapshots.push(snapshot);
    }

    pub fn pop(&mut self) -> Option<Snapshot> {
        self.snapshots.pop()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }
}

/// Result of a move attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// Target was a wall, void, out of bounds, or an unpushable box.
    /// State is unchanged.
    Blocked,
    /// The player stepped onto a free cell.
    Walked { solved: bool },
    /// The player pushed the box at `box_index` one cell.
    Pushed { box_index: usize, solved: bool },
}

impl MoveOutcome {
    /// Whether the move changed the state.
    pub fn is_success(self) -> bool {
        !matches!(self, MoveOutcome::Blocked)
    }

    /// Whether this move produced a win.
    pub fn solved(self) -> bool {
        match self {
            MoveOutcome::Blocked => false,
            MoveOutcome::Walked { solved } | MoveOutcome::Pushed { solved, .. } => solved,
        }
    }
}

/// The authoritative puzzle state for one level.
///
/// # Examples
///
/// ```
/// use sokolink::{Direction, Level, MoveOutcome, PuzzleState};
///
/// let level = Level::parse("#####\n#@$.#\n#####").unwrap();
/// let mut puzzle = PuzzleState::new(level);
///
/// let outcome = puzzle.attempt_move(Direction::Right);
/// assert_eq!(outcome, MoveOutcome::Pushed { box_index: 0, solved: true });
/// assert_eq!(puzzle.move_count(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct PuzzleState {
    level: Level,
    player: Point,
    boxes: Vec<Point>,
    move_count: u32,
    history: MoveHistory,
}

impl PuzzleState {
    /// Creates a fresh state in the level's initial layout with empty history.
    pub fn new(level: Level) -> Self {
        let player = level.player;
        let boxes = level.boxes.clone();
        Self {
            level,
            player,
            boxes,
            move_count: 0,
            history: MoveHistory::new(),
        }
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn player(&self) -> Point {
        self.player
    }

    pub fn boxes(&self) -> &[Point] {
        &self.boxes
    }

    pub fn move_count(&self) -> u32 {
        self.move_count
    }

    pub fn history(&self) -> &MoveHistory {
        &self.history
    }

    /// Whether there is anything to undo.
    pub fn has_undo(&self) -> bool {
        !self.history.is_empty()
    }

    /// Returns the index of the box at a point, if any.
    pub fn box_at(&self, point: Point) -> Option<usize> {
        self.boxes.iter().position(|&b| b == point)
    }

    /// Win predicate: every box rests on a goal.
    pub fn is_won(&self) -> bool {
        self.boxes.iter().all(|b| self.level.goals.contains(b))
    }

    /// Captures the mutable part of the state.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            player: self.player,
            boxes: self.boxes.clone(),
            move_count: self.move_count,
        }
    }

    /// Key for the current position.
    pub fn key(&self) -> StateKey {
        StateKey {
            player: self.player,
            boxes: self.boxes.clone(),
        }
    }

    /// The current position in the oracle's wire format.
    pub fn oracle_state(&self) -> OracleState {
        OracleState {
            grid: self.level.oracle_rows(),
            player: self.player,
            boxes: self.boxes.clone(),
            goals: self.level.goals.iter().copied().collect(),
        }
    }

    /// Attempts to move the player one cell.
    ///
    /// A push moves at most one box and never into another box. On success
    /// the prior state is pushed to the history and the move counter
    /// increments.
    pub fn attempt_move(&mut self, direction: Direction) -> MoveOutcome {
        let target = self.player.step(direction);
        if !self.level.is_passable(target) {
            return MoveOutcome::Blocked;
        }

        let pushed = match self.box_at(target) {
            Some(index) => {
                let destination = target.step(direction);
                if !self.level.is_passable(destination) || self.box_at(destination).is_some() {
                    return MoveOutcome::Blocked;
                }
                Some((index, destination))
            }
            None => None,
        };

        self.history.push(self.snapshot());
        self.player = target;
        self.move_count += 1;

        match pushed {
            Some((box_index, destination)) => {
                self.boxes[box_index] = destination;
                MoveOutcome::Pushed {
                    box_index,
                    solved: self.is_won(),
                }
            }
            None => MoveOutcome::Walked {
                solved: self.is_won(),
            },
        }
    }

    /// Restores the state before the last successful move.
    ///
    /// Returns `false` (and does nothing) when the history is empty.
    pub fn undo(&mut self) -> bool {
        match self.history.pop() {
            Some(snapshot) => {
                self.player = snapshot.player;
                self.boxes = snapshot.boxes;
                self.move_count = snapshot.move_count;
                true
            }
            None => false,
        }
    }

    /// Number of boxes currently on goals.
    pub fn boxes_on_goals(&self) -> usize {
        self.boxes
            .iter()
            .filter(|b| self.level.goals.contains(b))
            .count()
    }
}

impl fmt::Display for PuzzleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.level.render(self.player, &self.boxes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn puzzle(text: &str) -> PuzzleState {
        PuzzleState::new(Level::parse(text).unwrap())
    }

    #[test]
    fn test_walk_into_wall_is_blocked() {
        let mut state = puzzle("####\n#@ #\n####");
        let before = state.snapshot();
        assert_eq!(state.attempt_move(Direction::Up), MoveOutcome::Blocked);
        assert_eq!(state.attempt_move(Direction::Left), MoveOutcome::Blocked);
        assert_eq!(state.snapshot(), before);
        assert!(!state.has_undo());
    }

    #[test]
    fn test_walk_onto_floor() {
        let mut state = puzzle("####\n#@ #\n####");
        assert_eq!(
            state.attempt_move(Direction::Right),
            MoveOutcome::Walked { solved: true }
        );
        assert_eq!(state.player(), Point::new(2, 1));
        assert_eq!(state.move_count(), 1);
    }

    #[test]
    fn test_push_into_box_is_blocked() {
        let mut state = puzzle("######\n#@$$.#\n######");
        let before = state.snapshot();
        assert_eq!(state.attempt_move(Direction::Right), MoveOutcome::Blocked);
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_moves_off_the_grid_are_blocked() {
        let mut state = puzzle("@$");
        let before = state.snapshot();
        // Player leaves the grid, and the box would be pushed off it.
        assert_eq!(state.attempt_move(Direction::Left), MoveOutcome::Blocked);
        assert_eq!(state.attempt_move(Direction::Up), MoveOutcome::Blocked);
        assert_eq!(state.attempt_move(Direction::Down), MoveOutcome::Blocked);
        assert_eq!(state.attempt_move(Direction::Right), MoveOutcome::Blocked);
        assert_eq!(state.snapshot(), before);
        assert_eq!(state.move_count(), 0);
    }

    #[test]
    fn test_push_past_short_row_is_blocked() {
        let mut state = puzzle("#####\n#@$\n#####");
        let before = state.snapshot();
        assert_eq!(state.attempt_move(Direction::Right), MoveOutcome::Blocked);
        assert_eq!(state.snapshot(), before);
    }

    #[test]
    fn test_push_into_void_is_blocked() {
        // The box's right neighbor is exterior void reached through a gap.
        let mut state = puzzle("#####\n#@$ \n#####");
        assert_eq!(state.level().cell(Point::new(3, 1)), Some(crate::Cell::Void));
        assert_eq!(state.attempt_move(Direction::Right), MoveOutcome::Blocked);
    }

    #[test]
    fn test_push_keeps_box_identity() {
        let mut state = puzzle("#######\n#.$@$.#\n#######");
        assert_eq!(
            state.attempt_move(Direction::Right),
            MoveOutcome::Pushed { box_index: 1, solved: false }
        );
        assert_eq!(state.boxes(), &[Point::new(2, 1), Point::new(5, 1)]);
        assert_eq!(state.boxes_on_goals(), 1);
    }

    #[test]
    fn test_undo_restores_exactly() {
        let mut state = puzzle("######\n#@$ .#\n######");
        let initial = state.snapshot();
        state.attempt_move(Direction::Right);
        state.attempt_move(Direction::Right);
        assert_eq!(state.move_count(), 2);
        assert!(state.is_won());

        assert!(state.undo());
        assert!(state.undo());
        assert_eq!(state.snapshot(), initial);
        assert!(!state.undo());
        assert_eq!(state.snapshot(), initial);
    }

    #[test]
    fn test_win_predicate() {
        assert!(!puzzle("#####\n#@$ #\n#####").is_won());
        assert!(puzzle("####\n#@ #\n####").is_won());
        assert!(puzzle("####\n#@*#\n####").is_won());
    }

    #[test]
    fn test_display_renders_current_layout() {
        let mut state = puzzle("#####\n#@$.#\n#####");
        state.attempt_move(Direction::Right);
        assert_eq!(state.to_string(), "#####\n#-@*#\n#####");
    }
}
