//! # Input Module
//!
//! Text command parsing for player interactions.

use crate::game::Direction;
use log::debug;

/// Input handler for processing player commands.
///
/// Turns lines typed on stdin into [`PlayerInput`] values. A line is either a
/// single command word (`undo`, `left`, `quit`, ...) or a string of one-key
/// commands such as `ddwu`.
#[derive(Debug, Clone)]
pub struct InputHandler {
    /// Whether to enable Vi-style movement keys (hjkl)
    pub vi_keys_enabled: bool,
}

impl Default for InputHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl InputHandler {
    /// Creates a new input handler.
    ///
    /// # Examples
    ///
    /// ```
    /// use sokolink::{Direction, InputHandler, PlayerInput};
    ///
    /// let input_handler = InputHandler::new();
    /// assert_eq!(
    ///     input_handler.parse_line("dd"),
    ///     vec![PlayerInput::Move(Direction::Right), PlayerInput::Move(Direction::Right)]
    /// );
    /// ```
    pub fn new() -> Self {
        Self {
            vi_keys_enabled: true,
        }
    }

    /// Parses one line of input. Unknown keys are skipped.
    pub fn parse_line(&self, line: &str) -> Vec<PlayerInput> {
        let line = line.trim();
        if line.is_empty() {
            return Vec::new();
        }

        if let Some(input) = self.parse_word(line) {
            return vec![input];
        }

        line.chars()
            .filter(|c| !c.is_whitespace())
            .filter_map(|key| {
                let input = self.parse_key(key);
                if input.is_none() {
                    debug!("Ignoring unknown key {:?}", key);
                }
                input
            })
            .collect()
    }

    /// Maps a single key to an input.
    pub fn parse_key(&self, key: char) -> Option<PlayerInput> {
        let input = match key.to_ascii_lowercase() {
            'w' => PlayerInput::Move(Direction::Up),
            's' => PlayerInput::Move(Direction::Down),
            'a' => PlayerInput::Move(Direction::Left),
            'd' => PlayerInput::Move(Direction::Right),
            'k' if self.vi_keys_enabled => PlayerInput::Move(Direction::Up),
            'j' if self.vi_keys_enabled => PlayerInput::Move(Direction::Down),
            'h' if self.vi_keys_enabled => PlayerInput::Move(Direction::Left),
            'l' if self.vi_keys_enabled => PlayerInput::Move(Direction::Right),
            'u' | 'z' => PlayerInput::Undo,
            'r' => PlayerInput::Reset,
            'n' => PlayerInput::NewLevel,
            'p' => PlayerInput::ToggleAutoSolve,
            'v' => PlayerInput::TogglePlanDisplay,
            'c' => PlayerInput::Recheck,
            'm' => PlayerInput::ToggleMode,
            '?' => PlayerInput::Help,
            'q' => PlayerInput::Quit,
            _ => return None,
        };
        Some(input)
    }

    fn parse_word(&self, word: &str) -> Option<PlayerInput> {
        if word.chars().count() < 2 {
            return None;
        }
        if let Ok(direction) = word.parse::<Direction>() {
            return Some(PlayerInput::Move(direction));
        }
        let input = match word.to_lowercase().as_str() {
            "undo" => PlayerInput::Undo,
            "reset" | "restart" => PlayerInput::Reset,
            "new" | "next" => PlayerInput::NewLevel,
            "solve" | "auto" => PlayerInput::ToggleAutoSolve,
            "plan" => PlayerInput::TogglePlanDisplay,
            "check" | "recheck" => PlayerInput::Recheck,
            "mode" => PlayerInput::ToggleMode,
            "help" => PlayerInput::Help,
            "quit" | "exit" => PlayerInput::Quit,
            _ => return None,
        };
        Some(input)
    }

    /// One-line summary of the commands.
    pub fn help_text(&self) -> &'static str {
        "Commands: w/a/s/d (or k/h/j/l) move, u undo, r reset, n new level, \
         p auto-solve, v show plan, c recheck, m toggle fixed/auto mode, ? help, q quit"
    }
}

/// Player input types that can be processed by the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerInput {
    /// Move or push in a direction
    Move(Direction),
    /// Take back the last move
    Undo,
    /// Restart the current level
    Reset,
    /// Generate a fresh random level
    NewLevel,
    /// Start or stop auto-solve
    ToggleAutoSolve,
    /// Show or hide the oracle's plan
    TogglePlanDisplay,
    /// Ask the oracle again now
    Recheck,
    /// Switch between fixed and auto query mode
    ToggleMode,
    /// Show help information
    Help,
    /// Quit the game
    Quit,
}
