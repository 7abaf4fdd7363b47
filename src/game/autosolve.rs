//! # Auto-Solve Module
//!
//! Scripted playback of oracle plans, one move per cadence tick.
//!
//! The player drives [`PuzzleState::attempt_move`], the same primitive used
//! for manual input, and never talks to the oracle itself. The owning
//! session asks the orchestrator for a plan while the player is `Finding`.

use crate::game::{Direction, MoveOutcome, PuzzleState};
use crate::solvability::{RequestId, SolvabilityResult};
use log::{debug, info};
use std::collections::VecDeque;
use std::time::Duration;

/// Playback phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoPlayPhase {
    Idle,
    /// Waiting for the oracle to answer `request`.
    Finding { request: RequestId },
    Playing,
}

/// Why playback ended (or never started).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoPlayStop {
    Solved,
    PlanExhausted,
    /// A scripted move was rejected: the plan no longer matches the state.
    Desync { step: usize, direction: Direction },
    /// Manual input or an explicit toggle ended playback.
    Interrupted,
    PlanTooLong { len: usize },
    Unsolvable { message: String },
    Inconclusive { message: String },
}

impl AutoPlayStop {
    /// User-facing description.
    pub fn message(&self) -> String {
        match self {
            AutoPlayStop::Solved => "Auto-solve finished the puzzle.".to_string(),
            AutoPlayStop::PlanExhausted => {
                "Auto-solve ran out of moves before the puzzle was solved.".to_string()
            }
            AutoPlayStop::Desync { step, direction } => format!(
                "Auto-solve stopped: move {} ({}) no longer fits the board.",
                step, direction
            ),
            AutoPlayStop::Interrupted => "Auto-solve stopped.".to_string(),
            AutoPlayStop::PlanTooLong { len } => format!(
                "The solution found is too long to play back ({} moves).",
                len
            ),
            AutoPlayStop::Unsolvable { message } => format!("Cannot auto-solve: {}", message),
            AutoPlayStop::Inconclusive { message } => {
                format!("No plan found to auto-solve: {}", message)
            }
        }
    }
}

/// Result of one cadence tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoPlayStep {
    /// Playback is not running; nothing happened.
    Idle,
    /// One scripted move was applied and more remain.
    Moved {
        direction: Direction,
        outcome: MoveOutcome,
    },
    /// Playback ended, possibly after applying a final move.
    Finished {
        moved: Option<(Direction, MoveOutcome)>,
        reason: AutoPlayStop,
    },
}

/// Playback state machine: `Idle → Finding → Playing → Idle`.
#[derive(Debug, Clone)]
pub struct AutoSolvePlayer {
    phase: AutoPlayPhase,
    script: VecDeque<Direction>,
    played: usize,
    /// Delay between scripted moves
    pub cadence: Duration,
}

impl AutoSolvePlayer {
    /// Creates an idle player.
    pub fn new(cadence: Duration) -> Self {
        Self {
            phase: AutoPlayPhase::Idle,
            script: VecDeque::new(),
            played: 0,
            cadence,
        }
    }

    pub fn phase(&self) -> AutoPlayPhase {
        self.phase
    }

    /// Whether playback is finding or playing.
    pub fn is_active(&self) -> bool {
        self.phase != AutoPlayPhase::Idle
    }

    pub fn is_playing(&self) -> bool {
        self.phase == AutoPlayPhase::Playing
    }

    /// Moves still to be played.
    pub fn remaining(&self) -> usize {
        self.script.len()
    }

    /// Waits for the oracle to answer the given request.
    pub fn begin_finding(&mut self, request: RequestId) {
        debug!("Auto-solve waiting on request {}", request);
        self.script.clear();
        self.played = 0;
        self.phase = AutoPlayPhase::Finding { request };
    }

    /// Starts playing a plan immediately.
    pub fn begin_playing(&mut self, plan: &[Direction]) {
        info!("Auto-solve playing {} moves", plan.len());
        self.script = plan.iter().copied().collect();
        self.played = 0;
        self.phase = AutoPlayPhase::Playing;
    }

    /// Feeds an applied oracle result to a finding player.
    ///
    /// Returns `None` when the player is not waiting on `request`,
    /// `Some(Ok(()))` when playback starts, and `Some(Err(reason))` when it
    /// cannot start.
    pub fn resolve(
        &mut self,
        request: RequestId,
        result: &SolvabilityResult,
        move_cap: usize,
    ) -> Option<Result<(), AutoPlayStop>> {
        if self.phase != (AutoPlayPhase::Finding { request }) {
            return None;
        }

        let outcome = match result {
            SolvabilityResult::Solvable { plan: Some(plan), .. } if plan.len() <= move_cap => {
                self.begin_playing(plan);
                return Some(Ok(()));
            }
            SolvabilityResult::Solvable { plan: Some(plan), .. } => {
                AutoPlayStop::PlanTooLong { len: plan.len() }
            }
            SolvabilityResult::Solvable { plan: None, .. } => AutoPlayStop::Inconclusive {
                message: "the oracle reported the puzzle solvable but returned no plan"
                    .to_string(),
            },
            SolvabilityResult::Unsolvable { message } => AutoPlayStop::Unsolvable {
                message: message.clone(),
            },
            SolvabilityResult::Unknown { message } => AutoPlayStop::Inconclusive {
                message: message.clone(),
            },
            SolvabilityResult::Error { message, .. } => AutoPlayStop::Inconclusive {
                message: message.clone(),
            },
        };

        self.reset();
        Some(Err(outcome))
    }

    /// Stops playback. Returns the stop reason if anything was running.
    pub fn stop(&mut self, reason: AutoPlayStop) -> Option<AutoPlayStop> {
        if !self.is_active() {
            return None;
        }
        debug!("Auto-solve stopping after {} moves: {:?}", self.played, reason);
        self.reset();
        Some(reason)
    }

    /// Applies the next scripted move.
    pub fn step(&mut self, puzzle: &mut PuzzleState) -> AutoPlayStep {
        if self.phase != AutoPlayPhase::Playing {
            return AutoPlayStep::Idle;
        }

        if puzzle.is_won() {
            return self.finish(None, AutoPlayStop::Solved);
        }

        let Some(direction) = self.script.pop_front() else {
            return self.finish(None, AutoPlayStop::PlanExhausted);
        };

        let outcome = puzzle.attempt_move(direction);
        if !outcome.is_success() {
            let step = self.played + 1;
            return self.finish(None, AutoPlayStop::Desync { step, direction });
        }
        self.played += 1;

        if outcome.solved() {
            return self.finish(Some((direction, outcome)), AutoPlayStop::Solved);
        }
        if self.script.is_empty() {
            return self.finish(Some((direction, outcome)), AutoPlayStop::PlanExhausted);
        }

        AutoPlayStep::Moved { direction, outcome }
    }

    fn finish(&mut self, moved: Option<(Direction, MoveOutcome)>, reason: AutoPlayStop) -> AutoPlayStep {
        info!("Auto-solve finished after {} moves: {:?}", self.played, reason);
        self.reset();
        AutoPlayStep::Finished { moved, reason }
    }

    fn reset(&mut self) {
        self.phase = AutoPlayPhase::Idle;
        self.script.clear();
        self.played = 0;
    }
}

impl Default for AutoSolvePlayer {
    fn default() -> Self {
        Self::new(Duration::from_millis(crate::config::AUTOPLAY_CADENCE_MS))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Level;

    fn puzzle(text: &str) -> PuzzleState {
        PuzzleState::new(Level::parse(text).unwrap())
    }

    fn solvable(plan: Vec<Direction>) -> SolvabilityResult {
        SolvabilityResult::Solvable {
            plan: Some(plan),
            hint: None,
            message: None,
        }
    }

    #[test]
    fn test_player_creation() {
        let player = AutoSolvePlayer::default();
        assert_eq!(player.phase(), AutoPlayPhase::Idle);
        assert!(!player.is_active());
        assert_eq!(player.remaining(), 0);
    }

    #[test]
    fn test_plays_plan_to_win() {
        let mut state = puzzle("######\n#@$ .#\n######");
        let mut player = AutoSolvePlayer::default();
        player.begin_playing(&[Direction::Right, Direction::Right]);

        assert!(matches!(player.step(&mut state), AutoPlayStep::Moved { direction: Direction::Right, .. }));
        match player.step(&mut state) {
            AutoPlayStep::Finished { moved: Some(_), reason } => assert_eq!(reason, AutoPlayStop::Solved),
            other => panic!("unexpected step {:?}", other),
        }
        assert!(state.is_won());
        assert!(!player.is_active());
        assert_eq!(player.step(&mut state), AutoPlayStep::Idle);
    }

    #[test]
    fn test_rejected_move_is_desync() {
        let mut state = puzzle("#####\n#@$.#\n#####");
        let mut player = AutoSolvePlayer::default();
        player.begin_playing(&[Direction::Up, Direction::Right]);

        let step = player.step(&mut state);
        assert_eq!(
            step,
            AutoPlayStep::Finished {
                moved: None,
                reason: AutoPlayStop::Desync { step: 1, direction: Direction::Up },
            }
        );
        assert_eq!(state.move_count(), 0);
        assert!(!player.is_active());
    }

    #[test]
    fn test_plan_exhausted_without_win() {
        let mut state = puzzle("#######\n#@ $ .#\n#######");
        let mut player = AutoSolvePlayer::default();
        player.begin_playing(&[Direction::Right]);

        match player.step(&mut state) {
            AutoPlayStep::Finished { moved, reason } => {
                assert!(moved.is_some());
                assert_eq!(reason, AutoPlayStop::PlanExhausted);
            }
            other => panic!("unexpected step {:?}", other),
        }
    }

    #[test]
    fn test_resolve_only_matching_request() {
        let mut player = AutoSolvePlayer::default();
        player.begin_finding(7);

        assert_eq!(player.resolve(6, &solvable(vec![Direction::Up]), 10), None);
        assert_eq!(player.resolve(7, &solvable(vec![Direction::Up]), 10), Some(Ok(())));
        assert!(player.is_playing());
        assert_eq!(player.remaining(), 1);
    }

    #[test]
    fn test_resolve_rejects_long_and_negative_results() {
        let mut player = AutoSolvePlayer::default();
        player.begin_finding(1);
        assert_eq!(
            player.resolve(1, &solvable(vec![Direction::Up; 5]), 4),
            Some(Err(AutoPlayStop::PlanTooLong { len: 5 }))
        );
        assert!(!player.is_active());

        player.begin_finding(2);
        let unsolvable = SolvabilityResult::Unsolvable {
            message: "dead end".to_string(),
        };
        assert!(matches!(
            player.resolve(2, &unsolvable, 4),
            Some(Err(AutoPlayStop::Unsolvable { .. }))
        ));
    }

    #[test]
    fn test_stop_only_reports_when_active() {
        let mut player = AutoSolvePlayer::default();
        assert_eq!(player.stop(AutoPlayStop::Interrupted), None);
        player.begin_playing(&[Direction::Left]);
        assert_eq!(player.stop(AutoPlayStop::Interrupted), Some(AutoPlayStop::Interrupted));
        assert!(!player.is_active());
    }
}
