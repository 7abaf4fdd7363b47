//! # Session
//!
//! The event pump for one player: owns the puzzle, the orchestrator, the
//! session-wide timing table and auto-solve playback, and turns inputs and
//! timer/oracle events into notices for the UI.
//!
//! Everything runs on the caller's task. Timers and oracle calls post events
//! back through channels; [`Session::next_event`] waits for the next one and
//! [`Session::handle_event`] applies it. Must be used inside a tokio runtime.

use crate::config::ClientConfig;
use crate::game::{AutoPlayStep, AutoPlayStop, AutoSolvePlayer, Direction, Level, PuzzleState};
use crate::generation::{utils, GenerationConfig, Generator, PuzzleGenerator, Tier};
use crate::input::{InputHandler, PlayerInput};
use crate::oracle::Oracle;
use crate::solvability::{
    PlanCache, QueryEvent, QueryMode, QueryOptions, QueryUpdate, Scheduler, SolvabilityOrchestrator,
    SolvabilityStatus, TaskSlot, TimingEstimator, Trigger,
};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Something the session must react to.
#[derive(Debug)]
pub enum SessionEvent {
    Query(QueryEvent),
    /// Time for the next scripted move; carries the timer id
    AutoPlayTick(u64),
    /// Time to announce the win; carries the timer id
    SolvedReveal(u64),
}

/// What the UI should show after handling an input or event.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotice {
    /// The board changed and should be redrawn
    BoardChanged,
    Blocked {
        direction: Direction,
    },
    /// The winning move was just made
    Won {
        moves: u32,
    },
    /// Delayed solved announcement
    Solved {
        moves: u32,
    },
    LevelLoaded {
        name: Option<String>,
    },
    Status(SolvabilityStatus),
    /// Remaining moves of the displayed plan
    Plan(Vec<Direction>),
    AutoSolveStarted {
        moves: usize,
    },
    AutoSolveStopped(AutoPlayStop),
    ModeChanged(QueryMode),
    PlanDisplay(bool),
    Message(String),
    Quit,
}

impl SessionNotice {
    /// Text for the message log, if the notice carries any.
    pub fn describe(&self) -> Option<String> {
        match self {
            SessionNotice::BoardChanged | SessionNotice::Quit => None,
            SessionNotice::Blocked { direction } => Some(format!("Can't move {}.", direction)),
            SessionNotice::Won { moves } => Some(format!("All boxes placed in {} moves!", moves)),
            SessionNotice::Solved { moves } => {
                Some(format!("Level solved in {} moves. Press n for a new level.", moves))
            }
            SessionNotice::LevelLoaded { name } => Some(format!(
                "Loaded {}.",
                name.as_deref().unwrap_or("level")
            )),
            SessionNotice::Status(status) => {
                let text = status.describe();
                (!text.is_empty()).then_some(text)
            }
            SessionNotice::Plan(moves) if moves.is_empty() => Some("No plan to show.".to_string()),
            SessionNotice::Plan(moves) => Some(format!(
                "Plan: {}",
                moves
                    .iter()
                    .map(|d| d.as_str())
                    .collect::<Vec<_>>()
                    .join(" ")
            )),
            SessionNotice::AutoSolveStarted { moves } => {
                Some(format!("Auto-solving ({} moves)...", moves))
            }
            SessionNotice::AutoSolveStopped(reason) => Some(reason.message()),
            SessionNotice::ModeChanged(mode) => Some(format!("Query mode: {}.", mode)),
            SessionNotice::PlanDisplay(on) => Some(format!(
                "Plan display {}.",
                if *on { "on" } else { "off" }
            )),
            SessionNotice::Message(text) => Some(text.clone()),
        }
    }
}

/// One player's game session.
pub struct Session {
    config: ClientConfig,
    level: Level,
    puzzle: PuzzleState,
    orchestrator: SolvabilityOrchestrator,
    query_rx: mpsc::UnboundedReceiver<QueryEvent>,
    timing: TimingEstimator,
    autoplay: AutoSolvePlayer,
    timers: Scheduler<SessionEvent>,
    timer_rx: mpsc::UnboundedReceiver<SessionEvent>,
    tick: TaskSlot,
    reveal: TaskSlot,
    // Ids of the armed timers. Queued events with any other id are stale.
    tick_id: Option<u64>,
    reveal_id: Option<u64>,
    next_timer_id: u64,
    generator: PuzzleGenerator,
    tier: Tier,
    next_seed: u64,
    show_plan: bool,
    won: bool,
}

impl Session {
    /// Creates a session on `level`. Call [`start`](Self::start) to begin.
    pub fn new(config: ClientConfig, level: Level, oracle: Arc<dyn Oracle>, seed: u64) -> Self {
        let (orchestrator, query_rx) =
            SolvabilityOrchestrator::new(config.orchestrator.clone(), oracle);
        let (timers, timer_rx) = Scheduler::channel();

        Self {
            level: level.clone(),
            puzzle: PuzzleState::new(level),
            orchestrator,
            query_rx,
            timing: TimingEstimator::new(),
            autoplay: AutoSolvePlayer::new(config.autoplay_cadence()),
            timers,
            timer_rx,
            tick: TaskSlot::new(),
            reveal: TaskSlot::new(),
            tick_id: None,
            reveal_id: None,
            next_timer_id: 0,
            generator: PuzzleGenerator::with_max_attempts(config.generation.max_attempts),
            tier: config.generation.tier,
            next_seed: seed,
            show_plan: config.show_plan,
            won: false,
            config,
        }
    }

    /// Creates a session on a freshly generated level.
    pub fn with_random_level(
        config: ClientConfig,
        oracle: Arc<dyn Oracle>,
        seed: u64,
    ) -> crate::SokolinkResult<Self> {
        let generation = GenerationConfig::for_tier(seed, config.generation.tier);
        let generator = PuzzleGenerator::with_max_attempts(config.generation.max_attempts);
        let level = generator.generate(&generation, &mut utils::create_rng(&generation))?;
        let mut session = Self::new(config, level, oracle, seed);
        session.next_seed = seed.wrapping_add(1);
        Ok(session)
    }

    /// Starts the initial analysis of the current level.
    pub fn start(&mut self) -> Vec<SessionNotice> {
        let level = self.level.clone();
        self.load_level(level)
    }

    pub fn puzzle(&self) -> &PuzzleState {
        &self.puzzle
    }

    pub fn orchestrator(&self) -> &SolvabilityOrchestrator {
        &self.orchestrator
    }

    pub fn timing(&self) -> &TimingEstimator {
        &self.timing
    }

    pub fn autoplay(&self) -> &AutoSolvePlayer {
        &self.autoplay
    }

    pub fn status(&self) -> &SolvabilityStatus {
        self.orchestrator.status()
    }

    pub fn is_won(&self) -> bool {
        self.won
    }

    pub fn show_plan(&self) -> bool {
        self.show_plan
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    pub fn set_tier(&mut self, tier: Tier) {
        self.tier = tier;
    }

    /// Waits for the next timer or oracle event.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        tokio::select! {
            Some(event) = self.query_rx.recv() => Some(SessionEvent::Query(event)),
            Some(event) = self.timer_rx.recv() => Some(event),
            else => None,
        }
    }

    /// Replaces the current level and starts its analysis.
    pub fn load_level(&mut self, level: Level) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        if let Some(reason) = self.autoplay.stop(AutoPlayStop::Interrupted) {
            notices.push(SessionNotice::AutoSolveStopped(reason));
        }
        self.cancel_tick();
        self.cancel_reveal();
        self.orchestrator.reset();

        info!("Loading level {}", level.name.as_deref().unwrap_or("(unnamed)"));
        self.level = level.clone();
        self.puzzle = PuzzleState::new(level);
        self.won = false;
        notices.push(SessionNotice::LevelLoaded {
            name: self.level.name.clone(),
        });
        notices.push(SessionNotice::BoardChanged);

        if self.puzzle.is_won() {
            notices.extend(self.on_win());
        } else {
            self.schedule(Trigger::LevelStart);
        }
        notices
    }

    /// Applies one player input.
    pub fn handle_input(&mut self, input: PlayerInput) -> Vec<SessionNotice> {
        match input {
            PlayerInput::Move(direction) => self.player_move(direction),
            PlayerInput::Undo => self.undo(),
            PlayerInput::Reset => {
                let level = self.level.clone();
                self.load_level(level)
            }
            PlayerInput::NewLevel => self.new_level(),
            PlayerInput::ToggleAutoSolve => self.toggle_autosolve(),
            PlayerInput::TogglePlanDisplay => self.toggle_plan_display(),
            PlayerInput::Recheck => self.recheck(),
            PlayerInput::ToggleMode => {
                let mode = self.orchestrator.mode().toggled();
                self.orchestrator.set_mode(mode);
                let mut notices = vec![SessionNotice::ModeChanged(mode)];
                notices.extend(self.recheck());
                notices
            }
            PlayerInput::Help => vec![SessionNotice::Message(
                InputHandler::new().help_text().to_string(),
            )],
            PlayerInput::Quit => {
                self.shutdown();
                vec![SessionNotice::Quit]
            }
        }
    }

    /// Applies one event from [`next_event`](Self::next_event).
    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<SessionNotice> {
        match event {
            SessionEvent::Query(event) => self.query_event(event),
            SessionEvent::AutoPlayTick(id) => {
                if self.tick_id != Some(id) {
                    debug!("Ignoring stale auto-play tick {}", id);
                    return Vec::new();
                }
                self.tick_id = None;
                self.autoplay_tick()
            }
            SessionEvent::SolvedReveal(id) => {
                if self.reveal_id != Some(id) || !self.won {
                    debug!("Ignoring stale solved reveal {}", id);
                    return Vec::new();
                }
                self.reveal_id = None;
                vec![SessionNotice::Solved {
                    moves: self.puzzle.move_count(),
                }]
            }
        }
    }

    /// Cancels all timers and oracle work.
    pub fn shutdown(&mut self) {
        self.autoplay.stop(AutoPlayStop::Interrupted);
        self.cancel_tick();
        self.cancel_reveal();
        self.orchestrator.cancel();
    }

    fn schedule(&mut self, trigger: Trigger) {
        let mut options = QueryOptions::new(trigger);
        if self.show_plan {
            options = options.refreshing_plan();
        }
        self.orchestrator.schedule(&self.puzzle, options);
    }

    fn stop_autoplay(&mut self, notices: &mut Vec<SessionNotice>) {
        if let Some(reason) = self.autoplay.stop(AutoPlayStop::Interrupted) {
            self.cancel_tick();
            notices.push(SessionNotice::AutoSolveStopped(reason));
        }
    }

    fn player_move(&mut self, direction: Direction) -> Vec<SessionNotice> {
        if self.won {
            debug!("Ignoring move after the puzzle was solved");
            return Vec::new();
        }

        let mut notices = Vec::new();
        self.stop_autoplay(&mut notices);

        let previous = self.puzzle.key();
        let outcome = self.puzzle.attempt_move(direction);
        if !outcome.is_success() {
            notices.push(SessionNotice::Blocked { direction });
            return notices;
        }

        let progress = self
            .orchestrator
            .note_player_move(&previous, direction, self.puzzle.key());
        notices.push(SessionNotice::BoardChanged);

        if outcome.solved() {
            notices.extend(self.on_win());
        } else if progress == crate::solvability::PlanProgress::Diverged {
            self.orchestrator.schedule(
                &self.puzzle,
                QueryOptions::new(Trigger::PlanDiverged).refreshing_plan(),
            );
        } else {
            self.schedule(Trigger::Explore);
        }
        notices
    }

    fn undo(&mut self) -> Vec<SessionNotice> {
        let mut notices = Vec::new();
        self.stop_autoplay(&mut notices);

        if !self.puzzle.undo() {
            notices.push(SessionNotice::Message("Nothing to undo.".to_string()));
            return notices;
        }

        self.won = false;
        self.cancel_reveal();
        self.orchestrator.clear_active_plan();
        notices.push(SessionNotice::BoardChanged);
        self.schedule(Trigger::Explore);
        notices
    }

    fn new_level(&mut self) -> Vec<SessionNotice> {
        let seed = self.next_seed;
        self.next_seed = self.next_seed.wrapping_add(1);

        let config = GenerationConfig::for_tier(seed, self.tier);
        let mut rng = utils::create_rng(&config);
        match self.generator.generate(&config, &mut rng) {
            Ok(level) => self.load_level(level),
            Err(err) => {
                warn!("Level generation failed: {}", err);
                vec![SessionNotice::Message(format!(
                    "Could not generate a level: {}",
                    err
                ))]
            }
        }
    }

    fn toggle_autosolve(&mut self) -> Vec<SessionNotice> {
        if self.autoplay.is_active() {
            let mut notices = Vec::new();
            self.stop_autoplay(&mut notices);
            // Supersede a plan request that may still be running.
            self.schedule(Trigger::Recheck);
            return notices;
        }

        if self.won {
            return vec![SessionNotice::Message("The puzzle is already solved.".to_string())];
        }

        let key = self.puzzle.key();
        if let Some(plan) = self.orchestrator.cached_plan(&key).map(|plan| plan.to_vec()) {
            self.orchestrator.cancel();
            self.autoplay.begin_playing(&plan);
            self.schedule_tick();
            return vec![SessionNotice::AutoSolveStarted { moves: plan.len() }];
        }
        if let PlanCache::TooLong { key: cached, len } = self.orchestrator.plan_cache() {
            if *cached == key {
                return vec![SessionNotice::AutoSolveStopped(AutoPlayStop::PlanTooLong {
                    len: *len,
                })];
            }
        }

        let id = self.orchestrator.schedule(
            &self.puzzle,
            QueryOptions::new(Trigger::AutoSolve).with_mode(QueryMode::Auto),
        );
        self.autoplay.begin_finding(id);
        vec![SessionNotice::Message("Searching for a solution...".to_string())]
    }

    fn toggle_plan_display(&mut self) -> Vec<SessionNotice> {
        self.show_plan = !self.show_plan;
        let mut notices = vec![SessionNotice::PlanDisplay(self.show_plan)];
        if !self.show_plan {
            self.orchestrator.clear_active_plan();
            return notices;
        }

        let key = self.puzzle.key();
        if self.orchestrator.set_active_plan_from_cache(&key) {
            notices.push(SessionNotice::Plan(self.orchestrator.active_plan()));
        } else if !self.won && !self.autoplay.is_active() {
            self.schedule(Trigger::Recheck);
        }
        notices
    }

    fn recheck(&mut self) -> Vec<SessionNotice> {
        if self.won {
            return Vec::new();
        }
        if self.autoplay.is_active() {
            return vec![SessionNotice::Message(
                "Auto-solve is running; press p to stop it first.".to_string(),
            )];
        }
        self.schedule(Trigger::Recheck);
        Vec::new()
    }

    fn query_event(&mut self, event: QueryEvent) -> Vec<SessionNotice> {
        let Some(update) = self.orchestrator.handle_event(event, &mut self.timing) else {
            return Vec::new();
        };

        match update {
            QueryUpdate::Started { .. } => {
                vec![SessionNotice::Status(self.orchestrator.status().clone())]
            }
            QueryUpdate::Applied { id, result } => {
                let mut notices = vec![SessionNotice::Status(self.orchestrator.status().clone())];
                if self.show_plan {
                    notices.push(SessionNotice::Plan(self.orchestrator.active_plan()));
                }

                let cap = self.orchestrator.config().plan_move_cap;
                match self.autoplay.resolve(id, &result, cap) {
                    Some(Ok(())) => {
                        self.schedule_tick();
                        notices.push(SessionNotice::AutoSolveStarted {
                            moves: self.autoplay.remaining(),
                        });
                    }
                    Some(Err(reason)) => notices.push(SessionNotice::AutoSolveStopped(reason)),
                    None => {}
                }
                notices
            }
            QueryUpdate::Superseded { .. } | QueryUpdate::Aborted { .. } => Vec::new(),
        }
    }

    fn autoplay_tick(&mut self) -> Vec<SessionNotice> {
        match self.autoplay.step(&mut self.puzzle) {
            AutoPlayStep::Idle => Vec::new(),
            AutoPlayStep::Moved { .. } => {
                self.schedule_tick();
                vec![SessionNotice::BoardChanged]
            }
            AutoPlayStep::Finished { moved, reason } => {
                let mut notices = Vec::new();
                if moved.is_some() {
                    notices.push(SessionNotice::BoardChanged);
                }
                notices.push(SessionNotice::AutoSolveStopped(reason.clone()));

                if reason == AutoPlayStop::Solved {
                    if !self.won {
                        notices.extend(self.on_win());
                    }
                } else {
                    self.schedule(Trigger::Recheck);
                }
                notices
            }
        }
    }

    fn timer_id(&mut self) -> u64 {
        self.next_timer_id += 1;
        self.next_timer_id
    }

    fn schedule_tick(&mut self) {
        let id = self.timer_id();
        let cadence = self.autoplay.cadence;
        self.tick
            .replace(self.timers.schedule(cadence, SessionEvent::AutoPlayTick(id)));
        self.tick_id = Some(id);
    }

    fn cancel_tick(&mut self) {
        self.tick.cancel();
        self.tick_id = None;
    }

    fn cancel_reveal(&mut self) {
        self.reveal.cancel();
        self.reveal_id = None;
    }

    fn on_win(&mut self) -> Vec<SessionNotice> {
        self.won = true;
        self.orchestrator.cancel();
        self.orchestrator.clear_active_plan();
        let moves = self.puzzle.move_count();
        info!("Level solved in {} moves", moves);
        let id = self.timer_id();
        self.reveal.replace(
            self.timers
                .schedule(self.config.solved_reveal(), SessionEvent::SolvedReveal(id)),
        );
        self.reveal_id = Some(id);
        vec![SessionNotice::Won { moves }]
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("level", &self.level.name)
            .field("moves", &self.puzzle.move_count())
            .field("won", &self.won)
            .field("orchestrator", &self.orchestrator)
            .finish()
    }
}
