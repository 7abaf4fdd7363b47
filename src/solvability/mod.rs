//! # Solvability Module
//!
//! Keeps the solvability classification of the current position up to date
//! by querying the oracle, without ever applying a stale answer.
//!
//! ## Query lifecycle
//!
//! `Idle → Debouncing → InFlight → {Applied | Superseded | Aborted}`
//!
//! Every call to [`SolvabilityOrchestrator::schedule`] cancels the pending
//! debounce timer, aborts the in-flight request, and issues a fresh request
//! id. Cancellation is advisory: the abandoned oracle call may still finish,
//! and its completion is discarded because its id is no longer the latest.
//! The orchestrator is the single writer of the plan cache and status, and
//! it only writes from [`SolvabilityOrchestrator::handle_event`].

pub mod scheduler;
pub mod timing;

pub use scheduler::*;
pub use timing::*;

use crate::config::OrchestratorConfig;
use crate::game::{Direction, PuzzleState, StateKey};
use crate::oracle::{abort_pair, AbortHandle, Oracle, OracleError, OracleRequest, OracleResponse, OracleState};
use crate::SokolinkError;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::Instant;

/// Monotonic query identity.
pub type RequestId = u64;

/// How the oracle searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// One bounded-horizon search; whatever it answers is accepted
    #[default]
    Fixed,
    /// The oracle raises its own horizon until it finds a plan, proves
    /// unsolvability, or is cancelled
    Auto,
}

impl QueryMode {
    pub fn toggled(self) -> Self {
        match self {
            QueryMode::Fixed => QueryMode::Auto,
            QueryMode::Auto => QueryMode::Fixed,
        }
    }
}

impl fmt::Display for QueryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryMode::Fixed => write!(f, "fixed"),
            QueryMode::Auto => write!(f, "auto"),
        }
    }
}

impl FromStr for QueryMode {
    type Err = SokolinkError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fixed" => Ok(QueryMode::Fixed),
            "auto" => Ok(QueryMode::Auto),
            other => Err(SokolinkError::Config(format!("unknown query mode '{}'", other))),
        }
    }
}

/// What caused a query; selects the debounce delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Ordinary walking
    Explore,
    /// The player's move did not match the displayed plan
    PlanDiverged,
    /// Explicit request, or playback ended without a win
    Recheck,
    /// Initial analysis of a freshly loaded level
    LevelStart,
    /// Plan request that starts auto-solve
    AutoSolve,
}

impl Trigger {
    /// Whether the query uses the longer initial-analysis horizon.
    pub fn is_deep(self) -> bool {
        self == Trigger::LevelStart
    }
}

/// Parameters of a [`SolvabilityOrchestrator::schedule`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryOptions {
    pub trigger: Trigger,
    /// Overrides the configured mode
    pub mode: Option<QueryMode>,
    /// Replace the displayed plan with the answer's plan
    pub refresh_plan: bool,
}

impl QueryOptions {
    pub fn new(trigger: Trigger) -> Self {
        Self {
            trigger,
            mode: None,
            refresh_plan: false,
        }
    }

    pub fn with_mode(mut self, mode: QueryMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn refreshing_plan(mut self) -> Self {
        self.refresh_plan = true;
        self
    }
}

/// A query as issued to the oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct SolvabilityRequest {
    pub id: RequestId,
    pub key: StateKey,
    pub trigger: Trigger,
    pub mode: QueryMode,
    pub max_steps: u32,
    pub has_undo: bool,
    pub refresh_plan: bool,
    pub deep: bool,
    pub optimal: bool,
    pub timeout_sec: f64,
    pub expected_ms: f64,
    pub state: OracleState,
}

impl SolvabilityRequest {
    pub fn to_wire(&self) -> OracleRequest {
        OracleRequest {
            state: self.state.clone(),
            deep: self.deep,
            max_steps: self.max_steps,
            timeout_sec: Some(self.timeout_sec),
            auto: self.mode == QueryMode::Auto,
            optimal: self.optimal,
        }
    }
}

/// Oracle outcome normalised for the UI.
#[derive(Debug, Clone, PartialEq)]
pub enum SolvabilityResult {
    Solvable {
        plan: Option<Vec<Direction>>,
        hint: Option<String>,
        message: Option<String>,
    },
    Unsolvable {
        message: String,
    },
    /// The search ran out of budget without proving either outcome.
    Unknown {
        message: String,
    },
    Error {
        aborted: bool,
        message: String,
    },
}

impl SolvabilityResult {
    /// Folds a raw oracle outcome into the four-way classification.
    pub fn from_outcome(outcome: Result<OracleResponse, OracleError>) -> Self {
        match outcome {
            Ok(response) => match response.solvable {
                Some(true) => SolvabilityResult::Solvable {
                    plan: response.solution,
                    hint: response.hint_message,
                    message: response.message,
                },
                Some(false) => SolvabilityResult::Unsolvable {
                    message: response
                        .message
                        .unwrap_or_else(|| "No solution exists from this position.".to_string()),
                },
                None => SolvabilityResult::Unknown {
                    message: response.message.unwrap_or_else(|| {
                        "The search ended without a plan or a proof.".to_string()
                    }),
                },
            },
            Err(OracleError::Aborted) => SolvabilityResult::Error {
                aborted: true,
                message: OracleError::Aborted.to_string(),
            },
            Err(err) => SolvabilityResult::Error {
                aborted: false,
                message: err.to_string(),
            },
        }
    }

    pub fn is_solvable(&self) -> bool {
        matches!(self, SolvabilityResult::Solvable { .. })
    }
}

/// Last plan received, tied to the position it was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PlanCache {
    #[default]
    Empty,
    Plan {
        key: StateKey,
        moves: Vec<Direction>,
    },
    /// Solvable, but the plan exceeds the playback cap.
    TooLong {
        key: StateKey,
        len: usize,
    },
}

/// User-visible classification of the current position.
#[derive(Debug, Clone, PartialEq)]
pub enum SolvabilityStatus {
    Idle,
    Checking {
        request: RequestId,
        horizon: u32,
        expected_ms: f64,
    },
    Solvable {
        hint: Option<String>,
        plan_len: Option<usize>,
    },
    /// Unsolvable after the player's own moves; undo can recover.
    DeadEnd {
        message: String,
    },
    /// The level is unsolvable from its initial layout.
    Unsolvable {
        message: String,
    },
    /// Neither proven nor disproven. Never shown as unsolvable.
    Inconclusive {
        message: String,
    },
}

impl SolvabilityStatus {
    pub fn describe(&self) -> String {
        match self {
            SolvabilityStatus::Idle => String::new(),
            SolvabilityStatus::Checking {
                horizon,
                expected_ms,
                ..
            } => format!(
                "Checking solvability (horizon {}, ~{:.1}s)...",
                horizon,
                expected_ms / 1000.0
            ),
            SolvabilityStatus::Solvable { hint, plan_len } => {
                let mut text = "Solvable.".to_string();
                if let Some(len) = plan_len {
                    text.push_str(&format!(" Plan: {} moves.", len));
                }
                if let Some(hint) = hint {
                    text.push(' ');
                    text.push_str(hint);
                }
                text
            }
            SolvabilityStatus::DeadEnd { message } => {
                format!("Dead end: {} Undo to recover.", message)
            }
            SolvabilityStatus::Unsolvable { message } => {
                format!("This level cannot be solved: {}", message)
            }
            SolvabilityStatus::Inconclusive { message } => format!("Inconclusive: {}", message),
        }
    }
}

/// Where the current query is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPhase {
    Idle,
    Debouncing,
    InFlight,
}

/// Oracle call finished (or failed) for `id`.
#[derive(Debug)]
pub struct QueryCompletion {
    pub id: RequestId,
    pub outcome: Result<OracleResponse, OracleError>,
    pub elapsed: Duration,
    /// The abort signal had fired by the time the call returned
    pub aborted: bool,
}

/// Events the orchestrator posts to itself.
#[derive(Debug)]
pub enum QueryEvent {
    DebounceElapsed(RequestId),
    Returned(QueryCompletion),
}

/// What handling an event did.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryUpdate {
    Started {
        id: RequestId,
        horizon: u32,
        expected_ms: f64,
    },
    Applied {
        id: RequestId,
        result: SolvabilityResult,
    },
    /// A newer request exists; the answer was dropped.
    Superseded { id: RequestId },
    /// The request was cancelled; the answer was dropped.
    Aborted { id: RequestId },
}

/// Effect of a player move on the displayed plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanProgress {
    NoPlan,
    Advanced,
    Diverged,
}

#[derive(Debug)]
struct PendingQuery {
    id: RequestId,
    key: StateKey,
    state: OracleState,
    trigger: Trigger,
    mode: QueryMode,
    has_undo: bool,
    refresh_plan: bool,
}

#[derive(Debug)]
struct InFlight {
    request: SolvabilityRequest,
    abort: AbortHandle,
}

/// Owns the lifecycle of oracle queries for one session.
pub struct SolvabilityOrchestrator {
    config: OrchestratorConfig,
    oracle: Arc<dyn Oracle>,
    scheduler: Scheduler<QueryEvent>,
    debounce: TaskSlot,
    latest_id: RequestId,
    pending: Option<PendingQuery>,
    in_flight: Option<InFlight>,
    status: SolvabilityStatus,
    hint: Option<String>,
    plan_cache: PlanCache,
    active_plan: VecDeque<Direction>,
}

impl SolvabilityOrchestrator {
    /// Creates an orchestrator and the receiver its events arrive on.
    ///
    /// Every event received must be passed back to
    /// [`handle_event`](Self::handle_event).
    pub fn new(
        config: OrchestratorConfig,
        oracle: Arc<dyn Oracle>,
    ) -> (Self, mpsc::UnboundedReceiver<QueryEvent>) {
        let (scheduler, rx) = Scheduler::channel();
        info!("Solvability orchestrator using {} oracle", oracle.name());
        let orchestrator = Self {
            config,
            oracle,
            scheduler,
            debounce: TaskSlot::new(),
            latest_id: 0,
            pending: None,
            in_flight: None,
            status: SolvabilityStatus::Idle,
            hint: None,
            plan_cache: PlanCache::Empty,
            active_plan: VecDeque::new(),
        };
        (orchestrator, rx)
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn mode(&self) -> QueryMode {
        self.config.mode
    }

    pub fn set_mode(&mut self, mode: QueryMode) {
        self.config.mode = mode;
    }

    pub fn status(&self) -> &SolvabilityStatus {
        &self.status
    }

    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    pub fn plan_cache(&self) -> &PlanCache {
        &self.plan_cache
    }

    pub fn latest_id(&self) -> RequestId {
        self.latest_id
    }

    pub fn in_flight_id(&self) -> Option<RequestId> {
        self.in_flight.as_ref().map(|flight| flight.request.id)
    }

    pub fn phase(&self) -> QueryPhase {
        if self.pending.is_some() {
            QueryPhase::Debouncing
        } else if self.in_flight.is_some() {
            QueryPhase::InFlight
        } else {
            QueryPhase::Idle
        }
    }

    /// Cached plan for exactly this position, if any.
    pub fn cached_plan(&self, key: &StateKey) -> Option<&[Direction]> {
        match &self.plan_cache {
            PlanCache::Plan { key: cached, moves } if cached == key => Some(moves),
            _ => None,
        }
    }

    /// Remaining moves of the displayed plan.
    pub fn active_plan(&self) -> Vec<Direction> {
        self.active_plan.iter().copied().collect()
    }

    /// Displays the cached plan if it belongs to `key`.
    pub fn set_active_plan_from_cache(&mut self, key: &StateKey) -> bool {
        let moves = self.cached_plan(key).map(|moves| moves.to_vec());
        match moves {
            Some(moves) => {
                self.active_plan = moves.into();
                true
            }
            None => false,
        }
    }

    pub fn clear_active_plan(&mut self) {
        self.active_plan.clear();
    }

    /// Tracks a successful player move against the cached and displayed plans.
    pub fn note_player_move(
        &mut self,
        previous: &StateKey,
        direction: Direction,
        current: StateKey,
    ) -> PlanProgress {
        if let PlanCache::Plan { key, moves } = &mut self.plan_cache {
            if key == previous && moves.first() == Some(&direction) {
                moves.remove(0);
                *key = current;
            }
        }

        match self.active_plan.front() {
            None => PlanProgress::NoPlan,
            Some(&next) if next == direction => {
                self.active_plan.pop_front();
                PlanProgress::Advanced
            }
            Some(_) => {
                debug!("Player left the displayed plan");
                self.active_plan.clear();
                PlanProgress::Diverged
            }
        }
    }

    /// Schedules a query for the current position, superseding any other.
    ///
    /// Must be called from within a tokio runtime.
    pub fn schedule(&mut self, puzzle: &PuzzleState, options: QueryOptions) -> RequestId {
        self.cancel_outstanding();

        self.latest_id += 1;
        let id = self.latest_id;
        let mode = options.mode.unwrap_or(self.config.mode);
        let delay = self.config.debounce_for(options.trigger);
        debug!(
            "Scheduling query {} ({:?}, {} mode) in {:?}",
            id, options.trigger, mode, delay
        );

        self.pending = Some(PendingQuery {
            id,
            key: puzzle.key(),
            state: puzzle.oracle_state(),
            trigger: options.trigger,
            mode,
            has_undo: puzzle.has_undo(),
            refresh_plan: options.refresh_plan,
        });
        self.debounce
            .replace(self.scheduler.schedule(delay, QueryEvent::DebounceElapsed(id)));
        id
    }

    /// Cancels everything outstanding. Late completions become no-ops.
    pub fn cancel(&mut self) {
        self.cancel_outstanding();
        if matches!(self.status, SolvabilityStatus::Checking { .. }) {
            self.status = SolvabilityStatus::Idle;
        }
    }

    /// Cancels everything and forgets the previous level's results.
    pub fn reset(&mut self) {
        self.cancel_outstanding();
        self.clear_caches();
        self.status = SolvabilityStatus::Idle;
    }

    /// Handles an event from the orchestrator's channel.
    ///
    /// Returns `None` for timer events that were already superseded.
    pub fn handle_event(
        &mut self,
        event: QueryEvent,
        timing: &mut TimingEstimator,
    ) -> Option<QueryUpdate> {
        match event {
            QueryEvent::DebounceElapsed(id) => self.start_query(id, timing),
            QueryEvent::Returned(completion) => Some(self.complete_query(completion, timing)),
        }
    }

    fn cancel_outstanding(&mut self) {
        self.debounce.cancel();
        self.pending = None;
        if let Some(flight) = self.in_flight.take() {
            debug!("Aborting query {}", flight.request.id);
            flight.abort.abort();
        }
    }

    fn start_query(&mut self, id: RequestId, timing: &TimingEstimator) -> Option<QueryUpdate> {
        if self.pending.as_ref().map(|pending| pending.id) != Some(id) {
            debug!("Ignoring stale debounce for query {}", id);
            return None;
        }
        let pending = self.pending.take()?;

        let deep = pending.trigger.is_deep();
        let max_steps = self.config.max_steps_for(pending.mode, deep);
        let expected_ms = timing.estimate(max_steps);
        let request = SolvabilityRequest {
            id,
            key: pending.key,
            trigger: pending.trigger,
            mode: pending.mode,
            max_steps,
            has_undo: pending.has_undo,
            refresh_plan: pending.refresh_plan,
            deep,
            optimal: self.config.optimal,
            timeout_sec: self.config.timeout_for(max_steps, expected_ms),
            expected_ms,
            state: pending.state,
        };

        let (abort, signal) = abort_pair();
        let oracle = Arc::clone(&self.oracle);
        let tx = self.scheduler.sender();
        let wire = request.to_wire();
        tokio::spawn(async move {
            let started = Instant::now();
            let outcome = oracle.check_solvable(wire, signal.clone()).await;
            let completion = QueryCompletion {
                id,
                outcome,
                elapsed: started.elapsed(),
                aborted: signal.is_aborted(),
            };
            let _ = tx.send(QueryEvent::Returned(completion));
        });

        info!(
            "Query {} sent: horizon {}, {} mode, expected {:.0} ms",
            id, max_steps, request.mode, expected_ms
        );
        self.status = SolvabilityStatus::Checking {
            request: id,
            horizon: max_steps,
            expected_ms,
        };
        self.in_flight = Some(InFlight { request, abort });

        Some(QueryUpdate::Started {
            id,
            horizon: max_steps,
            expected_ms,
        })
    }

    fn complete_query(
        &mut self,
        completion: QueryCompletion,
        timing: &mut TimingEstimator,
    ) -> QueryUpdate {
        let id = completion.id;
        let aborted =
            completion.aborted || matches!(completion.outcome, Err(OracleError::Aborted));

        if !aborted {
            if let Ok(OracleResponse {
                solver: Some(stats),
                ..
            }) = &completion.outcome
            {
                timing.record_sample(stats.max_steps_used, stats.elapsed_ms);
            }
        }

        let current = id == self.latest_id && self.in_flight_id() == Some(id);
        if aborted || !current {
            debug!(
                "Discarding query {} after {:?} (aborted: {}, latest: {})",
                id, completion.elapsed, aborted, self.latest_id
            );
            return if aborted {
                QueryUpdate::Aborted { id }
            } else {
                QueryUpdate::Superseded { id }
            };
        }

        let Some(flight) = self.in_flight.take() else {
            return QueryUpdate::Superseded { id };
        };
        let result = SolvabilityResult::from_outcome(completion.outcome);
        self.apply(&flight.request, &result);
        QueryUpdate::Applied { id, result }
    }

    fn apply(&mut self, request: &SolvabilityRequest, result: &SolvabilityResult) {
        match result {
            SolvabilityResult::Solvable { plan, hint, .. } => {
                let cap = self.config.plan_move_cap;
                self.plan_cache = match plan {
                    Some(moves) if moves.len() > cap => PlanCache::TooLong {
                        key: request.key.clone(),
                        len: moves.len(),
                    },
                    Some(moves) => PlanCache::Plan {
                        key: request.key.clone(),
                        moves: moves.clone(),
                    },
                    None => PlanCache::Empty,
                };
                self.hint = hint.clone();
                if request.refresh_plan {
                    self.active_plan = match plan {
                        Some(moves) if moves.len() <= cap => moves.iter().copied().collect(),
                        _ => VecDeque::new(),
                    };
                }
                self.status = SolvabilityStatus::Solvable {
                    hint: hint.clone(),
                    plan_len: plan.as_ref().map(Vec::len),
                };
            }
            SolvabilityResult::Unsolvable { message } => {
                self.clear_caches();
                self.status = if request.has_undo {
                    SolvabilityStatus::DeadEnd {
                        message: message.clone(),
                    }
                } else {
                    SolvabilityStatus::Unsolvable {
                        message: message.clone(),
                    }
                };
            }
            SolvabilityResult::Unknown { message } | SolvabilityResult::Error { message, .. } => {
                if let SolvabilityResult::Error { .. } = result {
                    warn!("Oracle query {} failed: {}", request.id, message);
                }
                self.clear_caches();
                self.status = SolvabilityStatus::Inconclusive {
                    message: message.clone(),
                };
            }
        }
    }

    fn clear_caches(&mut self) {
        self.plan_cache = PlanCache::Empty;
        self.hint = None;
        self.active_plan.clear();
    }
}

impl fmt::Debug for SolvabilityOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SolvabilityOrchestrator")
            .field("oracle", &self.oracle.name())
            .field("latest_id", &self.latest_id)
            .field("phase", &self.phase())
            .field("status", &self.status)
            .finish()
    }
}
