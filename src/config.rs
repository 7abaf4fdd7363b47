//! Client configuration constants and the serde-backed client configuration.

use crate::generation::Tier;
use crate::solvability::{QueryMode, Trigger};
use crate::{SokolinkError, SokolinkResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Debounce before an exploratory-walk query
pub const EXPLORE_DEBOUNCE_MS: u64 = 350;

/// Debounce after the player's move diverged from the displayed plan
pub const PLAN_DIVERGED_DEBOUNCE_MS: u64 = 80;

/// Debounce for an explicit recheck
pub const RECHECK_DEBOUNCE_MS: u64 = 0;

/// Debounce for the initial analysis of a freshly loaded level
pub const LEVEL_START_DEBOUNCE_MS: u64 = 0;

/// Debounce for the plan request that starts auto-solve
pub const AUTO_SOLVE_DEBOUNCE_MS: u64 = 0;

/// Fixed-mode horizon in moves
pub const FIXED_HORIZON: u32 = 25;

/// Fixed-mode horizon for the initial analysis of a level
pub const DEEP_FIXED_HORIZON: u32 = 35;

/// Auto-mode starting horizon in pushes
pub const AUTO_HORIZON: u32 = 10;

/// Auto-mode starting horizon for the initial analysis of a level
pub const DEEP_AUTO_HORIZON: u32 = 15;

/// Plans longer than this are never played back
pub const PLAN_MOVE_CAP: usize = 300;

/// Bounds of the `timeoutSec` sent to the oracle
pub const MIN_TIMEOUT_SEC: f64 = 1.0;
pub const MAX_TIMEOUT_SEC: f64 = 30.0;

/// Weight of the newest timing sample in the moving average
pub const TIMING_EMA_WEIGHT: f64 = 0.3;

/// Latency expectations used before any sample exists (horizon, ms)
pub const DEFAULT_TIMING_TABLE: &[(u32, f64)] = &[(15, 250.0), (25, 1000.0), (35, 3500.0)];

/// Reference point for quartic extrapolation
pub const TIMING_REFERENCE_HORIZON: u32 = 25;
pub const TIMING_REFERENCE_MS: f64 = 1000.0;

/// Delay between scripted auto-solve moves
pub const AUTOPLAY_CADENCE_MS: u64 = 200;

/// Delay between the winning move and the solved announcement
pub const SOLVED_REVEAL_MS: u64 = 600;

/// Default location of the solver service
pub const DEFAULT_ORACLE_URL: &str = "http://localhost:4000";

/// Transport-level ceiling for a single oracle call
pub const ORACLE_REQUEST_TIMEOUT_SECS: u64 = 300;

/// Whole-generation retries before giving up
pub const GENERATION_MAX_ATTEMPTS: u32 = 25;

/// Oracle connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub base_url: String,
    pub request_timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_ORACLE_URL.to_string(),
            request_timeout_secs: ORACLE_REQUEST_TIMEOUT_SECS,
        }
    }
}

/// Tunables for the solvability orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub mode: QueryMode,
    pub explore_debounce_ms: u64,
    pub plan_diverged_debounce_ms: u64,
    pub recheck_debounce_ms: u64,
    pub level_start_debounce_ms: u64,
    pub auto_solve_debounce_ms: u64,
    pub fixed_horizon: u32,
    pub deep_fixed_horizon: u32,
    pub auto_horizon: u32,
    pub deep_auto_horizon: u32,
    pub plan_move_cap: usize,
    /// Ask for shortest plans
    pub optimal: bool,
    /// Stretch `timeoutSec` to twice the expected latency
    pub adaptive_timeout: bool,
    /// Fixed `timeoutSec` overriding the horizon-based default
    pub timeout_sec: Option<f64>,
}

impl OrchestratorConfig {
    pub fn new() -> Self {
        Self {
            mode: QueryMode::Fixed,
            explore_debounce_ms: EXPLORE_DEBOUNCE_MS,
            plan_diverged_debounce_ms: PLAN_DIVERGED_DEBOUNCE_MS,
            recheck_debounce_ms: RECHECK_DEBOUNCE_MS,
            level_start_debounce_ms: LEVEL_START_DEBOUNCE_MS,
            auto_solve_debounce_ms: AUTO_SOLVE_DEBOUNCE_MS,
            fixed_horizon: FIXED_HORIZON,
            deep_fixed_horizon: DEEP_FIXED_HORIZON,
            auto_horizon: AUTO_HORIZON,
            deep_auto_horizon: DEEP_AUTO_HORIZON,
            plan_move_cap: PLAN_MOVE_CAP,
            optimal: false,
            adaptive_timeout: true,
            timeout_sec: None,
        }
    }

    /// Short delays for tests.
    pub fn for_testing() -> Self {
        Self {
            explore_debounce_ms: 50,
            plan_diverged_debounce_ms: 10,
            plan_move_cap: 20,
            adaptive_timeout: false,
            ..Self::new()
        }
    }

    pub fn debounce_for(&self, trigger: Trigger) -> Duration {
        let ms = match trigger {
            Trigger::Explore => self.explore_debounce_ms,
            Trigger::PlanDiverged => self.plan_diverged_debounce_ms,
            Trigger::Recheck => self.recheck_debounce_ms,
            Trigger::LevelStart => self.level_start_debounce_ms,
            Trigger::AutoSolve => self.auto_solve_debounce_ms,
        };
        Duration::from_millis(ms)
    }

    /// Horizon to request. Auto mode counts pushes, fixed mode counts moves.
    pub fn max_steps_for(&self, mode: QueryMode, deep: bool) -> u32 {
        match (mode, deep) {
            (QueryMode::Fixed, false) => self.fixed_horizon,
            (QueryMode::Fixed, true) => self.deep_fixed_horizon,
            (QueryMode::Auto, false) => self.auto_horizon,
            (QueryMode::Auto, true) => self.deep_auto_horizon,
        }
    }

    /// `timeoutSec` for a query at `max_steps` expected to take `expected_ms`.
    pub fn timeout_for(&self, max_steps: u32, expected_ms: f64) -> f64 {
        let base = self.timeout_sec.unwrap_or(match max_steps {
            0..=25 => 5.0,
            26..=60 => 10.0,
            _ => 15.0,
        });
        let stretched = if self.adaptive_timeout && expected_ms.is_finite() {
            base.max(2.0 * expected_ms / 1000.0)
        } else {
            base
        };
        stretched.clamp(MIN_TIMEOUT_SEC, MAX_TIMEOUT_SEC)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Random level settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
    pub tier: Tier,
    pub max_attempts: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            tier: Tier::Easy,
            max_attempts: GENERATION_MAX_ATTEMPTS,
        }
    }
}

/// Complete client configuration, loadable from JSON.
///
/// Every field is optional in the file; missing values take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub oracle: OracleConfig,
    pub orchestrator: OrchestratorConfig,
    pub generation: GenerationSettings,
    pub autoplay_cadence_ms: u64,
    pub solved_reveal_ms: u64,
    /// Show the cached plan and keep it refreshed
    pub show_plan: bool,
}

impl ClientConfig {
    pub fn new() -> Self {
        Self {
            oracle: OracleConfig::default(),
            orchestrator: OrchestratorConfig::new(),
            generation: GenerationSettings::default(),
            autoplay_cadence_ms: AUTOPLAY_CADENCE_MS,
            solved_reveal_ms: SOLVED_REVEAL_MS,
            show_plan: false,
        }
    }

    /// Short delays and a small plan cap for tests.
    pub fn for_testing() -> Self {
        Self {
            orchestrator: OrchestratorConfig::for_testing(),
            autoplay_cadence_ms: 20,
            solved_reveal_ms: 30,
            ..Self::new()
        }
    }

    pub fn from_json(json: &str) -> SokolinkResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> SokolinkResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> SokolinkResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn autoplay_cadence(&self) -> Duration {
        Duration::from_millis(self.autoplay_cadence_ms)
    }

    pub fn solved_reveal(&self) -> Duration {
        Duration::from_millis(self.solved_reveal_ms)
    }

    fn validate(&self) -> SokolinkResult<()> {
        if self.oracle.base_url.trim().is_empty() {
            return Err(SokolinkError::Config("oracle.base_url is empty".to_string()));
        }
        if self.autoplay_cadence_ms == 0 {
            return Err(SokolinkError::Config(
                "autoplay_cadence_ms must be positive".to_string(),
            ));
        }
        if self.orchestrator.plan_move_cap == 0 {
            return Err(SokolinkError::Config(
                "orchestrator.plan_move_cap must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}
