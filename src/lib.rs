//! # Sokolink
//!
//! A box-pushing puzzle client that keeps an external solver's verdict in
//! sync with play.
//!
//! ## Architecture Overview
//!
//! - **Game**: level parsing, puzzle state with move rules and undo, and
//!   scripted playback of solver plans
//! - **Generation**: seeded reverse-pull level generation with a repair pass
//! - **Oracle**: the contract with the external solvability oracle, plus an
//!   HTTP client for the reference service
//! - **Solvability**: debounced, cancellable oracle queries where only the
//!   freshest answer is ever applied, and latency estimation per horizon
//! - **Session**: the event pump tying input, timers and oracle answers
//!   together on a single-threaded tokio runtime
//!
//! The oracle is opaque: any type implementing [`Oracle`] can stand in for
//! the HTTP service, which is how the tests drive the orchestrator.

pub mod config;
pub mod game;
pub mod generation;
pub mod input;
pub mod oracle;
pub mod session;
pub mod solvability;

// Core module re-exports
pub use game::*;
pub use generation::*;
pub use input::*;
pub use oracle::*;
pub use session::*;
pub use solvability::*;

pub use config::ClientConfig;

/// Core error type for the Sokolink client.
#[derive(thiserror::Error, Debug)]
pub enum SokolinkError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// Level text cannot be loaded (for example, no player symbol)
    #[error("Malformed level: {0}")]
    StructuralLevel(String),

    /// Game state is invalid
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Generation failed
    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    /// Oracle call failed
    #[error("Oracle error: {0}")]
    Oracle(#[from] OracleError),

    /// Configuration is invalid
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type used throughout the Sokolink codebase.
pub type SokolinkResult<T> = Result<T, SokolinkError>;

/// Version information for the client.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
