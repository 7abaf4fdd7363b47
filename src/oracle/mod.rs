//! # Oracle Module
//!
//! Contract with the external solvability oracle.
//!
//! The oracle is an opaque service: given a position and a search horizon it
//! answers solvable, unsolvable, or inconclusive, optionally with a plan.
//! This module holds the wire types, the [`Oracle`] trait, advisory
//! cancellation, and an HTTP client for the reference service.

pub mod http;
pub mod traits;

pub use http::*;
pub use traits::*;

use crate::game::{Direction, Point};
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

/// Position sent to the oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OracleState {
    /// Static grid rows (`#` wall, ` ` floor, `.` goal, `x` void)
    pub grid: Vec<String>,
    pub player: Point,
    pub boxes: Vec<Point>,
    pub goals: Vec<Point>,
}

/// A solvability query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleRequest {
    #[serde(flatten)]
    pub state: OracleState,
    /// Slightly longer horizon for the initial analysis of a level
    pub deep: bool,
    /// Search horizon
    pub max_steps: u32,
    /// Best-effort time budget for the search
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_sec: Option<f64>,
    /// Keep raising the horizon until a plan or a proof is found
    pub auto: bool,
    /// Prefer the shortest plan over the first one found
    pub optimal: bool,
}

/// Horizon and time the oracle actually spent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SolverStats {
    pub max_steps_used: u32,
    pub elapsed_ms: f64,
}

/// Raw oracle answer.
///
/// `solvable: None` means inconclusive, which is not the same as `false`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OracleResponse {
    pub solvable: Option<bool>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub hint_message: Option<String>,
    #[serde(default)]
    pub solution: Option<Vec<Direction>>,
    #[serde(default)]
    pub solver: Option<SolverStats>,
}

/// Failures talking to the oracle.
///
/// These never reach the UI directly; they are folded into
/// [`crate::SolvabilityResult::Error`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    /// Transport failed or the service returned an error status
    #[error("oracle unavailable: {0}")]
    Unavailable(String),

    /// The request did not finish in time
    #[error("oracle timed out")]
    Timeout,

    /// The body could not be decoded
    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),

    /// The client cancelled the request
    #[error("request aborted")]
    Aborted,
}

/// Creates a linked abort handle and signal.
pub fn abort_pair() -> (AbortHandle, AbortSignal) {
    let (tx, rx) = watch::channel(false);
    (AbortHandle { tx }, AbortSignal { rx })
}

/// Client side of advisory cancellation.
#[derive(Debug)]
pub struct AbortHandle {
    tx: watch::Sender<bool>,
}

impl AbortHandle {
    /// Requests cancellation. The oracle may ignore it.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Oracle side of advisory cancellation.
#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Completes once cancellation is requested.
    ///
    /// Pends forever if the handle is dropped without aborting.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        let result = rx.wait_for(|aborted| *aborted).await.map(|_| ());
        if result.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = OracleRequest {
            state: OracleState {
                grid: vec!["#####".into(), "#   #".into(), "#####".into()],
                player: Point::new(1, 1),
                boxes: vec![Point::new(2, 1)],
                goals: vec![Point::new(3, 1)],
            },
            deep: false,
            max_steps: 25,
            timeout_sec: None,
            auto: true,
            optimal: false,
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["maxSteps"], 25);
        assert_eq!(value["auto"], true);
        assert_eq!(value["player"]["x"], 1);
        assert_eq!(value["goals"][0]["x"], 3);
        assert!(value.get("timeoutSec").is_none());
        assert!(value.get("state").is_none());
    }

    #[test]
    fn test_response_parsing() {
        let json = r#"{
            "solvable": true,
            "message": "Puzzle is solvable (found path)!",
            "hint": "right",
            "hintMessage": "Try pushing Box 1 right!",
            "solution": ["right", "up"],
            "totalMoves": 2,
            "solver": {"maxStepsUsed": 10, "elapsedMs": 42}
        }"#;
        let response: OracleResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.solvable, Some(true));
        assert_eq!(response.solution, Some(vec![Direction::Right, Direction::Up]));
        assert_eq!(response.solver.unwrap().max_steps_used, 10);
    }

    #[test]
    fn test_null_solvable_is_inconclusive() {
        let response: OracleResponse =
            serde_json::from_str(r#"{"solvable": null, "solution": null}"#).unwrap();
        assert_eq!(response.solvable, None);
        assert!(response.solution.is_none());
        assert!(response.solver.is_none());
    }

    #[test]
    fn test_abort_pair() {
        let (handle, signal) = abort_pair();
        assert!(!signal.is_aborted());
        handle.abort();
        assert!(signal.is_aborted());
        assert!(handle.is_aborted());
        tokio_test::block_on(signal.aborted());
    }

    #[test]
    fn test_never_signal_stays_clear() {
        let signal = AbortSignal::never();
        assert!(!signal.is_aborted());
    }
}
