//! Scripted in-process oracle shared by the orchestration tests.

#![allow(dead_code)]

use sokolink::{
    AbortSignal, Direction, Oracle, OracleError, OracleFuture, OracleRequest, OracleResponse,
    SolverStats,
};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One canned answer and how long the oracle takes to give it.
#[derive(Debug, Clone)]
pub struct Scripted {
    pub delay: Duration,
    pub outcome: Result<OracleResponse, OracleError>,
}

impl Scripted {
    pub fn after_ms(ms: u64, outcome: Result<OracleResponse, OracleError>) -> Self {
        Self {
            delay: Duration::from_millis(ms),
            outcome,
        }
    }
}

/// Oracle that replays a script and records every request it sees.
///
/// Ignores the abort signal, like a slow service that finishes anyway.
/// Once the script runs out it answers inconclusive immediately.
#[derive(Debug, Clone, Default)]
pub struct ScriptedOracle {
    script: Arc<Mutex<VecDeque<Scripted>>>,
    requests: Arc<Mutex<Vec<OracleRequest>>>,
}

impl ScriptedOracle {
    pub fn new(script: Vec<Scripted>) -> Self {
        Self {
            script: Arc::new(Mutex::new(script.into())),
            requests: Arc::default(),
        }
    }

    pub fn push(&self, answer: Scripted) {
        self.script.lock().unwrap().push_back(answer);
    }

    pub fn requests(&self) -> Vec<OracleRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

impl Oracle for ScriptedOracle {
    fn check_solvable(&self, request: OracleRequest, _abort: AbortSignal) -> OracleFuture {
        self.requests.lock().unwrap().push(request);
        let next = self.script.lock().unwrap().pop_front();
        Box::pin(async move {
            match next {
                Some(Scripted { delay, outcome }) => {
                    tokio::time::sleep(delay).await;
                    outcome
                }
                None => Ok(OracleResponse::default()),
            }
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

pub fn solvable(plan: &[Direction]) -> Result<OracleResponse, OracleError> {
    Ok(OracleResponse {
        solvable: Some(true),
        solution: Some(plan.to_vec()),
        hint_message: plan.first().map(|d| format!("Try moving {}!", d)),
        ..Default::default()
    })
}

pub fn unsolvable(message: &str) -> Result<OracleResponse, OracleError> {
    Ok(OracleResponse {
        solvable: Some(false),
        message: Some(message.to_string()),
        ..Default::default()
    })
}

pub fn unknown() -> Result<OracleResponse, OracleError> {
    Ok(OracleResponse {
        solvable: None,
        message: Some("search budget exhausted".to_string()),
        ..Default::default()
    })
}

pub fn with_stats(
    outcome: Result<OracleResponse, OracleError>,
    max_steps_used: u32,
    elapsed_ms: f64,
) -> Result<OracleResponse, OracleError> {
    outcome.map(|response| OracleResponse {
        solver: Some(SolverStats {
            max_steps_used,
            elapsed_ms,
        }),
        ..response
    })
}
