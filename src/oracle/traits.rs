//! # Oracle Traits
//!
//! Trait definitions for solvability oracles.

use crate::oracle::{AbortSignal, OracleError, OracleRequest, OracleResponse};
use std::future::Future;
use std::pin::Pin;

/// Boxed future returned by [`Oracle::check_solvable`].
pub type OracleFuture =
    Pin<Box<dyn Future<Output = Result<OracleResponse, OracleError>> + Send + 'static>>;

/// An external solvability oracle.
///
/// Implementations may take arbitrarily long. Cancellation through the
/// [`AbortSignal`] is advisory: callers never rely on the oracle stopping.
pub trait Oracle: Send + Sync {
    /// Asks whether the position is solvable within the requested horizon.
    fn check_solvable(&self, request: OracleRequest, abort: AbortSignal) -> OracleFuture;

    /// Name used in logs.
    fn name(&self) -> &str {
        "oracle"
    }
}
