//! # HTTP Oracle
//!
//! Client for the reference solver service (`POST /api/check-solvable`).

use crate::config::OracleConfig;
use crate::oracle::{AbortSignal, Oracle, OracleError, OracleFuture, OracleRequest, OracleResponse};
use crate::{SokolinkError, SokolinkResult};
use log::debug;
use std::time::Duration;

/// Oracle reached over HTTP.
///
/// Aborting drops the in-flight request, which closes the connection; the
/// service treats a disconnect as cancellation.
#[derive(Debug, Clone)]
pub struct HttpOracle {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpOracle {
    /// Creates a client for the service at `config.base_url`.
    pub fn new(config: &OracleConfig) -> SokolinkResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|err| SokolinkError::Config(format!("cannot build HTTP client: {}", err)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/api/check-solvable",
                config.base_url.trim_end_matches('/')
            ),
        })
    }

    /// Full URL queries are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl Oracle for HttpOracle {
    fn check_solvable(&self, request: OracleRequest, abort: AbortSignal) -> OracleFuture {
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        Box::pin(async move {
            tokio::select! {
                result = post_query(&client, &endpoint, &request) => result,
                _ = abort.aborted() => {
                    debug!("Dropping oracle request to {}", endpoint);
                    Err(OracleError::Aborted)
                }
            }
        })
    }

    fn name(&self) -> &str {
        "http"
    }
}

async fn post_query(
    client: &reqwest::Client,
    endpoint: &str,
    request: &OracleRequest,
) -> Result<OracleResponse, OracleError> {
    let response = client
        .post(endpoint)
        .json(request)
        .send()
        .await
        .map_err(classify)?
        .error_for_status()
        .map_err(classify)?;

    let body = response.text().await.map_err(classify)?;
    serde_json::from_str(&body).map_err(|err| OracleError::MalformedResponse(err.to_string()))
}

fn classify(err: reqwest::Error) -> OracleError {
    if err.is_timeout() {
        OracleError::Timeout
    } else if err.is_decode() {
        OracleError::MalformedResponse(err.to_string())
    } else {
        OracleError::Unavailable(err.to_string())
    }
}
