//! HTTP adapters for the valuation engine and the game results service.
//!
//! Both speak JSON:
//!
//! - `POST <valuation_url>/recompute` with the job, answered by a [`Valuation`]
//! - `GET <results_url>/games/<game_id>/result`, answered by a [`GameResult`]
//!   or 404 while the game is still in progress

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use crate::domain::id::GameId;
use crate::domain::recompute::RecomputeJob;
use crate::domain::settlement::GameResult;
use crate::error::{ResultSourceError, ValuationError};
use crate::port::{GameResultSource, Valuation, ValuationEngine};

/// Append path segments to a base URL, keeping any base path.
fn endpoint(base: &Url, segments: &[&str]) -> Option<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .ok()?
        .pop_if_empty()
        .extend(segments);
    Some(url)
}

fn http_client(timeout: Duration) -> Client {
    Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|err| {
            warn!(error = %err, "Failed to build HTTP client, using defaults");
            Client::new()
        })
}

/// Valuation engine reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpValuationEngine {
    http: Client,
    base_url: Url,
}

impl HttpValuationEngine {
    #[must_use]
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            base_url,
        }
    }

    fn recompute_url(&self) -> Result<Url, ValuationError> {
        endpoint(&self.base_url, &["recompute"])
            .ok_or_else(|| ValuationError::Unavailable(format!("bad base url {}", self.base_url)))
    }
}

#[async_trait]
impl ValuationEngine for HttpValuationEngine {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn recompute(&self, job: RecomputeJob) -> Result<Valuation, ValuationError> {
        let url = self.recompute_url()?;
        debug!(job_id = %job.id, url = %url, "Posting recompute job");

        let response = self
            .http
            .post(url)
            .json(&job)
            .send()
            .await
            .map_err(|e| ValuationError::Unavailable(e.to_string()))?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(ValuationError::Rejected(format!("{status}: {body}")));
        }
        if !status.is_success() {
            return Err(ValuationError::Unavailable(format!("status {status}")));
        }

        response
            .json::<Valuation>()
            .await
            .map_err(|e| ValuationError::Decode(e.to_string()))
    }
}

/// Game result source reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpResultSource {
    http: Client,
    base_url: Url,
}

impl HttpResultSource {
    #[must_use]
    pub fn new(base_url: Url, timeout: Duration) -> Self {
        Self {
            http: http_client(timeout),
            base_url,
        }
    }

    fn result_url(&self, game_id: &GameId) -> Result<Url, ResultSourceError> {
        endpoint(&self.base_url, &["games", game_id.as_str(), "result"])
            .ok_or_else(|| ResultSourceError::Unavailable(format!("bad base url {}", self.base_url)))
    }
}

#[async_trait]
impl GameResultSource for HttpResultSource {
    async fn fetch_game_result(
        &self,
        game_id: &GameId,
    ) -> Result<Option<GameResult>, ResultSourceError> {
        let url = self.result_url(game_id)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ResultSourceError::Unavailable(e.to_string()))?;

        match response.status() {
            StatusCode::NOT_FOUND => {
                debug!(game_id = %game_id, "Game result not available yet");
                Ok(None)
            }
            status if status.is_success() => {
                let result = response.json::<GameResult>().await.map_err(|e| {
                    ResultSourceError::Decode {
                        game_id: game_id.to_string(),
                        reason: e.to_string(),
                    }
                })?;
                Ok(Some(result))
            }
            status => Err(ResultSourceError::Unavailable(format!(
                "status {status} for game {game_id}"
            ))),
        }
    }
}
