use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use reqwest::Client;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use super::models::{MatchListResponse, RawMatch, Sport};

/// Why a fetch for one sport produced no records.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("failed to get scores - status code {status}, response body: {body}")]
    Status { status: u16, body: String },

    #[error("failed to decode response body: {0}")]
    Decode(String),

    #[error("no response within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("cancelled by shutdown")]
    Cancelled,
}

/// Upstream source of raw match records.
#[async_trait]
pub trait MatchSource: Send + Sync {
    /// Fetch every match for `sport`; live-only when `live` is set,
    /// otherwise everything scheduled for today.
    async fn fetch_matches(&self, sport: Sport, live: bool) -> Result<Vec<RawMatch>, FetchError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str;
}

/// SportScore feed on RapidAPI.
pub struct SportScoreClient {
    http: Client,
    base_url: Url,
    api_key: String,
}

impl SportScoreClient {
    pub fn new(base_url: &str, api_key: &str, request_timeout: Duration) -> Result<Self> {
        if api_key.trim().is_empty() {
            anyhow::bail!("SportScore API key must not be empty");
        }
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid SportScore base URL '{}'", base_url))?;
        let http = Client::builder()
            .timeout(request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(SportScoreClient {
            http,
            base_url,
            api_key: api_key.to_string(),
        })
    }

    fn events_url(&self, sport: Sport, live: bool, today: NaiveDate) -> String {
        let base = self.base_url.as_str().trim_end_matches('/');
        if live {
            format!("{}/sports/{}/events/live", base, sport.upstream_id())
        } else {
            format!(
                "{}/sports/{}/events/date/{}",
                base,
                sport.upstream_id(),
                today.format("%Y-%m-%d")
            )
        }
    }
}

#[async_trait]
impl MatchSource for SportScoreClient {
    fn name(&self) -> &str {
        "SportScore"
    }

    async fn fetch_matches(&self, sport: Sport, live: bool) -> Result<Vec<RawMatch>, FetchError> {
        let url = self.events_url(sport, live, Utc::now().date_naive());
        debug!("Fetching {} matches (live={}) from {}", sport, live, url);

        let resp = self
            .http
            .get(&url)
            .header("x-rapidapi-key", &self.api_key)
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;
        parse_match_list(&body)
    }
}

fn parse_match_list(body: &[u8]) -> Result<Vec<RawMatch>, FetchError> {
    serde_json::from_slice::<MatchListResponse>(body)
        .map(|r| r.data)
        .map_err(|e| FetchError::Decode(e.to_string()))
}
