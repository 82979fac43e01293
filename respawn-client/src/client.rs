//! HTTP client for the respawn tracker API.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use reqwest::{Client, Response};
use respawn_tracker::api::slots::{ResetResponse, UpdateResponse};
use respawn_tracker::{Roster, Snapshot, Timestamp};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::fmt;
use std::time::Duration;

/// Request failures as seen by the client.
///
/// `Timeout`, `Connection` and `Decode` are transient: pollers keep their last
/// snapshot and retry on schedule.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientError {
    Timeout,
    Connection(String),
    Server { status: u16, message: String },
    Decode(String),
    Request(String),
}

impl ClientError {
    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout
        } else if e.is_connect() {
            ClientError::Connection(e.to_string())
        } else if e.is_decode() {
            ClientError::Decode(e.to_string())
        } else {
            ClientError::Request(e.to_string())
        }
    }

    /// True for failures that say nothing about the data itself
    pub fn is_transient(&self) -> bool {
        match self {
            ClientError::Timeout | ClientError::Connection(_) | ClientError::Decode(_) => true,
            ClientError::Server { status, .. } => *status >= 500,
            ClientError::Request(_) => true,
        }
    }
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Timeout => write!(f, "request timed out, server may be waking up"),
            ClientError::Connection(e) => write!(f, "connection failed (server offline?): {}", e),
            ClientError::Server { status, message } => {
                write!(f, "server returned {}: {}", status, message)
            }
            ClientError::Decode(e) => write!(f, "invalid response from server: {}", e),
            ClientError::Request(e) => write!(f, "request failed: {}", e),
        }
    }
}

impl std::error::Error for ClientError {}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

/// Client for the tracker's read/write contract
pub struct RespawnClient {
    http_client: Client,
    base_url: String,
}

impl RespawnClient {
    /// Create a client; every request is bounded by `timeout`
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .user_agent("respawn-client/0.1")
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http_client,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET /get_state
    pub async fn get_state(&self) -> Result<Snapshot, ClientError> {
        let response = self
            .http_client
            .get(format!("{}/get_state", self.base_url))
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        decode(response).await
    }

    /// GET /roster
    pub async fn roster(&self) -> Result<Roster, ClientError> {
        let response = self
            .http_client
            .get(format!("{}/roster", self.base_url))
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        decode(response).await
    }

    /// POST /update_boss_status; `None` marks the boss active
    pub async fn update_slot(
        &self,
        key: &str,
        timestamp: Option<&str>,
    ) -> Result<UpdateResponse, ClientError> {
        let response = self
            .http_client
            .post(format!("{}/update_boss_status", self.base_url))
            .json(&serde_json::json!({
                "key": key,
                "timestamp": timestamp,
            }))
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        decode(response).await
    }

    /// POST /reset_channel/{channel}
    pub async fn reset_channel(&self, channel: &str) -> Result<ResetResponse, ClientError> {
        let response = self
            .http_client
            .post(format!(
                "{}/reset_channel/{}",
                self.base_url,
                urlencoding::encode(channel)
            ))
            .send()
            .await
            .map_err(ClientError::from_reqwest)?;
        decode(response).await
    }

    /// Flip a slot: clear it if a kill is recorded, otherwise record a kill at `now`.
    ///
    /// Reads the current server state first so the decision is not based on a stale
    /// local copy.
    pub async fn toggle(
        &self,
        key: &str,
        now: DateTime<Utc>,
    ) -> Result<UpdateResponse, ClientError> {
        let current = self.get_state().await?;
        let timestamp = toggle_timestamp(&current, key, now);
        self.update_slot(key, timestamp.as_deref()).await
    }
}

/// Timestamp a toggle should send for `key`: none when the slot holds a kill
pub fn toggle_timestamp(current: &Snapshot, key: &str, now: DateTime<Utc>) -> Option<String> {
    match current.get(key).and_then(|state| state.killed_at()) {
        Some(_) => None,
        None => Some(Timestamp::from_instant(now).as_str().to_string()),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
    let status = response.status();
    let body = response.text().await.map_err(ClientError::from_reqwest)?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body)
            .map(|b| b.message)
            .unwrap_or(body);
        return Err(ClientError::Server {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| ClientError::Decode(e.to_string()))
}
