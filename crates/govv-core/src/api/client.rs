//! API client for the Go VV activity backend.
//!
//! Every endpoint answers with the same `{success, data, message}` envelope;
//! this module unwraps it into the typed models.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::{Activity, ActivityPage, NewActivity};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Backend used when nothing is configured.
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8001";

/// All backend routes live under this prefix.
const API_PREFIX: &str = "/api";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Page size used by the history and dashboard views.
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Response envelope shared by every backend route.
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    #[serde(default)]
    pub message: String,
}

impl<T> ApiResponse<T> {
    /// The payload of a successful response
    pub fn into_data(self) -> Result<T, ApiError> {
        if !self.success {
            return Err(ApiError::InvalidResponse(if self.message.is_empty() {
                "request was not successful".to_string()
            } else {
                self.message
            }));
        }
        self.data
            .ok_or_else(|| ApiError::InvalidResponse(format!("missing data ({})", self.message)))
    }
}

#[derive(Debug, Deserialize)]
struct ActivityData {
    activity: Activity,
}

#[derive(Debug, Deserialize)]
pub struct HealthStatus {
    pub status: String,
}

/// Client for the activity backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ActivityClient {
    client: Client,
    base_url: String,
}

impl ActivityClient {
    /// Create a client for the backend at `base_url`
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: reqwest::Response) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a request, backing off and retrying while rate limited, and
    /// unwrap the response envelope.
    async fn send<T: DeserializeOwned>(&self, request: reqwest::RequestBuilder, url: &str) -> Result<T> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let attempt = request
                .try_clone()
                .with_context(|| format!("Request to {} cannot be retried", url))?;
            let response = attempt
                .header(header::ACCEPT, "application/json")
                .send()
                .await
                .map_err(ApiError::NetworkError)
                .with_context(|| format!("Failed to send request to {}", url))?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let envelope: ApiResponse<T> = response
                        .json()
                        .await
                        .with_context(|| format!("Failed to parse JSON response from {}", url))?;
                    debug!(url = url, message = %envelope.message, "Backend responded");
                    return Ok(envelope.into_data()?);
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited.into());
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.send(self.client.get(url), url).await
    }

    async fn post<T: DeserializeOwned, B: Serialize>(&self, url: &str, body: &B) -> Result<T> {
        self.send(self.client.post(url).json(body), url).await
    }

    // ===== Endpoints =====

    /// Check that the backend is reachable
    pub async fn health(&self) -> Result<HealthStatus> {
        self.get(&self.endpoint("/health")).await
    }

    /// Store a finished ride; the server assigns id and points
    pub async fn create_activity(&self, activity: &NewActivity) -> Result<Activity> {
        let data: ActivityData = self.post(&self.endpoint("/activities"), activity).await?;
        debug!(id = %data.activity.id, points = data.activity.points_earned, "Activity saved");
        Ok(data.activity)
    }

    /// Newest activities first
    pub async fn list_activities(&self, limit: u32, offset: u32) -> Result<ActivityPage> {
        let url = format!("{}?limit={}&offset={}", self.endpoint("/activities"), limit, offset);
        self.get(&url).await
    }

    pub async fn get_activity(&self, id: &str) -> Result<Activity> {
        let url = self.endpoint(&format!("/activities/{}", id));
        let data: ActivityData = self.get(&url).await?;
        Ok(data.activity)
    }
}
