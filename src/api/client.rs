//! API client for communicating with the matchday REST API.
//!
//! This module provides the `ApiClient` struct for making authenticated
//! requests. Every outbound call goes through one send loop that attaches
//! the stored access token, refreshes-and-retries exactly once on 401, and
//! backs off on rate limiting. Non-auth failures pass through untouched.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::{
    CredentialStore, HttpRefreshTransport, RefreshCoordinator, Session, SessionBootstrap,
    SessionDataLoader, TokenCodec,
};
use crate::config::Config;
use crate::models::{Notice, ScheduleEvent, TeamRosterResponse, UserProfile};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
/// Also bounds the refresh call, so a hung refresh cannot park waiters
/// forever.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Number of days to look back for schedule entries.
const EVENT_LOOKBACK_DAYS: i64 = 30;

/// Number of days to look ahead for schedule entries.
/// 6 months covers a full half-season of fixtures.
const EVENT_LOOKAHEAD_DAYS: i64 = 180;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// API client for the matchday service.
/// Clone is cheap - reqwest::Client uses Arc internally for connection
/// pooling, and the auth runtime is shared behind Arcs.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
    refresh: Arc<RefreshCoordinator>,
    session: Session,
}

impl ApiClient {
    /// Create a new API client wired to the given credential store and
    /// session handle.
    pub fn new(
        config: &Config,
        store: Arc<dyn CredentialStore>,
        session: Session,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        let codec = TokenCodec::new(config.allow_dev_tokens);
        let transport = Arc::new(HttpRefreshTransport::new(
            client.clone(),
            config.api_base_url(),
        ));
        let refresh = Arc::new(RefreshCoordinator::new(
            store.clone(),
            codec,
            transport,
            session.clone(),
        ));

        Ok(Self {
            client,
            base_url: config.api_base_url().trim_end_matches('/').to_string(),
            store,
            codec,
            refresh,
            session,
        })
    }

    /// The shared refresh coordinator backing this client.
    pub fn refresh_coordinator(&self) -> Arc<RefreshCoordinator> {
        self.refresh.clone()
    }

    /// Build the one-shot startup validator wired to this client's runtime.
    pub fn session_bootstrap(&self) -> SessionBootstrap {
        SessionBootstrap::new(
            self.store.clone(),
            self.codec,
            self.refresh.clone(),
            self.session.clone(),
        )
    }

    /// Validate that a string looks like a valid GUID (UUID format).
    /// GUIDs should be 36 characters with dashes: xxxxxxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx
    pub fn is_valid_guid(s: &str) -> bool {
        if s.len() != 36 {
            return false;
        }
        s.chars().enumerate().all(|(i, c)| {
            if i == 8 || i == 13 || i == 18 || i == 23 {
                c == '-'
            } else {
                c.is_ascii_hexdigit()
            }
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send a request with the auth contract applied.
    ///
    /// The request is rebuilt per attempt from `build`; the retry markers
    /// are local to this loop rather than attached to the request. A request
    /// refreshes and retries at most once regardless of how many rate-limit
    /// attempts it makes.
    async fn send_authorized(
        &self,
        build: impl Fn(&Client) -> RequestBuilder,
    ) -> Result<reqwest::Response, ApiError> {
        let mut auth_retried = false;
        let mut rate_retries = 0u32;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut request = build(&self.client);
            match self.store.access() {
                Ok(Some(token)) => request = request.bearer_auth(token),
                Ok(None) => {}
                Err(err) => {
                    warn!(error = %err, "failed to read access token, sending unauthenticated");
                }
            }

            let response = request.send().await?;
            let status = response.status();

            if status == StatusCode::UNAUTHORIZED {
                if auth_retried {
                    debug!("still unauthorized after refresh-and-retry, giving up");
                    return Err(ApiError::Unauthorized);
                }
                auth_retried = true;
                debug!("unauthorized response, refreshing access token");
                self.refresh.request_refresh().await?;
                continue;
            }

            if status == StatusCode::TOO_MANY_REQUESTS {
                rate_retries += 1;
                if rate_retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(retry = rate_retries, backoff_ms, "Rate limited, backing off");
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2; // Exponential backoff
                continue;
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ApiError::from_status(status, &body));
            }

            return Ok(response);
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let response = self.send_authorized(|client| client.get(&url)).await?;
        response.json().await.map_err(|err| {
            ApiError::InvalidResponse(format!("Failed to parse response from {url}: {err}"))
        })
    }

    // ===== Data Fetching Methods =====

    /// Fetch the signed-in user's profile and team memberships
    pub async fn fetch_me(&self) -> Result<UserProfile, ApiError> {
        self.get("/v1/users/me").await
    }

    /// Fetch the full roster for a team
    pub async fn fetch_roster(&self, team_guid: &str) -> Result<TeamRosterResponse, ApiError> {
        self.get(&format!("/v1/teams/{team_guid}/roster")).await
    }

    /// Fetch schedule entries for a date range around the current date
    pub async fn fetch_schedule(&self, team_guid: &str) -> Result<Vec<ScheduleEvent>, ApiError> {
        let now = Utc::now();
        let from_date = (now - chrono::Duration::days(EVENT_LOOKBACK_DAYS))
            .format("%Y-%m-%d")
            .to_string();
        let to_date = (now + chrono::Duration::days(EVENT_LOOKAHEAD_DAYS))
            .format("%Y-%m-%d")
            .to_string();

        debug!(from = %from_date, to = %to_date, "Fetching schedule");

        let url = self.url(&format!("/v1/teams/{team_guid}/events"));
        let response = self
            .send_authorized(|client| {
                client.get(&url).query(&[
                    ("fromDate", from_date.as_str()),
                    ("toDate", to_date.as_str()),
                ])
            })
            .await?;

        response.json().await.map_err(|err| {
            ApiError::InvalidResponse(format!("Failed to parse schedule response: {err}"))
        })
    }

    /// Fetch notices posted to a team's board
    pub async fn fetch_notices(&self, team_guid: &str) -> Result<Vec<Notice>, ApiError> {
        self.get(&format!("/v1/teams/{team_guid}/notices")).await
    }
}

#[async_trait]
impl SessionDataLoader for ApiClient {
    async fn load_session_data(&self) -> anyhow::Result<()> {
        let profile = self.fetch_me().await.context("Failed to load session data")?;
        debug!(
            person = %profile.person_guid,
            teams = profile.memberships.len(),
            "session data loaded"
        );
        self.session.set_profile(profile);
        Ok(())
    }
}
