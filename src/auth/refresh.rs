//! Single-flight token refresh.
//!
//! Every caller that needs a fresh access token goes through
//! [`RefreshCoordinator::request_refresh`]. The first caller of a cycle runs
//! the actual refresh; callers arriving while it is in flight are parked on
//! a waiter queue and resolved with the same outcome, so at most one refresh
//! network call is in flight at any time.
//!
//! Terminal failures (missing/expired refresh token, server rejection,
//! transport error) all converge on the same effect: clear the credential
//! store and invalidate the session. Stored tokens are never left in an
//! expired-but-retained state.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{oneshot, Mutex};
use tracing::{debug, warn};

use super::credentials::CredentialStore;
use super::session::Session;
use super::token::TokenCodec;

/// Maximum bytes of a rejection body carried in the error.
const MAX_REJECTION_DETAIL_CHARS: usize = 200;

/// `Clone` so one failure can fan out to every queued waiter.
#[derive(Error, Debug, Clone)]
pub enum RefreshError {
    #[error("no refresh token is stored")]
    MissingRefreshToken,

    #[error("stored refresh token is expired")]
    ExpiredRefreshToken,

    #[error("refresh rejected by server ({status}): {detail}")]
    Rejected { status: u16, detail: String },

    #[error("network error during refresh: {0}")]
    Network(String),

    #[error("credential storage failed: {0}")]
    Storage(String),

    #[error("refresh cycle ended without an outcome")]
    Interrupted,
}

/// Tokens minted by the refresh endpoint. The refresh token is present only
/// when the server rotates it.
#[derive(Debug, Clone, Deserialize)]
pub struct MintedTokens {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: Option<String>,
}

/// The refresh endpoint, as a seam so tests can substitute a fake.
#[async_trait]
pub trait RefreshTransport: Send + Sync {
    async fn refresh(&self, refresh_token: &str) -> Result<MintedTokens, RefreshError>;
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

/// Production transport: `POST {base}/v1/auth/refresh`.
///
/// The reqwest client's request timeout bounds the call, so a hung refresh
/// cannot starve the waiter queue indefinitely.
pub struct HttpRefreshTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpRefreshTransport {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl RefreshTransport for HttpRefreshTransport {
    async fn refresh(&self, refresh_token: &str) -> Result<MintedTokens, RefreshError> {
        let url = format!("{}/v1/auth/refresh", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(&RefreshRequest { refresh_token })
            .send()
            .await
            .map_err(|err| RefreshError::Network(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RefreshError::Rejected {
                status: status.as_u16(),
                detail: body.chars().take(MAX_REJECTION_DETAIL_CHARS).collect(),
            });
        }

        response
            .json()
            .await
            .map_err(|err| RefreshError::Network(err.to_string()))
    }
}

struct RefreshInner {
    in_progress: bool,
    waiters: Vec<oneshot::Sender<Result<String, RefreshError>>>,
}

/// Process-wide refresh state: one coordinator per client runtime.
///
/// The `in_progress` check-then-set and the waiter queue live under one
/// async mutex, so the single-flight guarantee holds on a multi-threaded
/// runtime. The lock is never held across the network call.
pub struct RefreshCoordinator {
    inner: Mutex<RefreshInner>,
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
    transport: Arc<dyn RefreshTransport>,
    session: Session,
}

impl RefreshCoordinator {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        codec: TokenCodec,
        transport: Arc<dyn RefreshTransport>,
        session: Session,
    ) -> Self {
        Self {
            inner: Mutex::new(RefreshInner {
                in_progress: false,
                waiters: Vec::new(),
            }),
            store,
            codec,
            transport,
            session,
        }
    }

    /// Mint a fresh access token, or await the refresh already in flight.
    ///
    /// All callers of one cycle observe the identical outcome; waiters are
    /// resolved in enqueue order once the cycle settles.
    pub async fn request_refresh(&self) -> Result<String, RefreshError> {
        {
            let mut inner = self.inner.lock().await;
            if inner.in_progress {
                let (tx, rx) = oneshot::channel();
                inner.waiters.push(tx);
                drop(inner);
                debug!("refresh already in flight, waiting on its outcome");
                return match rx.await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(RefreshError::Interrupted),
                };
            }
            inner.in_progress = true;
        }

        let outcome = self.run_cycle().await;
        self.settle(&outcome).await;
        outcome
    }

    async fn run_cycle(&self) -> Result<String, RefreshError> {
        let refresh_token = match self.store.refresh_token() {
            Ok(Some(token)) => token,
            Ok(None) => return self.fail(RefreshError::MissingRefreshToken),
            Err(err) => return self.fail(RefreshError::Storage(err.to_string())),
        };

        // Provably dead refresh token: fail without a network call.
        if self.codec.is_expired(&refresh_token, Utc::now()) {
            return self.fail(RefreshError::ExpiredRefreshToken);
        }

        match self.transport.refresh(&refresh_token).await {
            Ok(minted) => {
                if let Err(err) = self.persist(&minted) {
                    return self.fail(RefreshError::Storage(err.to_string()));
                }
                debug!("access token refreshed");
                Ok(minted.access_token)
            }
            Err(err) => self.fail(err),
        }
    }

    fn persist(&self, minted: &MintedTokens) -> anyhow::Result<()> {
        self.store.set_access(&minted.access_token)?;
        if let Some(ref rotated) = minted.refresh_token {
            self.store.set_refresh(rotated)?;
        }
        Ok(())
    }

    /// Terminal failure: clear stored tokens, signal session-invalid.
    fn fail(&self, err: RefreshError) -> Result<String, RefreshError> {
        warn!(error = %err, "token refresh failed, clearing stored credentials");
        if let Err(clear_err) = self.store.clear() {
            warn!(error = %clear_err, "failed to clear credential store");
        }
        self.session.invalidate();
        Err(err)
    }

    async fn settle(&self, outcome: &Result<String, RefreshError>) {
        let waiters = {
            let mut inner = self.inner.lock().await;
            inner.in_progress = false;
            std::mem::take(&mut inner.waiters)
        };
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::credentials::MemoryCredentials;
    use crate::auth::token::make_token;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    enum FakeOutcome {
        Succeed { rotate_refresh: bool },
        Reject(u16),
        NetworkError,
    }

    struct FakeTransport {
        calls: AtomicUsize,
        delay: Duration,
        outcome: FakeOutcome,
    }

    impl FakeTransport {
        fn new(outcome: FakeOutcome) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                delay: Duration::from_millis(200),
                outcome,
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RefreshTransport for FakeTransport {
        async fn refresh(&self, _refresh_token: &str) -> Result<MintedTokens, RefreshError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.outcome {
                FakeOutcome::Succeed { rotate_refresh } => Ok(MintedTokens {
                    access_token: "A2".to_string(),
                    refresh_token: rotate_refresh.then(|| "R2".to_string()),
                }),
                FakeOutcome::Reject(status) => Err(RefreshError::Rejected {
                    status,
                    detail: "invalid refresh token".to_string(),
                }),
                FakeOutcome::NetworkError => {
                    Err(RefreshError::Network("connection reset".to_string()))
                }
            }
        }
    }

    fn valid_refresh_token() -> String {
        make_token((Utc::now() + chrono::Duration::hours(12)).timestamp())
    }

    fn coordinator(
        store: Arc<MemoryCredentials>,
        transport: Arc<FakeTransport>,
        session: Session,
    ) -> Arc<RefreshCoordinator> {
        Arc::new(RefreshCoordinator::new(
            store,
            TokenCodec::new(false),
            transport,
            session,
        ))
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn concurrent_callers_share_one_refresh_call() {
        let store = Arc::new(MemoryCredentials::with_tokens(
            Some("A1"),
            Some(&valid_refresh_token()),
        ));
        let transport = Arc::new(FakeTransport::new(FakeOutcome::Succeed {
            rotate_refresh: true,
        }));
        let coordinator = coordinator(store.clone(), transport.clone(), Session::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(
                async move { coordinator.request_refresh().await },
            ));
        }

        for handle in handles {
            let token = handle.await.expect("join").expect("refresh should succeed");
            assert_eq!(token, "A2");
        }

        assert_eq!(transport.calls(), 1);
        assert_eq!(store.access().expect("read").as_deref(), Some("A2"));
        assert_eq!(store.refresh_token().expect("read").as_deref(), Some("R2"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failure_fans_out_to_all_waiters_and_clears_store() {
        let store = Arc::new(MemoryCredentials::with_tokens(
            Some("A1"),
            Some(&valid_refresh_token()),
        ));
        let transport = Arc::new(FakeTransport::new(FakeOutcome::Reject(401)));
        let session = Session::new();
        session.set_authenticated(true);
        let coordinator = coordinator(store.clone(), transport.clone(), session.clone());

        let mut handles = Vec::new();
        for _ in 0..5 {
            let coordinator = coordinator.clone();
            handles.push(tokio::spawn(
                async move { coordinator.request_refresh().await },
            ));
        }

        for handle in handles {
            let err = handle.await.expect("join").expect_err("refresh should fail");
            assert!(matches!(err, RefreshError::Rejected { status: 401, .. }));
        }

        assert_eq!(transport.calls(), 1);
        assert_eq!(store.access().expect("read"), None);
        assert_eq!(store.refresh_token().expect("read"), None);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn missing_refresh_token_fails_without_network_call() {
        let store = Arc::new(MemoryCredentials::with_tokens(Some("A1"), None));
        let transport = Arc::new(FakeTransport::new(FakeOutcome::Succeed {
            rotate_refresh: false,
        }));
        let session = Session::new();
        session.set_authenticated(true);
        let coordinator = coordinator(store.clone(), transport.clone(), session.clone());

        let err = coordinator
            .request_refresh()
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, RefreshError::MissingRefreshToken));
        assert_eq!(transport.calls(), 0);
        assert_eq!(store.access().expect("read"), None);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn expired_refresh_token_fails_without_network_call() {
        let expired = make_token((Utc::now() - chrono::Duration::hours(1)).timestamp());
        let store = Arc::new(MemoryCredentials::with_tokens(Some("A1"), Some(&expired)));
        let transport = Arc::new(FakeTransport::new(FakeOutcome::Succeed {
            rotate_refresh: false,
        }));
        let coordinator = coordinator(store.clone(), transport.clone(), Session::new());

        let err = coordinator
            .request_refresh()
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, RefreshError::ExpiredRefreshToken));
        assert_eq!(transport.calls(), 0);
        assert_eq!(store.refresh_token().expect("read"), None);
    }

    #[tokio::test]
    async fn network_error_is_terminal() {
        let store = Arc::new(MemoryCredentials::with_tokens(
            Some("A1"),
            Some(&valid_refresh_token()),
        ));
        let transport = Arc::new(FakeTransport::new(FakeOutcome::NetworkError));
        let session = Session::new();
        session.set_authenticated(true);
        let coordinator = coordinator(store.clone(), transport, session.clone());

        let err = coordinator
            .request_refresh()
            .await
            .expect_err("refresh should fail");
        assert!(matches!(err, RefreshError::Network(_)));
        assert_eq!(store.access().expect("read"), None);
        assert!(!session.is_authenticated());
    }

    #[tokio::test]
    async fn unrotated_refresh_token_is_kept() {
        let refresh = valid_refresh_token();
        let store = Arc::new(MemoryCredentials::with_tokens(Some("A1"), Some(&refresh)));
        let transport = Arc::new(FakeTransport::new(FakeOutcome::Succeed {
            rotate_refresh: false,
        }));
        let coordinator = coordinator(store.clone(), transport, Session::new());

        let token = coordinator
            .request_refresh()
            .await
            .expect("refresh should succeed");
        assert_eq!(token, "A2");
        assert_eq!(store.access().expect("read").as_deref(), Some("A2"));
        assert_eq!(
            store.refresh_token().expect("read").as_deref(),
            Some(refresh.as_str())
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn coordinator_is_idle_again_after_settlement() {
        let store = Arc::new(MemoryCredentials::with_tokens(
            Some("A1"),
            Some(&valid_refresh_token()),
        ));
        // No rotation, so the second cycle still sees the valid refresh token.
        let transport = Arc::new(FakeTransport::new(FakeOutcome::Succeed {
            rotate_refresh: false,
        }));
        let coordinator = coordinator(store.clone(), transport.clone(), Session::new());

        coordinator.request_refresh().await.expect("first cycle");
        coordinator.request_refresh().await.expect("second cycle");

        // Two sequential cycles, two network calls: the in-progress flag
        // resets on settlement.
        assert_eq!(transport.calls(), 2);
    }
}
