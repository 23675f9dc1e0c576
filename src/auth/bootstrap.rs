//! Startup session validation.
//!
//! Runs once per process, before the first authenticated call: reconciles
//! the stored credential pair with the in-process session state, refreshing
//! or signing out as needed. Every unusable-credential path ends with the
//! store and session both cleared, so the frontend observes a single
//! consistent signed-out signal.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::credentials::CredentialStore;
use super::refresh::RefreshCoordinator;
use super::session::Session;
use super::token::TokenCodec;

/// External "load session data" collaborator: fetches the signed-in user's
/// profile and team memberships and populates the session handle.
/// [`crate::api::ApiClient`] implements it; tests substitute fakes.
#[async_trait]
pub trait SessionDataLoader: Send + Sync {
    async fn load_session_data(&self) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapOutcome {
    /// A previous invocation already ran; this one did nothing.
    AlreadyValidated,
    /// No stored credentials; any stale authenticated flag was repaired.
    SignedOut,
    /// A dev token is stored; validation skipped entirely.
    Bypassed,
    /// The access token is valid; the profile was loaded if missing.
    Active,
    /// The access token was expired; a refresh restored the session.
    Refreshed,
    /// Credentials were unusable; store and session are cleared.
    LoggedOut,
}

pub struct SessionBootstrap {
    ran: AtomicBool,
    store: Arc<dyn CredentialStore>,
    codec: TokenCodec,
    refresh: Arc<RefreshCoordinator>,
    session: Session,
}

impl SessionBootstrap {
    pub fn new(
        store: Arc<dyn CredentialStore>,
        codec: TokenCodec,
        refresh: Arc<RefreshCoordinator>,
        session: Session,
    ) -> Self {
        Self {
            ran: AtomicBool::new(false),
            store,
            codec,
            refresh,
            session,
        }
    }

    /// Validate stored credentials against the session state.
    ///
    /// Guarded against duplicate invocation: only the first call per process
    /// does any work.
    pub async fn run(&self, loader: &dyn SessionDataLoader) -> anyhow::Result<BootstrapOutcome> {
        if self.ran.swap(true, Ordering::SeqCst) {
            debug!("session bootstrap already ran, skipping");
            return Ok(BootstrapOutcome::AlreadyValidated);
        }

        let access = self.store.access()?;
        let refresh = self.store.refresh_token()?;

        if access.is_none() && refresh.is_none() {
            if self.session.is_authenticated() {
                warn!("authenticated flag set with no stored credentials, repairing");
                self.session.invalidate();
            }
            return Ok(BootstrapOutcome::SignedOut);
        }

        let is_bypass = |token: &Option<String>| {
            token.as_deref().is_some_and(|t| self.codec.is_bypass(t))
        };
        if is_bypass(&access) || is_bypass(&refresh) {
            debug!("dev token stored, skipping session validation");
            return Ok(BootstrapOutcome::Bypassed);
        }

        let now = Utc::now();
        // A missing access token reads as expired (fail-closed), so a lone
        // refresh token still takes the refresh path below.
        let access_expired = access
            .as_deref()
            .is_none_or(|t| self.codec.is_expired(t, now));

        if !access_expired {
            if self.session.is_authenticated() && !self.session.has_profile() {
                if let Err(err) = loader.load_session_data().await {
                    warn!(error = %err, "failed to load session data, signing out");
                    self.clear_all();
                    return Ok(BootstrapOutcome::LoggedOut);
                }
            }
            return Ok(BootstrapOutcome::Active);
        }

        let refresh_usable = refresh
            .as_deref()
            .is_some_and(|t| !self.codec.is_expired(t, now));
        if !refresh_usable {
            debug!("access token expired with no usable refresh token, signing out");
            self.clear_all();
            return Ok(BootstrapOutcome::LoggedOut);
        }

        match self.refresh.request_refresh().await {
            Ok(_) => {
                if !self.session.has_profile() {
                    if let Err(err) = loader.load_session_data().await {
                        warn!(error = %err, "failed to load session data after refresh, signing out");
                        self.clear_all();
                        return Ok(BootstrapOutcome::LoggedOut);
                    }
                }
                Ok(BootstrapOutcome::Refreshed)
            }
            Err(err) => {
                // The coordinator has already cleared the store and
                // invalidated the session.
                warn!(error = %err, "startup refresh failed");
                Ok(BootstrapOutcome::LoggedOut)
            }
        }
    }

    fn clear_all(&self) {
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear credential store");
        }
        self.session.invalidate();
    }
}
