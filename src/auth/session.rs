//! In-process session state shared with the frontends.
//!
//! The session store itself (who renders the profile, when navigation kicks
//! the user to the login screen) belongs to the frontend. This handle is the
//! boundary the auth runtime talks to: it reads the authenticated flag and
//! cached profile, and emits the single "session invalid" signal every
//! terminal auth failure converges on.

use std::sync::{Arc, RwLock};

use crate::models::UserProfile;

#[derive(Debug, Default)]
struct SessionInner {
    authenticated: bool,
    profile: Option<UserProfile>,
}

/// Cheap-clone handle to the shared session state.
#[derive(Debug, Clone, Default)]
pub struct Session {
    inner: Arc<RwLock<SessionInner>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // Session state is plain flags; a poisoned lock still holds usable data.
    fn read(&self) -> std::sync::RwLockReadGuard<'_, SessionInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SessionInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().authenticated
    }

    pub fn set_authenticated(&self, authenticated: bool) {
        self.write().authenticated = authenticated;
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.read().profile.clone()
    }

    pub fn has_profile(&self) -> bool {
        self.read().profile.is_some()
    }

    pub fn set_profile(&self, profile: UserProfile) {
        self.write().profile = Some(profile);
    }

    /// Terminal auth failure signal: drop the flag and the cached profile.
    pub fn invalidate(&self) {
        let mut inner = self.write();
        inner.authenticated = false;
        inner.profile = None;
    }
}
