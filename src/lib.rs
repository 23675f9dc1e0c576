//! matchday-core - Client runtime for the matchday team-management service.
//!
//! This crate provides the authenticated API client shared by every matchday
//! frontend: credential storage, token expiry handling, single-flight token
//! refresh, and the startup session validation that reconciles stored
//! credentials with the in-process session state.
//!
//! UI concerns (screens, forms, navigation) live in the frontends. They hand
//! this crate a [`config::Config`] and a [`auth::Session`] handle, then make
//! authenticated calls through [`api::ApiClient`].

pub mod api;
pub mod auth;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use auth::{
    BootstrapOutcome, CredentialStore, KeyringCredentials, MemoryCredentials, RefreshCoordinator,
    RefreshError, Session, SessionBootstrap, TokenCodec,
};
pub use config::Config;
