//! Authentication runtime: credentials, token expiry, refresh, bootstrap.
//!
//! This module provides:
//! - `CredentialStore`: durable access/refresh token slots (OS keychain)
//! - `TokenCodec`: fail-closed claim decoding and expiry checks
//! - `RefreshCoordinator`: single-flight token refresh with a waiter queue
//! - `SessionBootstrap`: one-time startup reconciliation of stored
//!   credentials vs. session state
//! - `Session`: the shared handle the runtime notifies on terminal failures

pub mod bootstrap;
pub mod credentials;
pub mod refresh;
pub mod session;
pub mod token;

pub use bootstrap::{BootstrapOutcome, SessionBootstrap, SessionDataLoader};
pub use credentials::{CredentialStore, KeyringCredentials, MemoryCredentials};
pub use refresh::{
    HttpRefreshTransport, MintedTokens, RefreshCoordinator, RefreshError, RefreshTransport,
};
pub use session::Session;
pub use token::{decode, Claims, DecodeError, TokenCodec, DEV_TOKEN_PREFIX};
