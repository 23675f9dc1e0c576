//! REST API client module for the matchday service.
//!
//! This module provides the `ApiClient` for communicating with the matchday
//! API to fetch roster, schedule, and notice data.
//!
//! The API uses JWT bearer token authentication; expired tokens are renewed
//! through the refresh endpoint by the auth runtime.

pub mod client;
pub mod error;

pub use client::ApiClient;
pub use error::ApiError;
