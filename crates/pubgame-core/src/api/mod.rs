//! REST API client module for the pub game backend.
//!
//! This module provides the `ApiClient` that every view goes through to reach
//! the backend. The backend authenticates with a bearer token obtained from
//! the login endpoint and kept in a `TokenStore`.

pub mod client;
pub mod error;
pub mod request;

pub use client::{ApiClient, LoginResponse};
pub use error::ApiError;
pub use request::{HttpMethod, RequestOptions};

/// Result of one request: the parsed JSON payload or a failure with a
/// human-readable message.
pub type Outcome<T = serde_json::Value> = Result<T, ApiError>;
