//! Core library for the pub game client.
//!
//! Everything with a contract lives here: the token store that owns the
//! session credential, the API client that attaches it to every request,
//! the session guard that reacts to `401` responses, and the realtime
//! connector that opens the authenticated WebSocket channel.
//!
//! Views and front ends (see `pubgame-cli`) only call into these types.

pub mod api;
pub mod auth;
pub mod config;
pub mod realtime;

pub use api::{ApiClient, ApiError, HttpMethod, LoginResponse, Outcome, RequestOptions};
pub use auth::{
    open_token_store, FileTokenStore, HistoryNavigator, KeyringTokenStore, MemoryTokenStore,
    Navigator, SessionGuard, StoreError, TokenStore,
};
pub use config::{Config, TokenBackend};
pub use realtime::{RealtimeConnector, RealtimeError};
