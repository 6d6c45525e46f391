//! Realtime channel to the backend (live game and raffle updates).
//!
//! Only the authenticated connection is built here; what flows over it is
//! up to the caller.

pub mod connector;

pub use connector::{RealtimeConnector, RealtimeError, RealtimeStream, DEFAULT_WS_PATH};
pub use tokio_tungstenite::tungstenite::Message;
