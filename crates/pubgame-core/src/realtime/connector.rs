use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpStream;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info};
use url::Url;

use crate::auth::TokenStore;

/// Default realtime path on the backend
pub const DEFAULT_WS_PATH: &str = "/ws";

/// Query parameter carrying the session token at handshake time
const TOKEN_PARAM: &str = "t";

const SECURE_SCHEME: &str = "wss";

/// Live realtime connection handed back to the caller
pub type RealtimeStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Error, Debug)]
pub enum RealtimeError {
    #[error("Invalid realtime URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Unsupported realtime scheme: {0}")]
    UnsupportedScheme(String),

    #[error("WebSocket connection failed: {0}")]
    Connect(#[from] tokio_tungstenite::tungstenite::Error),
}

/// One-shot factory for authenticated realtime connections.
///
/// The endpoint is derived from live token store state on every attempt.
/// Reconnects, close handling and message framing belong to the caller.
#[derive(Clone)]
pub struct RealtimeConnector {
    base: String,
    store: Arc<dyn TokenStore>,
}

impl RealtimeConnector {
    pub fn new(base: &str, store: Arc<dyn TokenStore>) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            store,
        }
    }

    /// Endpoint for `path`: always `wss`, with the token as `t` when one is held.
    pub fn endpoint(&self, path: &str) -> Result<Url, RealtimeError> {
        let (scheme, rest) = self
            .base
            .split_once("://")
            .ok_or_else(|| RealtimeError::UnsupportedScheme(self.base.clone()))?;

        match scheme.to_ascii_lowercase().as_str() {
            SECURE_SCHEME => {}
            "ws" | "http" | "https" => {
                debug!(scheme, "Upgrading realtime scheme to wss");
            }
            other => return Err(RealtimeError::UnsupportedScheme(other.to_string())),
        }

        let candidate = if path.starts_with('/') {
            format!("{}://{}{}", SECURE_SCHEME, rest, path)
        } else {
            format!("{}://{}/{}", SECURE_SCHEME, rest, path)
        };
        let mut url = Url::parse(&candidate)?;

        if let Some(token) = self.store.get() {
            url.query_pairs_mut().append_pair(TOKEN_PARAM, &token);
        }
        Ok(url)
    }

    /// Open the realtime channel at `path`
    pub async fn connect(&self, path: &str) -> Result<RealtimeStream, RealtimeError> {
        let url = self.endpoint(path)?;
        info!(
            host = url.host_str().unwrap_or_default(),
            path = url.path(),
            authenticated = self.store.has_session(),
            "Connecting realtime channel"
        );

        let (stream, response) = connect_async(url.as_str()).await?;
        debug!(status = response.status().as_u16(), "Realtime handshake complete");
        Ok(stream)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::MemoryTokenStore;

    fn connector(base: &str, token: Option<&str>) -> RealtimeConnector {
        let store = match token {
            Some(token) => MemoryTokenStore::with_token(token).unwrap(),
            None => MemoryTokenStore::new(),
        };
        RealtimeConnector::new(base, Arc::new(store))
    }

    #[test]
    fn test_insecure_base_is_upgraded() {
        let url = connector("http://example.com", Some("tok"))
            .endpoint(DEFAULT_WS_PATH)
            .unwrap();
        assert_eq!(url.as_str(), "wss://example.com/ws?t=tok");

        let url = connector("ws://example.com", Some("tok")).endpoint("/ws").unwrap();
        assert_eq!(url.as_str(), "wss://example.com/ws?t=tok");
    }

    #[test]
    fn test_secure_base_kept() {
        let url = connector("https://rt.example.com///", None)
            .endpoint("/ws")
            .unwrap();
        assert_eq!(url.as_str(), "wss://rt.example.com/ws");

        let url = connector("wss://rt.example.com:8443", None)
            .endpoint("games/safe")
            .unwrap();
        assert_eq!(url.as_str(), "wss://rt.example.com:8443/games/safe");
    }

    #[test]
    fn test_token_omitted_without_session() {
        let url = connector("wss://example.com", None).endpoint("/ws").unwrap();
        assert_eq!(url.query(), None);
    }

    #[test]
    fn test_token_is_encoded() {
        let url = connector("wss://example.com", Some("a b&c=d"))
            .endpoint("/ws")
            .unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs, vec![("t".to_string(), "a b&c=d".to_string())]);
    }

    #[test]
    fn test_endpoint_reads_live_token() {
        let store = Arc::new(MemoryTokenStore::new());
        let connector = RealtimeConnector::new("wss://example.com", store.clone());
        assert_eq!(connector.endpoint("/ws").unwrap().query(), None);

        store.set("fresh").unwrap();
        assert_eq!(connector.endpoint("/ws").unwrap().query(), Some("t=fresh"));
    }

    #[test]
    fn test_unsupported_scheme() {
        assert!(matches!(
            connector("ftp://example.com", None).endpoint("/ws"),
            Err(RealtimeError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            connector("example.com", None).endpoint("/ws"),
            Err(RealtimeError::UnsupportedScheme(_))
        ));
    }

    #[tokio::test]
    async fn test_connect_refused_is_an_error() {
        let result = connector("http://127.0.0.1:1", Some("tok"))
            .connect(DEFAULT_WS_PATH)
            .await;
        assert!(matches!(result, Err(RealtimeError::Connect(_))));
    }
}
