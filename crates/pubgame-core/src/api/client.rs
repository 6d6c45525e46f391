//! Session-aware client for the pub game REST API.
//!
//! Every call carries the bearer token from the `TokenStore`, response
//! bodies are parsed defensively, and a `401` hands control to the
//! `SessionGuard` before the failure is returned.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::auth::{Navigator, SessionGuard, TokenStore};
use crate::config::Config;

use super::{ApiError, Outcome, RequestOptions};

// ============================================================================
// Constants
// ============================================================================

/// Login endpoint; answers `{"token": "..."}` on success
const LOGIN_PATH: &str = "/api/auth/login";

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

/// Successful login: the stored token plus whatever else the backend sent
#[derive(Debug, Clone)]
pub struct LoginResponse {
    pub token: String,
    pub payload: Value,
}

/// API client for the pub game backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    store: Arc<dyn TokenStore>,
    guard: SessionGuard,
}

impl ApiClient {
    /// Create a client without a request timeout
    pub fn new(base_url: &str, store: Arc<dyn TokenStore>, guard: SessionGuard) -> Outcome<Self> {
        Self::with_timeout(base_url, store, guard, None)
    }

    pub fn with_timeout(
        base_url: &str,
        store: Arc<dyn TokenStore>,
        guard: SessionGuard,
        timeout: Option<Duration>,
    ) -> Outcome<Self> {
        // No cookie store: the bearer header is the only credential sent.
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            store,
            guard,
        })
    }

    /// Wire a client, its session guard and the given navigator from config
    pub fn from_config(
        config: &Config,
        store: Arc<dyn TokenStore>,
        navigator: Arc<dyn Navigator>,
    ) -> Outcome<Self> {
        let guard = SessionGuard::new(Arc::clone(&store), navigator, config.login_path.clone());
        Self::with_timeout(&config.api_base, store, guard, config.timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn store(&self) -> &Arc<dyn TokenStore> {
        &self.store
    }

    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }

    /// `Content-Type: application/json`, then the auth header, then `extra`;
    /// later sources replace earlier ones on the same name.
    fn request_headers(&self, extra: &HeaderMap) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        merge_headers(&mut headers, &self.store.auth_header());
        merge_headers(&mut headers, extra);
        headers
    }

    /// Perform one request and turn the response into an outcome.
    pub async fn execute(&self, path: &str, options: RequestOptions) -> Outcome {
        let url = self.url(path);
        let method = options.method;

        let mut request = self
            .client
            .request(method.as_reqwest(), &url)
            .headers(self.request_headers(&options.headers));
        if let Some(ref body) = options.body {
            let bytes = serde_json::to_vec(body).map_err(ApiError::Encode)?;
            request = request.body(bytes);
        }

        debug!(%method, path, "Sending request");
        let response = request.send().await.map_err(|e| {
            warn!(%method, path, error = %e, "Request failed before a response arrived");
            ApiError::Network(e)
        })?;

        let status = response.status();
        let text = response.text().await?;
        let payload = parse_payload(&text);

        if status == StatusCode::UNAUTHORIZED {
            warn!(%method, path, "Backend rejected the session");
            self.guard.on_auth_failure();
            return Err(ApiError::from_status(status, &payload));
        }

        if !status.is_success() {
            debug!(%method, path, status = status.as_u16(), "Request failed");
            return Err(ApiError::from_status(status, &payload));
        }

        Ok(payload)
    }

    /// `execute`, then deserialize the payload into `T`
    pub async fn execute_as<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> Outcome<T> {
        let payload = self.execute(path, options).await?;
        serde_json::from_value(payload).map_err(ApiError::Decode)
    }

    pub async fn get(&self, path: &str) -> Outcome {
        self.execute(path, RequestOptions::get()).await
    }

    pub async fn post<B: Serialize>(&self, path: &str, body: &B) -> Outcome {
        let body = serde_json::to_value(body).map_err(ApiError::Encode)?;
        self.execute(path, RequestOptions::post(body)).await
    }

    pub async fn put<B: Serialize>(&self, path: &str, body: &B) -> Outcome {
        let body = serde_json::to_value(body).map_err(ApiError::Encode)?;
        self.execute(path, RequestOptions::put(body)).await
    }

    pub async fn delete(&self, path: &str) -> Outcome {
        self.execute(path, RequestOptions::delete()).await
    }

    // ===== Session lifecycle =====

    /// Exchange email and password for a session token and store it
    pub async fn login(&self, email: &str, password: &str) -> Outcome<LoginResponse> {
        let payload = self
            .post(LOGIN_PATH, &LoginRequest { email, password })
            .await?;

        let token = payload
            .get("token")
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .ok_or(ApiError::MissingToken)?
            .to_string();

        self.store.set(&token)?;
        info!("Logged in");
        Ok(LoginResponse { token, payload })
    }

    /// Drop the local session. Safe to call when logged out.
    pub fn logout(&self) {
        self.store.clear();
        info!("Logged out");
    }
}

/// Replace every header in `target` that `overrides` names.
fn merge_headers(target: &mut HeaderMap, overrides: &HeaderMap) {
    for name in overrides.keys() {
        target.remove(name);
    }
    for (name, value) in overrides {
        target.append(name.clone(), value.clone());
    }
}

/// Empty body is `null`; anything that is not JSON comes back as `{"raw": text}`.
fn parse_payload(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    match serde_json::from_str(text) {
        Ok(value) => value,
        Err(_) => {
            debug!(body = %ApiError::truncate_body(text), "Response body is not JSON");
            json!({ "raw": text })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{HistoryNavigator, MemoryTokenStore};
    use reqwest::header::{HeaderName, AUTHORIZATION};

    fn client_with(token: Option<&str>) -> ApiClient {
        let store: Arc<dyn TokenStore> = Arc::new(MemoryTokenStore::new());
        if let Some(token) = token {
            store.set(token).unwrap();
        }
        let guard = SessionGuard::new(
            Arc::clone(&store),
            Arc::new(HistoryNavigator::new("/")),
            "/login",
        );
        ApiClient::new("https://pub.example.com/", store, guard).unwrap()
    }

    #[test]
    fn test_parse_payload() {
        assert_eq!(parse_payload(""), Value::Null);
        assert_eq!(parse_payload("  \n"), Value::Null);
        assert_eq!(parse_payload("null"), Value::Null);
        assert_eq!(parse_payload("[1,2]"), json!([1, 2]));
        assert_eq!(parse_payload("\"ok\""), json!("ok"));
        assert_eq!(parse_payload("Bad Gateway"), json!({"raw": "Bad Gateway"}));
    }

    #[test]
    fn test_url_joins_base_and_path() {
        let client = client_with(None);
        assert_eq!(client.base_url(), "https://pub.example.com");
        assert_eq!(client.url("/api/dashboard"), "https://pub.example.com/api/dashboard");
        assert_eq!(client.url("api/venues"), "https://pub.example.com/api/venues");
    }

    #[test]
    fn test_request_headers_without_session() {
        let client = client_with(None);
        let headers = client.request_headers(&HeaderMap::new());
        assert_eq!(headers.len(), 1);
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
    }

    #[test]
    fn test_extra_headers_win() {
        let client = client_with(Some("abc123"));

        let mut extra = HeaderMap::new();
        extra.insert(AUTHORIZATION, HeaderValue::from_static("Bearer override"));
        extra.insert(CONTENT_TYPE, HeaderValue::from_static("text/plain"));
        extra.insert(HeaderName::from_static("x-venue"), HeaderValue::from_static("7"));

        let headers = client.request_headers(&extra);
        assert_eq!(headers.get(AUTHORIZATION).unwrap(), "Bearer override");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "text/plain");
        assert_eq!(headers.get("x-venue").unwrap(), "7");
        assert_eq!(headers.get_all(AUTHORIZATION).iter().count(), 1);
    }

    #[test]
    fn test_logout_is_idempotent() {
        let client = client_with(Some("abc123"));
        client.logout();
        client.logout();
        assert!(!client.store().has_session());
    }
}
