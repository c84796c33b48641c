//! Authenticated HTTP client for the staffdesk REST API.
//!
//! Every request consults the [`TokenStore`] for a bearer token and every
//! failure comes back as a classified [`ApiError`]; nothing here panics or
//! leaks transport errors to the caller.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::ApiError;
use crate::auth::TokenStore;

/// Outcome of a request: the decoded payload or a classified failure.
pub type RequestOutcome<T> = std::result::Result<T, ApiError>;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Method, query string and JSON body of a request.
#[derive(Debug, Clone)]
pub struct RequestOptions {
    pub method: Method,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn get() -> Self {
        Self {
            method: Method::GET,
            query: Vec::new(),
            body: None,
        }
    }

    pub fn delete() -> Self {
        Self {
            method: Method::DELETE,
            ..Self::get()
        }
    }

    pub fn post<B: Serialize + ?Sized>(body: &B) -> RequestOutcome<Self> {
        Self::with_body(Method::POST, body)
    }

    pub fn put<B: Serialize + ?Sized>(body: &B) -> RequestOutcome<Self> {
        Self::with_body(Method::PUT, body)
    }

    fn with_body<B: Serialize + ?Sized>(method: Method, body: &B) -> RequestOutcome<Self> {
        let body = serde_json::to_value(body).map_err(|e| {
            ApiError::ValidationError(format!("Failed to encode request body: {}", e))
        })?;
        Ok(Self {
            method,
            query: Vec::new(),
            body: Some(body),
        })
    }

    pub fn query<K: Into<String>, V: Into<String>>(mut self, pairs: Vec<(K, V)>) -> Self {
        self.query
            .extend(pairs.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }
}

/// API client for the staffdesk backend.
/// Clone is cheap - reqwest::Client and TokenStore are both shared handles.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    tokens: TokenStore,
    initial_backoff: Duration,
}

impl ApiClient {
    /// Create a client rooted at `base_url` (e.g. `http://localhost:8000/api`).
    pub fn new(base_url: &str, timeout: Duration, tokens: TokenStore) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Override the first rate-limit backoff delay; it doubles per retry.
    pub fn with_backoff(mut self, initial_backoff: Duration) -> Self {
        self.initial_backoff = initial_backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Perform an authenticated request.
    ///
    /// The bearer header is attached only when a valid access token is
    /// stored. A stored token that fails validation is cleared and the call
    /// fails with `AuthenticationRequired` before anything is sent.
    pub async fn request<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> RequestOutcome<T> {
        let token = self.bearer_token()?;
        self.send(path, &options, token.as_deref(), true).await
    }

    /// Perform a request that never carries credentials (login, register).
    ///
    /// A 401 here rejects the submitted credentials, not the stored tokens,
    /// so storage is left alone.
    pub async fn request_anonymous<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
    ) -> RequestOutcome<T> {
        self.send(path, &options, None, false).await
    }

    /// Perform a request with an explicit bearer token instead of the stored
    /// one. Storage is left alone on a 401.
    pub async fn request_with_token<T: DeserializeOwned>(
        &self,
        path: &str,
        options: RequestOptions,
        token: &str,
    ) -> RequestOutcome<T> {
        self.send(path, &options, Some(token), false).await
    }

    fn bearer_token(&self) -> RequestOutcome<Option<String>> {
        if let Some(token) = self.tokens.current_valid_access() {
            return Ok(Some(token));
        }
        if self.tokens.has_access_token() {
            warn!("Stored access token is invalid or expired, clearing tokens");
            self.tokens.clear();
            return Err(ApiError::AuthenticationRequired);
        }
        Ok(None)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        path: &str,
        options: &RequestOptions,
        token: Option<&str>,
        clear_on_reject: bool,
    ) -> RequestOutcome<T> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let mut builder = self
                .client
                .request(options.method.clone(), &url)
                .header(header::ACCEPT, "application/json");
            if !options.query.is_empty() {
                builder = builder.query(&options.query);
            }
            if let Some(ref body) = options.body {
                builder = builder.json(body);
            }
            if let Some(token) = token {
                builder = builder.bearer_auth(token);
            }

            debug!(method = %options.method, url = %url, "Sending request");
            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) => {
                    warn!(url = %url, error = %e, "Request failed before a response arrived");
                    return Err(ApiError::from_transport(&e));
                }
            };

            let status = response.status();
            if status.is_success() {
                return Self::parse_body(response).await;
            }

            match status {
                StatusCode::UNAUTHORIZED => {
                    if clear_on_reject {
                        warn!(url = %url, "Credential rejected by server, clearing tokens");
                        self.tokens.clear();
                    }
                    return Err(ApiError::AuthenticationRequired);
                }
                StatusCode::TOO_MANY_REQUESTS => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::ValidationError(
                            "Too many requests. Please wait before retrying.".to_string(),
                        ));
                    }
                    warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
                _ => {
                    let body = response.text().await.unwrap_or_default();
                    let err = ApiError::from_status(status, &body);
                    debug!(url = %url, status = status.as_u16(), error = %err, "Request rejected");
                    return Err(err);
                }
            }
        }
    }

    /// Decode a successful response. Empty bodies (e.g. 204 on delete)
    /// decode as JSON `null`, which suits `()` and `Option<_>` targets.
    async fn parse_body<T: DeserializeOwned>(response: reqwest::Response) -> RequestOutcome<T> {
        let status = response.status();
        let is_json = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("application/json"))
            .unwrap_or(false);

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ApiError::from_transport(&e))?;

        if status == StatusCode::NO_CONTENT || bytes.is_empty() {
            return serde_json::from_value(Value::Null)
                .map_err(|e| ApiError::MalformedResponse(e.to_string()));
        }

        if !is_json {
            return Err(ApiError::MalformedResponse(
                "Expected JSON data".to_string(),
            ));
        }

        serde_json::from_slice(&bytes).map_err(|e| ApiError::MalformedResponse(e.to_string()))
    }
}
