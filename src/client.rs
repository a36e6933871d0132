//! Jira API client.
//!
//! Low-level HTTP client that handles authentication, request retries and
//! the connection health gate. Entity-specific operations are implemented
//! via the `Get` trait and convenience functions on model types.

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::time::sleep;
use url::Url;

use crate::error::{JiraError, Result};
use crate::metadata::MetadataCache;

const DEFAULT_API_VERSION: &str = "3";
const DEFAULT_PAGE_SIZE: u32 = 50;
const DEFAULT_RETRY_COUNT: u32 = 1;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(1000);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
const PROBE_ATTEMPTS: u32 = 10;
const DEFAULT_PROBE_DELAY: Duration = Duration::from_secs(2);
const USER_AGENT: &str = concat!("jirapi/", env!("CARGO_PKG_VERSION"));

/// Credentials attached to every outbound request.
#[derive(Clone)]
pub enum Auth {
    /// HTTP Basic authentication with a username and API token (or password).
    Basic { username: String, token: String },
    /// Bearer token authentication (personal access tokens on Jira Server/DC).
    Bearer { token: String },
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .finish_non_exhaustive(),
            Auth::Bearer { .. } => f.debug_struct("Bearer").finish_non_exhaustive(),
        }
    }
}

/// Configuration for a [`JiraClient`].
///
/// Only the base URL and credentials are required; everything else has a
/// sensible default. Builder methods consume and return the config so it
/// can be assembled in one expression.
///
/// # Example
///
/// ```no_run
/// use jirapi::{Auth, JiraConfig};
/// use std::time::Duration;
///
/// let config = JiraConfig::new(
///     "https://example.atlassian.net",
///     Auth::Basic {
///         username: "me@example.com".to_string(),
///         token: "api-token".to_string(),
///     },
/// )
/// .retries(3, Duration::from_secs(1))
/// .retry_on_status(&[502, 503]);
/// ```
#[derive(Debug, Clone)]
pub struct JiraConfig {
    pub(crate) base_url: String,
    pub(crate) auth: Auth,
    pub(crate) api_version: String,
    pub(crate) cloud: bool,
    pub(crate) page_size: u32,
    pub(crate) retry_count: u32,
    pub(crate) retry_delay: Duration,
    pub(crate) retryable_status_codes: Vec<u16>,
    pub(crate) retry_on_timeout: bool,
    pub(crate) assert_ok: bool,
    pub(crate) request_timeout: Duration,
    pub(crate) probe_delay: Duration,
}

impl JiraConfig {
    /// Create a configuration with default settings.
    pub fn new(base_url: impl Into<String>, auth: Auth) -> Self {
        Self {
            base_url: base_url.into(),
            auth,
            api_version: DEFAULT_API_VERSION.to_string(),
            cloud: true,
            page_size: DEFAULT_PAGE_SIZE,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_delay: DEFAULT_RETRY_DELAY,
            retryable_status_codes: Vec::new(),
            retry_on_timeout: false,
            assert_ok: true,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            probe_delay: DEFAULT_PROBE_DELAY,
        }
    }

    /// Set the REST API version used in request paths (default `"3"`).
    #[must_use]
    pub fn api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = version.into();
        self
    }

    /// Whether this is a Jira Cloud instance (default `true`).
    ///
    /// Affects only the health endpoint used by the connection gate:
    /// `/status` on Cloud, `/rest/api/{version}/serverInfo` otherwise.
    #[must_use]
    pub fn cloud(mut self, cloud: bool) -> Self {
        self.cloud = cloud;
        self
    }

    /// Default page size for paginated searches (default 50).
    #[must_use]
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// How many times a failed request is retried, and the fixed sleep
    /// between attempts (defaults: 1 retry, 1 second).
    #[must_use]
    pub fn retries(mut self, count: u32, delay: Duration) -> Self {
        self.retry_count = count;
        self.retry_delay = delay;
        self
    }

    /// Response status codes that trigger a retry in addition to network
    /// failures (default: none). Useful for flaky proxies returning 502/503.
    #[must_use]
    pub fn retry_on_status(mut self, codes: &[u16]) -> Self {
        self.retryable_status_codes = codes.to_vec();
        self
    }

    /// Whether a request timeout counts as a retryable failure (default
    /// `false`).
    #[must_use]
    pub fn retry_on_timeout(mut self, retry: bool) -> Self {
        self.retry_on_timeout = retry;
        self
    }

    /// Whether the final response status is asserted for success after
    /// retries are exhausted (default `true`).
    #[must_use]
    pub fn assert_ok(mut self, assert: bool) -> Self {
        self.assert_ok = assert;
        self
    }

    /// Per-request timeout (default 300 seconds).
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sleep between connection-gate probe attempts (default 2 seconds).
    #[must_use]
    pub fn probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = delay;
        self
    }
}

/// Low-level Jira API client.
///
/// Handles authentication, the connection health gate, and HTTP requests
/// with the configured retry policy. Entity-specific operations live on
/// the model types in [`crate::models`].
///
/// This struct is cheaply cloneable; clones share the same connection
/// pool, metadata cache and connection-gate state.
///
/// # Example
///
/// ```no_run
/// use jirapi::JiraClient;
///
/// # async fn example() -> jirapi::Result<()> {
/// // Create from environment variables
/// let client = JiraClient::from_env()?;
///
/// // Or configure manually
/// use jirapi::{Auth, JiraConfig};
/// let config = JiraConfig::new(
///     "https://example.atlassian.net",
///     Auth::Bearer { token: "pat".to_string() },
/// );
/// let client = JiraClient::new(config)?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct JiraClient {
    http: Client,
    base_url: Arc<Url>,
    config: Arc<JiraConfig>,
    verified: Arc<AtomicBool>,
    pub(crate) metadata: Arc<MetadataCache>,
}

impl std::fmt::Debug for JiraClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JiraClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_version", &self.config.api_version)
            .finish_non_exhaustive()
    }
}

impl JiraClient {
    /// Create a client from environment variables.
    ///
    /// Uses `JIRA_URL` for the base URL and either `JIRA_USER` +
    /// `JIRA_API_TOKEN` (basic auth) or `JIRA_AUTH_TOKEN` (bearer).
    ///
    /// # Errors
    ///
    /// Returns an error if `JIRA_URL` or the credentials are not set.
    pub fn from_env() -> Result<Self> {
        let base_url = env::var("JIRA_URL").map_err(|_| {
            JiraError::ConfigMissing("JIRA_URL environment variable not set".to_string())
        })?;

        let auth = match (env::var("JIRA_USER"), env::var("JIRA_API_TOKEN")) {
            (Ok(username), Ok(token)) => Auth::Basic { username, token },
            _ => match env::var("JIRA_AUTH_TOKEN") {
                Ok(token) => Auth::Bearer { token },
                Err(_) => {
                    return Err(JiraError::ConfigMissing(
                        "set JIRA_USER and JIRA_API_TOKEN, or JIRA_AUTH_TOKEN".to_string(),
                    ))
                }
            },
        };

        Self::new(JiraConfig::new(base_url, auth))
    }

    /// Create a new client from a configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is empty, does not parse, or has
    /// no host.
    pub fn new(config: JiraConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(JiraError::ConfigMissing(
                "the Jira base URL is required".to_string(),
            ));
        }

        // Ensure base URL ends with / so relative joins keep any subpath
        let base_url_str = if config.base_url.ends_with('/') {
            config.base_url.clone()
        } else {
            format!("{}/", config.base_url)
        };

        let base_url = Url::parse(&base_url_str)?;
        if base_url.host_str().is_none() {
            return Err(JiraError::ConfigMissing(
                "the Jira base URL must name a host".to_string(),
            ));
        }

        let http = Client::builder()
            .user_agent(USER_AGENT)
            .gzip(true)
            .build()
            .map_err(JiraError::HttpError)?;

        Ok(Self {
            http,
            base_url: Arc::new(base_url),
            config: Arc::new(config),
            verified: Arc::new(AtomicBool::new(false)),
            metadata: Arc::new(MetadataCache::default()),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Default page size for paginated searches.
    pub fn default_page_size(&self) -> u32 {
        self.config.page_size
    }

    /// The configured basic-auth username, if any.
    pub(crate) fn username(&self) -> Option<&str> {
        match &self.config.auth {
            Auth::Basic { username, .. } => Some(username),
            Auth::Bearer { .. } => None,
        }
    }

    /// Build a versioned REST path, e.g. `api("issue/KEY-1")` →
    /// `rest/api/3/issue/KEY-1`.
    pub(crate) fn api(&self, rest: &str) -> String {
        format!("rest/api/{}/{}", self.config.api_version, rest)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.auth {
            Auth::Basic { username, token } => request.basic_auth(username, Some(token)),
            Auth::Bearer { token } => request.bearer_auth(token),
        }
    }

    // -------------------------------------------------------------------
    // Connection gate
    // -------------------------------------------------------------------

    /// Verify the service is reachable and the credentials are accepted.
    ///
    /// The first successful probe is cached for the lifetime of the client
    /// (and its clones); later calls return immediately. Every outbound
    /// request consults this gate before proceeding.
    ///
    /// # Errors
    ///
    /// [`JiraError::Unauthorized`] if the server rejects the credentials
    /// (not retried), or [`JiraError::Connectivity`] once all probe
    /// attempts are exhausted.
    pub async fn can_connect(&self) -> Result<bool> {
        self.ensure_connected().await?;
        Ok(true)
    }

    pub(crate) async fn ensure_connected(&self) -> Result<()> {
        if self.verified.load(Ordering::Acquire) {
            return Ok(());
        }
        self.probe().await?;
        self.verified.store(true, Ordering::Release);
        Ok(())
    }

    async fn probe(&self) -> Result<()> {
        let path = if self.config.cloud {
            "status".to_string()
        } else {
            self.api("serverInfo")
        };
        let url = self.base_url.join(&path)?;

        let mut last: Option<(StatusCode, String)> = None;
        for attempt in 1..=PROBE_ATTEMPTS {
            tracing::debug!(url = %url, attempt, "checking Jira health status");
            let outcome = self
                .authorize(self.http.get(url.clone()))
                .timeout(self.config.request_timeout)
                .send()
                .await;

            match outcome {
                Ok(response) => {
                    let status = response.status();
                    if status == StatusCode::UNAUTHORIZED {
                        return Err(JiraError::Unauthorized(
                            "the Jira server rejected the configured credentials".to_string(),
                        ));
                    }
                    if status == StatusCode::OK {
                        return Ok(());
                    }
                    let body = response.text().await.unwrap_or_default();
                    tracing::warn!(status = %status, attempt, "Jira health check failed");
                    last = Some((status, body));
                }
                Err(err) => {
                    tracing::warn!(error = %err, attempt, "Jira health check failed");
                    last = None;
                }
            }

            if attempt < PROBE_ATTEMPTS {
                sleep(self.config.probe_delay).await;
            }
        }

        Err(JiraError::Connectivity {
            status: last.as_ref().map(|(status, _)| status.as_u16()),
            body: last.map(|(_, body)| body).unwrap_or_default(),
        })
    }

    // -------------------------------------------------------------------
    // Raw requests
    // -------------------------------------------------------------------

    /// Make a GET request.
    pub(crate) async fn get(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::GET, path, None, None).await
    }

    /// Make a GET request with query parameters.
    pub(crate) async fn get_with_query<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<ApiResponse> {
        let query = serde_json::to_value(query)?;
        self.request(Method::GET, path, Some(&query), None).await
    }

    /// Make a POST request with a JSON body.
    pub(crate) async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, None, Some(&body)).await
    }

    /// Make a POST request with query parameters and a JSON body.
    pub(crate) async fn post_with_query<Q: Serialize + ?Sized, B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
        body: &B,
    ) -> Result<ApiResponse> {
        let query = serde_json::to_value(query)?;
        let body = serde_json::to_value(body)?;
        self.request(Method::POST, path, Some(&query), Some(&body))
            .await
    }

    /// Make a PUT request with a JSON body.
    pub(crate) async fn put<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, None, Some(&body)).await
    }

    /// Make a PUT request with query parameters and a JSON body.
    pub(crate) async fn put_with_query<Q: Serialize + ?Sized, B: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
        body: &B,
    ) -> Result<ApiResponse> {
        let query = serde_json::to_value(query)?;
        let body = serde_json::to_value(body)?;
        self.request(Method::PUT, path, Some(&query), Some(&body))
            .await
    }

    /// Make a DELETE request.
    pub(crate) async fn delete(&self, path: &str) -> Result<ApiResponse> {
        self.request(Method::DELETE, path, None, None).await
    }

    /// Make a DELETE request with query parameters.
    pub(crate) async fn delete_with_query<Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<ApiResponse> {
        let query = serde_json::to_value(query)?;
        self.request(Method::DELETE, path, Some(&query), None).await
    }

    /// Make a DELETE request with a JSON body (bulk endpoints).
    pub(crate) async fn delete_with_body<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<ApiResponse> {
        let body = serde_json::to_value(body)?;
        self.request(Method::DELETE, path, None, Some(&body)).await
    }

    /// Execute a request with the configured retry policy.
    ///
    /// Network failures are retried up to the configured count (timeouts
    /// only when `retry_on_timeout` is set); responses whose status is in
    /// `retryable_status_codes` are retried too, with a fixed sleep
    /// between attempts. Retries are invisible to callers: only the final
    /// outcome surfaces.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: Option<&Value>,
        body: Option<&Value>,
    ) -> Result<ApiResponse> {
        self.ensure_connected().await?;

        let url = self.base_url.join(path)?;
        let attempts = self.config.retry_count.saturating_add(1);
        let mut attempt = 0;

        let response = loop {
            attempt += 1;
            let mut request = self
                .authorize(self.http.request(method.clone(), url.clone()))
                .timeout(self.config.request_timeout);
            if let Some(query) = query {
                request = request.query(query);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if attempt < attempts && self.config.retryable_status_codes.contains(&status) {
                        tracing::warn!(status, attempt, "retrying request on response status");
                        sleep(self.config.retry_delay).await;
                        continue;
                    }
                    break response;
                }
                Err(err) => {
                    let give_up =
                        attempt >= attempts || (err.is_timeout() && !self.config.retry_on_timeout);
                    if give_up {
                        return Err(JiraError::HttpError(err));
                    }
                    tracing::warn!(error = %err, attempt, "retrying request on transport error");
                    sleep(self.config.retry_delay).await;
                }
            }
        };

        let status = response.status();
        let body = response.text().await.map_err(JiraError::HttpError)?;
        let response = ApiResponse { status, body };

        if self.config.assert_ok {
            response.ensure_success()?;
        }
        Ok(response)
    }
}

/// A buffered HTTP response: final status code plus raw body.
#[derive(Debug, Clone)]
pub struct ApiResponse {
    status: StatusCode,
    body: String,
}

impl ApiResponse {
    /// The response status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// The raw response body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Deserialize the body as `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.body).map_err(JiraError::ParseError)
    }

    /// Assert the status is a success (2xx), or return an API error with
    /// the message extracted from the body.
    pub fn ensure_success(&self) -> Result<()> {
        if self.status.is_success() {
            return Ok(());
        }
        Err(JiraError::ApiError {
            message: extract_error_message(&self.body, self.status),
            status_code: Some(self.status.as_u16()),
        })
    }

    /// Assert the exact status a mutation endpoint is expected to return.
    pub(crate) fn expect_status(&self, expected: StatusCode, operation: &'static str) -> Result<()> {
        if self.status == expected {
            return Ok(());
        }
        Err(JiraError::Mutation {
            operation,
            status: self.status.as_u16(),
        })
    }

    #[cfg(test)]
    pub(crate) fn for_tests(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Extract a human-readable message from a failed response body.
///
/// Jira reports errors as `{"errorMessages": [...], "errors": {...}}`;
/// some endpoints use a plain `"message"` field instead.
fn extract_error_message(body: &str, status: StatusCode) -> String {
    if body.is_empty() {
        return format!("HTTP {status}");
    }

    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(messages) = json.get("errorMessages").and_then(|m| m.as_array()) {
            let joined: Vec<&str> = messages.iter().filter_map(|m| m.as_str()).collect();
            if !joined.is_empty() {
                return joined.join("; ");
            }
        }
        if let Some(message) = json.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }

    body.to_string()
}
