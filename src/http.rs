//! Shared HTTP plumbing for the backend REST clients
//!
//! Each API client owns an [`ApiClient`] rooted at its own path prefix
//! (`/api/emails`, `/api/drafts`, `/api/gmail`). Every request is decorated
//! with the bearer token from the session provider, bounded by the
//! configured timeout, and non-2xx responses are mapped onto
//! [`ReplyDeskError`].

use reqwest::{header, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::{ReplyDeskError, Result};
use crate::session::SessionProvider;

/// Header carrying the per-attempt idempotency token on sends
pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";

#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: Arc<dyn SessionProvider>,
    timeout: Duration,
}

impl ApiClient {
    pub fn new(
        base_url: &str,
        prefix: &str,
        session: Arc<dyn SessionProvider>,
        timeout: Duration,
    ) -> Result<Self> {
        // Client-wide timeout so it also bounds reading the body
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ReplyDeskError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            http,
            base_url: join_url(base_url, prefix),
            session,
            timeout,
        })
    }

    pub fn from_config(
        config: &ApiConfig,
        prefix: &str,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self> {
        Self::new(&config.base_url, prefix, session, config.timeout())
    }

    /// Same transport and session, different path prefix
    pub fn scoped(&self, prefix: &str) -> Self {
        Self {
            http: self.http.clone(),
            base_url: join_url(&self.base_url, prefix),
            session: Arc::clone(&self.session),
            timeout: self.timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.base_url, path)
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.url(path))
            .header(header::ACCEPT, "application/json")
    }

    pub async fn get_json<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T> {
        let response = self.send(self.request(Method::GET, path).query(query)).await?;
        self.decode(response).await
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(self.request(Method::POST, path).json(body)).await?;
        self.decode(response).await
    }

    pub async fn put_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let response = self.send(self.request(Method::PUT, path).json(body)).await?;
        self.decode(response).await
    }

    /// Request without a body whose response is decoded as JSON
    pub async fn call_json<T: DeserializeOwned>(&self, method: Method, path: &str) -> Result<T> {
        let response = self.send(self.request(method, path)).await?;
        self.decode(response).await
    }

    /// Request whose response body is ignored
    pub async fn call_empty(&self, request: RequestBuilder) -> Result<()> {
        self.send(request).await?;
        Ok(())
    }

    /// Attach auth, enforce the timeout and map error statuses
    pub async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match self.session.current_session().await? {
            Some(session) => request.bearer_auth(&session.access_token),
            None => {
                debug!("No active session, sending request without Authorization header");
                request
            }
        };

        let request = request.build()?;
        let method = request.method().clone();
        let url = request.url().clone();
        debug!("{} {}", method, url);

        let response = self
            .http
            .execute(request)
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();
        let error = ReplyDeskError::from_status(status.as_u16(), &body, retry_after);
        warn!("{} {} failed: {}", method, url, error);
        Err(error)
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Timeouts carry the configured limit; everything else maps as usual
    fn transport_error(&self, error: reqwest::Error) -> ReplyDeskError {
        if error.is_timeout() {
            warn!("Request timed out after {:?}: {}", self.timeout, error);
            return ReplyDeskError::Timeout(self.timeout.as_secs());
        }
        error.into()
    }
}

/// Join a base and a path with exactly one slash between them
fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        base.to_string()
    } else {
        format!("{}/{}", base, path)
    }
}
