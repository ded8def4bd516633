//! HTTP client for the DMART backend.
//!
//! The session client owns the cookie jar and attaches the bearer token
//! from login; it is used for managed endpoints only. The public client
//! sends no credentials. Callers resolve the endpoint from the
//! active-space store on every call and pass it in.

use std::sync::Arc;

use reqwest::cookie::{CookieStore, Jar};
use reqwest::header::{self, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use tokio::sync::RwLock;

use super::error::ApiError;
use super::types::ApiResponse;
use crate::state::{ActiveSpace, EndpointConfig};

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// HTTP client wrapper bound to an [`ActiveSpace`].
pub struct ApiClient {
    session: Client,
    public: Client,
    jar: Arc<Jar>,
    space: Arc<ActiveSpace>,
    access_token: RwLock<Option<String>>,
}

impl ApiClient {
    /// Create a client that reads its endpoint from `space`.
    pub fn new(space: Arc<ActiveSpace>) -> Result<Self, ApiError> {
        let jar = Arc::new(Jar::default());
        let session = base_builder().cookie_provider(jar.clone()).build()?;
        let public = base_builder().build()?;
        Ok(Self {
            session,
            public,
            jar,
            space,
            access_token: RwLock::new(None),
        })
    }

    /// The endpoint active right now.
    pub fn endpoint(&self) -> EndpointConfig {
        self.space.get()
    }

    pub fn space(&self) -> &Arc<ActiveSpace> {
        &self.space
    }

    /// Store the bearer token sent on managed requests.
    pub async fn set_access_token(&self, token: String) {
        *self.access_token.write().await = Some(token);
    }

    /// Forget the bearer token (used on logout).
    pub async fn clear_access_token(&self) {
        *self.access_token.write().await = None;
    }

    pub async fn has_access_token(&self) -> bool {
        self.access_token.read().await.is_some()
    }

    /// POST a JSON body without credentials.
    pub async fn post<T: Serialize + ?Sized>(
        &self,
        endpoint: &EndpointConfig,
        path: &str,
        body: &T,
    ) -> Result<Response, ApiError> {
        let url = endpoint.url(path);
        log::debug!("POST {}", url);
        let resp = self.public.post(&url).json(body).send().await?;
        check_status(resp).await
    }

    /// GET an absolute URL without credentials.
    pub async fn get(&self, url: &str) -> Result<Response, ApiError> {
        log::debug!("GET {}", url);
        let resp = self.public.get(url).send().await?;
        check_status(resp).await
    }

    /// POST a JSON body to a managed endpoint with session credentials.
    pub async fn authenticated_post<T: Serialize + ?Sized>(
        &self,
        endpoint: &EndpointConfig,
        path: &str,
        body: &T,
    ) -> Result<Response, ApiError> {
        let url = endpoint.url(path);
        log::debug!("POST {} (session)", url);
        let builder = self.with_credentials(self.session.post(&url).json(body)).await;
        check_status(builder.send().await?).await
    }

    /// POST a multipart form to a managed endpoint with session credentials.
    pub async fn authenticated_multipart_post(
        &self,
        endpoint: &EndpointConfig,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<Response, ApiError> {
        let url = endpoint.url(path);
        log::debug!("POST {} (multipart, session)", url);
        let builder = self.with_credentials(self.session.post(&url).multipart(form)).await;
        check_status(builder.send().await?).await
    }

    /// Copy `Set-Cookie` headers of a credential-less response into the
    /// session jar so later managed calls carry the session.
    pub fn capture_session(&self, resp: &Response) {
        let mut cookies = resp.headers().get_all(header::SET_COOKIE).iter().peekable();
        if cookies.peek().is_some() {
            log::debug!("Capturing session cookies from {}", resp.url());
            self.jar.set_cookies(&mut cookies, resp.url());
        }
    }

    async fn with_credentials(&self, builder: RequestBuilder) -> RequestBuilder {
        match self.access_token.read().await.as_deref() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

fn base_builder() -> reqwest::ClientBuilder {
    let mut headers = HeaderMap::new();
    headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));
    headers.insert(header::CONNECTION, HeaderValue::from_static("close"));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));

    Client::builder()
        .default_headers(headers)
        .pool_max_idle_per_host(0)
        .connect_timeout(std::time::Duration::from_secs(CONNECT_TIMEOUT_SECS))
}

async fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    log::warn!("Backend returned {}: {}", status, body);
    Err(ApiError::Http { status, body })
}

/// Parse a successful response body as an [`ApiResponse`].
pub async fn read_json(resp: Response) -> Result<ApiResponse, ApiError> {
    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::malformed(e.to_string()))
}
