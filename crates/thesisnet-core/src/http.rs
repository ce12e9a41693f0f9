//! HTTP access through the CORS-style proxy collaborator.
//!
//! The harvester never talks to repositories directly: every request is a
//! single GET of `<proxy prefix><url-encoded target>`. The proxy answers with
//! the target's status and body text, which callers interpret.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;

/// Upper bound for a single request (connect + body)
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Gap between consecutive page fetches against one repository
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(200);

/// Connect timeout, kept below the request bound so slow DNS fails early
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Network tuning shared by every caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpConfig {
    /// Request bound; expiry counts as a transport failure
    pub timeout: Duration,
    /// Politeness delay between pages of one harvest
    pub page_delay: Duration,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }
}

/// Raw answer relayed by the proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyResponse {
    pub status: u16,
    pub body: String,
}

impl ProxyResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body of a 2xx response; anything else is a transport failure.
    pub fn into_success(self) -> Result<String, TransportError> {
        if self.is_success() {
            Ok(self.body)
        } else {
            Err(TransportError::Status {
                status: self.status,
            })
        }
    }
}

/// The proxy collaborator: forwards one URL, returns status and text.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, target: &str) -> Result<ProxyResponse, TransportError>;
}

/// reqwest-backed transport, optionally routed through a URL-prefix proxy.
pub struct ProxyTransport {
    client: reqwest::Client,
    prefix: Option<String>,
    timeout: Duration,
}

impl ProxyTransport {
    /// `prefix` is prepended to the url-encoded target, e.g.
    /// `https://proxy.example/?url=`. `None` fetches targets directly.
    pub fn new(prefix: Option<String>, config: &HttpConfig) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(config.timeout))
            .timeout(config.timeout)
            .pool_max_idle_per_host(4)
            .build()
            .map_err(|e| TransportError::from_reqwest(&e, config.timeout))?;
        let prefix = prefix.filter(|p| !p.trim().is_empty());
        Ok(Self {
            client,
            prefix,
            timeout: config.timeout,
        })
    }

    /// URL actually requested for `target`.
    pub fn request_url(&self, target: &str) -> String {
        match &self.prefix {
            Some(prefix) => {
                let encoded: String = url::form_urlencoded::byte_serialize(target.as_bytes()).collect();
                format!("{prefix}{encoded}")
            }
            None => target.to_string(),
        }
    }
}

#[async_trait]
impl Transport for ProxyTransport {
    async fn get(&self, target: &str) -> Result<ProxyResponse, TransportError> {
        let url = self.request_url(target);
        log::debug!("GET {target}");
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, self.timeout))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&e, self.timeout))?;
        Ok(ProxyResponse { status, body })
    }
}

/// Current-thread runtime: all harvesting is cooperative on one thread.
pub static SHARED_RUNTIME: LazyLock<tokio::runtime::Runtime> = LazyLock::new(|| {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
});

/// Run `fut` to completion, bounded by `limit`.
pub async fn with_timeout<T>(
    limit: Duration,
    fut: impl std::future::Future<Output = Result<T, TransportError>>,
) -> Result<T, TransportError> {
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout(limit)),
    }
}
