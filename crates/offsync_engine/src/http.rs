//! HTTP transport implementation.
//!
//! This module maps the remote sync protocol onto HTTP-style calls. The
//! actual HTTP client is abstracted via a trait to allow different
//! implementations (reqwest, ureq, a platform webview, etc.).

use crate::error::{EngineError, EngineResult};
use crate::monitor::{LinkClass, ProbeSample, ReachabilityProbe};
use crate::transport::RemoteTransport;
use offsync_protocol::RemoteRecord;
use std::time::Instant;

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport.
pub trait HttpClient: Send + Sync {
    /// Sends a request and returns the response.
    ///
    /// `body` is `None` for bodiless methods (GET, HEAD, DELETE).
    fn request(
        &self,
        method: &str,
        url: &str,
        body: Option<&[u8]>,
    ) -> Result<HttpResponse, String>;
}

/// A minimal HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Creates a response.
    pub fn new(status: u16, body: Vec<u8>) -> Self {
        Self { status, body }
    }

    /// Returns true for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP-based remote transport.
///
/// Maps queue operations onto REST-style endpoints:
/// create → `POST /{type}`, update → `PUT /{type}/{id}`,
/// delete → `DELETE /{type}/{id}`, fetch → `GET /{type}/{id}`.
/// Any non-2xx response is a failure and drives the retry path.
/// Bodies are CBOR.
pub struct HttpRemote<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpRemote<C> {
    /// Creates a new HTTP transport.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }

    /// Returns the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn call(&self, method: &str, path: &str, body: Option<&[u8]>) -> EngineResult<HttpResponse> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .request(method, &url, body)
            .map_err(EngineError::remote_retryable)?;

        if !response.is_success() {
            return Err(EngineError::remote_retryable(format!(
                "HTTP {} for {method} {path}",
                response.status
            )));
        }

        Ok(response)
    }
}

impl<C: HttpClient> RemoteTransport for HttpRemote<C> {
    fn create(&self, entity_type: &str, _entity_id: &str, payload: &[u8]) -> EngineResult<()> {
        self.call("POST", &format!("/{entity_type}"), Some(payload))?;
        Ok(())
    }

    fn update(&self, entity_type: &str, entity_id: &str, payload: &[u8]) -> EngineResult<()> {
        self.call("PUT", &format!("/{entity_type}/{entity_id}"), Some(payload))?;
        Ok(())
    }

    fn delete(&self, entity_type: &str, entity_id: &str) -> EngineResult<()> {
        self.call("DELETE", &format!("/{entity_type}/{entity_id}"), None)?;
        Ok(())
    }

    fn fetch(&self, entity_type: &str, entity_id: &str) -> EngineResult<Option<RemoteRecord>> {
        let url = format!("{}/{entity_type}/{entity_id}", self.base_url);
        let response = self
            .client
            .request("GET", &url, None)
            .map_err(EngineError::remote_retryable)?;

        if response.status == 404 {
            return Ok(None);
        }
        if !response.is_success() {
            return Err(EngineError::remote_retryable(format!(
                "HTTP {} for GET /{entity_type}/{entity_id}",
                response.status
            )));
        }

        let record: RemoteRecord = ciborium::de::from_reader(response.body.as_slice())
            .map_err(|e| EngineError::remote_fatal(format!("invalid remote record body: {e}")))?;
        Ok(Some(record))
    }
}

/// Reachability probe issuing a `HEAD /health` request.
///
/// Measures round-trip latency only; HTTP cannot observe the link type,
/// so samples report [`LinkClass::Unknown`].
pub struct HttpProbe<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpProbe<C> {
    /// Creates a new probe against the given base URL.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        Self {
            base_url: base_url.into(),
            client,
        }
    }
}

impl<C: HttpClient> ReachabilityProbe for HttpProbe<C> {
    fn probe(&self) -> Result<ProbeSample, String> {
        let url = format!("{}/health", self.base_url);
        let start = Instant::now();
        let response = self.client.request("HEAD", &url, None)?;

        if !response.is_success() {
            return Err(format!("HTTP {} for HEAD /health", response.status));
        }

        Ok(ProbeSample {
            latency_ms: start.elapsed().as_millis() as u64,
            link: LinkClass::Unknown,
        })
    }
}
