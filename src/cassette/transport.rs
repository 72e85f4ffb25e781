//! HTTP transports for outgoing calls

use std::time::Duration;

use http_body_util::{BodyExt, Full};
use hyper::body::Bytes;
use hyper::header::{HeaderName, HeaderValue};
use hyper::{Method, Request};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use super::session::with_active;
use super::{Headers, RequestRecord, ResponseRecord};
use crate::{RecorderError, Result};

/// Something that can perform an HTTP call
pub trait Transport {
    /// Send `request` and return the response
    ///
    /// # Errors
    ///
    /// Returns error if the call fails
    fn send(&self, request: &RequestRecord) -> Result<ResponseRecord>;
}

impl<F> Transport for F
where
    F: Fn(&RequestRecord) -> Result<ResponseRecord>,
{
    fn send(&self, request: &RequestRecord) -> Result<ResponseRecord> {
        self(request)
    }
}

/// Blocking HTTP/1 client for live calls while recording.
///
/// Drives a hyper client on its own current-thread runtime, so callers stay
/// synchronous. Plain `http` only.
pub struct HyperTransport {
    runtime: Runtime,
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HyperTransport {
    /// Create a new transport
    ///
    /// # Errors
    ///
    /// Returns error if the runtime cannot be started
    pub fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;

        let client = {
            let _guard = runtime.enter();
            Client::builder(TokioExecutor::new())
                .pool_idle_timeout(Duration::from_secs(90))
                .pool_max_idle_per_host(10)
                .build_http()
        };

        Ok(Self { runtime, client })
    }

    async fn forward(&self, request: &RequestRecord) -> Result<ResponseRecord> {
        debug!("Forwarding {} to {}", request.method, request.uri);

        let method = Method::from_bytes(request.method.as_bytes()).map_err(|e| {
            RecorderError::InvalidRequest(format!("Invalid HTTP method '{}': {e}", request.method))
        })?;

        let mut http_request = Request::builder()
            .method(method)
            .uri(request.uri.as_str())
            .body(Full::new(request.body.clone()))
            .map_err(|e| RecorderError::InvalidRequest(format!("Failed to build request: {e}")))?;

        for (name, value) in &request.headers {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    http_request.headers_mut().append(name, value);
                }
                _ => debug!("Skipping header not valid on the wire: {}", name),
            }
        }

        let response = self.client.request(http_request).await.map_err(|e| {
            warn!("Request failed: {e}");
            RecorderError::Transport(format!("Request failed: {e}"))
        })?;

        let status = response.status();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();

        let body = response
            .into_body()
            .collect()
            .await
            .map_err(|e| RecorderError::Transport(format!("Failed to read response body: {e}")))?
            .to_bytes();

        let mut record =
            ResponseRecord::new(status.as_u16(), status.canonical_reason().unwrap_or_default());
        record.headers = headers;
        record.body = body;
        Ok(record)
    }
}

impl Transport for HyperTransport {
    fn send(&self, request: &RequestRecord) -> Result<ResponseRecord> {
        self.runtime.block_on(self.forward(request))
    }
}

/// Client that routes requests through the outgoing session active on the
/// current thread, falling back to the wrapped transport when there is none
pub struct RecordingClient<T> {
    inner: T,
}

impl<T: Transport> RecordingClient<T> {
    /// Wrap a transport
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    /// The wrapped transport
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

impl RecordingClient<HyperTransport> {
    /// Recording client over a live hyper transport
    ///
    /// # Errors
    ///
    /// Returns error if the transport cannot be created
    pub fn live() -> Result<Self> {
        Ok(Self::new(HyperTransport::new()?))
    }
}

impl<T: Transport> Transport for RecordingClient<T> {
    fn send(&self, request: &RequestRecord) -> Result<ResponseRecord> {
        match with_active(|cassette| cassette.respond(request.clone(), &self.inner)) {
            Some(result) => result,
            None => self.inner.send(request),
        }
    }
}
