//! Test client abstraction used to dispatch replayed requests

use bytes::Bytes;

use crate::cassette::Headers;
use crate::recording::IncomingResponse;
use crate::Result;

/// Fixed options passed with every replayed call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientOptions {
    /// Follow redirects
    pub follow: bool,
    /// Issue the request over HTTPS
    pub secure: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            follow: true,
            secure: true,
        }
    }
}

/// A generic call into the system under test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRequest {
    /// HTTP method
    pub method: String,
    /// URI as recorded
    pub uri: String,
    /// Request body
    pub body: Bytes,
    /// Content type of the body, if recorded
    pub content_type: Option<String>,
    /// Extra headers forwarded from the recording
    pub headers: Headers,
    /// Client options
    pub options: ClientOptions,
}

/// Test client able to send a generic request to the system under test
pub trait TestClient {
    /// Response type returned by the client
    type Response: IncomingResponse;

    /// Dispatch `request`
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be dispatched
    fn generic(&mut self, request: ClientRequest) -> Result<Self::Response>;
}

impl<F, R> TestClient for F
where
    F: FnMut(ClientRequest) -> Result<R>,
    R: IncomingResponse,
{
    type Response = R;

    fn generic(&mut self, request: ClientRequest) -> Result<R> {
        self(request)
    }
}
