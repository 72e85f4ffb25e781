//! Framework-neutral views of incoming requests and outgoing responses

use bytes::Bytes;
use hyper::header::HeaderMap;
use hyper::{Request, Response};
use serde_json::Value;

use crate::cassette::RawHeaders;

/// What the recorder needs from a framework request
pub trait IncomingRequest {
    /// HTTP method
    fn http_method(&self) -> &str;

    /// Absolute URI including the query string
    fn raw_uri(&self) -> String;

    /// Raw body
    fn raw_body(&self) -> Bytes;

    /// Header (or request metadata) mapping; values need not be strings
    fn header_map(&self) -> RawHeaders;
}

/// What the recorder needs from a framework response
pub trait IncomingResponse {
    /// Status code
    fn status_code(&self) -> u16;

    /// Reason phrase
    fn reason_phrase(&self) -> String;

    /// Header mapping; values need not be strings
    fn header_map(&self) -> RawHeaders;

    /// Raw body
    fn raw_body(&self) -> Bytes;
}

/// Header values that are not visible ASCII are kept as byte arrays, so the
/// header filter drops them.
fn raw_headers(headers: &HeaderMap) -> RawHeaders {
    headers
        .iter()
        .map(|(name, value)| {
            let value = match value.to_str() {
                Ok(text) => Value::String(text.to_string()),
                Err(_) => Value::from(value.as_bytes().to_vec()),
            };
            (name.to_string(), value)
        })
        .collect()
}

impl IncomingRequest for Request<Bytes> {
    fn http_method(&self) -> &str {
        self.method().as_str()
    }

    fn raw_uri(&self) -> String {
        let uri = self.uri();
        if uri.scheme().is_some() && uri.authority().is_some() {
            return uri.to_string();
        }

        let host = self
            .headers()
            .get(hyper::header::HOST)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("localhost");
        let path = uri.path_and_query().map_or("/", |pq| pq.as_str());
        format!("http://{host}{path}")
    }

    fn raw_body(&self) -> Bytes {
        self.body().clone()
    }

    fn header_map(&self) -> RawHeaders {
        raw_headers(self.headers())
    }
}

impl IncomingResponse for Response<Bytes> {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }

    fn reason_phrase(&self) -> String {
        self.status()
            .canonical_reason()
            .unwrap_or_default()
            .to_string()
    }

    fn header_map(&self) -> RawHeaders {
        raw_headers(self.headers())
    }

    fn raw_body(&self) -> Bytes {
        self.body().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_relative_uri_uses_host_header() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/items?page=2")
            .header("Host", "testserver")
            .body(Bytes::from_static(b"{}"))
            .unwrap();

        assert_eq!(request.http_method(), "POST");
        assert_eq!(request.raw_uri(), "http://testserver/api/items?page=2");
        assert_eq!(&request.raw_body()[..], b"{}");
    }

    #[test]
    fn test_absolute_uri_kept() {
        let request = Request::builder()
            .uri("https://example.com:8443/x?y=1")
            .body(Bytes::new())
            .unwrap();

        assert_eq!(request.raw_uri(), "https://example.com:8443/x?y=1");
    }

    #[test]
    fn test_opaque_header_values_not_strings() {
        let mut request = Request::builder()
            .uri("/")
            .header("x-plain", "text")
            .body(Bytes::new())
            .unwrap();
        request.headers_mut().insert(
            "x-binary",
            HeaderValue::from_bytes(&[0xfa, 0xfb]).unwrap(),
        );

        let headers = request.header_map();

        assert_eq!(headers["x-plain"], Value::String("text".to_string()));
        assert!(!headers["x-binary"].is_string());
    }

    #[test]
    fn test_response_view() {
        let response = Response::builder()
            .status(404)
            .header("Content-Type", "text/plain")
            .body(Bytes::from_static(b"missing"))
            .unwrap();

        assert_eq!(response.status_code(), 404);
        assert_eq!(response.reason_phrase(), "Not Found");
        assert_eq!(
            response.header_map()["content-type"],
            Value::String("text/plain".to_string())
        );
        assert_eq!(&IncomingResponse::raw_body(&response)[..], b"missing");
    }
}
