//! JSON cassette format

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::{MatchField, RecordMode, CASSETTE_VERSION};

/// Header mapping as persisted: text values only, ordered by name
pub type Headers = BTreeMap<String, String>;

/// Recorded HTTP request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// HTTP method
    pub method: String,
    /// Absolute URI including the query string
    pub uri: String,
    /// Raw body
    #[serde(with = "request_body", default)]
    pub body: Bytes,
    /// Request headers
    #[serde(default)]
    pub headers: Headers,
}

impl RequestRecord {
    /// Create a request without body or headers
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            body: Bytes::new(),
            headers: Headers::new(),
        }
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Content type of the body.
    ///
    /// Header names are compared after upper-casing and mapping `-` to `_`,
    /// so `Content-Type`, `content-type` and the CGI-style `CONTENT_TYPE`
    /// all match.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .iter()
            .find(|(name, _)| normalize_header_name(name) == "CONTENT_TYPE")
            .map(|(_, value)| value.as_str())
    }
}

/// Status line of a recorded response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Status {
    /// Status code
    pub code: u16,
    /// Reason phrase
    pub message: String,
}

/// Recorded HTTP response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    /// Status code and reason phrase
    pub status: Status,
    /// Response headers
    #[serde(default)]
    pub headers: Headers,
    /// Raw body
    #[serde(with = "response_body")]
    pub body: Bytes,
}

impl ResponseRecord {
    /// Create a response without body or headers
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self {
            status: Status {
                code,
                message: message.into(),
            },
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Set the body
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Status code
    #[must_use]
    pub fn code(&self) -> u16 {
        self.status.code
    }
}

/// One request/response pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Interaction {
    /// Request as recorded
    pub request: RequestRecord,
    /// Response as recorded
    pub response: ResponseRecord,
}

/// Top-level cassette document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CassetteFile {
    /// Interactions in recording order
    pub interactions: Vec<Interaction>,
    /// Format version
    #[serde(default = "default_version")]
    pub version: u32,
    /// Record mode the cassette was written with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_mode: Option<RecordMode>,
    /// Matching rule the cassette was written with
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub match_on: Vec<MatchField>,
}

fn default_version() -> u32 {
    CASSETTE_VERSION
}

pub(crate) fn normalize_header_name(name: &str) -> String {
    name.chars()
        .map(|c| if c == '-' { '_' } else { c.to_ascii_uppercase() })
        .collect()
}

/// Request bodies are a plain string, or `{"base64_string": ...}` when the
/// bytes are not UTF-8.
mod request_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use bytes::Bytes;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    #[serde(untagged)]
    enum StoredBody {
        Text(String),
        Encoded { base64_string: String },
    }

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(body) {
            Ok(text) => serializer.serialize_str(text),
            Err(_) => StoredBody::Encoded {
                base64_string: STANDARD.encode(body),
            }
            .serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        match Option::<StoredBody>::deserialize(deserializer)? {
            None => Ok(Bytes::new()),
            Some(StoredBody::Text(text)) => Ok(Bytes::from(text)),
            Some(StoredBody::Encoded { base64_string }) => STANDARD
                .decode(base64_string)
                .map(Bytes::from)
                .map_err(D::Error::custom),
        }
    }
}

/// Response bodies are `{"string": ...}`, or `{"base64_string": ...}` when
/// the bytes are not UTF-8.
mod response_body {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use bytes::Bytes;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    #[derive(Serialize, Deserialize)]
    enum TaggedBody {
        #[serde(rename = "string")]
        Text(String),
        #[serde(rename = "base64_string")]
        Encoded(String),
    }

    pub fn serialize<S: Serializer>(body: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(body) {
            Ok(text) => TaggedBody::Text(text.to_string()).serialize(serializer),
            Err(_) => TaggedBody::Encoded(STANDARD.encode(body)).serialize(serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Bytes, D::Error> {
        match TaggedBody::deserialize(deserializer)? {
            TaggedBody::Text(text) => Ok(Bytes::from(text)),
            TaggedBody::Encoded(encoded) => STANDARD
                .decode(encoded)
                .map(Bytes::from)
                .map_err(D::Error::custom),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn interaction() -> Interaction {
        Interaction {
            request: RequestRecord::new("POST", "http://testserver/api/items?page=2")
                .with_body(&b"{\"a\":1}"[..])
                .with_header("CONTENT_TYPE", "application/json"),
            response: ResponseRecord::new(201, "Created")
                .with_header("Content-Type", "application/json")
                .with_body(&b"{\"id\":7}"[..]),
        }
    }

    #[test]
    fn test_interaction_json_shape() {
        let value = serde_json::to_value(interaction()).unwrap();

        assert_eq!(
            value,
            json!({
                "request": {
                    "method": "POST",
                    "uri": "http://testserver/api/items?page=2",
                    "body": "{\"a\":1}",
                    "headers": {"CONTENT_TYPE": "application/json"}
                },
                "response": {
                    "status": {"code": 201, "message": "Created"},
                    "headers": {"Content-Type": "application/json"},
                    "body": {"string": "{\"id\":7}"}
                }
            })
        );
    }

    #[test]
    fn test_binary_bodies_survive() {
        let mut interaction = interaction();
        interaction.request.body = Bytes::from_static(&[0xff, 0x00, 0xfe]);
        interaction.response.body = Bytes::from_static(&[0x1f, 0x8b, 0xff]);

        let value = serde_json::to_value(&interaction).unwrap();
        assert!(value["request"]["body"]["base64_string"].is_string());
        assert!(value["response"]["body"]["base64_string"].is_string());

        let parsed: Interaction = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, interaction);
    }

    #[test]
    fn test_null_request_body() {
        let parsed: RequestRecord = serde_json::from_value(json!({
            "method": "GET",
            "uri": "http://example.com/",
            "body": null,
            "headers": {}
        }))
        .unwrap();

        assert!(parsed.body.is_empty());
    }

    #[test]
    fn test_cassette_file_defaults() {
        let file: CassetteFile = serde_json::from_str(r#"{"interactions": []}"#).unwrap();
        assert_eq!(file.version, CASSETTE_VERSION);
        assert!(file.record_mode.is_none());
        assert!(file.match_on.is_empty());
    }

    #[test]
    fn test_content_type_lookup() {
        let cgi = RequestRecord::new("GET", "/").with_header("CONTENT_TYPE", "text/plain");
        let http = RequestRecord::new("GET", "/").with_header("content-type", "text/html");
        let none = RequestRecord::new("GET", "/");

        assert_eq!(cgi.content_type(), Some("text/plain"));
        assert_eq!(http.content_type(), Some("text/html"));
        assert_eq!(none.content_type(), None);
    }
}
