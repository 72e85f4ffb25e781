//! Header filtering and response decoding applied before recording

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use bytes::Bytes;
use flate2::read::{GzDecoder, ZlibDecoder};
use serde_json::Value;
use tracing::debug;

use super::{Headers, RequestRecord, ResponseRecord};
use crate::{RecorderError, Result};

/// Header mapping as handed over by a framework. Values may be of any
/// type; only strings are ever persisted.
pub type RawHeaders = BTreeMap<String, Value>;

/// Set of header names excluded from recordings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderFilter {
    excluded: BTreeSet<String>,
}

impl HeaderFilter {
    /// Create a filter excluding the given header names
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Whether a header name is excluded, ignoring ASCII case
    #[must_use]
    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(name))
    }

    /// Excluded header names
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.excluded.iter().map(String::as_str)
    }

    /// Keep the entries whose value is a string and whose name is not
    /// excluded. Everything else is dropped without error.
    #[must_use]
    pub fn filter(&self, headers: &RawHeaders) -> Headers {
        headers
            .iter()
            .filter(|(name, _)| !self.is_excluded(name))
            .filter_map(|(name, value)| match value {
                Value::String(text) => Some((name.clone(), text.clone())),
                _ => None,
            })
            .collect()
    }

    /// Remove excluded headers from an outgoing request
    pub fn scrub(&self, request: &mut RequestRecord) {
        if self.excluded.is_empty() {
            return;
        }

        request.headers.retain(|name, _| !self.is_excluded(name));
    }
}

/// Decompress a gzip or deflate encoded response body so the recording is
/// readable. The encoding header is removed and any content length updated.
///
/// # Errors
///
/// Returns error if the body is not valid for its declared encoding
pub fn decode_response(mut response: ResponseRecord) -> Result<ResponseRecord> {
    let Some((encoding_header, encoding)) = response
        .headers
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case("content-encoding"))
        .map(|(name, value)| (name.clone(), value.trim().to_ascii_lowercase()))
    else {
        return Ok(response);
    };

    let decoded = match encoding.as_str() {
        "gzip" | "x-gzip" => read_all(GzDecoder::new(&response.body[..]), &encoding)?,
        "deflate" => read_all(ZlibDecoder::new(&response.body[..]), &encoding)?,
        _ => return Ok(response),
    };

    debug!(
        "Decoded {} response body: {} -> {} bytes",
        encoding,
        response.body.len(),
        decoded.len()
    );

    response.headers.remove(&encoding_header);
    let length = decoded.len().to_string();
    for (name, value) in &mut response.headers {
        if name.eq_ignore_ascii_case("content-length") {
            value.clone_from(&length);
        }
    }
    response.body = Bytes::from(decoded);

    Ok(response)
}

fn read_all(mut reader: impl Read, encoding: &str) -> Result<Vec<u8>> {
    let mut decoded = Vec::new();
    reader
        .read_to_end(&mut decoded)
        .map_err(|source| RecorderError::Decode {
            encoding: encoding.to_string(),
            source,
        })?;
    Ok(decoded)
}
