//! Request matching for outgoing replay

use hyper::Uri;
use url::form_urlencoded;

use super::{MatchField, RequestRecord};

/// URI split into the components the matchers compare
#[derive(Debug, PartialEq, Eq)]
struct UriParts {
    scheme: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: Vec<(String, String)>,
}

impl UriParts {
    fn parse(raw: &str) -> Self {
        let Ok(uri) = raw.parse::<Uri>() else {
            // Unparseable URIs compare by their raw text as the path
            return Self {
                scheme: String::new(),
                host: String::new(),
                port: None,
                path: raw.to_string(),
                query: Vec::new(),
            };
        };

        let scheme = uri.scheme_str().unwrap_or_default().to_ascii_lowercase();
        let port = uri.port_u16().or(match scheme.as_str() {
            "http" => Some(80),
            "https" => Some(443),
            _ => None,
        });

        Self {
            host: uri.host().unwrap_or_default().to_ascii_lowercase(),
            port,
            path: uri.path().to_string(),
            query: parse_query(uri.query().unwrap_or_default()),
            scheme,
        }
    }
}

/// Parse a query string into sorted, form-decoded pairs
fn parse_query(query: &str) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();

    pairs.sort();
    pairs
}

/// Check whether two requests agree on every listed component
#[must_use]
pub fn requests_match(a: &RequestRecord, b: &RequestRecord, match_on: &[MatchField]) -> bool {
    let left = UriParts::parse(&a.uri);
    let right = UriParts::parse(&b.uri);

    match_on.iter().all(|field| match field {
        MatchField::Method => a.method.eq_ignore_ascii_case(&b.method),
        MatchField::Scheme => left.scheme == right.scheme,
        MatchField::Host => left.host == right.host,
        MatchField::Port => left.port == right.port,
        MatchField::Path => left.path == right.path,
        MatchField::Query => left.query == right.query,
        MatchField::Uri => a.uri == b.uri,
        MatchField::Body => a.body == b.body,
    })
}
