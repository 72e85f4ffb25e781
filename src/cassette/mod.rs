//! Cassette engine: on-disk format, request matching, record modes and
//! scoped outgoing sessions

mod filters;
mod format;
mod matcher;
mod session;
mod store;
mod transport;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use filters::{decode_response, HeaderFilter, RawHeaders};
pub use format::{CassetteFile, Headers, Interaction, RequestRecord, ResponseRecord, Status};
pub use matcher::requests_match;
pub use session::{session_active, OutgoingSession};
pub use store::{BeforeRecordResponse, Cassette};
pub use transport::{HyperTransport, RecordingClient, Transport};

/// Cassette format version written to disk
pub const CASSETTE_VERSION: u32 = 1;

/// Request components compared for outgoing replay: method, port, query, path
pub const DEFAULT_MATCH_ON: [MatchField; 4] = [
    MatchField::Method,
    MatchField::Port,
    MatchField::Query,
    MatchField::Path,
];

/// Policy for capturing and replaying interactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMode {
    /// Record every request, never replay
    All,
    /// Replay only; an unmatched request is an error
    None,
    /// Record if the cassette file did not exist, otherwise behave like `None`
    Once,
    /// Replay matches and record anything new
    NewEpisodes,
}

impl RecordMode {
    /// Name used in cassette files and error messages
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::None => "none",
            Self::Once => "once",
            Self::NewEpisodes => "new_episodes",
        }
    }
}

impl fmt::Display for RecordMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Component of a request that takes part in matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchField {
    /// HTTP method, case-insensitive
    Method,
    /// URI scheme
    Scheme,
    /// URI host
    Host,
    /// Port, defaulted from the scheme when absent
    Port,
    /// URI path
    Path,
    /// Query parameters, order-insensitive
    Query,
    /// Full URI string
    Uri,
    /// Raw request body
    Body,
}
