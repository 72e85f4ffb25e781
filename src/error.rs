//! Error types for the test recorder

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::cassette::RecordMode;

/// Result type for recorder operations
pub type Result<T> = std::result::Result<T, RecorderError>;

/// Errors that can occur while recording or replaying
#[derive(Debug, Error)]
pub enum RecorderError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Cassette or body could not be (de)serialized
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// An incoming cassette must hold exactly one interaction
    #[error("Incoming cassette {} should have 1 recording, found {count}", .path.display())]
    IncomingInteractionCount {
        /// Cassette file
        path: PathBuf,
        /// Number of interactions found
        count: usize,
    },

    /// No recorded interaction matched an outgoing request
    #[error("No recorded interaction for {method} {uri} (record mode: {mode})")]
    UnmatchedRequest {
        /// Request method
        method: String,
        /// Request URI
        uri: String,
        /// Record mode of the cassette in use
        mode: RecordMode,
    },

    /// Replayed request produced a different status code
    #[error("Expected status code {expected}, got {actual}")]
    UnexpectedStatus {
        /// Status the test expected
        expected: u16,
        /// Status the system under test returned
        actual: u16,
    },

    /// Header requested for forwarding is absent from the recording
    #[error("Header not present in recorded request: {0}")]
    MissingHeader(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request could not be turned into an HTTP call
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Live HTTP call failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Compressed body could not be decoded
    #[error("Failed to decode {encoding} body: {source}")]
    Decode {
        /// Content encoding that failed
        encoding: String,
        /// Underlying error
        source: io::Error,
    },
}
