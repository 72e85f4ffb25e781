//! Recorders mapping one logical recording to its incoming and outgoing
//! cassettes

mod exchange;
mod recorder;

pub use exchange::{IncomingRequest, IncomingResponse};
pub use recorder::{Recorder, Recorders, RequestBody};

/// Suffix of the cassette holding the incoming request/response pair
pub const INCOMING_SUFFIX: &str = "_incoming";

/// Suffix of the cassette holding calls made while handling the request
pub const OUTGOING_SUFFIX: &str = "_outgoing";

/// Cassette file extension
pub const CASSETTE_EXTENSION: &str = "json";
