//! Recorder: cassette paths, request/response translation and the
//! incoming/outgoing save and load operations

use std::ops::Index;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, info};

use super::{
    IncomingRequest, IncomingResponse, CASSETTE_EXTENSION, INCOMING_SUFFIX, OUTGOING_SUFFIX,
};
use crate::cassette::{
    decode_response, Cassette, HeaderFilter, Headers, MatchField, OutgoingSession, RawHeaders,
    RecordMode, RequestRecord, ResponseRecord,
};
use crate::config::Config;
use crate::{RecorderError, Result};

/// Body of a recorded incoming request, decoded according to its content
/// type
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// `application/json` body, parsed
    Json(serde_json::Value),
    /// Any other body, unchanged
    Raw(Bytes),
}

/// Recorder for one logical recording: a pair of incoming/outgoing
/// cassettes sharing a name
#[derive(Debug, Clone)]
pub struct Recorder {
    recording_name: String,
    cassettes_path: PathBuf,
    incoming_cassette_path: PathBuf,
    outgoing_cassette_path: PathBuf,
    outgoing_record_mode: RecordMode,
    match_on: Vec<MatchField>,
    decode_compressed_response: bool,
    filter: HeaderFilter,
}

impl Recorder {
    /// Create a recorder with the default configuration
    pub fn new(
        recording_name: impl Into<String>,
        cassettes_path: impl Into<PathBuf>,
        outgoing_record_mode: RecordMode,
    ) -> Self {
        Self::with_config(
            recording_name,
            cassettes_path,
            outgoing_record_mode,
            &Config::default(),
        )
    }

    /// Create a recorder with an explicit configuration
    pub fn with_config(
        recording_name: impl Into<String>,
        cassettes_path: impl Into<PathBuf>,
        outgoing_record_mode: RecordMode,
        config: &Config,
    ) -> Self {
        let recording_name = recording_name.into();
        let cassettes_path = cassettes_path.into();

        let incoming_cassette_path =
            cassette_path(&cassettes_path, &format!("{recording_name}{INCOMING_SUFFIX}"));
        let outgoing_cassette_path =
            cassette_path(&cassettes_path, &format!("{recording_name}{OUTGOING_SUFFIX}"));

        Self {
            recording_name,
            cassettes_path,
            incoming_cassette_path,
            outgoing_cassette_path,
            outgoing_record_mode,
            match_on: config.match_on.clone(),
            decode_compressed_response: config.decode_compressed_response,
            filter: HeaderFilter::new(config.filter_headers.iter().cloned()),
        }
    }

    /// Recording name
    #[must_use]
    pub fn recording_name(&self) -> &str {
        &self.recording_name
    }

    /// Directory holding the cassettes
    #[must_use]
    pub fn cassettes_path(&self) -> &Path {
        &self.cassettes_path
    }

    /// Path of the incoming cassette
    #[must_use]
    pub fn incoming_cassette_path(&self) -> &Path {
        &self.incoming_cassette_path
    }

    /// Path of the outgoing cassette
    #[must_use]
    pub fn outgoing_cassette_path(&self) -> &Path {
        &self.outgoing_cassette_path
    }

    /// Record mode used for outgoing calls
    #[must_use]
    pub fn outgoing_record_mode(&self) -> RecordMode {
        self.outgoing_record_mode
    }

    /// Header filter applied to everything recorded
    #[must_use]
    pub fn header_filter(&self) -> &HeaderFilter {
        &self.filter
    }

    /// Keep only string-valued headers that are not filtered out
    #[must_use]
    pub fn filter_headers(&self, headers: &RawHeaders) -> Headers {
        self.filter.filter(headers)
    }

    /// Translate a framework request into a request record
    pub fn to_request_record<R>(&self, request: &R) -> RequestRecord
    where
        R: IncomingRequest + ?Sized,
    {
        RequestRecord {
            method: request.http_method().to_string(),
            uri: request.raw_uri(),
            body: request.raw_body(),
            headers: self.filter_headers(&request.header_map()),
        }
    }

    /// Translate a framework response into a response record
    pub fn to_response_record<R>(&self, response: &R) -> ResponseRecord
    where
        R: IncomingResponse + ?Sized,
    {
        let mut record = ResponseRecord::new(response.status_code(), response.reason_phrase());
        record.headers = self.filter_headers(&response.header_map());
        record.body = response.raw_body();
        record
    }

    /// Save the incoming request/response pair as the only interaction of
    /// the incoming cassette, replacing any previous recording. Response
    /// bodies are decoded so the file stays readable.
    ///
    /// # Errors
    ///
    /// Returns error if the body cannot be decoded or the file written
    /// (the cassettes directory is not created)
    pub fn save_incoming_interaction<Req, Resp>(&self, request: &Req, response: &Resp) -> Result<()>
    where
        Req: IncomingRequest + ?Sized,
        Resp: IncomingResponse + ?Sized,
    {
        let request = self.to_request_record(request);
        let response = self.to_response_record(response);

        let mut cassette = Cassette::new(&self.incoming_cassette_path, RecordMode::All)
            .with_before_record_response(decode_response);
        cassette.append(request, response)?;
        cassette.save(true)?;

        info!(
            "Saved incoming interaction for '{}' to {}",
            self.recording_name,
            self.incoming_cassette_path.display()
        );
        Ok(())
    }

    /// Load the recorded incoming request.
    ///
    /// # Errors
    ///
    /// Returns error if the cassette is missing or malformed, or
    /// `IncomingInteractionCount` unless it holds exactly one interaction
    pub fn load_incoming_interaction(&self) -> Result<RequestRecord> {
        let cassette = Cassette::open(&self.incoming_cassette_path, RecordMode::None)?;

        if cassette.len() != 1 {
            return Err(RecorderError::IncomingInteractionCount {
                path: self.incoming_cassette_path.clone(),
                count: cassette.len(),
            });
        }

        let request = cassette.interactions()[0].request.clone();
        debug!("Loaded incoming request {} {}", request.method, request.uri);
        Ok(request)
    }

    /// Load the recorded incoming request body, parsed as JSON when its
    /// content type is `application/json`
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be loaded or a JSON body does not
    /// parse
    pub fn load_incoming_request_body(&self) -> Result<RequestBody> {
        let request = self.load_incoming_interaction()?;

        if request.content_type() == Some("application/json") {
            return Ok(RequestBody::Json(serde_json::from_slice(&request.body)?));
        }

        Ok(RequestBody::Raw(request.body))
    }

    /// Load the outgoing cassette configured for this recorder, without
    /// activating it
    ///
    /// # Errors
    ///
    /// Returns error if an existing cassette file cannot be read or parsed
    pub fn outgoing_cassette(&self) -> Result<Cassette> {
        let cassette = Cassette::load(&self.outgoing_cassette_path, self.outgoing_record_mode)?
            .with_match_on(self.match_on.clone())
            .with_header_filter(self.filter.clone());

        Ok(if self.decode_compressed_response {
            cassette.with_before_record_response(decode_response)
        } else {
            cassette
        })
    }

    /// Activate the outgoing cassette for the current thread. Outgoing
    /// calls made through a `RecordingClient` are matched against it, and
    /// recorded depending on the record mode, until the returned guard is
    /// finished or dropped.
    ///
    /// ```no_run
    /// # use test_recorder::cassette::RecordMode;
    /// # use test_recorder::recording::Recorder;
    /// # fn main() -> test_recorder::Result<()> {
    /// let recorder = Recorder::new("0_checkout", "cassettes", RecordMode::All);
    /// let session = recorder.use_outgoing_cassette()?;
    /// // ... code making outgoing calls ...
    /// let cassette = session.finish()?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Returns error if an existing cassette file cannot be read or parsed
    pub fn use_outgoing_cassette(&self) -> Result<OutgoingSession> {
        Ok(OutgoingSession::enter(self.outgoing_cassette()?))
    }
}

fn cassette_path(cassettes_path: &Path, name: &str) -> PathBuf {
    cassettes_path.join(format!("{name}.{CASSETTE_EXTENSION}"))
}

/// Independently configured recorders, one per recording name
#[derive(Debug, Clone)]
pub struct Recorders {
    recorders: Vec<Recorder>,
}

impl Recorders {
    /// Create one recorder per name with shared settings
    pub fn new<I, S>(
        recording_names: I,
        cassettes_path: impl AsRef<Path>,
        outgoing_record_mode: RecordMode,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(
            recording_names,
            cassettes_path,
            outgoing_record_mode,
            &Config::default(),
        )
    }

    /// Create one recorder per name with an explicit configuration
    pub fn with_config<I, S>(
        recording_names: I,
        cassettes_path: impl AsRef<Path>,
        outgoing_record_mode: RecordMode,
        config: &Config,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let cassettes_path = cassettes_path.as_ref();
        Self {
            recorders: recording_names
                .into_iter()
                .map(|name| Recorder::with_config(name, cassettes_path, outgoing_record_mode, config))
                .collect(),
        }
    }

    /// Recorder at `index`
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Recorder> {
        self.recorders.get(index)
    }

    /// Number of recorders
    #[must_use]
    pub fn len(&self) -> usize {
        self.recorders.len()
    }

    /// Whether there are no recorders
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.recorders.is_empty()
    }
}

impl Index<usize> for Recorders {
    type Output = Recorder;

    fn index(&self, index: usize) -> &Recorder {
        &self.recorders[index]
    }
}
